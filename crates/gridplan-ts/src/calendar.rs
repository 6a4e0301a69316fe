use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{TsError, TsResult};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// What a leap year's 29 February becomes on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeapDayPolicy {
    /// Leap years have the same sample count as other years
    #[default]
    Drop,
    Keep,
}

/// Sampling calendar shared by every series in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Calendar {
    #[serde(default = "default_resolution")]
    pub resolution_minutes: u32,
    #[serde(default)]
    pub leap_day: LeapDayPolicy,
}

fn default_resolution() -> u32 {
    60
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            resolution_minutes: default_resolution(),
            leap_day: LeapDayPolicy::default(),
        }
    }
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

impl Calendar {
    pub fn hourly() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> TsResult<()> {
        if self.resolution_minutes == 0 || MINUTES_PER_DAY % self.resolution_minutes != 0 {
            return Err(TsError::Resolution(self.resolution_minutes));
        }
        Ok(())
    }

    pub fn samples_per_day(&self) -> usize {
        (MINUTES_PER_DAY / self.resolution_minutes.max(1)) as usize
    }

    /// Days on the axis for `year` after the leap-day policy is applied.
    pub fn days_in_year(&self, year: i32) -> usize {
        match (is_leap_year(year), self.leap_day) {
            (true, LeapDayPolicy::Keep) => 366,
            _ => 365,
        }
    }

    /// Samples a series for `weather_year` must have: 8760 for hourly data
    /// unless leap days are kept.
    pub fn expected_sample_count(&self, weather_year: i32) -> usize {
        self.days_in_year(weather_year) * self.samples_per_day()
    }

    /// Days in `month` (1-based) as they appear on the axis.
    pub fn days_in_month(&self, year: i32, month: u32) -> TsResult<usize> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(TsError::InvalidYear(year))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(TsError::InvalidYear(year))?;
        let mut days = (next - first).num_days() as usize;
        if month == 2 && days == 29 && self.leap_day == LeapDayPolicy::Drop {
            days = 28;
        }
        Ok(days)
    }

    pub fn axis(&self, weather_year: i32) -> TsResult<TimeAxis> {
        let start = NaiveDate::from_ymd_opt(weather_year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(TsError::InvalidYear(weather_year))?;
        Ok(TimeAxis {
            start,
            resolution_minutes: self.resolution_minutes,
            len: self.expected_sample_count(weather_year),
            skip_leap_day: is_leap_year(weather_year) && self.leap_day == LeapDayPolicy::Drop,
        })
    }
}

/// Timestamps for one weather year under a [`Calendar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    pub start: NaiveDateTime,
    pub resolution_minutes: u32,
    pub len: usize,
    skip_leap_day: bool,
}

impl TimeAxis {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn skips_leap_day(&self) -> bool {
        self.skip_leap_day
    }

    /// Timestamp of sample `index`, stepping over 29 February when the
    /// calendar drops it.
    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        if index >= self.len {
            return None;
        }
        let step = Duration::minutes(i64::from(self.resolution_minutes) * index as i64);
        let ts = self.start.checked_add_signed(step)?;
        if self.skip_leap_day && (ts.month() > 2 || (ts.month() == 2 && ts.day() == 29)) {
            return ts.checked_add_signed(Duration::days(1));
        }
        Some(ts)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.len).filter_map(move |i| self.timestamp(i))
    }
}
