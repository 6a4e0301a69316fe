//! Time-series alignment for planning builds.
//!
//! Source profiles arrive as bare sample vectors sliced out of array files.
//! This crate puts them on a calendar: it checks lengths against the weather
//! year, drops 29 February when the calendar asks for it, expands monthly
//! values to the sample resolution and derives hourly reserve requirements.

use std::sync::Arc;

use gridplan_core::TimeSeries;
use thiserror::Error;

mod calendar;

pub use calendar::{is_leap_year, Calendar, LeapDayPolicy, TimeAxis};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TsError {
    #[error("series has {actual} samples, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("monthly profile needs 12 values, got {0}")]
    MonthCount(usize),

    #[error("sample {index} is {value}")]
    NonFinite { index: usize, value: f64 },

    #[error("Reserve requirement is zero")]
    ZeroRequirement,

    #[error("year {0} is outside the supported calendar")]
    InvalidYear(i32),

    #[error("resolution of {0} minutes does not divide a day")]
    Resolution(u32),
}

pub type TsResult<T> = Result<T, TsError>;

/// Binds `samples` to `weather_year` on `calendar`.
///
/// Samples already at the expected length are shared without copying. A
/// leap-year series that still includes 29 February is trimmed when the
/// calendar drops leap days; any other length is an error, as is a NaN or
/// infinite sample.
pub fn align(
    name: &str,
    samples: Arc<[f64]>,
    solve_year: Option<i32>,
    weather_year: i32,
    calendar: &Calendar,
) -> TsResult<TimeSeries> {
    let axis = calendar.axis(weather_year)?;
    let expected = axis.len();
    let per_day = calendar.samples_per_day();
    if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
        return Err(TsError::NonFinite {
            index,
            value: samples[index],
        });
    }

    let values = if samples.len() == expected {
        samples
    } else if calendar.leap_day == LeapDayPolicy::Drop
        && is_leap_year(weather_year)
        && samples.len() == expected + per_day
    {
        let leap_start = 59 * per_day;
        let mut trimmed = Vec::with_capacity(expected);
        trimmed.extend_from_slice(&samples[..leap_start]);
        trimmed.extend_from_slice(&samples[leap_start + per_day..]);
        Arc::from(trimmed)
    } else {
        return Err(TsError::Length {
            expected,
            actual: samples.len(),
        });
    };

    Ok(TimeSeries {
        name: name.to_string(),
        solve_year,
        weather_year,
        start: axis.start,
        resolution_minutes: axis.resolution_minutes,
        skip_leap_day: axis.skips_leap_day(),
        values,
    })
}

/// Repeats each of twelve monthly values across that month's samples.
pub fn monthly_to_hourly(year: i32, monthly: &[f64], calendar: &Calendar) -> TsResult<Vec<f64>> {
    if monthly.len() != 12 {
        return Err(TsError::MonthCount(monthly.len()));
    }
    let per_day = calendar.samples_per_day();
    let mut out = Vec::with_capacity(calendar.expected_sample_count(year));
    for (month, value) in (1..=12u32).zip(monthly) {
        let days = calendar.days_in_month(year, month)?;
        out.extend(std::iter::repeat(*value).take(days * per_day));
    }
    Ok(out)
}

/// Fractions of load, wind output and solar output held as reserve.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReserveFractions {
    #[serde(default)]
    pub load: f64,
    #[serde(default)]
    pub wind: f64,
    #[serde(default)]
    pub solar: f64,
}

/// A capacity-factor profile scaled by installed capacity.
#[derive(Debug, Clone, Copy)]
pub struct CapacityProfile<'a> {
    pub capacity_mw: f64,
    pub profile: &'a [f64],
}

/// Hourly requirement: fraction-weighted wind and solar output plus
/// fraction-weighted load.
///
/// Inputs of unequal length are truncated to the shortest one. A requirement
/// that is zero everywhere (including no inputs at all) is an error.
pub fn reserve_requirement(
    wind: &[CapacityProfile<'_>],
    solar: &[CapacityProfile<'_>],
    loads: &[&[f64]],
    fractions: &ReserveFractions,
) -> TsResult<Vec<f64>> {
    let len = wind
        .iter()
        .chain(solar)
        .map(|p| p.profile.len())
        .chain(loads.iter().map(|l| l.len()))
        .min()
        .unwrap_or(0);

    let mut requirement = vec![0.0; len];
    for (group, fraction) in [(wind, fractions.wind), (solar, fractions.solar)] {
        for unit in group {
            for (slot, cf) in requirement.iter_mut().zip(unit.profile) {
                *slot += fraction * unit.capacity_mw * cf;
            }
        }
    }
    for load in loads {
        for (slot, value) in requirement.iter_mut().zip(load.iter()) {
            *slot += fractions.load * value;
        }
    }

    if requirement.iter().all(|v| *v == 0.0) {
        return Err(TsError::ZeroRequirement);
    }
    Ok(requirement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_shares_correct_length() {
        let samples: Arc<[f64]> = vec![1.0; 8760].into();
        let ts = align("demand", samples.clone(), Some(2030), 2011, &Calendar::hourly()).unwrap();
        assert!(Arc::ptr_eq(&ts.values, &samples));
        assert_eq!(ts.solve_year, Some(2030));
        assert_eq!(ts.start.to_string(), "2011-01-01 00:00:00");
    }

    #[test]
    fn align_trims_leap_day() {
        let mut raw = vec![0.0; 8784];
        // mark 29 February
        for v in &mut raw[59 * 24..60 * 24] {
            *v = 9.0;
        }
        let ts = align("demand", raw.into(), None, 2012, &Calendar::hourly()).unwrap();
        assert_eq!(ts.len(), 8760);
        assert!(ts.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn align_rejects_wrong_length() {
        let err = align("demand", vec![1.0; 100].into(), None, 2012, &Calendar::hourly())
            .unwrap_err();
        assert_eq!(
            err,
            TsError::Length {
                expected: 8760,
                actual: 100
            }
        );
    }

    #[test]
    fn align_rejects_missing_samples() {
        let mut raw = vec![1.0; 8760];
        raw[17] = f64::NAN;
        let err = align("demand", raw.into(), None, 2011, &Calendar::hourly()).unwrap_err();
        assert!(matches!(err, TsError::NonFinite { index: 17, .. }));
    }

    #[test]
    fn aligned_series_sits_on_calendar_axis() {
        let calendar = Calendar::hourly();
        let ts = align("demand", vec![0.0; 8760].into(), None, 2012, &calendar).unwrap();
        let axis = calendar.axis(2012).unwrap();
        for index in [0, 59 * 24 - 1, 59 * 24, 8759] {
            assert_eq!(ts.timestamp(index), axis.timestamp(index));
        }
        assert_eq!(ts.timestamp(59 * 24).unwrap().to_string(), "2012-03-01 00:00:00");
        assert_eq!(ts.timestamp(8759).unwrap().to_string(), "2012-12-31 23:00:00");

        let keep = Calendar {
            leap_day: LeapDayPolicy::Keep,
            ..Calendar::default()
        };
        let ts = align("demand", vec![0.0; 8784].into(), None, 2012, &keep).unwrap();
        assert_eq!(ts.timestamp(59 * 24).unwrap().to_string(), "2012-02-29 00:00:00");
    }

    #[test]
    fn monthly_expansion_lengths() {
        let keep = Calendar {
            leap_day: LeapDayPolicy::Keep,
            ..Calendar::default()
        };
        let monthly: Vec<f64> = (1..=12).map(f64::from).collect();
        assert_eq!(monthly_to_hourly(2024, &monthly, &keep).unwrap().len(), 366 * 24);
        assert_eq!(monthly_to_hourly(1900, &monthly, &keep).unwrap().len(), 365 * 24);

        let hourly = monthly_to_hourly(2024, &monthly, &Calendar::hourly()).unwrap();
        assert_eq!(hourly.len(), 8760);
        assert_eq!(hourly[0], 1.0);
        assert_eq!(hourly[31 * 24], 2.0);
        assert_eq!(hourly[8759], 12.0);
    }

    #[test]
    fn monthly_expansion_needs_twelve_values() {
        let err = monthly_to_hourly(2024, &[0.5; 11], &Calendar::hourly()).unwrap_err();
        assert_eq!(err, TsError::MonthCount(11));
    }

    #[test]
    fn reserve_requirement_weights_inputs() {
        let wind_cf = vec![1.0; 24];
        let solar_cf = vec![0.0; 24];
        let load = vec![0.5; 24];
        let fractions = ReserveFractions {
            load: 0.2,
            wind: 0.1,
            solar: 0.1,
        };
        let req = reserve_requirement(
            &[CapacityProfile {
                capacity_mw: 1.0,
                profile: &wind_cf,
            }],
            &[CapacityProfile {
                capacity_mw: 2.0,
                profile: &solar_cf,
            }],
            &[load.as_slice()],
            &fractions,
        )
        .unwrap();
        assert_eq!(req.len(), 24);
        assert!((req[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn reserve_requirement_uses_shortest_input() {
        let wind_cf = vec![1.0; 10];
        let solar_cf = vec![1.0; 15];
        let load = vec![1.0; 24];
        let req = reserve_requirement(
            &[CapacityProfile {
                capacity_mw: 1.0,
                profile: &wind_cf,
            }],
            &[CapacityProfile {
                capacity_mw: 2.0,
                profile: &solar_cf,
            }],
            &[load.as_slice()],
            &ReserveFractions {
                load: 0.2,
                wind: 0.1,
                solar: 0.1,
            },
        )
        .unwrap();
        assert_eq!(req.len(), 10);
    }

    #[test]
    fn reserve_requirement_zero_is_error() {
        let err = reserve_requirement(&[], &[], &[], &ReserveFractions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Reserve requirement is zero");
    }
}
