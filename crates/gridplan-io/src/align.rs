//! Binding array slices to components.
//!
//! [`ProfileCache`] slices array containers by label and year and keeps each
//! slice as a shared `Arc<[f64]>`, so every component bound to the same
//! source slice points at one allocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use gridplan_core::{BuildError, BuildResult, TimeSeries};
use gridplan_ts::{Calendar, TsError};

use crate::readers::RawDataset;

type SliceKey = (String, String, Option<i32>, Option<i32>);

#[derive(Debug, Default)]
pub struct ProfileCache {
    slices: BTreeMap<SliceKey, Arc<[f64]>>,
    hits: usize,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Requests answered without slicing again.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Samples of `label` for the requested years.
    ///
    /// Only containers whose file binding admits the years are searched.
    /// `Ok(None)` means no container carries the label at all; a label that
    /// exists only for other years is an `UnresolvedYear` error.
    pub fn slice(
        &mut self,
        dataset: &RawDataset,
        label: &str,
        solve_year: Option<i32>,
        weather_year: Option<i32>,
    ) -> BuildResult<Option<Arc<[f64]>>> {
        let key = (
            dataset.name.clone(),
            label.to_string(),
            solve_year,
            weather_year,
        );
        if let Some(values) = self.slices.get(&key) {
            self.hits += 1;
            return Ok(Some(Arc::clone(values)));
        }

        let candidate = dataset
            .arrays()
            .iter()
            .find(|table| table.has_column(label) && table.admits(solve_year, weather_year));
        let Some(table) = candidate else {
            if dataset.arrays().iter().any(|table| table.has_column(label)) {
                return Err(BuildError::UnresolvedYear {
                    dataset: dataset.name.clone(),
                    solve_year,
                    weather_year,
                });
            }
            return Ok(None);
        };

        let values = table.slice(&dataset.name, label, solve_year, weather_year)?;
        if let Some(values) = &values {
            self.slices.insert(key, Arc::clone(values));
        }
        Ok(values)
    }

    /// Slices `label` and aligns it to `weather_year` as series `name` owned
    /// by `owner`.
    #[allow(clippy::too_many_arguments)]
    pub fn series(
        &mut self,
        dataset: &RawDataset,
        label: &str,
        name: &str,
        owner: &str,
        solve_year: Option<i32>,
        weather_year: i32,
        calendar: &Calendar,
    ) -> BuildResult<Option<TimeSeries>> {
        let Some(values) = self.slice(dataset, label, solve_year, Some(weather_year))? else {
            return Ok(None);
        };
        align_values(
            &dataset.name,
            owner,
            name,
            values,
            solve_year,
            weather_year,
            calendar,
        )
        .map(Some)
    }
}

/// Wraps [`gridplan_ts::align`], naming the dataset and owner on failure.
pub fn align_values(
    dataset: &str,
    owner: &str,
    name: &str,
    values: Arc<[f64]>,
    solve_year: Option<i32>,
    weather_year: i32,
    calendar: &Calendar,
) -> BuildResult<TimeSeries> {
    gridplan_ts::align(name, values, solve_year, weather_year, calendar).map_err(|err| match err {
        TsError::Length { expected, actual } => BuildError::SeriesLength {
            dataset: dataset.to_string(),
            owner: owner.to_string(),
            expected,
            actual,
        },
        TsError::InvalidYear(year) => BuildError::UnresolvedYear {
            dataset: dataset.to_string(),
            solve_year,
            weather_year: Some(year),
        },
        other => BuildError::OutOfRange {
            dataset: dataset.to_string(),
            entity: owner.to_string(),
            detail: other.to_string(),
        },
    })
}
