//! Raw dataset readers.
//!
//! Readers only parse. They turn each resolved source into rows or numeric
//! columns without interpreting them, so they can run on worker threads
//! while the builder stays single-threaded.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use gridplan_core::{BuildError, BuildResult};

use crate::mapping::{DatasetFormat, ResolvedDataset};

pub mod array;
pub mod tabular;

pub use array::{ArraySchema, ArrayTable};
pub use tabular::{TableRow, TableSource};

#[derive(Debug, Clone)]
pub enum RawData {
    Table(Vec<TableSource>),
    Array(Vec<ArrayTable>),
}

/// Parsed contents of every source of one dataset.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub name: String,
    pub data: RawData,
}

impl RawDataset {
    pub fn tables(&self) -> &[TableSource] {
        match &self.data {
            RawData::Table(tables) => tables,
            RawData::Array(_) => &[],
        }
    }

    pub fn arrays(&self) -> &[ArrayTable] {
        match &self.data {
            RawData::Array(arrays) => arrays,
            RawData::Table(_) => &[],
        }
    }

    /// Data rows for tabular datasets, distinct value labels for arrays. A
    /// label split across several year-bound files is one record.
    pub fn record_count(&self) -> usize {
        match &self.data {
            RawData::Table(tables) => tables.iter().map(|t| t.rows.len()).sum(),
            RawData::Array(arrays) => arrays
                .iter()
                .flat_map(|a| a.labels())
                .collect::<BTreeSet<_>>()
                .len(),
        }
    }
}

/// Fails with `Timeout` once `cancel` is raised.
pub(crate) fn check_cancel(dataset: &str, cancel: &AtomicBool) -> BuildResult<()> {
    if cancel.load(Ordering::Relaxed) {
        tracing::debug!(dataset, "read cancelled");
        return Err(BuildError::Timeout { elapsed_ms: 0 });
    }
    Ok(())
}

pub fn read_dataset(dataset: &ResolvedDataset, cancel: &AtomicBool) -> BuildResult<RawDataset> {
    let data = match dataset.format() {
        DatasetFormat::Tabular => RawData::Table(
            dataset
                .sources
                .iter()
                .map(|source| tabular::read_table(dataset, source, cancel))
                .collect::<BuildResult<_>>()?,
        ),
        DatasetFormat::Array => RawData::Array(
            dataset
                .sources
                .iter()
                .map(|source| array::read_array(&dataset.name, source, cancel))
                .collect::<BuildResult<_>>()?,
        ),
    };
    let raw = RawDataset {
        name: dataset.name.clone(),
        data,
    };
    tracing::debug!(
        dataset = %raw.name,
        sources = dataset.sources.len(),
        records = raw.record_count(),
        "read dataset"
    );
    Ok(raw)
}
