//! Delimited text sources.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use csv::{ReaderBuilder, StringRecord, Trim};
use gridplan_core::{BuildError, BuildResult};
use serde::de::DeserializeOwned;

use crate::mapping::{ResolvedDataset, SourceDescriptor, YearBinding};

#[derive(Debug, Clone)]
pub struct TableRow {
    /// 1-based line in the source file (the header is line 1)
    pub line: u64,
    pub record: StringRecord,
}

/// One parsed file with its canonical header.
#[derive(Debug, Clone)]
pub struct TableSource {
    pub path: PathBuf,
    pub binding: YearBinding,
    pub headers: StringRecord,
    pub rows: Vec<TableRow>,
}

impl TableSource {
    /// Decodes `row` into `T` by canonical column name.
    pub fn deserialize<T: DeserializeOwned>(
        &self,
        dataset: &str,
        row: &TableRow,
    ) -> BuildResult<T> {
        row.record
            .deserialize(Some(&self.headers))
            .map_err(|e| BuildError::parse(dataset, Some(row.line), e.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

fn csv_error(dataset: &str, err: csv::Error) -> BuildError {
    let line = err.position().map(|p| p.line());
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => BuildError::Io(io),
        _ => BuildError::parse(dataset, line, message),
    }
}

fn open(dataset: &str, path: &Path) -> BuildResult<csv::Reader<File>> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(dataset, e))
}

/// Raw header cells of `path`.
pub fn read_header(dataset: &str, path: &Path) -> BuildResult<Vec<String>> {
    let mut reader = open(dataset, path)?;
    let headers = reader.headers().map_err(|e| csv_error(dataset, e))?;
    Ok(headers.iter().map(str::to_string).collect())
}

pub fn read_table(
    dataset: &ResolvedDataset,
    source: &SourceDescriptor,
    cancel: &AtomicBool,
) -> BuildResult<TableSource> {
    let name = dataset.name.as_str();
    let mut reader = open(name, &source.path)?;
    let raw_headers = reader.headers().map_err(|e| csv_error(name, e))?.clone();
    let headers: StringRecord = raw_headers
        .iter()
        .map(|raw| dataset.spec.canonical_name(raw))
        .collect::<Vec<_>>()
        .into();

    let mut rows = Vec::new();
    for record in reader.records() {
        super::check_cancel(name, cancel)?;
        let record = record.map_err(|e| csv_error(name, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(TableRow { line, record });
    }

    Ok(TableSource {
        path: source.path.clone(),
        binding: source.binding,
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DatasetSpec;
    use serde::Deserialize;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        technology: String,
        vintage: Option<String>,
        capacity: f64,
    }

    fn dataset(file: &tempfile::NamedTempFile) -> (ResolvedDataset, SourceDescriptor) {
        let spec = DatasetSpec::tabular("cap.csv", &[])
            .rename("i", "technology")
            .rename("v", "vintage")
            .rename("Value", "capacity");
        let source = SourceDescriptor {
            path: file.path().to_path_buf(),
            binding: YearBinding::default(),
            columns: Vec::new(),
        };
        let resolved = ResolvedDataset {
            name: "capacity".into(),
            spec,
            sources: vec![source.clone()],
        };
        (resolved, source)
    }

    #[test]
    fn reads_rows_with_canonical_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "i, v ,Value\ngas-cc, new ,250.5\nupv_1,,40\n").unwrap();
        let (resolved, source) = dataset(&file);

        let table = read_table(&resolved, &source, &AtomicBool::new(false)).unwrap();
        assert!(table.has_column("capacity"));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 2);

        let first: Row = table.deserialize("capacity", &table.rows[0]).unwrap();
        assert_eq!(first.vintage.as_deref(), Some("new"));
        let second: Row = table.deserialize("capacity", &table.rows[1]).unwrap();
        assert_eq!(second.vintage, None);
        assert_eq!(second.capacity, 40.0);
    }

    #[test]
    fn bad_value_reports_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "i,v,Value\ngas-cc,new,lots\n").unwrap();
        let (resolved, source) = dataset(&file);
        let table = read_table(&resolved, &source, &AtomicBool::new(false)).unwrap();

        let err = table.deserialize::<Row>("capacity", &table.rows[0]).unwrap_err();
        match err {
            BuildError::Parse { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cancelled_read_stops() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "i,v,Value\ngas-cc,new,1\n").unwrap();
        let (resolved, source) = dataset(&file);
        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);
        let err = read_table(&resolved, &source, &cancel).unwrap_err();
        assert_eq!(err.kind(), gridplan_core::ErrorKind::Timeout);
    }
}
