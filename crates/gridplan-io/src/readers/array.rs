//! Arrow IPC array containers.
//!
//! An array container holds one `Float64` column per label (a region, or a
//! `technology|region` resource) and, when it spans several years, `Int64`
//! index columns named `solve_year` and `weather_year`. The schema metadata
//! key `dims` lists the container's dimension labels, comma separated.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use gridplan_core::{BuildError, BuildResult};

use crate::mapping::{SourceDescriptor, YearBinding};

pub const SOLVE_YEAR_COLUMN: &str = "solve_year";
pub const WEATHER_YEAR_COLUMN: &str = "weather_year";
pub const DIMS_METADATA_KEY: &str = "dims";

fn arrow_error(dataset: &str, err: ArrowError) -> BuildError {
    match err {
        ArrowError::IoError(_, io) => BuildError::Io(io),
        other => BuildError::parse(dataset, None, other.to_string()),
    }
}

fn is_index(name: &str) -> bool {
    name == SOLVE_YEAR_COLUMN || name == WEATHER_YEAR_COLUMN
}

/// Field names and declared dimensions of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySchema {
    pub columns: Vec<String>,
    pub dims: Vec<String>,
}

fn schema_of(schema: &Schema) -> ArraySchema {
    let dims = schema
        .metadata()
        .get(DIMS_METADATA_KEY)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    ArraySchema {
        columns: schema.fields().iter().map(|f| f.name().clone()).collect(),
        dims,
    }
}

pub fn read_schema(dataset: &str, path: &Path) -> BuildResult<ArraySchema> {
    let file = File::open(path)?;
    let reader = FileReader::try_new(file, None).map_err(|e| arrow_error(dataset, e))?;
    Ok(schema_of(&reader.schema()))
}

/// A fully loaded array container.
#[derive(Debug, Clone)]
pub struct ArrayTable {
    pub path: PathBuf,
    pub binding: YearBinding,
    pub dims: Vec<String>,
    /// Per-row solve year, when the container carries that index
    pub solve_years: Option<Vec<i32>>,
    pub weather_years: Option<Vec<i32>>,
    /// Value columns by label
    pub columns: BTreeMap<String, Arc<[f64]>>,
    pub rows: usize,
}

impl ArrayTable {
    pub fn has_column(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Weather years the container covers, from its index or its binding.
    pub fn weather_year_set(&self) -> BTreeSet<i32> {
        match (&self.weather_years, self.binding.weather_year) {
            (Some(years), _) => years.iter().copied().collect(),
            (None, Some(year)) => BTreeSet::from([year]),
            (None, None) => BTreeSet::new(),
        }
    }

    /// True when the container has no index or binding for weather years.
    pub fn is_year_agnostic(&self) -> bool {
        self.weather_years.is_none() && self.binding.weather_year.is_none()
    }

    /// True when the file-level binding does not rule out the requested years.
    pub fn admits(&self, solve_year: Option<i32>, weather_year: Option<i32>) -> bool {
        self.binding.admits(solve_year, weather_year)
    }

    /// Samples of `label` for the requested years.
    ///
    /// Index columns filter rows; a container without an index returns the
    /// whole column without copying. `Ok(None)` means the label is absent.
    pub fn slice(
        &self,
        dataset: &str,
        label: &str,
        solve_year: Option<i32>,
        weather_year: Option<i32>,
    ) -> BuildResult<Option<Arc<[f64]>>> {
        let Some(column) = self.columns.get(label) else {
            return Ok(None);
        };
        let filter_solve = self.solve_years.as_ref().zip(solve_year);
        let filter_weather = self.weather_years.as_ref().zip(weather_year);
        if filter_solve.is_none() && filter_weather.is_none() {
            return Ok(Some(Arc::clone(column)));
        }

        let keep = |row: usize| {
            filter_solve.map_or(true, |(years, wanted)| years[row] == wanted)
                && filter_weather.map_or(true, |(years, wanted)| years[row] == wanted)
        };
        let values: Vec<f64> = (0..self.rows)
            .filter(|row| keep(*row))
            .map(|row| column[row])
            .collect();
        if values.is_empty() {
            return Err(BuildError::UnresolvedYear {
                dataset: dataset.to_string(),
                solve_year,
                weather_year,
            });
        }
        Ok(Some(values.into()))
    }
}

fn index_values(dataset: &str, name: &str, array: &ArrayRef) -> BuildResult<Vec<i32>> {
    let convert = |v: i64| {
        i32::try_from(v)
            .map_err(|_| BuildError::parse(dataset, None, format!("{name} value {v} out of range")))
    };
    if let Some(values) = array.as_any().downcast_ref::<Int64Array>() {
        return values
            .iter()
            .map(|v| {
                v.ok_or_else(|| BuildError::parse(dataset, None, format!("null in {name}")))
                    .and_then(convert)
            })
            .collect();
    }
    if let Some(values) = array.as_any().downcast_ref::<Int32Array>() {
        return values
            .iter()
            .map(|v| v.ok_or_else(|| BuildError::parse(dataset, None, format!("null in {name}"))))
            .collect();
    }
    Err(BuildError::parse(
        dataset,
        None,
        format!("index column '{name}' must be an integer column"),
    ))
}

pub fn read_array(
    dataset: &str,
    source: &SourceDescriptor,
    cancel: &AtomicBool,
) -> BuildResult<ArrayTable> {
    let file = File::open(&source.path)?;
    let reader = FileReader::try_new(file, None).map_err(|e| arrow_error(dataset, e))?;
    let schema = schema_of(&reader.schema());

    let mut solve_years: Option<Vec<i32>> = None;
    let mut weather_years: Option<Vec<i32>> = None;
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut rows = 0;

    for batch in reader {
        super::check_cancel(dataset, cancel)?;
        let batch = batch.map_err(|e| arrow_error(dataset, e))?;
        let batch_schema = batch.schema();
        for (field, array) in batch_schema.fields().iter().zip(batch.columns()) {
            let name = field.name();
            if is_index(name) {
                let years = index_values(dataset, name, array)?;
                let slot = if name == SOLVE_YEAR_COLUMN {
                    &mut solve_years
                } else {
                    &mut weather_years
                };
                slot.get_or_insert_with(Vec::new).extend(years);
                continue;
            }
            let column = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    BuildError::parse(
                        dataset,
                        None,
                        format!("column '{name}' is {}, expected Float64", field.data_type()),
                    )
                })?;
            // Nulls become NaN and are rejected when the column is aligned.
            values
                .entry(name.clone())
                .or_default()
                .extend(column.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        rows += batch.num_rows();
    }

    Ok(ArrayTable {
        path: source.path.clone(),
        binding: source.binding,
        dims: schema.dims,
        solve_years,
        weather_years,
        columns: values
            .into_iter()
            .map(|(label, column)| (label, Arc::from(column)))
            .collect(),
        rows,
    })
}

/// Year index rows for [`write_array_file`].
#[derive(Debug, Clone, Default)]
pub struct YearIndex {
    pub solve_years: Option<Vec<i64>>,
    pub weather_years: Option<Vec<i64>>,
}

/// Writes an array container, mainly for fixtures and exports.
pub fn write_array_file(
    path: &Path,
    dims: &[&str],
    index: &YearIndex,
    columns: &[(&str, Vec<f64>)],
) -> BuildResult<()> {
    let dataset = path.display().to_string();
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for (name, years) in [
        (SOLVE_YEAR_COLUMN, &index.solve_years),
        (WEATHER_YEAR_COLUMN, &index.weather_years),
    ] {
        if let Some(years) = years {
            fields.push(Field::new(name, DataType::Int64, false));
            arrays.push(Arc::new(Int64Array::from(years.clone())));
        }
    }
    for (label, values) in columns {
        fields.push(Field::new(*label, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }

    let metadata = HashMap::from([(DIMS_METADATA_KEY.to_string(), dims.join(","))]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
    let batch =
        RecordBatch::try_new(Arc::clone(&schema), arrays).map_err(|e| arrow_error(&dataset, e))?;

    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(file, &schema).map_err(|e| arrow_error(&dataset, e))?;
    writer.write(&batch).map_err(|e| arrow_error(&dataset, e))?;
    writer.finish().map_err(|e| arrow_error(&dataset, e))?;
    Ok(())
}
