//! Mapping resolution.
//!
//! A [`MappingSpec`] names every logical dataset a build reads and where to
//! find it relative to a case directory. Paths may carry placeholders
//! (`{solve_year}`, `{weather_year}`, `{case_name}`, `{scenario}`) and glob
//! wildcards. [`resolve`] turns the mapping into concrete files, checks
//! their headers against the declared columns and records absent optional
//! datasets in the gap report.
//!
//! ```yaml
//! datasets:
//!   load_profiles:
//!     path: inputs_case/load_{weather_year}.arrow
//!     format: array
//!     dims: [hour, region]
//!   emissions:
//!     path: outputs/emit_*.csv
//!     required: false
//!     disambiguate: last
//!     columns: [technology, region, pollutant, rate]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobBuilder;
use gridplan_core::{BuildError, BuildResult, ErrorKind, GapReport};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::readers::{array, tabular};

const DEFAULT_MAPPING: &str = include_str!("../data/default_mapping.yaml");

/// Dataset names the system builder understands.
pub mod names {
    pub const HIERARCHY: &str = "hierarchy";
    pub const MODELED_YEARS: &str = "modeled_years";
    pub const CAPACITY: &str = "capacity";
    pub const TRANSMISSION: &str = "transmission";
    pub const RESERVES: &str = "reserves";
    pub const EMISSIONS: &str = "emissions";
    pub const FUEL_TECH_MAP: &str = "fuel_tech_map";
    pub const LOAD_PROFILES: &str = "load_profiles";
    pub const CF_PROFILES: &str = "cf_profiles";
    pub const HYDRO_CF: &str = "hydro_cf";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// Delimited text with a header row
    #[default]
    Tabular,
    /// Arrow IPC file with one numeric column per label
    Array,
}

/// Which file wins when a glob matches several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disambiguation {
    /// Lexicographically first path
    First,
    /// Lexicographically last path
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSpec {
    pub path: String,
    #[serde(default)]
    pub format: DatasetFormat,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Columns that must be present after `column_mapping` is applied
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub optional_columns: Vec<String>,
    /// Raw header → canonical column name
    #[serde(default)]
    pub column_mapping: BTreeMap<String, String>,
    /// Dimension labels an array container must declare
    #[serde(default)]
    pub dims: Vec<String>,
    #[serde(default)]
    pub disambiguate: Option<Disambiguation>,
}

fn default_required() -> bool {
    true
}

impl DatasetSpec {
    pub fn tabular(path: &str, columns: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            format: DatasetFormat::Tabular,
            required: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            optional_columns: Vec::new(),
            column_mapping: BTreeMap::new(),
            dims: Vec::new(),
            disambiguate: None,
        }
    }

    pub fn array(path: &str, dims: &[&str]) -> Self {
        Self {
            format: DatasetFormat::Array,
            dims: dims.iter().map(|d| d.to_string()).collect(),
            ..Self::tabular(path, &[])
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn rename(mut self, raw: &str, canonical: &str) -> Self {
        self.column_mapping
            .insert(raw.to_string(), canonical.to_string());
        self
    }

    pub fn with_disambiguation(mut self, rule: Disambiguation) -> Self {
        self.disambiguate = Some(rule);
        self
    }

    /// Canonical name of a raw header cell.
    pub fn canonical_name(&self, raw: &str) -> String {
        let raw = raw.trim();
        self.column_mapping
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    /// Canonical table columns outside `columns` and `optional_columns`.
    /// A table spec that declares no columns accepts any header.
    pub fn undeclared<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        if self.format != DatasetFormat::Tabular || self.columns.is_empty() {
            return Vec::new();
        }
        columns
            .iter()
            .filter(|c| !self.columns.contains(c) && !self.optional_columns.contains(c))
            .map(String::as_str)
            .collect()
    }
}

/// Declarative description of every dataset in a case directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSpec {
    pub datasets: BTreeMap<String, DatasetSpec>,
}

impl MappingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, name: &str, spec: DatasetSpec) -> Self {
        self.datasets.insert(name.to_string(), spec);
        self
    }

    pub fn from_yaml_str(data: &str) -> BuildResult<Self> {
        serde_yaml::from_str(data).map_err(|e| BuildError::Config(format!("mapping yaml: {e}")))
    }

    pub fn from_json_str(data: &str) -> BuildResult<Self> {
        serde_json::from_str(data).map_err(|e| BuildError::Config(format!("mapping json: {e}")))
    }

    /// Layout of a standard planning-model case directory.
    pub fn default_reeds() -> BuildResult<Self> {
        Self::from_yaml_str(DEFAULT_MAPPING)
    }
}

pub fn load_mapping_from_path(path: &Path) -> Result<MappingSpec> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading mapping spec '{}'", path.display()))?;
    let spec = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => MappingSpec::from_json_str(&data),
        _ => MappingSpec::from_yaml_str(&data),
    };
    spec.with_context(|| format!("parsing mapping spec '{}'", path.display()))
}

/// Years a concrete source file was expanded for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearBinding {
    pub solve_year: Option<i32>,
    pub weather_year: Option<i32>,
}

impl YearBinding {
    /// True when the binding does not contradict the requested years.
    pub fn admits(&self, solve_year: Option<i32>, weather_year: Option<i32>) -> bool {
        let fits = |bound: Option<i32>, wanted: Option<i32>| match (bound, wanted) {
            (Some(b), Some(w)) => b == w,
            _ => true,
        };
        fits(self.solve_year, solve_year) && fits(self.weather_year, weather_year)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub binding: YearBinding,
    /// Canonical header (tabular) or field names (array) found in the file
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDataset {
    pub name: String,
    pub spec: DatasetSpec,
    pub sources: Vec<SourceDescriptor>,
}

impl ResolvedDataset {
    pub fn format(&self) -> DatasetFormat {
        self.spec.format
    }
}

/// Concrete inputs for a build, ordered by dataset name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMapping {
    pub datasets: BTreeMap<String, ResolvedDataset>,
    /// Datasets with no usable source
    pub absent: BTreeSet<String>,
    pub report: GapReport,
}

impl ResolvedMapping {
    pub fn dataset(&self, name: &str) -> Option<&ResolvedDataset> {
        self.datasets.get(name)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }
}

const KNOWN_PLACEHOLDERS: [&str; 4] = ["solve_year", "weather_year", "case_name", "scenario"];

fn placeholder_names(pattern: &str) -> BuildResult<BTreeSet<String>> {
    let re = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| BuildError::Config(format!("placeholder pattern: {e}")))?;
    Ok(re
        .captures_iter(pattern)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect())
}

/// Expands `pattern` into one concrete pattern per year binding.
fn expand_pattern(
    dataset: &str,
    pattern: &str,
    config: &BuildConfig,
) -> BuildResult<Vec<(YearBinding, String)>> {
    let used = placeholder_names(pattern)?;
    if let Some(unknown) = used
        .iter()
        .find(|name| !KNOWN_PLACEHOLDERS.contains(&name.as_str()))
    {
        return Err(BuildError::Config(format!(
            "dataset '{dataset}': unknown placeholder '{{{unknown}}}' in '{pattern}'"
        )));
    }

    let mut base = pattern.replace("{scenario}", &config.scenario);
    if used.contains("case_name") {
        let case = config.case_name.as_deref().ok_or_else(|| {
            BuildError::Config(format!(
                "dataset '{dataset}': '{pattern}' uses {{case_name}} but no case_name is configured"
            ))
        })?;
        base = base.replace("{case_name}", case);
    }

    let solve = used.contains("solve_year");
    let weather = used.contains("weather_year");
    let bindings: Vec<YearBinding> = match (solve, weather) {
        (true, true) => config
            .year_pairs()
            .into_iter()
            .map(|(s, w)| YearBinding {
                solve_year: Some(s),
                weather_year: Some(w),
            })
            .collect(),
        (true, false) => config
            .solve_years
            .iter()
            .map(|s| YearBinding {
                solve_year: Some(*s),
                weather_year: None,
            })
            .collect(),
        (false, true) => config
            .weather_years
            .iter()
            .map(|w| YearBinding {
                solve_year: None,
                weather_year: Some(*w),
            })
            .collect(),
        (false, false) => vec![YearBinding::default()],
    };

    Ok(bindings
        .into_iter()
        .map(|binding| {
            let mut concrete = base.clone();
            if let Some(s) = binding.solve_year {
                concrete = concrete.replace("{solve_year}", &s.to_string());
            }
            if let Some(w) = binding.weather_year {
                concrete = concrete.replace("{weather_year}", &w.to_string());
            }
            (binding, concrete)
        })
        .collect())
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Files under `root` matching `pattern`, sorted by path.
fn discover(dataset: &str, root: &Path, pattern: &str) -> BuildResult<Vec<PathBuf>> {
    if !is_glob(pattern) {
        let path = root.join(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }

    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| BuildError::Config(format!("dataset '{dataset}': bad pattern: {e}")))?
        .compile_matcher();

    // Walk only below the literal part of the pattern.
    let literal: Vec<&str> = pattern
        .split('/')
        .take_while(|part| !is_glob(part))
        .collect();
    let base = root.join(literal.join("/"));
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(relative_display(root, entry.path())) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn pick_file(
    dataset: &str,
    pattern: &str,
    root: &Path,
    mut found: Vec<PathBuf>,
    rule: Option<Disambiguation>,
) -> BuildResult<Option<PathBuf>> {
    if found.len() <= 1 {
        return Ok(found.pop());
    }
    match rule {
        Some(Disambiguation::First) => Ok(found.into_iter().next()),
        Some(Disambiguation::Last) => Ok(found.pop()),
        None => Err(BuildError::AmbiguousMapping {
            dataset: dataset.to_string(),
            pattern: pattern.to_string(),
            matches: found.iter().map(|p| relative_display(root, p)).collect(),
        }),
    }
}

/// Canonical columns of `path`, checked against the declared schema.
fn check_schema(
    name: &str,
    spec: &DatasetSpec,
    root: &Path,
    path: &Path,
) -> BuildResult<Vec<String>> {
    let (columns, expected, actual) = match spec.format {
        DatasetFormat::Tabular => {
            let columns: Vec<String> = tabular::read_header(name, path)?
                .iter()
                .map(|raw| spec.canonical_name(raw))
                .collect();
            (columns.clone(), spec.columns.clone(), columns)
        }
        DatasetFormat::Array => {
            let schema = array::read_schema(name, path)?;
            let mut expected = spec.columns.clone();
            expected.extend(spec.dims.iter().cloned());
            let mut actual = schema.columns.clone();
            actual.extend(schema.dims.iter().cloned());
            (schema.columns, expected, actual)
        }
    };

    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !actual.contains(c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(BuildError::SchemaMismatch {
            dataset: name.to_string(),
            path: relative_display(root, path),
            expected,
            missing,
            actual,
        });
    }
    Ok(columns)
}

/// Resolves every dataset of `spec` under `root`.
///
/// Strict builds fail on the first missing required file or schema
/// mismatch. Tolerant builds record them and mark the dataset absent when
/// none of its sources survive. Absent optional datasets are warnings in
/// both modes. Ambiguous patterns always fail.
pub fn resolve(
    spec: &MappingSpec,
    config: &BuildConfig,
    root: &Path,
) -> BuildResult<ResolvedMapping> {
    let policy = config.policy();
    let mut resolved = ResolvedMapping::default();

    for (name, dataset) in &spec.datasets {
        let mut sources = Vec::new();
        for (binding, pattern) in expand_pattern(name, &dataset.path, config)? {
            let found = discover(name, root, &pattern)?;
            let Some(path) = pick_file(name, &pattern, root, found, dataset.disambiguate)? else {
                let err = BuildError::MissingFile {
                    dataset: name.clone(),
                    pattern: pattern.clone(),
                };
                if !dataset.required {
                    warn!(dataset = %name, %pattern, "optional dataset not found");
                    resolved.report.add_warning(
                        err.kind(),
                        name,
                        &format!("optional dataset not found: {pattern}"),
                    );
                    continue;
                }
                if policy.is_strict() {
                    return Err(err);
                }
                warn!(dataset = %name, %pattern, "required dataset not found");
                resolved.report.add_build_error(name, &err);
                continue;
            };

            match check_schema(name, dataset, root, &path) {
                Ok(columns) => {
                    for column in dataset.undeclared(&columns) {
                        warn!(dataset = %name, %column, "column not in schema");
                        resolved.report.add_warning(
                            ErrorKind::SchemaMismatch,
                            name,
                            &format!("column '{column}' is not in the schema"),
                        );
                    }
                    debug!(dataset = %name, path = %path.display(), "resolved source");
                    sources.push(SourceDescriptor {
                        path,
                        binding,
                        columns,
                    });
                }
                Err(err) if !policy.is_strict() && !err.is_always_fatal() => {
                    warn!(dataset = %name, error = %err, "source skipped");
                    resolved.report.add_build_error(name, &err);
                }
                Err(err) => return Err(err),
            }
        }

        if sources.is_empty() {
            resolved.absent.insert(name.clone());
        } else {
            resolved.datasets.insert(
                name.clone(),
                ResolvedDataset {
                    name: name.clone(),
                    spec: dataset.clone(),
                    sources,
                },
            );
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> BuildConfig {
        BuildConfig::new(vec![2030, 2035], vec![2012])
    }

    fn write(dir: &TempDir, rel: &str, body: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn default_mapping_parses() {
        let spec = MappingSpec::default_reeds().unwrap();
        assert!(spec.datasets.contains_key(names::CAPACITY));
        assert!(!spec.datasets[names::EMISSIONS].required);
        assert_eq!(spec.datasets[names::LOAD_PROFILES].format, DatasetFormat::Array);
        assert_eq!(
            spec.datasets[names::HIERARCHY].canonical_name("*r"),
            "region"
        );
    }

    #[test]
    fn unknown_fields_rejected() {
        let yaml = "datasets:\n  capacity:\n    path: cap.csv\n    colums: [a]\n";
        let err = MappingSpec::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("colums"));
    }

    #[test]
    fn year_placeholders_expand_per_year() {
        let pattern = "load_{solve_year}_{weather_year}.arrow";
        let pairs = expand_pattern("load", pattern, &config()).unwrap();
        let paths: Vec<_> = pairs.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(paths, vec!["load_2030_2012.arrow", "load_2035_2012.arrow"]);
        assert_eq!(pairs[1].0.solve_year, Some(2035));
    }

    #[test]
    fn unknown_placeholder_is_config_error() {
        let err = expand_pattern("load", "load_{region}.csv", &config()).unwrap_err();
        assert_eq!(err.kind(), gridplan_core::ErrorKind::Config);
    }

    #[test]
    fn case_name_needs_config() {
        assert!(expand_pattern("cap", "{case_name}/cap.csv", &config()).is_err());
        let with_case = config().with_case_name("USA");
        let expanded = expand_pattern("cap", "{case_name}/{scenario}/cap.csv", &with_case).unwrap();
        assert_eq!(expanded[0].1, "USA/base/cap.csv");
    }

    #[test]
    fn binding_admits_matching_years() {
        let bound = YearBinding {
            solve_year: None,
            weather_year: Some(2012),
        };
        assert!(bound.admits(Some(2030), Some(2012)));
        assert!(!bound.admits(None, Some(2007)));
    }

    #[test]
    fn glob_with_many_matches_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        write(&dir, "out/cap_a.csv", "i,r,t,Value\n");
        write(&dir, "out/cap_b.csv", "i,r,t,Value\n");
        let spec = MappingSpec::new()
            .with_dataset("capacity", DatasetSpec::tabular("out/cap_*.csv", &[]));

        let err = resolve(&spec, &config().with_strict(false), dir.path()).unwrap_err();
        assert_eq!(err.kind(), gridplan_core::ErrorKind::AmbiguousMapping);
        assert!(err.to_string().contains("out/cap_a.csv"));

        let last = MappingSpec::new().with_dataset(
            "capacity",
            DatasetSpec::tabular("out/cap_*.csv", &[]).with_disambiguation(Disambiguation::Last),
        );
        let resolved = resolve(&last, &config(), dir.path()).unwrap();
        let source = &resolved.dataset("capacity").unwrap().sources[0];
        assert!(source.path.ends_with("cap_b.csv"));
    }

    #[test]
    fn undeclared_columns_are_warnings() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cap.csv", "i,r,t,Value,notes\n");
        let mut capacity = DatasetSpec::tabular("cap.csv", &["technology", "region", "capacity"])
            .rename("i", "technology")
            .rename("r", "region")
            .rename("t", "year")
            .rename("Value", "capacity");
        capacity.optional_columns = vec!["year".into()];
        let spec = MappingSpec::new().with_dataset("capacity", capacity.clone());

        let resolved = resolve(&spec, &config(), dir.path()).unwrap();
        assert!(resolved.is_present("capacity"));
        assert_eq!(resolved.report.warning_count(), 1);
        assert!(resolved
            .report
            .contains(gridplan_core::ErrorKind::SchemaMismatch, "capacity"));
        assert!(!resolved.report.has_errors());

        capacity.optional_columns.push("notes".into());
        let spec = MappingSpec::new().with_dataset("capacity", capacity);
        let resolved = resolve(&spec, &config(), dir.path()).unwrap();
        assert!(resolved.report.is_empty());
    }

    #[test]
    fn glob_does_not_cross_directories() {
        let dir = TempDir::new().unwrap();
        write(&dir, "out/nested/cap.csv", "i\n");
        let spec = MappingSpec::new()
            .with_dataset("capacity", DatasetSpec::tabular("out/*.csv", &[]).optional());
        let resolved = resolve(&spec, &config(), dir.path()).unwrap();
        assert!(!resolved.is_present("capacity"));
    }

    #[test]
    fn missing_optional_is_warning() {
        let dir = TempDir::new().unwrap();
        let spec = MappingSpec::new()
            .with_dataset("emissions", DatasetSpec::tabular("emit.csv", &[]).optional());
        let resolved = resolve(&spec, &config(), dir.path()).unwrap();
        assert!(resolved.absent.contains("emissions"));
        assert!(resolved
            .report
            .contains(gridplan_core::ErrorKind::MissingFile, "emissions"));
        assert!(!resolved.report.has_errors());
    }

    #[test]
    fn missing_required_depends_on_policy() {
        let dir = TempDir::new().unwrap();
        let spec =
            MappingSpec::new().with_dataset("capacity", DatasetSpec::tabular("cap.csv", &[]));

        let err = resolve(&spec, &config(), dir.path()).unwrap_err();
        assert_eq!(err.kind(), gridplan_core::ErrorKind::MissingFile);

        let resolved = resolve(&spec, &config().with_strict(false), dir.path()).unwrap();
        assert!(resolved.report.has_errors());
        assert!(resolved.absent.contains("capacity"));
    }

    #[test]
    fn header_checked_after_renames() {
        let dir = TempDir::new().unwrap();
        write(&dir, "cap.csv", "i,v,r,t,Value\ngas-cc,new,p1,2030,10\n");
        let good = MappingSpec::new().with_dataset(
            "capacity",
            DatasetSpec::tabular("cap.csv", &["technology", "region"])
                .rename("i", "technology")
                .rename("r", "region"),
        );
        let resolved = resolve(&good, &config(), dir.path()).unwrap();
        let columns = &resolved.dataset("capacity").unwrap().sources[0].columns;
        assert_eq!(columns, &["technology", "v", "region", "t", "Value"]);

        let bad = MappingSpec::new()
            .with_dataset("capacity", DatasetSpec::tabular("cap.csv", &["technology"]));
        match resolve(&bad, &config(), dir.path()).unwrap_err() {
            BuildError::SchemaMismatch { missing, .. } => assert_eq!(missing, vec!["technology"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
