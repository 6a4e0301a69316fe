//! Build configuration.
//!
//! Loaded from YAML or JSON. Unknown keys are rejected so a misspelled
//! option fails loudly instead of silently taking its default.
//!
//! ```yaml
//! solve_years: [2030, 2035]
//! weather_years: 2012
//! case_name: USA_decarb
//! strict_mode: false
//! excluded_techs: [can-imports, electrolyzer]
//! classification_rules:
//!   mode: extend
//!   rules:
//!     - category: thermal
//!       subtype: fusion
//!       match: { prefix: futurefusion }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gridplan_core::{BuildError, BuildResult, ReserveType};
use gridplan_ts::{Calendar, ReserveFractions};
use serde::{Deserialize, Deserializer, Serialize};

use crate::classify::ClassificationRule;

/// Whether data problems abort the build or become gap entries.
///
/// One value of this type is threaded through every component of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPolicy {
    /// First resolution, classification, alignment or referential error aborts
    Strict,
    /// Offending rows are dropped and recorded; the build continues
    Tolerant,
}

impl BuildPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            BuildPolicy::Strict
        } else {
            BuildPolicy::Tolerant
        }
    }

    pub fn is_strict(self) -> bool {
        self == BuildPolicy::Strict
    }
}

/// How configured classification rules combine with the bundled defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    /// Configured rules are tried before the defaults
    #[default]
    Extend,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    #[serde(default)]
    pub mode: OverrideMode,
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub solve_years: Vec<i32>,
    #[serde(deserialize_with = "one_or_many")]
    pub weather_years: Vec<i32>,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default = "default_strict")]
    pub strict_mode: bool,
    #[serde(default)]
    pub classification_rules: Option<RuleOverride>,
    #[serde(default)]
    pub excluded_techs: Vec<String>,
    #[serde(default)]
    pub calendar: Calendar,
    #[serde(default = "default_reserve_fractions")]
    pub reserve_fractions: BTreeMap<ReserveType, ReserveFractions>,
    /// Reader threads; 0 uses one per CPU
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_scenario() -> String {
    "base".to_string()
}

fn default_strict() -> bool {
    true
}

fn default_reserve_fractions() -> BTreeMap<ReserveType, ReserveFractions> {
    BTreeMap::from([
        (
            ReserveType::Regulation,
            ReserveFractions {
                load: 0.01,
                wind: 0.005,
                solar: 0.003,
            },
        ),
        (
            ReserveType::Spinning,
            ReserveFractions {
                load: 0.03,
                wind: 0.0,
                solar: 0.0,
            },
        ),
        (
            ReserveType::Flexibility,
            ReserveFractions {
                load: 0.0,
                wind: 0.1,
                solar: 0.04,
            },
        ),
    ])
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(i32),
    Many(Vec<i32>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(year) => vec![year],
        OneOrMany::Many(years) => years,
    })
}

impl BuildConfig {
    pub fn new(solve_years: Vec<i32>, weather_years: Vec<i32>) -> Self {
        Self {
            solve_years,
            weather_years,
            case_name: None,
            scenario: default_scenario(),
            strict_mode: default_strict(),
            classification_rules: None,
            excluded_techs: Vec::new(),
            calendar: Calendar::default(),
            reserve_fractions: default_reserve_fractions(),
            threads: 0,
            timeout_ms: None,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_case_name(mut self, case_name: impl Into<String>) -> Self {
        self.case_name = Some(case_name.into());
        self
    }

    pub fn with_excluded_techs(mut self, techs: &[&str]) -> Self {
        self.excluded_techs = techs.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_rules(mut self, mode: OverrideMode, rules: Vec<ClassificationRule>) -> Self {
        self.classification_rules = Some(RuleOverride { mode, rules });
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn policy(&self) -> BuildPolicy {
        BuildPolicy::from_strict(self.strict_mode)
    }

    pub fn primary_solve_year(&self) -> Option<i32> {
        self.solve_years.first().copied()
    }

    pub fn primary_weather_year(&self) -> Option<i32> {
        self.weather_years.first().copied()
    }

    /// Every configured (solve year, weather year) pair, in configuration order.
    pub fn year_pairs(&self) -> Vec<(i32, i32)> {
        self.solve_years
            .iter()
            .flat_map(|s| self.weather_years.iter().map(move |w| (*s, *w)))
            .collect()
    }

    pub fn is_excluded(&self, technology: &str) -> bool {
        let tech = technology.trim().to_ascii_lowercase();
        self.excluded_techs
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(&tech))
    }

    pub fn fractions_for(&self, kind: ReserveType) -> ReserveFractions {
        self.reserve_fractions.get(&kind).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> BuildResult<()> {
        if self.solve_years.is_empty() {
            return Err(BuildError::Config("solve_years must name at least one year".into()));
        }
        if self.weather_years.is_empty() {
            return Err(BuildError::Config(
                "weather_years must name at least one year".into(),
            ));
        }
        for (field, years) in [
            ("solve_years", &self.solve_years),
            ("weather_years", &self.weather_years),
        ] {
            let unique: BTreeSet<_> = years.iter().collect();
            if unique.len() != years.len() {
                return Err(BuildError::Config(format!(
                    "{field} contains duplicates: {years:?}"
                )));
            }
        }
        if self.case_name.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(BuildError::Config("case_name cannot be empty".into()));
        }
        self.calendar
            .validate()
            .map_err(|e| BuildError::Config(format!("calendar: {e}")))?;
        Ok(())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<BuildConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading build config '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing build config yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing build config json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing build config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn single_years_and_defaults() {
        let config: BuildConfig =
            serde_yaml::from_str("solve_years: 2032\nweather_years: 2012\n").unwrap();
        assert_eq!(config.solve_years, vec![2032]);
        assert_eq!(config.primary_weather_year(), Some(2012));
        assert_eq!(config.scenario, "base");
        assert!(config.case_name.is_none());
        assert_eq!(config.policy(), BuildPolicy::Strict);
        assert_eq!(config.threads, 0);
        config.validate().unwrap();
    }

    #[test]
    fn year_lists_keep_order() {
        let config: BuildConfig = serde_json::from_str(
            r#"{"solve_years": [2035, 2030], "weather_years": [2007, 2012], "strict_mode": false}"#,
        )
        .unwrap();
        assert_eq!(config.primary_solve_year(), Some(2035));
        assert_eq!(
            config.year_pairs(),
            vec![(2035, 2007), (2035, 2012), (2030, 2007), (2030, 2012)]
        );
        assert_eq!(config.policy(), BuildPolicy::Tolerant);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = serde_yaml::from_str::<BuildConfig>(
            "solve_years: 2030\nweather_years: 2012\nstrict: true\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn empty_years_fail_validation() {
        let config = BuildConfig::new(vec![], vec![2012]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("solve_years"));
    }

    #[test]
    fn duplicate_solve_years_fail_validation() {
        let config = BuildConfig::new(vec![2030, 2030], vec![2012]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_weather_years_fail_validation() {
        let config: BuildConfig =
            serde_yaml::from_str("solve_years: 2030\nweather_years: [2012, 2012]\n").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), gridplan_core::ErrorKind::Config);
        assert!(err.to_string().contains("weather_years contains duplicates"));
    }

    #[test]
    fn exclusion_ignores_case() {
        let config = BuildConfig::new(vec![2030], vec![2012])
            .with_excluded_techs(&["can-imports", " Electrolyzer "]);
        assert!(config.is_excluded("CAN-IMPORTS"));
        assert!(config.is_excluded("electrolyzer"));
        assert!(!config.is_excluded("gas-cc"));
    }

    #[test]
    fn reserve_fraction_overrides() {
        let config: BuildConfig = serde_yaml::from_str(
            "solve_years: 2030\nweather_years: 2012\n\
             reserve_fractions:\n  REGULATION: { load: 0.02 }\n",
        )
        .unwrap();
        assert_eq!(config.fractions_for(ReserveType::Regulation).load, 0.02);
        assert_eq!(config.fractions_for(ReserveType::Spinning).load, 0.0);
    }

    #[test]
    fn loads_yaml_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "solve_years: [2030]\nweather_years: [2012]\ncase_name: test").unwrap();
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.case_name.as_deref(), Some("test"));
    }
}
