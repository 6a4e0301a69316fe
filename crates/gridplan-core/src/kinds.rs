//! Closed vocabularies used by planning components.
//!
//! Source files spell these values inconsistently ("co2", " CO2 ", "Up",
//! "UPSTREAM"), so each enum has a lenient parser that trims and ignores case
//! and reports unknown values as [`BuildError::InvalidValue`].

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, BuildResult};

/// Canonical technology category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyCategory {
    Thermal,
    Nuclear,
    Hydro,
    Wind,
    Solar,
    Storage,
    Geothermal,
    Biopower,
    Imports,
    Electrolyzer,
    /// Fallback for labels no rule matched (non-strict builds only)
    Unclassified,
}

impl TechnologyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TechnologyCategory::Thermal => "thermal",
            TechnologyCategory::Nuclear => "nuclear",
            TechnologyCategory::Hydro => "hydro",
            TechnologyCategory::Wind => "wind",
            TechnologyCategory::Solar => "solar",
            TechnologyCategory::Storage => "storage",
            TechnologyCategory::Geothermal => "geothermal",
            TechnologyCategory::Biopower => "biopower",
            TechnologyCategory::Imports => "imports",
            TechnologyCategory::Electrolyzer => "electrolyzer",
            TechnologyCategory::Unclassified => "unclassified",
        }
    }

    /// Output follows a weather-driven capacity-factor profile.
    pub fn is_variable(self) -> bool {
        matches!(self, TechnologyCategory::Wind | TechnologyCategory::Solar)
    }

    /// Consumes a monthly energy budget instead of an hourly profile.
    pub fn is_hydro(self) -> bool {
        matches!(self, TechnologyCategory::Hydro)
    }
}

impl std::fmt::Display for TechnologyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReserveType {
    Spinning,
    Regulation,
    Flexibility,
    Contingency,
}

impl ReserveType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReserveType::Spinning => "SPINNING",
            ReserveType::Regulation => "REGULATION",
            ReserveType::Flexibility => "FLEXIBILITY",
            ReserveType::Contingency => "CONTINGENCY",
        }
    }

    /// Exact, case-insensitive match after trimming.
    pub fn parse(raw: &str) -> BuildResult<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SPINNING" => Ok(ReserveType::Spinning),
            "REGULATION" => Ok(ReserveType::Regulation),
            "FLEXIBILITY" => Ok(ReserveType::Flexibility),
            "CONTINGENCY" => Ok(ReserveType::Contingency),
            _ => Err(BuildError::InvalidValue {
                field: "reserve type",
                value: raw.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ReserveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ReserveDirection {
    #[default]
    Up,
    Down,
}

impl ReserveDirection {
    pub fn parse(raw: &str) -> BuildResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(ReserveDirection::Up),
            "down" => Ok(ReserveDirection::Down),
            _ => Err(BuildError::InvalidValue {
                field: "direction",
                value: raw.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmissionType {
    #[serde(rename = "CO2")]
    Co2,
    #[serde(rename = "CO2E")]
    Co2e,
    #[serde(rename = "NOx")]
    Nox,
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "CH4")]
    Ch4,
    #[serde(rename = "N2O")]
    N2o,
}

impl EmissionType {
    pub fn as_str(self) -> &'static str {
        match self {
            EmissionType::Co2 => "CO2",
            EmissionType::Co2e => "CO2E",
            EmissionType::Nox => "NOx",
            EmissionType::So2 => "SO2",
            EmissionType::Ch4 => "CH4",
            EmissionType::N2o => "N2O",
        }
    }

    pub fn parse(raw: &str) -> BuildResult<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CO2" => Ok(EmissionType::Co2),
            "CO2E" => Ok(EmissionType::Co2e),
            "NOX" => Ok(EmissionType::Nox),
            "SO2" => Ok(EmissionType::So2),
            "CH4" => Ok(EmissionType::Ch4),
            "N2O" => Ok(EmissionType::N2o),
            _ => Err(BuildError::InvalidValue {
                field: "emission type",
                value: raw.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EmissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmissionSource {
    #[default]
    Combustion,
    Precombustion,
}

impl EmissionSource {
    /// Blank or absent values mean combustion. `PROCESS` and `UPSTREAM` are
    /// upstream emissions. Otherwise the label only has to contain one of
    /// the two source names.
    pub fn parse(raw: Option<&str>) -> BuildResult<Self> {
        let Some(raw) = raw else {
            return Ok(EmissionSource::Combustion);
        };
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "" | "COMBUSTION" => Ok(EmissionSource::Combustion),
            "PRECOMBUSTION" | "PROCESS" | "UPSTREAM" => Ok(EmissionSource::Precombustion),
            // "PRECOMBUSTION" contains "COMBUSTION"; test it first
            other if other.contains("PRECOMBUSTION") => Ok(EmissionSource::Precombustion),
            other if other.contains("COMBUSTION") => Ok(EmissionSource::Combustion),
            _ => Err(BuildError::InvalidValue {
                field: "emission source",
                value: raw.to_string(),
            }),
        }
    }
}
