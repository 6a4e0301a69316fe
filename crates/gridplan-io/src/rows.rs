//! Typed rows for the tabular datasets, keyed by canonical column name.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HierarchyRow {
    pub region: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub nerc_region: Option<String>,
    #[serde(default)]
    pub transmission_region: Option<String>,
    #[serde(default)]
    pub interconnect: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeledYearRow {
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapacityRow {
    pub technology: String,
    #[serde(default)]
    pub vintage: Option<String>,
    pub region: String,
    pub year: i32,
    pub capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransmissionRow {
    pub from_region: String,
    pub to_region: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReserveRow {
    pub region: String,
    pub reserve_type: String,
    #[serde(default)]
    pub direction: Option<String>,
    /// Constant requirement in MW; absent means derived from profiles
    #[serde(default)]
    pub requirement: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmissionRow {
    pub technology: String,
    #[serde(default)]
    pub vintage: Option<String>,
    pub region: String,
    pub pollutant: String,
    #[serde(default)]
    pub source: Option<String>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FuelRow {
    pub technology: String,
    pub fuel: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HydroRow {
    pub technology: String,
    pub region: String,
    pub month: u32,
    pub value: f64,
}
