//! # gridplan-io: planning-model outputs to a validated system
//!
//! Turns the tabular and array files written by a regional capacity
//! expansion model into a [`gridplan_core::System`].
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Mapping resolution | [`mapping`] | [`mapping::ResolvedMapping`] |
//! | Raw reads (parallel) | [`readers`] | [`readers::RawDataset`] per dataset |
//! | Technology classification | [`classify`] | [`classify::Classification`] |
//! | Profile alignment | [`align`] | shared [`gridplan_core::TimeSeries`] |
//! | Component building | [`helpers::SystemBuilder`] | [`gridplan_core::System`] |
//! | Validation | [`helpers::validate_system`] | [`gridplan_core::GapReport`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use gridplan_io::{build_system, BuildConfig, MappingSpec};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mapping = MappingSpec::default_reeds()?;
//!     let config = BuildConfig::new(vec![2030], vec![2012]).with_strict(false);
//!     let output = build_system(&mapping, &config, Path::new("runs/base"))?;
//!
//!     println!("{:?}", output.system.stats());
//!     println!("{}", output.report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Build policy
//!
//! [`BuildConfig::strict_mode`] selects one policy for the whole build.
//! Strict builds stop at the first problem. Tolerant builds drop or flag
//! the offending record, keep going, and return every gap in the report.
//! Ambiguous mappings, parse failures, self-links and timeouts stop both.

pub mod align;
pub mod classify;
pub mod config;
pub mod helpers;
pub mod mapping;
pub mod parser;
pub mod readers;
pub mod rows;

pub use classify::{Classification, ClassificationRule, Matcher, RuleSet};
pub use config::{load_config_from_path, BuildConfig, BuildPolicy, OverrideMode, RuleOverride};
pub use helpers::{BuildStats, DatasetStats, SystemBuilder, ValidationConfig};
pub use mapping::{load_mapping_from_path, resolve, DatasetSpec, MappingSpec, ResolvedMapping};
pub use parser::{build_system, BuildOutput};
