//! Post-build validation of a [`System`] against the datasets it came from.
//!
//! The builder already rejects most bad rows on the way in; this pass checks
//! the finished system as a whole and writes everything it finds into the
//! [`GapReport`]. Whether a non-empty report fails the build is decided by
//! the caller.

use std::collections::BTreeMap;

use gridplan_core::{
    check_region_hierarchy, ErrorKind, GapReport, RegionLevel, ReserveRequirement, System,
    TechnologyCategory,
};
use gridplan_ts::Calendar;
use tracing::warn;

use super::system_builder::{CAPACITY_FACTOR_SERIES, LOAD_SERIES, REQUIREMENT_SERIES};
use super::BuildStats;
use crate::config::BuildConfig;
use crate::mapping::names;
use crate::readers::RawDataset;

/// Configuration for system validation behavior
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Unclassified generators are errors rather than accepted gaps
    pub strict: bool,
    pub calendar: Calendar,
    /// Every (solve year, weather year) pair profiles must cover
    pub year_pairs: Vec<(i32, i32)>,
}

impl ValidationConfig {
    pub fn from_build(config: &BuildConfig) -> Self {
        Self {
            strict: config.strict_mode,
            calendar: config.calendar,
            year_pairs: config.year_pairs(),
        }
    }
}

/// Validate a built system and record every issue in `report`.
///
/// Phases:
/// - **Reconciliation**: every record of every source dataset reached the
///   builder and is accounted for, drops match the gap entries that explain
///   them, and component totals match what was built
/// - **Reference integrity**: links, generators, reserves, demand and
///   emissions point at components that exist
/// - **Hierarchy**: parents are coarser and the parent graph is acyclic
/// - **Series**: bound series have the expected length and required series
///   exist for every year pair
pub fn validate_system(
    system: &System,
    datasets: &BTreeMap<String, RawDataset>,
    stats: &BuildStats,
    report: &mut GapReport,
    config: &ValidationConfig,
) {
    // Phase 1: Reconciliation
    validate_reconciliation(datasets, stats, report);
    validate_component_totals(system, stats, report);

    // Phase 2: Reference integrity and physical ranges
    validate_references(system, report);

    // Phase 3: Region hierarchy
    for (region, detail) in check_region_hierarchy(system) {
        report.add_error(ErrorKind::ReferentialIntegrity, region.as_str(), &detail);
    }

    // Phase 4: Classification
    if config.strict {
        for generator in system.generators() {
            if generator.category == TechnologyCategory::Unclassified {
                report.add_error(
                    ErrorKind::UnclassifiedTechnology,
                    generator.id.as_str(),
                    &format!("technology '{}' has no category", generator.technology),
                );
            }
        }
    }

    // Phase 5: Series
    validate_series(system, report, config);
}

fn validate_reconciliation(
    datasets: &BTreeMap<String, RawDataset>,
    stats: &BuildStats,
    report: &mut GapReport,
) {
    for (dataset, raw) in datasets {
        let read = raw.record_count();
        let seen = stats.dataset(dataset).map_or(0, |counts| counts.rows);
        if read != seen {
            report.add_error(
                ErrorKind::ValidationFailure,
                dataset,
                &format!("{read} records in the source but {seen} reached the builder"),
            );
        }
    }

    for (dataset, counts) in &stats.datasets {
        if !counts.is_reconciled() {
            report.add_error(
                ErrorKind::ValidationFailure,
                dataset,
                &format!(
                    "{} records read but {} accounted for \
                     ({} built, {} merged, {} excluded, {} filtered, {} dropped)",
                    counts.rows,
                    counts.accounted(),
                    counts.built,
                    counts.merged,
                    counts.excluded,
                    counts.filtered,
                    counts.dropped
                ),
            );
        }
        let recorded = report.dropped_in(dataset);
        if recorded != counts.dropped {
            report.add_error(
                ErrorKind::ValidationFailure,
                dataset,
                &format!(
                    "{} records dropped but {} drop entries recorded",
                    counts.dropped, recorded
                ),
            );
        }
    }
}

/// Datasets whose built records map one-to-one onto components.
fn validate_component_totals(system: &System, stats: &BuildStats, report: &mut GapReport) {
    let built = |dataset: &str| stats.dataset(dataset).map_or(0, |counts| counts.built);
    let totals = system.stats();
    let areas = system
        .regions()
        .filter(|r| r.level == RegionLevel::BalancingArea)
        .count();

    for (dataset, what, actual) in [
        (names::HIERARCHY, "balancing areas", areas),
        (names::RESERVES, "reserves", totals.reserves),
        (names::LOAD_PROFILES, "demand profiles", totals.demands),
        (names::EMISSIONS, "emission records", totals.emissions),
    ] {
        let expected = built(dataset);
        if expected != actual {
            report.add_error(
                ErrorKind::ValidationFailure,
                dataset,
                &format!("{expected} records built but the system holds {actual} {what}"),
            );
        }
    }
}

fn validate_references(system: &System, report: &mut GapReport) {
    for generator in system.generators() {
        if !system.has_region(generator.region.as_str()) {
            report.add_error(
                ErrorKind::ReferentialIntegrity,
                generator.id.as_str(),
                &format!("region '{}' does not exist", generator.region),
            );
        }
        if !generator.capacity.is_physical() {
            report.add_error(
                ErrorKind::InvalidValue,
                generator.id.as_str(),
                &format!("capacity {} is not a non-negative number", generator.capacity),
            );
        }
    }

    for link in system.links() {
        if link.from == link.to {
            report.add_error(
                ErrorKind::ReferentialIntegrity,
                link.id.as_str(),
                "link connects a region to itself",
            );
        }
        for endpoint in [&link.from, &link.to] {
            if !system.has_region(endpoint.as_str()) {
                report.add_error(
                    ErrorKind::ReferentialIntegrity,
                    link.id.as_str(),
                    &format!("region '{endpoint}' does not exist"),
                );
            }
        }
        if !link.forward_capacity.is_physical() || !link.reverse_capacity.is_physical() {
            report.add_error(
                ErrorKind::InvalidValue,
                link.id.as_str(),
                "capacity is not a non-negative number",
            );
        }
    }

    for reserve in system.reserves() {
        if !system.has_region(reserve.region.as_str()) {
            report.add_error(
                ErrorKind::ReferentialIntegrity,
                reserve.id.as_str(),
                &format!("region '{}' does not exist", reserve.region),
            );
        }
    }

    for demand in system.demands() {
        if !system.has_region(demand.region.as_str()) {
            report.add_error(
                ErrorKind::ReferentialIntegrity,
                demand.id.as_str(),
                &format!("region '{}' does not exist", demand.region),
            );
        }
    }

    for record in system.emissions() {
        if !system.has_generator(record.generator.as_str()) {
            report.add_error(
                ErrorKind::ReferentialIntegrity,
                record.generator.as_str(),
                &format!("{} record for missing generator", record.pollutant),
            );
        }
    }
}

fn has_series(
    system: &System,
    owner: &str,
    name: &str,
    solve_year: i32,
    weather_year: i32,
) -> bool {
    system.time_series(owner).iter().any(|ts| {
        ts.name == name
            && ts.weather_year == weather_year
            && ts.solve_year.map_or(true, |s| s == solve_year)
    })
}

fn validate_series(system: &System, report: &mut GapReport, config: &ValidationConfig) {
    for (owner, series) in system.all_series() {
        let expected = config.calendar.expected_sample_count(series.weather_year);
        if series.len() != expected {
            report.add_error(
                ErrorKind::SeriesLength,
                owner,
                &format!(
                    "series '{}' for weather year {} has {} samples, expected {}",
                    series.name,
                    series.weather_year,
                    series.len(),
                    expected
                ),
            );
        }
        if let Some(index) = series.values.iter().position(|v| !v.is_finite()) {
            report.add_error(
                ErrorKind::InvalidValue,
                owner,
                &format!(
                    "series '{}' sample {index} is {}",
                    series.name, series.values[index]
                ),
            );
        }
    }

    // Owners already carrying a gap entry were reported when the series failed.
    for (solve_year, weather_year) in &config.year_pairs {
        for demand in system.demands() {
            let owner = demand.id.as_str();
            if !report.mentions(owner)
                && !has_series(system, owner, LOAD_SERIES, *solve_year, *weather_year)
            {
                report.add_error(
                    ErrorKind::UnresolvedYear,
                    owner,
                    &format!("no load for solve year {solve_year}, weather year {weather_year}"),
                );
            }
        }

        for reserve in system.reserves() {
            let owner = reserve.id.as_str();
            if reserve.requirement == ReserveRequirement::TimeVarying
                && !report.mentions(owner)
                && !has_series(system, owner, REQUIREMENT_SERIES, *solve_year, *weather_year)
            {
                report.add_error(
                    ErrorKind::UnresolvedYear,
                    owner,
                    &format!(
                        "no requirement for solve year {solve_year}, weather year {weather_year}"
                    ),
                );
            }
        }

        for generator in system.generators().filter(|g| g.is_variable()) {
            if !has_series(
                system,
                generator.id.as_str(),
                CAPACITY_FACTOR_SERIES,
                *solve_year,
                *weather_year,
            ) {
                warn!(
                    generator = %generator.id,
                    solve_year,
                    weather_year,
                    "variable generator has no capacity-factor profile"
                );
            }
        }
    }
}
