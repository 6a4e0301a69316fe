//! Build entry point.
//!
//! [`build_system`] runs the whole pipeline for one (mapping, configuration,
//! data root) triple:
//!
//! 1. resolve the mapping against the root
//! 2. read every resolved dataset on a worker pool
//! 3. check the configured years against the inputs
//! 4. build the system on the calling thread
//! 5. validate it and apply the build policy
//!
//! Reads are the only concurrent step. Their results are collected by
//! dataset name before anything is built, so completion order never shows
//! up in the result.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use gridplan_core::{BuildError, BuildResult, GapReport, System};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::classify::RuleSet;
use crate::config::BuildConfig;
use crate::helpers::{validate_system, BuildStats, SystemBuilder, ValidationConfig};
use crate::mapping::{names, resolve, MappingSpec, ResolvedDataset};
use crate::readers::{read_dataset, RawDataset};
use crate::rows::ModeledYearRow;

/// A built system with the gaps found along the way.
#[derive(Debug)]
pub struct BuildOutput {
    pub system: System,
    /// Empty for a clean build. Always free of errors under the strict policy.
    pub report: GapReport,
    pub stats: BuildStats,
}

/// Builds a validated [`System`] from the files under `root`.
///
/// Under the strict policy the first problem aborts the build, and a
/// validation pass that finds anything returns
/// [`BuildError::ValidationFailure`] with the full report. Under the tolerant
/// policy the report comes back alongside the system.
pub fn build_system(
    mapping: &MappingSpec,
    config: &BuildConfig,
    root: &Path,
) -> BuildResult<BuildOutput> {
    let started = Instant::now();
    config.validate()?;
    let rules = RuleSet::from_config(config)?;
    info!(
        rules = rules.len(),
        root = %root.display(),
        strict = config.strict_mode,
        weather_year = config.primary_weather_year(),
        "starting build"
    );

    let resolved = resolve(mapping, config, root)?;
    info!(
        datasets = resolved.datasets.len(),
        absent = resolved.absent.len(),
        "resolved mapping"
    );

    let datasets = read_all(resolved.datasets.values().cloned().collect(), config, started)?;
    validate_inputs(&datasets, config)?;

    let builder = SystemBuilder::new(config, &rules, resolved.report);
    let (system, mut report, stats) = builder.build(&datasets)?;

    let checks = ValidationConfig::from_build(config);
    validate_system(&system, &datasets, &stats, &mut report, &checks);
    info!(
        warnings = report.warning_count(),
        errors = report.error_count(),
        dropped = stats.total_dropped(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "validated system"
    );

    if config.policy().is_strict() && report.has_errors() {
        return Err(BuildError::ValidationFailure(report));
    }
    Ok(BuildOutput {
        system,
        report,
        stats,
    })
}

fn timed_out(started: Instant) -> BuildError {
    BuildError::Timeout {
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Reads every dataset on a dedicated pool and waits at most until the
/// configured deadline. On timeout outstanding reads are cancelled and no
/// partial result is returned.
fn read_all(
    datasets: Vec<ResolvedDataset>,
    config: &BuildConfig,
    started: Instant,
) -> BuildResult<BTreeMap<String, RawDataset>> {
    let deadline = config.timeout_ms.map(Duration::from_millis);
    if deadline.is_some_and(|limit| started.elapsed() >= limit) {
        return Err(timed_out(started));
    }

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| BuildError::Io(io::Error::other(format!("building reader pool: {e}"))))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // Collected in input order, which is dataset-name order.
        let results: Vec<BuildResult<RawDataset>> = pool.install(|| {
            datasets
                .par_iter()
                .map(|dataset| read_dataset(dataset, &worker_cancel))
                .collect()
        });
        // The receiver is gone once the build has timed out.
        let _ = tx.send(results);
    });

    let received = match deadline {
        Some(limit) => rx.recv_timeout(limit.saturating_sub(started.elapsed())),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    let results = match received {
        Ok(results) => results,
        Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            return Err(timed_out(started));
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(BuildError::Io(io::Error::other("dataset reader stopped unexpectedly")));
        }
    };

    let mut raw = BTreeMap::new();
    for result in results {
        let dataset = result?;
        debug!(dataset = %dataset.name, records = dataset.record_count(), "read dataset");
        raw.insert(dataset.name.clone(), dataset);
    }
    info!(datasets = raw.len(), "read datasets");
    Ok(raw)
}

/// Checks the configured years against what the inputs can provide.
fn validate_inputs(
    datasets: &BTreeMap<String, RawDataset>,
    config: &BuildConfig,
) -> BuildResult<()> {
    if let Some(raw) = datasets.get(names::MODELED_YEARS) {
        let mut modeled = BTreeSet::new();
        for table in raw.tables() {
            for row in &table.rows {
                let parsed: ModeledYearRow = table.deserialize(names::MODELED_YEARS, row)?;
                modeled.insert(parsed.year);
            }
        }
        for year in &config.solve_years {
            if !modeled.contains(year) {
                return Err(BuildError::Config(format!(
                    "Solve year {year} is not among the modeled years ({})",
                    modeled
                        .iter()
                        .map(i32::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
    }

    if let Some(raw) = datasets.get(names::LOAD_PROFILES) {
        let indexed: Vec<_> = raw
            .arrays()
            .iter()
            .filter(|table| !table.is_year_agnostic())
            .collect();
        if !indexed.is_empty() {
            let available: BTreeSet<i32> = indexed
                .iter()
                .flat_map(|table| table.weather_year_set())
                .collect();
            for year in &config.weather_years {
                if !available.contains(year) {
                    return Err(BuildError::Config(format!(
                        "Weather year {year} is not in the load profile index"
                    )));
                }
            }
        }
    }
    Ok(())
}
