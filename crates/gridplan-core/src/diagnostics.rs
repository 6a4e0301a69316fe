//! Gap reporting for builds that tolerate missing or inconsistent data.
//!
//! A [`GapReport`] collects every discrepancy a build chose not to abort on:
//!
//! - absent optional datasets (warnings)
//! - rows dropped because they reference unknown entities (errors)
//! - validation findings such as series of the wrong length (errors)
//!
//! Each entry carries an [`ErrorKind`], the affected entity or dataset, and a
//! human-readable detail. Strict builds fail when the report holds any
//! error-severity entry; non-strict builds hand it back with the system.
//!
//! # Example
//!
//! ```
//! use gridplan_core::diagnostics::{GapReport, Severity};
//! use gridplan_core::ErrorKind;
//!
//! let mut report = GapReport::new();
//! report.add_warning(ErrorKind::MissingFile, "emissions", "optional dataset not found");
//! report.add_error(ErrorKind::ReferentialIntegrity, "capacity", "region 'p99' does not exist");
//!
//! assert_eq!(report.warning_count(), 1);
//! assert_eq!(report.error_count(), 1);
//! assert!(report.contains(ErrorKind::MissingFile, "emissions"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, ErrorKind};

/// Severity level for gap entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected absence; the build is complete without it
    Warning,
    /// Data was dropped or an invariant does not hold
    Error,
}

/// A single discrepancy between the source files and the built system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapEntry {
    pub severity: Severity,
    pub kind: ErrorKind,
    /// Dataset name or entity identifier the entry is about
    pub subject: String,
    pub detail: String,
    /// Row or column identity when the entry stands for dropped source data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Source line, when the entry came from a tabular row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

impl GapEntry {
    pub fn new(
        severity: Severity,
        kind: ErrorKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            subject: subject.into(),
            detail: detail.into(),
            entity: None,
            line: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// True for entries that stand for a dropped row or column.
    pub fn is_drop(&self) -> bool {
        self.severity == Severity::Error && (self.entity.is_some() || self.line.is_some())
    }

    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

impl std::fmt::Display for GapEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}: {}", severity, self.kind, self.subject, self.detail)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        Ok(())
    }
}

/// Ordered collection of gap entries for one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<GapEntry>,
}

impl GapReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: GapEntry) {
        self.entries.push(entry);
    }

    pub fn add_warning(&mut self, kind: ErrorKind, subject: &str, detail: &str) {
        self.entries
            .push(GapEntry::new(Severity::Warning, kind, subject, detail));
    }

    pub fn add_error(&mut self, kind: ErrorKind, subject: &str, detail: &str) {
        self.entries
            .push(GapEntry::new(Severity::Error, kind, subject, detail));
    }

    /// Record a downgraded build error against `subject`.
    pub fn add_build_error(&mut self, subject: &str, err: &BuildError) {
        self.entries.push(GapEntry::new(
            Severity::Error,
            err.kind(),
            subject,
            err.to_string(),
        ));
    }

    /// Record a source row or column of `dataset` that was left out of the
    /// system because of `err`.
    pub fn add_dropped(
        &mut self,
        dataset: &str,
        entity: &str,
        line: Option<u64>,
        err: &BuildError,
    ) {
        let mut entry = GapEntry::new(Severity::Error, err.kind(), dataset, err.to_string())
            .with_entity(entity);
        entry.line = line;
        self.entries.push(entry);
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn contains(&self, kind: ErrorKind, subject: &str) -> bool {
        self.by_kind(kind).any(|e| e.subject == subject)
    }

    /// Number of dropped rows or columns recorded against `dataset`.
    pub fn dropped_in(&self, dataset: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.subject == dataset && e.is_drop())
            .count()
    }

    /// True when any entry names `subject` or carries it as its entity.
    pub fn mentions(&self, subject: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.subject == subject || e.entity.as_deref() == Some(subject))
    }

    pub fn by_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &GapEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn errors(&self) -> impl Iterator<Item = &GapEntry> {
        self.entries.iter().filter(|e| e.severity == Severity::Error)
    }

    // =========================================================================
    // Utility Methods
    // =========================================================================

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();

        match (warnings, errors) {
            (0, 0) => "No gaps".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for GapReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())?;
        for entry in &self.entries {
            write!(f, "\n  {}", entry)?;
        }
        Ok(())
    }
}
