use std::collections::BTreeMap;

use gridplan_core::SystemStats;
use serde::Serialize;

/// Where every source record of one dataset ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    /// Rows (tabular) or labelled columns (array) read
    pub rows: usize,
    /// Records that became a component or a component attribute
    pub built: usize,
    /// Exact duplicates folded into an earlier record
    pub merged: usize,
    /// Records for excluded technologies
    pub excluded: usize,
    /// Records outside the configured years or without a component to bind to
    pub filtered: usize,
    /// Records dropped with a gap entry
    pub dropped: usize,
}

impl DatasetStats {
    pub fn accounted(&self) -> usize {
        self.built + self.merged + self.excluded + self.filtered + self.dropped
    }

    pub fn is_reconciled(&self) -> bool {
        self.accounted() == self.rows
    }
}

/// Statistics for a whole build
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildStats {
    pub datasets: BTreeMap<String, DatasetStats>,
    pub system: SystemStats,
}

impl BuildStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetStats> {
        self.datasets.get(name)
    }

    pub fn entry(&mut self, name: &str) -> &mut DatasetStats {
        self.datasets.entry(name.to_string()).or_default()
    }

    pub fn total_dropped(&self) -> usize {
        self.datasets.values().map(|d| d.dropped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_counts_every_outcome() {
        let mut stats = BuildStats::new();
        let cap = stats.entry("capacity");
        cap.rows = 6;
        cap.built = 2;
        cap.merged = 1;
        cap.excluded = 1;
        cap.filtered = 1;
        assert!(!cap.is_reconciled());
        cap.dropped = 1;
        assert!(cap.is_reconciled());
        assert_eq!(stats.total_dropped(), 1);
    }
}
