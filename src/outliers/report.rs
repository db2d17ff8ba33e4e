//! What the two-stage filter removed, and why.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::outliers::{FilterParams, GroupKey};
use crate::record::CongestionLevel;
use crate::stats::{Summary, pct};

/// Stage 2 result for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdaptiveOutcome {
    /// Mean-relative bounds were applied.
    Applied {
        lower_bound: f64,
        upper_bound: f64,
        removed: usize,
    },
    /// Fewer survivors than `min_sample_threshold`; all of them were kept.
    Exempt,
    /// Stage 2 was turned off for the run.
    Disabled,
    /// Stage 1 removed every record of the group.
    NoSurvivors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub key: GroupKey,
    pub stage1_removed: usize,
    /// Number of stage 1 survivors, the population the mean is taken over.
    pub sample_count: usize,
    /// Wait-time statistics of the stage 1 survivors; `None` if there were none.
    pub summary: Option<Summary>,
    pub adaptive: AdaptiveOutcome,
}

impl GroupReport {
    pub fn stage2_removed(&self) -> usize {
        match self.adaptive {
            AdaptiveOutcome::Applied { removed, .. } => removed,
            _ => 0,
        }
    }

    pub fn kept(&self) -> usize {
        self.sample_count - self.stage2_removed()
    }

    pub fn is_exempt(&self) -> bool {
        matches!(self.adaptive, AdaptiveOutcome::Exempt)
    }

    pub fn mean(&self) -> Option<f64> {
        self.summary.as_ref().map(|s| s.mean)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelBreakdown {
    pub kept: usize,
    pub stage1_removed: usize,
    pub stage2_removed: usize,
}

impl LevelBreakdown {
    pub fn total(&self) -> usize {
        self.kept + self.stage1_removed + self.stage2_removed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub total_input: usize,
    pub stage1_removed: usize,
    pub stage2_removed: usize,
    pub retained: usize,
    pub params: FilterParams,
    /// Sorted by group key.
    pub groups: Vec<GroupReport>,
}

impl FilterReport {
    pub fn removed(&self) -> usize {
        self.stage1_removed + self.stage2_removed
    }

    pub fn removal_rate_pct(&self) -> f64 {
        pct(self.removed(), self.total_input)
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupReport> {
        self.groups
            .binary_search_by(|g| g.key.cmp(key))
            .ok()
            .map(|i| &self.groups[i])
    }

    /// Groups that had an adaptive window applied.
    pub fn applied_group_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| matches!(g.adaptive, AdaptiveOutcome::Applied { .. }))
            .count()
    }

    pub fn exempt_group_count(&self) -> usize {
        self.groups.iter().filter(|g| g.is_exempt()).count()
    }

    /// Records that skipped stage 2 because their group was too small.
    pub fn exempt_record_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.is_exempt())
            .map(|g| g.sample_count)
            .sum()
    }

    pub fn level_breakdown(&self) -> BTreeMap<CongestionLevel, LevelBreakdown> {
        let mut levels: BTreeMap<CongestionLevel, LevelBreakdown> = BTreeMap::new();
        for g in &self.groups {
            let entry = levels.entry(g.key.level).or_default();
            entry.kept += g.kept();
            entry.stage1_removed += g.stage1_removed;
            entry.stage2_removed += g.stage2_removed();
        }
        levels
    }

    pub fn log_summary(&self) {
        info!(
            total = self.total_input,
            stage1_removed = self.stage1_removed,
            stage2_removed = self.stage2_removed,
            exempt_records = self.exempt_record_count(),
            removal_rate_pct = %format!("{:.1}", self.removal_rate_pct()),
            retained = self.retained,
            "Outlier filtering complete"
        );
        info!(
            groups = self.groups.len(),
            adaptive = self.applied_group_count(),
            exempt = self.exempt_group_count(),
            min_sample_threshold = self.params.min_sample_threshold,
            "Group statistics"
        );
        for (level, b) in self.level_breakdown() {
            if b.total() == 0 {
                continue;
            }
            info!(
                level = %level,
                kept = b.kept,
                kept_pct = %format!("{:.1}", pct(b.kept, b.total())),
                stage1_removed = b.stage1_removed,
                stage2_removed = b.stage2_removed,
                "Congestion level breakdown"
            );
        }
    }
}
