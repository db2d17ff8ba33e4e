//! Two-stage outlier filtering of queue records.
//!
//! Stage 1 drops records whose wait time falls outside the hard bounds of
//! their `(zone group, congestion level)`. Stage 2 groups the survivors by
//! [`GroupKey`], takes each group's mean wait once, and drops records outside
//! `[lower_mult * mean, upper_mult * mean]`. Groups smaller than
//! `min_sample_threshold` skip stage 2.

pub mod bounds;
pub mod report;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use bounds::{Bounds, HardBounds};
pub use report::{AdaptiveOutcome, FilterReport, GroupReport, LevelBreakdown};

use crate::error::FilterError;
use crate::record::{CongestionLevel, Record, ZoneGroup};
use crate::stats::{Summary, summary_statistics};

/// How stage 2 partitions records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveGrouping {
    /// One group per `(zone_id, congestion level)`, up to 68 groups.
    #[default]
    Zone,
    /// One group per `(zone group, congestion level)`, up to 8 groups.
    ZoneGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    Zone(u32),
    Group(ZoneGroup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub cohort: Cohort,
    pub level: CongestionLevel,
}

impl GroupKey {
    pub fn zone(zone_id: u32, level: CongestionLevel) -> Self {
        GroupKey {
            cohort: Cohort::Zone(zone_id),
            level,
        }
    }

    pub fn of(record: &Record, grouping: AdaptiveGrouping) -> Self {
        let cohort = match grouping {
            AdaptiveGrouping::Zone => Cohort::Zone(record.zone_id()),
            AdaptiveGrouping::ZoneGroup => Cohort::Group(record.zone_group()),
        };
        GroupKey {
            cohort,
            level: record.congestion_level(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cohort {
            Cohort::Zone(z) => write!(f, "zone {z} / {}", self.level),
            Cohort::Group(g) => write!(f, "{g} / {}", self.level),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub adaptive_lower_mult: f64,
    pub adaptive_upper_mult: f64,
    /// Groups with fewer stage 1 survivors than this skip stage 2.
    pub min_sample_threshold: usize,
    pub grouping: AdaptiveGrouping,
    pub hard_bounds_enabled: bool,
    pub adaptive_enabled: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            adaptive_lower_mult: 0.3,
            adaptive_upper_mult: 1.7,
            min_sample_threshold: 10,
            grouping: AdaptiveGrouping::Zone,
            hard_bounds_enabled: true,
            adaptive_enabled: true,
        }
    }
}

impl FilterParams {
    /// Rejects multipliers that would make every adaptive window empty or undefined.
    pub fn validate(&self) -> Result<(), FilterError> {
        let (lower, upper) = (self.adaptive_lower_mult, self.adaptive_upper_mult);
        if lower.is_finite() && upper.is_finite() && lower >= 0.0 && lower <= upper {
            Ok(())
        } else {
            Err(FilterError::InvalidMultipliers { lower, upper })
        }
    }
}

/// Stage 2 survivors in input order, plus the report.
#[derive(Debug, Clone)]
pub struct Filtered {
    pub records: Vec<Record>,
    pub report: FilterReport,
}

#[derive(Default)]
struct Tally {
    stage1_removed: usize,
    survivors: Vec<f64>,
    stage2_removed: usize,
}

/// Runs both filter stages over `records`.
///
/// # Errors
///
/// Returns [`FilterError::InvalidMultipliers`] if `params` fail
/// [`FilterParams::validate`], and [`FilterError::MissingBounds`] as soon as a record's
/// `(zone group, congestion level)` has no entry in `bounds`. Stage 1 never
/// treats a missing entry as unbounded.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn filter_outliers(
    records: Vec<Record>,
    bounds: &HardBounds,
    params: &FilterParams,
) -> Result<Filtered, FilterError> {
    params.validate()?;
    let total_input = records.len();
    let mut tallies: BTreeMap<GroupKey, Tally> = BTreeMap::new();

    let mut stage1 = Vec::with_capacity(records.len());
    for record in records {
        let key = GroupKey::of(&record, params.grouping);
        if params.hard_bounds_enabled {
            let b = bounds
                .get(record.zone_group(), record.congestion_level())
                .ok_or(FilterError::MissingBounds {
                    zone_id: record.zone_id(),
                    zone_group: record.zone_group(),
                    level: record.congestion_level(),
                })?;
            if !b.admits(record.actual_pass_time()) {
                tallies.entry(key).or_default().stage1_removed += 1;
                continue;
            }
        }
        tallies
            .entry(key)
            .or_default()
            .survivors
            .push(f64::from(record.actual_pass_time()));
        stage1.push((key, record));
    }
    let stage1_removed = total_input - stage1.len();
    debug!(survivors = stage1.len(), removed = stage1_removed, "Stage 1 done");

    // Means come from the stage 1 population only and are fixed for the pass.
    let summaries: BTreeMap<GroupKey, Option<Summary>> = tallies
        .iter()
        .map(|(key, t)| (*key, summary_statistics(&t.survivors)))
        .collect();
    let windows: BTreeMap<GroupKey, (f64, f64)> = summaries
        .iter()
        .filter_map(|(key, summary)| {
            let summary = summary.as_ref()?;
            let tally = &tallies[key];
            (params.adaptive_enabled && !is_small(tally.survivors.len(), params)).then(|| {
                (
                    *key,
                    (
                        params.adaptive_lower_mult * summary.mean,
                        params.adaptive_upper_mult * summary.mean,
                    ),
                )
            })
        })
        .collect();

    let mut retained = Vec::with_capacity(stage1.len());
    for (key, record) in stage1 {
        if let Some(&(lower, upper)) = windows.get(&key) {
            let secs = f64::from(record.actual_pass_time());
            if !(lower <= secs && secs <= upper) {
                if let Some(t) = tallies.get_mut(&key) {
                    t.stage2_removed += 1;
                }
                continue;
            }
        }
        retained.push(record);
    }

    let groups = tallies
        .into_iter()
        .map(|(key, t)| {
            let sample_count = t.survivors.len();
            let adaptive = match windows.get(&key) {
                Some(&(lower_bound, upper_bound)) => AdaptiveOutcome::Applied {
                    lower_bound,
                    upper_bound,
                    removed: t.stage2_removed,
                },
                None if !params.adaptive_enabled => AdaptiveOutcome::Disabled,
                None if sample_count == 0 => AdaptiveOutcome::NoSurvivors,
                None => AdaptiveOutcome::Exempt,
            };
            GroupReport {
                key,
                stage1_removed: t.stage1_removed,
                sample_count,
                summary: summaries.get(&key).cloned().flatten(),
                adaptive,
            }
        })
        .collect::<Vec<_>>();

    let report = FilterReport {
        total_input,
        stage1_removed,
        stage2_removed: groups.iter().map(GroupReport::stage2_removed).sum(),
        retained: retained.len(),
        params: params.clone(),
        groups,
    };
    report.log_summary();

    Ok(Filtered {
        records: retained,
        report,
    })
}

/// An empty group counts as small even with a zero threshold.
fn is_small(sample_count: usize, params: &FilterParams) -> bool {
    sample_count < params.min_sample_threshold.max(1)
}
