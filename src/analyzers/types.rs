//! Data types produced by the accuracy analysis.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::loader::DateRange;
use crate::record::CongestionLevel;
use crate::stats::{ErrorMetrics, Estimator, Summary};

/// Per-group averages for one slice of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAccuracy {
    pub record_count: usize,
    pub avg_object_count: f64,
    pub avg_actual_pass_time: f64,
    pub mae: BTreeMap<Estimator, f64>,
    pub mean_pct_error: BTreeMap<Estimator, f64>,
    /// Mean signed error; positive means overestimation.
    pub mean_error: BTreeMap<Estimator, f64>,
}

/// Threshold breaches for one estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub high_error: usize,
    pub underestimation: usize,
    pub overestimation: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Issues {
    pub by_estimator: BTreeMap<Estimator, IssueCounts>,
    pub short_actual_times: usize,
    pub long_actual_times: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub zones: Vec<u32>,
    pub object_count: Summary,
    pub actual_pass_time: Summary,
}

/// Complete accuracy analysis of a record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub summary: DatasetSummary,
    pub accuracy: BTreeMap<Estimator, ErrorMetrics>,
    pub by_zone: BTreeMap<u32, GroupAccuracy>,
    pub by_date: BTreeMap<NaiveDate, GroupAccuracy>,
    pub by_hour: BTreeMap<u32, GroupAccuracy>,
    pub by_congestion: BTreeMap<CongestionLevel, GroupAccuracy>,
    pub by_zone_congestion: BTreeMap<u32, BTreeMap<CongestionLevel, GroupAccuracy>>,
    pub by_object_bin: BTreeMap<&'static str, GroupAccuracy>,
    pub issues: Issues,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneWaitTimes {
    pub predicted_min: f64,
    pub actual_min: f64,
}

/// Final-estimate error of one period, in minutes. Positive means overestimation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMetrics {
    pub range: DateRange,
    pub total_samples: usize,
    pub zone_avg_error_min: BTreeMap<u32, f64>,
    pub zone_congestion_error_min: BTreeMap<u32, BTreeMap<CongestionLevel, f64>>,
    pub congestion_avg_error_min: BTreeMap<CongestionLevel, f64>,
    pub zone_wait_times: BTreeMap<u32, ZoneWaitTimes>,
    pub zone_sample_counts: BTreeMap<u32, usize>,
}

/// Difference between two consecutive values. `pct` is 0 when the base is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Change {
    pub delta: f64,
    pub pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    Stable,
    Improving,
    Degrading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// One value per period, oldest first.
    pub values: Vec<f64>,
    /// Change between each pair of consecutive periods.
    pub steps: Vec<Change>,
    /// First period to last.
    pub overall: Change,
    pub status: TrendStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopChanges {
    /// `(zone_id, overall delta)`, largest drop in error first.
    pub improving: Vec<(u32, f64)>,
    /// `(zone_id, overall delta)`, largest rise in error first.
    pub degrading: Vec<(u32, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub range: DateRange,
    pub total_samples: usize,
}

/// Error trends across consecutive periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub periods: Vec<PeriodSummary>,
    pub zones: BTreeMap<u32, Trend>,
    pub congestion: BTreeMap<CongestionLevel, Trend>,
    pub top_changes: TopChanges,
}
