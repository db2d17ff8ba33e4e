//! Period-over-period trends of the final estimate's error.
//!
//! Each period is a date range of cleaned records. Errors are compared in
//! minutes, and a zone or congestion level absent from a period counts as 0.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyzers::aggregate::group_accuracy;
use crate::analyzers::types::{
    Change, GroupAccuracy, PeriodMetrics, PeriodSummary, TopChanges, Trend, TrendReport,
    TrendStatus, ZoneWaitTimes,
};
use crate::loader::DateRange;
use crate::record::{CongestionLevel, Record};
use crate::stats::Estimator;

/// Overall change in minutes below which a trend is stable.
pub const STABLE_THRESHOLD_MIN: f64 = 0.1;

fn error_min(acc: &GroupAccuracy) -> f64 {
    acc.mean_error.get(&Estimator::Final).copied().unwrap_or(0.0) / 60.0
}

impl PeriodMetrics {
    pub fn from_records(range: DateRange, records: &[Record]) -> Self {
        let by_zone = group_accuracy(records, Record::zone_id);

        let mut zone_congestion_error_min: BTreeMap<u32, BTreeMap<CongestionLevel, f64>> =
            BTreeMap::new();
        for ((zone, level), acc) in group_accuracy(records, |r| (r.zone_id(), r.congestion_level())) {
            zone_congestion_error_min
                .entry(zone)
                .or_default()
                .insert(level, error_min(&acc));
        }

        PeriodMetrics {
            range,
            total_samples: records.len(),
            zone_avg_error_min: by_zone.iter().map(|(z, acc)| (*z, error_min(acc))).collect(),
            zone_congestion_error_min,
            congestion_avg_error_min: group_accuracy(records, Record::congestion_level)
                .iter()
                .map(|(l, acc)| (*l, error_min(acc)))
                .collect(),
            // mean(estimate) = mean(actual) + mean(error)
            zone_wait_times: by_zone
                .iter()
                .map(|(z, acc)| {
                    let actual_min = acc.avg_actual_pass_time / 60.0;
                    let predicted_min = actual_min + error_min(acc);
                    (
                        *z,
                        ZoneWaitTimes {
                            predicted_min,
                            actual_min,
                        },
                    )
                })
                .collect(),
            zone_sample_counts: by_zone.iter().map(|(z, acc)| (*z, acc.record_count)).collect(),
        }
    }
}

impl Change {
    pub fn between(from: f64, to: f64) -> Self {
        let delta = to - from;
        let pct = if from != 0.0 {
            (delta / from * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Change { delta, pct }
    }
}

pub fn assess_trend(overall_delta: f64, lower_is_better: bool) -> TrendStatus {
    if overall_delta.abs() < STABLE_THRESHOLD_MIN {
        return TrendStatus::Stable;
    }
    let improving = if lower_is_better {
        overall_delta < 0.0
    } else {
        overall_delta > 0.0
    };
    if improving {
        TrendStatus::Improving
    } else {
        TrendStatus::Degrading
    }
}

impl Trend {
    /// `None` for an empty series.
    pub fn new(values: Vec<f64>, lower_is_better: bool) -> Option<Self> {
        let first = *values.first()?;
        let last = *values.last()?;
        let steps = values.windows(2).map(|w| Change::between(w[0], w[1])).collect();
        let overall = Change::between(first, last);
        Some(Trend {
            status: assess_trend(overall.delta, lower_is_better),
            values,
            steps,
            overall,
        })
    }
}

/// The `n` zones whose error fell most and the `n` whose error rose most.
pub fn top_changes(zone_trends: &BTreeMap<u32, Trend>, n: usize) -> TopChanges {
    let mut deltas: Vec<(u32, f64)> = zone_trends
        .iter()
        .map(|(z, t)| (*z, t.overall.delta))
        .collect();

    deltas.sort_by(|a, b| a.1.total_cmp(&b.1));
    let improving = deltas.iter().take(n).copied().collect();
    deltas.sort_by(|a, b| b.1.total_cmp(&a.1));
    let degrading = deltas.iter().take(n).copied().collect();

    TopChanges {
        improving,
        degrading,
    }
}

/// Trends across `periods`, oldest first. `None` with fewer than two periods.
#[tracing::instrument(skip_all, fields(periods = periods.len()))]
pub fn trends(periods: &[PeriodMetrics], top_n: usize) -> Option<TrendReport> {
    if periods.len() < 2 {
        return None;
    }

    let all_zones: BTreeSet<u32> = periods
        .iter()
        .flat_map(|p| p.zone_avg_error_min.keys().copied())
        .collect();
    let zones: BTreeMap<u32, Trend> = all_zones
        .into_iter()
        .filter_map(|zone| {
            let values: Vec<f64> = periods
                .iter()
                .map(|p| p.zone_avg_error_min.get(&zone).copied().unwrap_or(0.0))
                .collect();
            if values.iter().all(|v| *v == 0.0) {
                return None;
            }
            Some((zone, Trend::new(values, true)?))
        })
        .collect();

    let congestion = CongestionLevel::ALL
        .into_iter()
        .filter_map(|level| {
            let values = periods
                .iter()
                .map(|p| p.congestion_avg_error_min.get(&level).copied().unwrap_or(0.0))
                .collect();
            Some((level, Trend::new(values, true)?))
        })
        .collect();

    Some(TrendReport {
        periods: periods
            .iter()
            .map(|p| PeriodSummary {
                range: p.range,
                total_samples: p.total_samples,
            })
            .collect(),
        top_changes: top_changes(&zones, top_n),
        zones,
        congestion,
    })
}
