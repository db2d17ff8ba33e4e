use std::collections::{BTreeMap, BTreeSet};

use chrono::Timelike;

use crate::analyzers::types::{Analysis, DatasetSummary, GroupAccuracy, IssueCounts, Issues};
use crate::record::Record;
use crate::stats::{Estimator, accuracy, mean, summary_statistics};

/// Absolute error in seconds above which a prediction counts as a high error.
pub const HIGH_ERROR_SECS: f64 = 100.0;
pub const UNDERESTIMATION_SECS: f64 = -30.0;
pub const OVERESTIMATION_SECS: f64 = 50.0;
pub const SHORT_ACTUAL_SECS: u32 = 40;
pub const LONG_ACTUAL_SECS: u32 = 500;

/// Upper object count of each bin, checked in order.
static OBJECT_BINS: &[(u32, &str)] = &[
    (10, "1-10"),
    (20, "11-20"),
    (30, "21-30"),
    (40, "31-40"),
    (50, "41-50"),
];

pub fn object_bin(object_count: u32) -> &'static str {
    OBJECT_BINS
        .iter()
        .find(|(max, _)| object_count <= *max)
        .map_or("50+", |(_, label)| *label)
}

impl GroupAccuracy {
    /// Averages over `records`; `None` if there are none.
    pub fn from_records(records: &[&Record]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let mut mae = BTreeMap::new();
        let mut mean_pct_error = BTreeMap::new();
        let mut mean_error = BTreeMap::new();
        for est in Estimator::ALL {
            mae.insert(est, average(records, |r| est.error(r).abs()));
            mean_pct_error.insert(est, average(records, |r| est.pct_error(r)));
            mean_error.insert(est, average(records, |r| est.error(r)));
        }

        Some(GroupAccuracy {
            record_count: records.len(),
            avg_object_count: average(records, |r| f64::from(r.object_count())),
            avg_actual_pass_time: average(records, |r| f64::from(r.actual_pass_time())),
            mae,
            mean_pct_error,
            mean_error,
        })
    }
}

fn average(records: &[&Record], f: impl Fn(&Record) -> f64) -> f64 {
    let values: Vec<f64> = records.iter().map(|&r| f(r)).collect();
    mean(&values)
}

/// Groups `records` by `key` and computes accuracy per group.
pub fn group_accuracy<K, F>(records: &[Record], key: F) -> BTreeMap<K, GroupAccuracy>
where
    K: Ord,
    F: Fn(&Record) -> K,
{
    let mut groups: BTreeMap<K, Vec<&Record>> = BTreeMap::new();
    for r in records {
        groups.entry(key(r)).or_default().push(r);
    }
    groups
        .into_iter()
        .filter_map(|(k, rs)| Some((k, GroupAccuracy::from_records(&rs)?)))
        .collect()
}

pub fn count_issues(records: &[Record]) -> Issues {
    let mut issues = Issues::default();
    for r in records {
        for est in Estimator::ALL {
            let e = est.error(r);
            let counts: &mut IssueCounts = issues.by_estimator.entry(est).or_default();
            if e.abs() > HIGH_ERROR_SECS {
                counts.high_error += 1;
            }
            if e < UNDERESTIMATION_SECS {
                counts.underestimation += 1;
            }
            if e > OVERESTIMATION_SECS {
                counts.overestimation += 1;
            }
        }
        if r.actual_pass_time() < SHORT_ACTUAL_SECS {
            issues.short_actual_times += 1;
        }
        if r.actual_pass_time() > LONG_ACTUAL_SECS {
            issues.long_actual_times += 1;
        }
    }
    issues
}

/// Full zone, time and congestion level breakdown. `None` for no records.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn analyze(records: &[Record]) -> Option<Analysis> {
    let start = records.iter().map(Record::timestamp).min()?;
    let end = records.iter().map(Record::timestamp).max()?;
    let zones: BTreeSet<u32> = records.iter().map(Record::zone_id).collect();
    let object_counts: Vec<f64> = records.iter().map(|r| f64::from(r.object_count())).collect();
    let actual_times: Vec<f64> = records.iter().map(|r| f64::from(r.actual_pass_time())).collect();

    let summary = DatasetSummary {
        total_records: records.len(),
        start,
        end,
        zones: zones.into_iter().collect(),
        object_count: summary_statistics(&object_counts)?,
        actual_pass_time: summary_statistics(&actual_times)?,
    };

    let overall = Estimator::ALL
        .into_iter()
        .filter_map(|est| Some((est, accuracy(records, est)?)))
        .collect();

    let mut by_zone_congestion: BTreeMap<u32, BTreeMap<_, _>> = BTreeMap::new();
    for ((zone, level), acc) in group_accuracy(records, |r| (r.zone_id(), r.congestion_level())) {
        by_zone_congestion.entry(zone).or_default().insert(level, acc);
    }

    Some(Analysis {
        summary,
        accuracy: overall,
        by_zone: group_accuracy(records, Record::zone_id),
        by_date: group_accuracy(records, Record::date),
        by_hour: group_accuracy(records, |r| r.timestamp().hour()),
        by_congestion: group_accuracy(records, Record::congestion_level),
        by_zone_congestion,
        by_object_bin: group_accuracy(records, |r| object_bin(r.object_count())),
        issues: count_issues(records),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CongestionLevel;
    use crate::record::tests::record;

    #[test]
    fn test_object_bins() {
        assert_eq!(object_bin(0), "1-10");
        assert_eq!(object_bin(10), "1-10");
        assert_eq!(object_bin(11), "11-20");
        assert_eq!(object_bin(50), "41-50");
        assert_eq!(object_bin(51), "50+");
    }

    #[test]
    fn test_group_accuracy_averages() {
        // estimates are lidar 100, throughput 120, final 110
        let records = vec![record(5, 2, 100), record(5, 4, 200)];
        let by_zone = group_accuracy(&records, Record::zone_id);
        let acc = &by_zone[&5];

        assert_eq!(acc.record_count, 2);
        assert_eq!(acc.avg_object_count, 3.0);
        assert_eq!(acc.avg_actual_pass_time, 150.0);
        assert_eq!(acc.mae[&Estimator::Lidar], 50.0);
        assert_eq!(acc.mean_error[&Estimator::Lidar], -50.0);
        // (0% + -50%) / 2
        assert_eq!(acc.mean_pct_error[&Estimator::Lidar], -25.0);
    }

    #[test]
    fn test_count_issues() {
        let records = vec![record(5, 1, 20), record(5, 1, 600), record(5, 1, 60)];
        let issues = count_issues(&records);

        let lidar = issues.by_estimator[&Estimator::Lidar];
        // errors: +80, -500, +40
        assert_eq!(lidar.high_error, 1);
        assert_eq!(lidar.underestimation, 1);
        assert_eq!(lidar.overestimation, 1);
        assert_eq!(issues.short_actual_times, 1);
        assert_eq!(issues.long_actual_times, 1);
    }

    #[test]
    fn test_analyze_breakdowns() {
        let records = vec![record(1, 10, 100), record(1, 90, 400), record(6, 1, 120)];
        let a = analyze(&records).unwrap();

        assert_eq!(a.summary.total_records, 3);
        assert_eq!(a.summary.zones, vec![1, 6]);
        assert_eq!(a.by_zone.len(), 2);
        assert_eq!(a.by_zone[&1].record_count, 2);
        assert_eq!(a.by_hour[&10].record_count, 3);
        assert_eq!(a.by_congestion[&CongestionLevel::Low].record_count, 2);
        assert_eq!(a.by_zone_congestion[&1].len(), 2);
        assert_eq!(a.by_object_bin["1-10"].record_count, 2);
        assert_eq!(a.accuracy.len(), 3);
    }

    #[test]
    fn test_analyze_empty() {
        assert!(analyze(&[]).is_none());
    }

    #[test]
    fn test_analysis_serializes() {
        let a = analyze(&[record(3, 1, 100)]).unwrap();
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["by_zone"]["3"]["record_count"], 1);
        assert_eq!(json["by_congestion"]["Low"]["mae"]["lidar"], 0.0);
        assert_eq!(json["by_date"]["2025-12-21"]["record_count"], 1);
    }
}
