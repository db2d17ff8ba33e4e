use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use queue_log_rater::analyzers::analyze;
use queue_log_rater::config::AnalysisConfig;
use queue_log_rater::congestion::CongestionClassifier;
use queue_log_rater::loader::{CsvFormat, DateRange, LoadOptions, load_dir};
use queue_log_rater::outliers::{
    AdaptiveOutcome, FilterParams, GroupKey, HardBounds, filter_outliers,
};
use queue_log_rater::output::{write_json, write_records};
use queue_log_rater::record::CongestionLevel;

fn fixtures() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"))
}

fn december_2025() -> LoadOptions {
    LoadOptions {
        date_range: DateRange {
            from: NaiveDate::from_ymd_opt(2025, 11, 1),
            to: NaiveDate::from_ymd_opt(2025, 12, 31),
        },
        ..LoadOptions::default()
    }
}

#[test]
fn test_load_dir_mixed_formats() {
    let loaded = load_dir(fixtures(), &LoadOptions::default(), &CongestionClassifier::default())
        .expect("Failed to load fixtures");

    let formats: Vec<_> = loaded.report.files.iter().map(|f| f.format).collect();
    assert_eq!(
        formats,
        vec![
            Some(CsvFormat::LegacyHeader),
            Some(CsvFormat::HeaderlessExtended),
            Some(CsvFormat::HeaderlessExtended),
        ]
    );
    assert_eq!(loaded.records.len(), 18);
    assert_eq!(loaded.report.rows_read(), 19);
    assert_eq!(loaded.report.rows_dropped(), 1);
    assert_eq!(loaded.report.dropped_by_reason()["actual_pass_time"], 1);

    // file name order, legacy file first
    assert_eq!(loaded.records[0].zone_id(), 6);
    assert_eq!(loaded.records[13].observation().object_id, Some(201));
    assert_eq!(loaded.records[13].actual_pass_time(), 200);
}

#[test]
fn test_load_dir_date_range() {
    let loaded = load_dir(fixtures(), &december_2025(), &CongestionClassifier::default()).unwrap();

    assert_eq!(loaded.report.files.len(), 2);
    assert_eq!(loaded.records.len(), 17);
    assert!(
        loaded
            .records
            .iter()
            .all(|r| r.date() < NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    );
}

#[test]
fn test_load_missing_dir_is_empty() {
    let loaded = load_dir(
        &fixtures().join("does_not_exist"),
        &LoadOptions::default(),
        &CongestionClassifier::default(),
    )
    .unwrap();
    assert!(loaded.records.is_empty());
    assert!(loaded.report.files.is_empty());
}

#[test]
fn test_full_pipeline() {
    let loaded = load_dir(fixtures(), &december_2025(), &CongestionClassifier::default()).unwrap();
    let filtered =
        filter_outliers(loaded.records, &HardBounds::default(), &FilterParams::default()).unwrap();
    let report = &filtered.report;

    assert_eq!(report.total_input, 17);
    // zone 6 waits of 0 and 600, zone 2 wait of 500
    assert_eq!(report.stage1_removed, 3);
    // zone 6 wait of 20 is below 0.3 x mean
    assert_eq!(report.stage2_removed, 1);
    assert_eq!(report.retained, 13);
    assert_eq!(filtered.records.len(), 13);
    assert_eq!(
        report.total_input,
        report.retained + report.stage1_removed + report.stage2_removed
    );

    let zone6 = report.group(&GroupKey::zone(6, CongestionLevel::Low)).unwrap();
    assert_eq!(zone6.sample_count, 11);
    match zone6.adaptive {
        AdaptiveOutcome::Applied {
            lower_bound,
            upper_bound,
            removed,
        } => {
            assert_eq!(removed, 1);
            assert!(lower_bound > 20.0 && lower_bound < 90.0);
            assert!(upper_bound > 120.0);
        }
        ref other => panic!("unexpected outcome {other:?}"),
    }

    let zone2 = report.group(&GroupKey::zone(2, CongestionLevel::Low)).unwrap();
    assert!(zone2.is_exempt());
    assert_eq!(zone2.stage1_removed, 1);
    assert_eq!(zone2.kept(), 2);

    let zone9 = report.group(&GroupKey::zone(9, CongestionLevel::VeryHigh)).unwrap();
    assert!(zone9.is_exempt());
    assert_eq!(report.exempt_record_count(), 3);
}

#[test]
fn test_refilter_is_stable() {
    let loaded = load_dir(fixtures(), &december_2025(), &CongestionClassifier::default()).unwrap();
    let params = FilterParams::default();
    let first = filter_outliers(loaded.records, &HardBounds::default(), &params).unwrap();
    let second = filter_outliers(first.records.clone(), &HardBounds::default(), &params).unwrap();

    assert_eq!(second.records, first.records);
    assert_eq!(second.report.removed(), 0);
}

#[test]
fn test_config_overrides_filter() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{ "filter": { "min_sample_threshold": 20 } }"#).unwrap();

    let config = AnalysisConfig::load(&config_path).unwrap();
    let loaded = load_dir(fixtures(), &december_2025(), &config.classifier()).unwrap();
    let filtered = filter_outliers(loaded.records, &config.hard_bounds, &config.filter).unwrap();

    // every group is now too small for stage 2
    assert_eq!(filtered.report.stage2_removed, 0);
    assert_eq!(filtered.report.retained, 14);
    assert_eq!(filtered.report.exempt_group_count(), filtered.report.groups.len());
}

#[test]
fn test_pipeline_outputs() {
    let loaded = load_dir(fixtures(), &LoadOptions::default(), &CongestionClassifier::default()).unwrap();
    let filtered =
        filter_outliers(loaded.records, &HardBounds::default(), &FilterParams::default()).unwrap();
    assert_eq!(filtered.records.len(), 14);

    let dir = tempfile::tempdir().unwrap();
    let clean = dir.path().join("clean.csv");
    write_records(&clean, &filtered.records).unwrap();
    let content = fs::read_to_string(&clean).unwrap();
    assert_eq!(content.lines().count(), 15);

    let analysis = analyze(&filtered.records).unwrap();
    assert_eq!(analysis.summary.zones, vec![2, 6, 9]);
    assert_eq!(analysis.by_zone[&6].record_count, 10);
    assert_eq!(analysis.by_date.len(), 3);

    let out = dir.path().join("analysis.json");
    write_json(&out, &analysis).unwrap();
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["summary"]["total_records"], 14);
}
