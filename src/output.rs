//! Persistence for cleaned records and run reports.
//!
//! Cleaned records go to CSV, reports, analyses and trends to pretty JSON.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::parser::TIMESTAMP_FORMAT;
use crate::record::{CongestionLevel, Record, ZoneGroup};

/// Flat CSV row for a cleaned record.
#[derive(Debug, Serialize)]
struct CleanRow {
    timestamp: String,
    date: Option<NaiveDate>,
    object_id: Option<u64>,
    zone_id: u32,
    zone_group: ZoneGroup,
    object_count: u32,
    congestion_level: CongestionLevel,
    in_time: Option<String>,
    out_time: Option<String>,
    actual_pass_time: u32,
    lidar_est_time: f64,
    throughput_est_time: f64,
    final_est_time: f64,
}

impl From<&Record> for CleanRow {
    fn from(r: &Record) -> Self {
        let obs = r.observation();
        CleanRow {
            timestamp: obs.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            date: obs.date,
            object_id: obs.object_id,
            zone_id: obs.zone_id,
            zone_group: r.zone_group(),
            object_count: obs.object_count,
            congestion_level: r.congestion_level(),
            in_time: obs.in_time.map(|t| t.format("%H:%M:%S").to_string()),
            out_time: obs.out_time.map(|t| t.format("%H:%M:%S").to_string()),
            actual_pass_time: obs.actual_pass_time,
            lidar_est_time: obs.lidar_est_time,
            throughput_est_time: obs.throughput_est_time,
            final_est_time: obs.final_est_time,
        }
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

/// Writes `records` to a new CSV file with a header row.
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing cleaned records");

    let mut writer = WriterBuilder::new().has_headers(true).from_writer(create(path)?);
    for record in records {
        writer.serialize(CleanRow::from(record))?;
    }
    writer.flush()?;

    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    debug!(path = %path.display(), "Writing JSON");
    let file = create(path)?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
