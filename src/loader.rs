//! Loads `passingObject_YYYYMMDD.csv` files into classified [`Record`]s.
//!
//! Two layouts exist. Legacy files start with a header row whose first field
//! is `timestamp` and carry the wait time as integer seconds. Current files
//! have no header and carry the wait time as an `MM:SS` or `HH:MM:SS`
//! duration; their column positions come from a [`ColumnLayout`].
//!
//! Rows that fail a conversion are dropped and tallied per file. A zone id
//! outside the configured range aborts the load.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::congestion::CongestionClassifier;
use crate::error::{LoadError, RowError};
use crate::parser::{
    parse_clock, parse_count, parse_duration, parse_estimate, parse_int, parse_timestamp,
};
use crate::record::{Observation, Record};

pub const FILE_PREFIX: &str = "passingObject_";
pub const LEGACY_HEADER_TOKEN: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvFormat {
    /// `timestamp,zone_id,objectCount,lidarEstTime,throughputEstTime,finalEstTime,actualPassTime`
    LegacyHeader,
    /// Ten columns, no header, duration-formatted wait time.
    HeaderlessExtended,
}

pub fn detect_format(first_row: &StringRecord) -> CsvFormat {
    match first_row.get(0) {
        Some(LEGACY_HEADER_TOKEN) => CsvFormat::LegacyHeader,
        _ => CsvFormat::HeaderlessExtended,
    }
}

/// Column positions for header-less files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub timestamp: usize,
    pub object_id: Option<usize>,
    pub zone_id: usize,
    pub object_count: usize,
    pub in_time: Option<usize>,
    pub out_time: Option<usize>,
    pub actual_pass_time: usize,
    pub lidar_est_time: usize,
    pub throughput_est_time: usize,
    pub final_est_time: usize,
}

impl ColumnLayout {
    /// `timestamp,objectId,zoneId,zoneObjectCount,inTime,outTime,actualPassTime,lidarEstTime,throughputEstTime,finalEstTime`
    pub const fn object_id_first() -> Self {
        ColumnLayout {
            timestamp: 0,
            object_id: Some(1),
            zone_id: 2,
            object_count: 3,
            in_time: Some(4),
            out_time: Some(5),
            actual_pass_time: 6,
            lidar_est_time: 7,
            throughput_est_time: 8,
            final_est_time: 9,
        }
    }

    /// `timestamp,zoneId,objectCount,sequence,startTime,endTime,duration,lidarEstTime,throughputEstTime,finalEstTime`
    pub const fn zone_first() -> Self {
        ColumnLayout {
            timestamp: 0,
            object_id: None,
            zone_id: 1,
            object_count: 2,
            in_time: Some(4),
            out_time: Some(5),
            actual_pass_time: 6,
            lidar_est_time: 7,
            throughput_est_time: 8,
            final_est_time: 9,
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::object_id_first()
    }
}

/// Inclusive range of file dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub layout: ColumnLayout,
    pub date_range: DateRange,
    /// Skip detection and parse every file as this format.
    pub format_hint: Option<CsvFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLoadSummary {
    pub path: PathBuf,
    pub date: Option<NaiveDate>,
    /// `None` for an empty file.
    pub format: Option<CsvFormat>,
    pub rows_read: usize,
    pub rows_loaded: usize,
    /// Dropped rows by reason.
    pub dropped: BTreeMap<&'static str, usize>,
}

impl FileLoadSummary {
    fn new(path: &Path, date: Option<NaiveDate>) -> Self {
        FileLoadSummary {
            path: path.to_path_buf(),
            date,
            format: None,
            rows_read: 0,
            rows_loaded: 0,
            dropped: BTreeMap::new(),
        }
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub files: Vec<FileLoadSummary>,
}

impl LoadReport {
    pub fn rows_read(&self) -> usize {
        self.files.iter().map(|f| f.rows_read).sum()
    }

    pub fn rows_loaded(&self) -> usize {
        self.files.iter().map(|f| f.rows_loaded).sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.files.iter().map(FileLoadSummary::dropped_count).sum()
    }

    pub fn dropped_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut reasons = BTreeMap::new();
        for (reason, n) in self.files.iter().flat_map(|f| &f.dropped) {
            *reasons.entry(*reason).or_insert(0) += n;
        }
        reasons
    }
}

#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub records: Vec<Record>,
    pub report: LoadReport,
}

/// Date embedded in a `passingObject_YYYYMMDD.csv` file name.
pub fn file_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix(FILE_PREFIX)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Lists `passingObject_*.csv` files in `dir`, sorted by file name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(FILE_PREFIX) && name.ends_with(".csv") && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Loads every data file in `dir`. A missing directory yields no records.
#[tracing::instrument(skip(opts, classifier), fields(dir = %dir.display()))]
pub fn load_dir(
    dir: &Path,
    opts: &LoadOptions,
    classifier: &CongestionClassifier,
) -> Result<Loaded, LoadError> {
    if !dir.is_dir() {
        warn!("Data directory not found");
        return Ok(Loaded::default());
    }
    let files = list_files(dir)?;
    if files.is_empty() {
        warn!("No {FILE_PREFIX}*.csv files found");
    }
    load_files(&files, opts, classifier)
}

/// Loads `paths` in file name order, skipping files outside the date range.
pub fn load_files(
    paths: &[PathBuf],
    opts: &LoadOptions,
    classifier: &CongestionClassifier,
) -> Result<Loaded, LoadError> {
    let mut paths = paths.to_vec();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let selected: Vec<PathBuf> = if opts.date_range.is_unbounded() {
        paths
    } else {
        let total = paths.len();
        let selected: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| match file_date(p) {
                Some(date) => opts.date_range.contains(date),
                None => {
                    warn!(path = %p.display(), "No date in file name, skipped by date filter");
                    false
                }
            })
            .collect();
        info!(
            selected = selected.len(),
            total,
            from = ?opts.date_range.from,
            to = ?opts.date_range.to,
            "Date filter applied"
        );
        selected
    };

    let mut loaded = Loaded::default();
    for path in &selected {
        let (records, summary) = load_file(path, opts, classifier)?;
        loaded.records.extend(records);
        loaded.report.files.push(summary);
    }

    info!(
        files = loaded.report.files.len(),
        records = loaded.records.len(),
        dropped = loaded.report.rows_dropped(),
        "Finished loading"
    );
    Ok(loaded)
}

#[tracing::instrument(skip(opts, classifier), fields(path = %path.display()))]
pub fn load_file(
    path: &Path,
    opts: &LoadOptions,
    classifier: &CongestionClassifier,
) -> Result<(Vec<Record>, FileLoadSummary), LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (records, summary) = read_records(file, path, opts, classifier)?;

    if summary.dropped_count() > 0 {
        warn!(
            loaded = summary.rows_loaded,
            dropped = summary.dropped_count(),
            reasons = ?summary.dropped,
            "Dropped unparsable rows"
        );
    } else {
        debug!(loaded = summary.rows_loaded, format = ?summary.format, "File loaded");
    }
    Ok((records, summary))
}

/// Parses one file's contents. `path` names the source in the summary and errors.
pub fn read_records<R: Read>(
    reader: R,
    path: &Path,
    opts: &LoadOptions,
    classifier: &CongestionClassifier,
) -> Result<(Vec<Record>, FileLoadSummary), LoadError> {
    let date = file_date(path);
    let mut summary = FileLoadSummary::new(path, date);
    let mut rows = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records();

    let first = match rows.next() {
        Some(first) => first.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
        None => return Ok((Vec::new(), summary)),
    };
    let format = opts.format_hint.unwrap_or_else(|| detect_format(&first));
    summary.format = Some(format);

    let row_parser = match format {
        CsvFormat::LegacyHeader => RowParser::Legacy(LegacyColumns::from_header(&first, path)?),
        CsvFormat::HeaderlessExtended => RowParser::Headerless(opts.layout),
    };
    let first_is_data =
        format == CsvFormat::HeaderlessExtended && detect_format(&first) != CsvFormat::LegacyHeader;

    let mut records = Vec::new();
    let mut line: u64 = if first_is_data { 0 } else { 1 };
    let data_rows = first_is_data
        .then_some(Ok::<_, csv::Error>(first))
        .into_iter()
        .chain(rows);
    for row in data_rows {
        line += 1;
        summary.rows_read += 1;
        let row = match row {
            Ok(row) => Ok(row),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(LoadError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => Err(RowError::from(e)),
        };
        if let Some(pos) = row.as_ref().ok().and_then(StringRecord::position) {
            line = pos.line();
        }

        match row.and_then(|row| row_parser.parse(&row, date, classifier)) {
            Ok(record) => {
                summary.rows_loaded += 1;
                records.push(record);
            }
            Err(RowError::Zone(source)) => {
                return Err(LoadError::InvalidZone {
                    path: path.to_path_buf(),
                    line,
                    source,
                });
            }
            Err(e) => {
                debug!(line, error = %e, "Dropping row");
                *summary.dropped.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }

    Ok((records, summary))
}

enum RowParser {
    Legacy(LegacyColumns),
    Headerless(ColumnLayout),
}

impl RowParser {
    fn parse(
        &self,
        row: &StringRecord,
        date: Option<NaiveDate>,
        classifier: &CongestionClassifier,
    ) -> Result<Record, RowError> {
        let (raw_zone, obs) = match self {
            RowParser::Legacy(cols) => cols.parse(row, date)?,
            RowParser::Headerless(layout) => parse_headerless(layout, row, date)?,
        };
        let zone_id = classifier.validate_zone(raw_zone)?;
        Ok(Record::classify(
            Observation { zone_id, ..obs },
            classifier,
        )?)
    }
}

fn column<'r>(row: &'r StringRecord, field: &'static str, index: usize) -> Result<&'r str, RowError> {
    row.get(index).ok_or(RowError::MissingColumn {
        field,
        index,
        len: row.len(),
    })
}

/// Header positions of a legacy file.
struct LegacyColumns {
    timestamp: usize,
    zone_id: usize,
    object_count: usize,
    lidar_est_time: usize,
    throughput_est_time: usize,
    final_est_time: usize,
    actual_pass_time: usize,
}

impl LegacyColumns {
    fn from_header(header: &StringRecord, path: &Path) -> Result<Self, LoadError> {
        let find = |name: &'static str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name,
                })
        };
        Ok(LegacyColumns {
            timestamp: find("timestamp")?,
            zone_id: find("zone_id")?,
            object_count: find("objectCount")?,
            lidar_est_time: find("lidarEstTime")?,
            throughput_est_time: find("throughputEstTime")?,
            final_est_time: find("finalEstTime")?,
            actual_pass_time: find("actualPassTime")?,
        })
    }

    fn parse(&self, row: &StringRecord, date: Option<NaiveDate>) -> Result<(i64, Observation), RowError> {
        let timestamp = parse_timestamp(column(row, "timestamp", self.timestamp)?)?;
        let zone = parse_int("zone_id", column(row, "zone_id", self.zone_id)?)?;
        let object_count = parse_count("object_count", column(row, "object_count", self.object_count)?)?;
        let lidar_est_time = parse_estimate("lidar_est_time", column(row, "lidar_est_time", self.lidar_est_time)?)?;
        let throughput_est_time = parse_estimate(
            "throughput_est_time",
            column(row, "throughput_est_time", self.throughput_est_time)?,
        )?;
        let final_est_time = parse_estimate("final_est_time", column(row, "final_est_time", self.final_est_time)?)?;
        // Legacy files store the wait as whole seconds, not a duration.
        let actual_pass_time: u32 =
            parse_count("actual_pass_time", column(row, "actual_pass_time", self.actual_pass_time)?)?;

        Ok((
            zone,
            Observation {
                timestamp,
                object_id: None,
                zone_id: 0,
                object_count,
                in_time: entry_time(timestamp, actual_pass_time),
                out_time: Some(timestamp.time()),
                lidar_est_time,
                throughput_est_time,
                final_est_time,
                actual_pass_time,
                date,
            },
        ))
    }
}

/// Legacy rows are stamped at exit, so entry is the timestamp minus the wait.
fn entry_time(exit: NaiveDateTime, wait_secs: u32) -> Option<chrono::NaiveTime> {
    exit.checked_sub_signed(TimeDelta::seconds(i64::from(wait_secs)))
        .map(|t| t.time())
}

fn parse_headerless(
    layout: &ColumnLayout,
    row: &StringRecord,
    date: Option<NaiveDate>,
) -> Result<(i64, Observation), RowError> {
    let timestamp = parse_timestamp(column(row, "timestamp", layout.timestamp)?)?;
    let object_id = layout
        .object_id
        .map(|i| parse_count("object_id", column(row, "object_id", i)?))
        .transpose()?;
    let zone = parse_int("zone_id", column(row, "zone_id", layout.zone_id)?)?;
    let object_count = parse_count("object_count", column(row, "object_count", layout.object_count)?)?;
    let in_time = layout
        .in_time
        .map(|i| parse_clock("in_time", column(row, "in_time", i)?))
        .transpose()?;
    let out_time = layout
        .out_time
        .map(|i| parse_clock("out_time", column(row, "out_time", i)?))
        .transpose()?;
    let actual_pass_time = parse_duration(column(row, "actual_pass_time", layout.actual_pass_time)?)?;
    let lidar_est_time = parse_estimate("lidar_est_time", column(row, "lidar_est_time", layout.lidar_est_time)?)?;
    let throughput_est_time = parse_estimate(
        "throughput_est_time",
        column(row, "throughput_est_time", layout.throughput_est_time)?,
    )?;
    let final_est_time = parse_estimate("final_est_time", column(row, "final_est_time", layout.final_est_time)?)?;

    Ok((
        zone,
        Observation {
            timestamp,
            object_id,
            zone_id: 0,
            object_count,
            in_time,
            out_time,
            lidar_est_time,
            throughput_est_time,
            final_est_time,
            actual_pass_time,
            date,
        },
    ))
}
