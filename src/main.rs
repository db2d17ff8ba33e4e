//! CLI entry point for the queue log rater.
//!
//! Loads checkpoint queue logs, removes outliers, and writes the cleaned
//! records, the filter report, a grouped accuracy analysis, or error trends
//! across periods.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use queue_log_rater::analyzers::{PeriodMetrics, analyze, trends};
use queue_log_rater::config::AnalysisConfig;
use queue_log_rater::loader::{CsvFormat, DateRange, LoadOptions, LoadReport, load_dir};
use queue_log_rater::outliers::{AdaptiveGrouping, FilterReport, Filtered, filter_outliers};
use queue_log_rater::output::{write_json, write_records};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "queue_log_rater")]
#[command(about = "Filter and rate checkpoint queue wait-time predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and filter logs, writing the cleaned records and a filter report
    Filter {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// CSV file for the cleaned records
        #[arg(short, long, default_value = "clean.csv")]
        output: PathBuf,

        /// JSON file for the load and filter report
        #[arg(short, long, default_value = "report.json")]
        report: PathBuf,
    },
    /// Load and filter logs, then write accuracy by zone, date, hour and congestion level
    Analyze {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// JSON file for the analysis
        #[arg(short, long, default_value = "analysis.json")]
        output: PathBuf,
    },
    /// Compare final-estimate error across consecutive periods
    Trend {
        #[command(flatten)]
        run: RunArgs,

        /// Period as FROM:TO (YYYYMMDD, inclusive), oldest first; at least two
        #[arg(long = "period", value_parser = parse_period, required = true, num_args = 1)]
        periods: Vec<DateRange>,

        /// Number of most improved and most degraded zones to list
        #[arg(long, default_value_t = 3)]
        top: usize,

        /// JSON file for the trend report
        #[arg(short, long, default_value = "trend.json")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Directory containing passingObject_YYYYMMDD.csv files
    #[arg(value_name = "DIR", default_value = "csv")]
    data_dir: PathBuf,

    /// JSON config overriding zones, thresholds, bounds and filter parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parse every file as this format instead of detecting it
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Minimum group size for adaptive filtering
    #[arg(long)]
    min_samples: Option<usize>,

    /// Adaptive lower bound as a multiple of the group mean
    #[arg(long)]
    lower_mult: Option<f64>,

    /// Adaptive upper bound as a multiple of the group mean
    #[arg(long)]
    upper_mult: Option<f64>,

    /// Adaptive grouping granularity
    #[arg(long, value_enum)]
    group_by: Option<GroupByArg>,

    /// Skip the hard bounds stage
    #[arg(long, default_value_t = false)]
    no_hard_bounds: bool,

    /// Skip the adaptive stage
    #[arg(long, default_value_t = false)]
    no_adaptive: bool,
}

#[derive(Args)]
struct RangeArgs {
    /// First file date to load (YYYYMMDD, inclusive)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Last file date to load (YYYYMMDD, inclusive)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
}

impl RangeArgs {
    fn date_range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Legacy,
    Headerless,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupByArg {
    Zone,
    ZoneGroup,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|e| format!("expected YYYYMMDD: {e}"))
}

fn parse_period(s: &str) -> Result<DateRange, String> {
    let (from, to) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got {s:?}"))?;
    let (from, to) = (parse_date(from)?, parse_date(to)?);
    if from > to {
        return Err(format!("period starts after it ends: {s}"));
    }
    Ok(DateRange {
        from: Some(from),
        to: Some(to),
    })
}

#[derive(Serialize)]
struct RunReport<'a> {
    load: &'a LoadReport,
    filter: &'a FilterReport,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/queue_log_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("queue_log_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Filter {
            run,
            range,
            output,
            report,
        } => {
            let config = build_config(&run)?;
            let (load_report, filtered) = load_and_filter(&run, &config, range.date_range())?;

            write_records(&output, &filtered.records)?;
            write_json(
                &report,
                &RunReport {
                    load: &load_report,
                    filter: &filtered.report,
                },
            )?;
            info!(
                records = filtered.records.len(),
                output = %output.display(),
                report = %report.display(),
                "Wrote cleaned records"
            );
        }
        Commands::Analyze { run, range, output } => {
            let config = build_config(&run)?;
            let (_, filtered) = load_and_filter(&run, &config, range.date_range())?;

            match analyze(&filtered.records) {
                Some(analysis) => {
                    write_json(&output, &analysis)?;
                    info!(output = %output.display(), "Wrote analysis");
                }
                None => warn!("No records left to analyze"),
            }
        }
        Commands::Trend {
            run,
            periods,
            top,
            output,
        } => {
            let config = build_config(&run)?;
            let mut metrics = Vec::with_capacity(periods.len());
            for range in periods {
                let (_, filtered) = load_and_filter(&run, &config, range)?;
                metrics.push(PeriodMetrics::from_records(range, &filtered.records));
            }

            match trends(&metrics, top) {
                Some(report) => {
                    write_json(&output, &report)?;
                    info!(
                        periods = report.periods.len(),
                        zones = report.zones.len(),
                        output = %output.display(),
                        "Wrote trend report"
                    );
                }
                None => warn!("Trends need at least two periods"),
            }
        }
    }

    Ok(())
}

/// Reads the config file, if any, and applies flag overrides.
fn build_config(run: &RunArgs) -> Result<AnalysisConfig> {
    let mut config = match &run.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(n) = run.min_samples {
        config.filter.min_sample_threshold = n;
    }
    if let Some(m) = run.lower_mult {
        config.filter.adaptive_lower_mult = m;
    }
    if let Some(m) = run.upper_mult {
        config.filter.adaptive_upper_mult = m;
    }
    if let Some(g) = run.group_by {
        config.filter.grouping = match g {
            GroupByArg::Zone => AdaptiveGrouping::Zone,
            GroupByArg::ZoneGroup => AdaptiveGrouping::ZoneGroup,
        };
    }
    config.filter.hard_bounds_enabled &= !run.no_hard_bounds;
    config.filter.adaptive_enabled &= !run.no_adaptive;
    config.validate()?;

    Ok(config)
}

/// Loads the data directory over `date_range` and runs the two-stage filter.
#[tracing::instrument(skip_all, fields(dir = %run.data_dir.display(), from = ?date_range.from, to = ?date_range.to))]
fn load_and_filter(
    run: &RunArgs,
    config: &AnalysisConfig,
    date_range: DateRange,
) -> Result<(LoadReport, Filtered)> {
    let opts = LoadOptions {
        layout: config.layout,
        date_range,
        format_hint: run.format.map(|f| match f {
            FormatArg::Legacy => CsvFormat::LegacyHeader,
            FormatArg::Headerless => CsvFormat::HeaderlessExtended,
        }),
    };

    let loaded = load_dir(&run.data_dir, &opts, &config.classifier())?;
    info!(
        rows = loaded.report.rows_read(),
        loaded = loaded.report.rows_loaded(),
        dropped = loaded.report.rows_dropped(),
        reasons = ?loaded.report.dropped_by_reason(),
        "Load summary"
    );
    if loaded.records.is_empty() {
        warn!("No data was loaded, check the data directory and file formats");
    }

    let filtered = filter_outliers(loaded.records, &config.hard_bounds, &config.filter)?;
    if filtered.records.is_empty() && filtered.report.total_input > 0 {
        warn!("All records were filtered out as outliers");
    }

    Ok((loaded.report, filtered))
}
