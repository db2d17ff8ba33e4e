//! Prediction accuracy grouped by zone, date, hour and congestion level,
//! and error trends across consecutive periods.
//!
//! Consumes cleaned records from the outlier filter and produces
//! serializable aggregates for the reporting layer.

pub mod aggregate;
pub mod trend;
pub mod types;

pub use aggregate::{analyze, group_accuracy};
pub use trend::{top_changes, trends};
pub use types::{Analysis, GroupAccuracy, Issues, PeriodMetrics, Trend, TrendReport};
