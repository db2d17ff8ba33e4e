use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::congestion::{CongestionClassifier, CongestionThresholds, ZoneRange};
use crate::loader::ColumnLayout;
use crate::outliers::{FilterParams, HardBounds};

/// Zone ranges, thresholds, bounds and filter parameters for a run.
///
/// Stored as a JSON object on disk. Every section is optional and falls back
/// to the built-in values:
/// ```json
/// {
///   "zones": { "min": 1, "max": 17, "identity_max": 4 },
///   "congestion": { "identity": [40, 80, 140], "security": [5, 11, 16] },
///   "hard_bounds": { "security": { "Low": { "min_secs": 0, "max_secs": 480 } } },
///   "filter": { "min_sample_threshold": 10, "grouping": "zone" },
///   "layout": { "zone_id": 1, "object_id": null }
/// }
/// ```
/// A `hard_bounds` section replaces the whole default table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub zones: ZoneRange,
    pub congestion: CongestionThresholds,
    pub hard_bounds: HardBounds,
    pub filter: FilterParams,
    pub layout: ColumnLayout,
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path` and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        Ok(config)
    }

    /// Checks the filter parameters. A partial hard bounds table is allowed
    /// but logged, since filtering a record in an uncovered pair fails.
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        let missing = self.hard_bounds.missing();
        if self.filter.hard_bounds_enabled && !missing.is_empty() {
            warn!(?missing, "Hard bounds table is incomplete");
        }
        Ok(())
    }

    pub fn classifier(&self) -> CongestionClassifier {
        CongestionClassifier::new(self.zones, self.congestion)
    }
}
