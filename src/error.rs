//! Error types for loading, classifying, and filtering queue records.

use std::path::PathBuf;

use crate::record::{CongestionLevel, ZoneGroup};

/// A duration field that is not `MM:SS` or `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("malformed duration {raw:?}: expected MM:SS or HH:MM:SS")]
    Malformed { raw: String },

    #[error("negative component in duration {raw:?}")]
    Negative { raw: String },
}

/// A zone id outside the configured valid range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("zone {zone_id} is outside the valid range {min}..={max}")]
pub struct InvalidZoneError {
    pub zone_id: i64,
    pub min: u32,
    pub max: u32,
}

/// Why a single CSV row could not become a record.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error(transparent)]
    Duration(#[from] DurationError),

    #[error("invalid {field}: {raw:?}")]
    Field { field: &'static str, raw: String },

    #[error("missing column {index} for {field} (row has {len} fields)")]
    MissingColumn {
        field: &'static str,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Zone(#[from] InvalidZoneError),

    #[error("unreadable row: {0}")]
    Csv(#[from] csv::Error),
}

impl RowError {
    /// Short label used to tally dropped rows by reason.
    pub fn kind(&self) -> &'static str {
        match self {
            RowError::Duration(DurationError::Malformed { .. }) => "malformed_duration",
            RowError::Duration(DurationError::Negative { .. }) => "negative_duration",
            RowError::Field { field, .. } => *field,
            RowError::MissingColumn { .. } => "missing_column",
            RowError::Zone(_) => "invalid_zone",
            RowError::Csv(_) => "unreadable_row",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: header has no {column:?} column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path} line {line}: {source}")]
    InvalidZone {
        path: PathBuf,
        line: u64,
        #[source]
        source: InvalidZoneError,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("no hard bounds configured for zone {zone_id} ({zone_group}, {level})")]
    MissingBounds {
        zone_id: u32,
        zone_group: ZoneGroup,
        level: CongestionLevel,
    },

    #[error(
        "invalid adaptive multipliers {lower}..{upper}: both must be finite and non-negative, lower <= upper"
    )]
    InvalidMultipliers { lower: f64, upper: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_kinds() {
        let malformed: RowError = DurationError::Malformed { raw: "1".into() }.into();
        assert_eq!(malformed.kind(), "malformed_duration");

        let field = RowError::Field {
            field: "object_count",
            raw: "abc".into(),
        };
        assert_eq!(field.kind(), "object_count");

        let zone: RowError = InvalidZoneError {
            zone_id: 18,
            min: 1,
            max: 17,
        }
        .into();
        assert_eq!(zone.kind(), "invalid_zone");
    }

    #[test]
    fn test_missing_bounds_message_names_group() {
        let err = FilterError::MissingBounds {
            zone_id: 7,
            zone_group: ZoneGroup::Security,
            level: CongestionLevel::VeryHigh,
        };
        assert_eq!(
            err.to_string(),
            "no hard bounds configured for zone 7 (security, Very High)"
        );
    }
}
