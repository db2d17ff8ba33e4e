//! Canonical queue record and the enums derived from it.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::congestion::CongestionClassifier;
use crate::error::InvalidZoneError;

/// Coarse zone classification used for congestion thresholds and hard bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneGroup {
    Identity,
    Security,
}

impl ZoneGroup {
    pub const ALL: [ZoneGroup; 2] = [ZoneGroup::Identity, ZoneGroup::Security];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneGroup::Identity => "identity",
            ZoneGroup::Security => "security",
        }
    }
}

impl fmt::Display for ZoneGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl CongestionLevel {
    pub const ALL: [CongestionLevel; 4] = [
        CongestionLevel::Low,
        CongestionLevel::Medium,
        CongestionLevel::High,
        CongestionLevel::VeryHigh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CongestionLevel::Low => "Low",
            CongestionLevel::Medium => "Medium",
            CongestionLevel::High => "High",
            CongestionLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw observation fields as read from a CSV row, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub object_id: Option<u64>,
    pub zone_id: u32,
    pub object_count: u32,
    pub in_time: Option<NaiveTime>,
    pub out_time: Option<NaiveTime>,
    pub lidar_est_time: f64,
    pub throughput_est_time: f64,
    pub final_est_time: f64,
    /// Ground truth wait in seconds.
    pub actual_pass_time: u32,
    /// Date taken from the source file name.
    pub date: Option<NaiveDate>,
}

/// A classified observation.
///
/// Only [`Record::classify`] builds one, so `zone_group` and
/// `congestion_level` always agree with `zone_id` and `object_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    obs: Observation,
    zone_group: ZoneGroup,
    congestion_level: CongestionLevel,
}

impl Record {
    pub fn classify(
        obs: Observation,
        classifier: &CongestionClassifier,
    ) -> Result<Self, InvalidZoneError> {
        let zone_group = classifier.zone_group(obs.zone_id)?;
        let congestion_level = classifier.level_for(zone_group, obs.object_count);
        Ok(Record {
            obs,
            zone_group,
            congestion_level,
        })
    }

    pub fn observation(&self) -> &Observation {
        &self.obs
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.obs.timestamp
    }

    pub fn zone_id(&self) -> u32 {
        self.obs.zone_id
    }

    pub fn object_count(&self) -> u32 {
        self.obs.object_count
    }

    pub fn actual_pass_time(&self) -> u32 {
        self.obs.actual_pass_time
    }

    /// The file date if known, otherwise the timestamp's date.
    pub fn date(&self) -> NaiveDate {
        self.obs.date.unwrap_or_else(|| self.obs.timestamp.date())
    }

    pub fn zone_group(&self) -> ZoneGroup {
        self.zone_group
    }

    pub fn congestion_level(&self) -> CongestionLevel {
        self.congestion_level
    }
}
