//! Zone grouping and congestion level classification.

use serde::{Deserialize, Serialize};

use crate::error::InvalidZoneError;
use crate::record::{CongestionLevel, ZoneGroup};

/// Valid zone ids and where the identity zones end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRange {
    pub min: u32,
    pub max: u32,
    /// Zones `min..=identity_max` are identity checkpoints, the rest security.
    pub identity_max: u32,
}

impl Default for ZoneRange {
    fn default() -> Self {
        ZoneRange {
            min: 1,
            max: 17,
            identity_max: 4,
        }
    }
}

/// Inclusive upper object counts for Low, Medium and High; anything above is Very High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionThresholds {
    pub identity: [u32; 3],
    pub security: [u32; 3],
}

impl Default for CongestionThresholds {
    fn default() -> Self {
        CongestionThresholds {
            identity: [40, 80, 140],
            security: [5, 11, 16],
        }
    }
}

impl CongestionThresholds {
    pub fn for_group(&self, group: ZoneGroup) -> [u32; 3] {
        match group {
            ZoneGroup::Identity => self.identity,
            ZoneGroup::Security => self.security,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CongestionClassifier {
    zones: ZoneRange,
    thresholds: CongestionThresholds,
}

impl CongestionClassifier {
    pub fn new(zones: ZoneRange, thresholds: CongestionThresholds) -> Self {
        CongestionClassifier { zones, thresholds }
    }

    /// Checks a raw zone id read from input against the valid range.
    pub fn validate_zone(&self, zone_id: i64) -> Result<u32, InvalidZoneError> {
        match u32::try_from(zone_id) {
            Ok(z) if (self.zones.min..=self.zones.max).contains(&z) => Ok(z),
            _ => Err(self.invalid(zone_id)),
        }
    }

    pub fn zone_group(&self, zone_id: u32) -> Result<ZoneGroup, InvalidZoneError> {
        let z = self.validate_zone(i64::from(zone_id))?;
        if z <= self.zones.identity_max {
            Ok(ZoneGroup::Identity)
        } else {
            Ok(ZoneGroup::Security)
        }
    }

    pub fn classify(
        &self,
        zone_id: u32,
        object_count: u32,
    ) -> Result<CongestionLevel, InvalidZoneError> {
        let group = self.zone_group(zone_id)?;
        Ok(self.level_for(group, object_count))
    }

    /// Level for a zone group that is already known to be valid.
    pub fn level_for(&self, group: ZoneGroup, object_count: u32) -> CongestionLevel {
        let [low, medium, high] = self.thresholds.for_group(group);
        match object_count {
            c if c <= low => CongestionLevel::Low,
            c if c <= medium => CongestionLevel::Medium,
            c if c <= high => CongestionLevel::High,
            _ => CongestionLevel::VeryHigh,
        }
    }

    /// Human-readable object count range for a level, e.g. `"41-80"` or `"141+"`.
    pub fn object_count_range(&self, level: CongestionLevel, group: ZoneGroup) -> String {
        let [low, medium, high] = self.thresholds.for_group(group);
        match level {
            CongestionLevel::Low => format!("0-{low}"),
            CongestionLevel::Medium => format!("{}-{medium}", low + 1),
            CongestionLevel::High => format!("{}-{high}", medium + 1),
            CongestionLevel::VeryHigh => format!("{}+", high + 1),
        }
    }

    fn invalid(&self, zone_id: i64) -> InvalidZoneError {
        InvalidZoneError {
            zone_id,
            min: self.zones.min,
            max: self.zones.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let c = CongestionClassifier::default();
        assert_eq!(c.classify(1, 40), Ok(CongestionLevel::Low));
        assert_eq!(c.classify(1, 41), Ok(CongestionLevel::Medium));
        assert_eq!(c.classify(4, 80), Ok(CongestionLevel::Medium));
        assert_eq!(c.classify(4, 140), Ok(CongestionLevel::High));
        assert_eq!(c.classify(4, 141), Ok(CongestionLevel::VeryHigh));
        assert_eq!(c.classify(5, 5), Ok(CongestionLevel::Low));
        assert_eq!(c.classify(5, 6), Ok(CongestionLevel::Medium));
        assert_eq!(c.classify(17, 11), Ok(CongestionLevel::Medium));
        assert_eq!(c.classify(17, 16), Ok(CongestionLevel::High));
        assert_eq!(c.classify(17, 17), Ok(CongestionLevel::VeryHigh));
    }

    #[test]
    fn test_zone_four_is_identity() {
        let c = CongestionClassifier::default();
        assert_eq!(c.zone_group(4), Ok(ZoneGroup::Identity));
        assert_eq!(c.zone_group(5), Ok(ZoneGroup::Security));
    }

    #[test]
    fn test_out_of_range_zone_is_rejected() {
        let c = CongestionClassifier::default();
        assert_eq!(
            c.classify(0, 3),
            Err(InvalidZoneError {
                zone_id: 0,
                min: 1,
                max: 17
            })
        );
        assert!(c.classify(18, 3).is_err());
        assert!(c.validate_zone(-2).is_err());
        assert_eq!(c.validate_zone(17), Ok(17));
    }

    #[test]
    fn test_custom_thresholds() {
        let c = CongestionClassifier::new(
            ZoneRange {
                min: 1,
                max: 3,
                identity_max: 1,
            },
            CongestionThresholds {
                identity: [1, 2, 3],
                security: [10, 20, 30],
            },
        );
        assert_eq!(c.classify(1, 3), Ok(CongestionLevel::High));
        assert_eq!(c.classify(2, 3), Ok(CongestionLevel::Low));
        assert!(c.classify(4, 0).is_err());
    }

    #[test]
    fn test_object_count_ranges() {
        let c = CongestionClassifier::default();
        assert_eq!(
            c.object_count_range(CongestionLevel::Medium, ZoneGroup::Identity),
            "41-80"
        );
        assert_eq!(
            c.object_count_range(CongestionLevel::VeryHigh, ZoneGroup::Security),
            "17+"
        );
        assert_eq!(
            c.object_count_range(CongestionLevel::Low, ZoneGroup::Security),
            "0-5"
        );
    }
}
