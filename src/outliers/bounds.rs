//! Hard wait-time bounds per zone group and congestion level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{CongestionLevel, ZoneGroup};

/// An exclusive `(min_secs, max_secs)` range of plausible wait times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_secs: u32,
    pub max_secs: u32,
}

impl Bounds {
    pub const fn minutes(min: u32, max: u32) -> Self {
        Bounds {
            min_secs: min * 60,
            max_secs: max * 60,
        }
    }

    /// True iff `min_secs < secs < max_secs`.
    pub fn admits(&self, secs: u32) -> bool {
        self.min_secs < secs && secs < self.max_secs
    }
}

/// Lookup table of [`Bounds`] by zone group and congestion level.
///
/// Serialized as `{"identity": {"Low": {"min_secs": 0, "max_secs": 480}, ...}}`.
/// A table may be partial; the filter treats a missing pair as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardBounds {
    table: BTreeMap<ZoneGroup, BTreeMap<CongestionLevel, Bounds>>,
}

impl HardBounds {
    pub fn empty() -> Self {
        HardBounds {
            table: BTreeMap::new(),
        }
    }

    pub fn with(mut self, group: ZoneGroup, level: CongestionLevel, bounds: Bounds) -> Self {
        self.table.entry(group).or_default().insert(level, bounds);
        self
    }

    pub fn get(&self, group: ZoneGroup, level: CongestionLevel) -> Option<Bounds> {
        self.table.get(&group)?.get(&level).copied()
    }

    /// `(group, level)` pairs with no entry; filtering any of them fails.
    pub fn missing(&self) -> Vec<(ZoneGroup, CongestionLevel)> {
        ZoneGroup::ALL
            .into_iter()
            .flat_map(|g| CongestionLevel::ALL.into_iter().map(move |l| (g, l)))
            .filter(|&(g, l)| self.get(g, l).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ZoneGroup, CongestionLevel, Bounds)> + '_ {
        self.table
            .iter()
            .flat_map(|(g, levels)| levels.iter().map(move |(l, b)| (*g, *l, *b)))
    }
}

impl Default for HardBounds {
    fn default() -> Self {
        use CongestionLevel::*;
        use ZoneGroup::*;

        HardBounds::empty()
            .with(Identity, Low, Bounds::minutes(0, 8))
            .with(Identity, Medium, Bounds::minutes(4, 15))
            .with(Identity, High, Bounds::minutes(6, 30))
            .with(Identity, VeryHigh, Bounds::minutes(8, 40))
            .with(Security, Low, Bounds::minutes(0, 8))
            .with(Security, Medium, Bounds::minutes(2, 15))
            .with(Security, High, Bounds::minutes(3, 20))
            .with(Security, VeryHigh, Bounds::minutes(4, 30))
    }
}
