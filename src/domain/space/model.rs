//! Space domain entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::parking::ParkingLot;

/// Space category. Declaration order is the layout order used when a lot
/// is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Regular,
    Compact,
    Disabled,
    ElectricCharging,
}

impl SpaceType {
    pub const ALL: [SpaceType; 4] = [
        SpaceType::Regular,
        SpaceType::Compact,
        SpaceType::Disabled,
        SpaceType::ElectricCharging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Compact => "compact",
            Self::Disabled => "disabled",
            Self::ElectricCharging => "electric_charging",
        }
    }

    /// Accepts `electric_charging`, `electric-charging` and `ElectricCharging`.
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().replace('_', "") == folded)
    }

    /// Label prefix, e.g. `R` in `R-001`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Regular => "R",
            Self::Compact => "C",
            Self::Disabled => "D",
            Self::ElectricCharging => "E",
        }
    }
}

impl std::fmt::Display for SpaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Occupancy state of a single space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceState {
    Available,
    /// Held by a pending reservation
    Reserved,
    /// A vehicle is parked
    Occupied,
    /// Blocked for maintenance
    OutOfService,
}

impl SpaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Reserved => "Reserved",
            Self::Occupied => "Occupied",
            Self::OutOfService => "OutOfService",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Available" => Self::Available,
            "Reserved" => Self::Reserved,
            "Occupied" => Self::Occupied,
            _ => Self::OutOfService,
        }
    }
}

impl std::fmt::Display for SpaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub space_type: SpaceType,
    /// 1-based position inside the lot
    pub index: u32,
    pub state: SpaceState,
    /// Compare-and-set counter, bumped on every state write
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl Space {
    pub fn new(lot_id: Uuid, space_type: SpaceType, index: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lot_id,
            space_type,
            index,
            state: SpaceState::Available,
            version: 1,
            updated_at: now,
        }
    }

    pub fn label(&self) -> String {
        format!("{}-{:03}", self.space_type.prefix(), self.index)
    }

    pub fn is_available(&self) -> bool {
        self.state == SpaceState::Available
    }

    /// Next revision of this space in `state`.
    pub fn with_state(&self, state: SpaceState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Requested per-type counts for one lot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub lot_id: Uuid,
    pub counts: BTreeMap<SpaceType, u32>,
}

impl AllocationPlan {
    pub fn new(lot_id: Uuid, counts: BTreeMap<SpaceType, u32>) -> Self {
        Self { lot_id, counts }
    }

    /// Sum of all counts, `None` when it does not fit in `u32`.
    pub fn total(&self) -> Option<u32> {
        self.counts
            .values()
            .try_fold(0u32, |sum, count| sum.checked_add(*count))
    }

    pub fn count(&self, space_type: SpaceType) -> u32 {
        self.counts.get(&space_type).copied().unwrap_or(0)
    }

    /// Lay the plan out in `SpaceType::ALL` order with indices 1..=total.
    pub fn build_spaces(&self, now: DateTime<Utc>) -> Vec<Space> {
        let mut spaces = Vec::with_capacity(self.total().unwrap_or(0) as usize);
        let mut index = 0;
        for space_type in SpaceType::ALL {
            for _ in 0..self.count(space_type) {
                index += 1;
                spaces.push(Space::new(self.lot_id, space_type, index, now));
            }
        }
        spaces
    }
}

/// Outcome of configuring a lot
#[derive(Debug, Clone)]
pub struct SpaceSet {
    pub lot: ParkingLot,
    /// Ordered by index
    pub spaces: Vec<Space>,
}

/// Space counts of one lot, per state and per type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub occupied: u32,
    pub out_of_service: u32,
    pub available_by_type: BTreeMap<SpaceType, u32>,
}

impl Occupancy {
    pub fn from_spaces(spaces: &[Space]) -> Self {
        let mut occupancy = Self::default();
        for space in spaces {
            occupancy.total += 1;
            match space.state {
                SpaceState::Available => {
                    occupancy.available += 1;
                    *occupancy
                        .available_by_type
                        .entry(space.space_type)
                        .or_insert(0) += 1;
                }
                SpaceState::Reserved => occupancy.reserved += 1,
                SpaceState::Occupied => occupancy.occupied += 1,
                SpaceState::OutOfService => occupancy.out_of_service += 1,
            }
        }
        occupancy
    }
}
