//! Space type vocabulary, default split and price resolution

use std::collections::BTreeMap;

use chrono::NaiveTime;
use uuid::Uuid;

use crate::domain::parking::ParkingLot;
use crate::domain::space::{AllocationPlan, SpaceType};
use crate::domain::DomainError;

/// Percent of capacity suggested for each space type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceTypeRegistry {
    ratios: BTreeMap<SpaceType, u32>,
}

impl Default for SpaceTypeRegistry {
    fn default() -> Self {
        Self {
            ratios: BTreeMap::from([
                (SpaceType::Regular, 70),
                (SpaceType::Compact, 20),
                (SpaceType::Disabled, 10),
                (SpaceType::ElectricCharging, 0),
            ]),
        }
    }
}

impl SpaceTypeRegistry {
    /// Custom split. Missing types get 0 and the percentages must add up
    /// to exactly 100.
    pub fn with_ratios(ratios: BTreeMap<SpaceType, u32>) -> Result<Self, DomainError> {
        let sum: u64 = ratios.values().map(|r| u64::from(*r)).sum();
        if sum != 100 {
            return Err(DomainError::Validation(format!(
                "space type ratios must add up to 100, got {}",
                sum
            )));
        }
        Ok(Self { ratios })
    }

    pub fn ratio(&self, space_type: SpaceType) -> u32 {
        self.ratios.get(&space_type).copied().unwrap_or(0)
    }

    /// Floor of each share, remainder to `Regular`, zero counts omitted.
    pub fn suggest(&self, lot_id: Uuid, capacity: u32) -> AllocationPlan {
        let mut counts = BTreeMap::new();
        let mut assigned = 0;
        for space_type in SpaceType::ALL {
            let count = (u64::from(capacity) * u64::from(self.ratio(space_type)) / 100) as u32;
            assigned += count;
            counts.insert(space_type, count);
        }
        *counts.entry(SpaceType::Regular).or_insert(0) += capacity.saturating_sub(assigned);
        counts.retain(|_, count| *count > 0);
        AllocationPlan::new(lot_id, counts)
    }

    /// Hourly price for a lot: the per-type override if any, else the
    /// lot rate at `at`, else the reference rate.
    pub fn hourly_rate_cents(
        &self,
        lot: &ParkingLot,
        space_type: Option<SpaceType>,
        at: Option<NaiveTime>,
    ) -> i64 {
        if let Some(cents) = space_type.and_then(|t| lot.type_rates.get(&t)) {
            return *cents;
        }
        match at {
            Some(at) => lot.hourly_rate.rate_at(at),
            None => lot.hourly_rate.reference_cents(),
        }
    }
}
