//! Space DTOs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domain::space::{AllocationPlan, Occupancy, Space};
use crate::domain::{DomainError, SpaceType};

use super::super::parkings::ParkingLotDto;

/// Space details in API responses
#[derive(Debug, Serialize, ToSchema)]
pub struct SpaceDto {
    pub id: Uuid,
    pub parking_id: Uuid,
    /// e.g. `R-001`
    pub label: String,
    /// regular | compact | disabled | electric_charging
    pub space_type: String,
    pub index: u32,
    /// Available, Reserved, Occupied, OutOfService
    pub state: String,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<Space> for SpaceDto {
    fn from(space: Space) -> Self {
        Self {
            label: space.label(),
            id: space.id,
            parking_id: space.lot_id,
            space_type: space.space_type.as_str().to_string(),
            index: space.index,
            state: space.state.to_string(),
            version: space.version,
            updated_at: space.updated_at,
        }
    }
}

/// Number of spaces per type
#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationDto {
    pub parking_id: Uuid,
    /// e.g. `{"regular": 7, "compact": 2, "disabled": 1}`
    pub counts: BTreeMap<String, u32>,
    pub total: u64,
}

impl From<AllocationPlan> for AllocationDto {
    fn from(plan: AllocationPlan) -> Self {
        Self {
            parking_id: plan.lot_id,
            total: plan.counts.values().map(|n| u64::from(*n)).sum(),
            counts: plan
                .counts
                .iter()
                .map(|(t, n)| (t.as_str().to_string(), *n))
                .collect(),
        }
    }
}

/// Layout to apply; the counts must add up to the lot capacity
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfigureSpacesRequest {
    /// Space type -> count, e.g. `{"regular": 7, "compact": 2, "disabled": 1}`
    pub counts: BTreeMap<String, u32>,
}

impl ConfigureSpacesRequest {
    pub fn into_plan(self, parking_id: Uuid) -> Result<AllocationPlan, DomainError> {
        let mut counts = BTreeMap::new();
        for (raw, count) in self.counts {
            let space_type = SpaceType::parse(&raw)
                .ok_or_else(|| DomainError::Validation(format!("unknown space type '{}'", raw)))?;
            let slot = counts.entry(space_type).or_insert(0u32);
            *slot = slot.checked_add(count).ok_or_else(|| {
                DomainError::Validation(format!("too many '{}' spaces", space_type))
            })?;
        }
        counts.retain(|_, n| *n > 0);
        Ok(AllocationPlan::new(parking_id, counts))
    }
}

/// Result of a space configuration
#[derive(Debug, Serialize, ToSchema)]
pub struct SpaceConfigurationDto {
    pub parking: ParkingLotDto,
    pub spaces: Vec<SpaceDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OccupancyDto {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub occupied: u32,
    pub out_of_service: u32,
    pub available_by_type: BTreeMap<String, u32>,
}

impl From<Occupancy> for OccupancyDto {
    fn from(o: Occupancy) -> Self {
        Self {
            total: o.total,
            available: o.available,
            reserved: o.reserved,
            occupied: o.occupied,
            out_of_service: o.out_of_service,
            available_by_type: o
                .available_by_type
                .iter()
                .map(|(t, n)| (t.as_str().to_string(), *n))
                .collect(),
        }
    }
}

/// Spaces of a lot with a summary
#[derive(Debug, Serialize, ToSchema)]
pub struct SpaceListDto {
    pub occupancy: OccupancyDto,
    pub spaces: Vec<SpaceDto>,
}

/// Maintenance toggle
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MaintenanceRequest {
    /// `true` takes an Available space out of service, `false` returns it
    pub out_of_service: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_request_merges_aliases_and_drops_zeroes() {
        let id = Uuid::new_v4();
        let request = ConfigureSpacesRequest {
            counts: BTreeMap::from([
                ("regular".to_string(), 5),
                ("Regular".to_string(), 2),
                ("electric-charging".to_string(), 0),
                ("compact".to_string(), 3),
            ]),
        };
        let plan = request.into_plan(id).unwrap();
        assert_eq!(plan.count(SpaceType::Regular), 7);
        assert_eq!(plan.count(SpaceType::Compact), 3);
        assert!(!plan.counts.contains_key(&SpaceType::ElectricCharging));
        assert_eq!(plan.total(), Some(10));
    }

    #[test]
    fn merged_alias_counts_must_not_overflow() {
        let request = ConfigureSpacesRequest {
            counts: BTreeMap::from([
                ("regular".to_string(), u32::MAX),
                ("Regular".to_string(), 2),
            ]),
        };
        assert!(matches!(
            request.into_plan(Uuid::nil()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        let request = ConfigureSpacesRequest {
            counts: BTreeMap::from([("truck".to_string(), 1)]),
        };
        assert!(matches!(
            request.into_plan(Uuid::nil()),
            Err(DomainError::Validation(_))
        ));
    }
}
