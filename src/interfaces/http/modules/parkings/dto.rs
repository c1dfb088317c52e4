//! Parking lot DTOs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::application::{SearchCriteria, SearchHit};
use crate::domain::parking::{
    HourlyRate, NewParkingLot, OperatingHours, ParkingLot, ParkingLotPatch, ServiceKind,
};
use crate::domain::{DomainError, SpaceType};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_SEARCH_LIMIT: usize = 200;

/// Request to register a parking lot
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterParkingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    /// Street address; unique across lots once normalized
    #[validate(length(min = 3, max = 250))]
    pub address: String,
    #[validate(length(min = 1, max = 80))]
    pub province: String,
    #[validate(length(min = 1, max = 80))]
    pub district: String,
    #[validate(range(min = 1))]
    pub total_capacity: u32,
    /// `{"kind": "always_open"}`, `{"kind": "daily", "open": "07:00:00", "close": "22:00:00"}`
    /// or `{"kind": "custom", "schedule": [...]}`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub operating_hours: OperatingHours,
    /// `{"kind": "flat", "cents": 500}` or `{"kind": "day_night", "day_cents": 600, "night_cents": 400}`
    #[schema(value_type = Object)]
    pub hourly_rate: HourlyRate,
    /// Extra services with their price in cents, e.g. `{"car_wash": 1500}`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub services: BTreeMap<ServiceKind, i64>,
    /// Hourly price per space type overriding the base rate
    #[serde(default)]
    #[schema(value_type = Object)]
    pub type_rates: BTreeMap<SpaceType, i64>,
}

impl From<RegisterParkingRequest> for NewParkingLot {
    fn from(r: RegisterParkingRequest) -> Self {
        NewParkingLot {
            name: r.name,
            description: r.description,
            address: r.address,
            province: r.province,
            district: r.district,
            total_capacity: r.total_capacity,
            operating_hours: r.operating_hours,
            hourly_rate: r.hourly_rate,
            services: r.services,
            type_rates: r.type_rates,
        }
    }
}

/// Partial update; absent fields stay unchanged
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateParkingRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 3, max = 250))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub province: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub district: Option<String>,
    /// Only while the lot has no spaces
    #[validate(range(min = 1))]
    pub total_capacity: Option<u32>,
    #[schema(value_type = Option<Object>)]
    pub operating_hours: Option<OperatingHours>,
    #[schema(value_type = Option<Object>)]
    pub hourly_rate: Option<HourlyRate>,
    #[schema(value_type = Option<Object>)]
    pub services: Option<BTreeMap<ServiceKind, i64>>,
    #[schema(value_type = Option<Object>)]
    pub type_rates: Option<BTreeMap<SpaceType, i64>>,
}

impl From<UpdateParkingRequest> for ParkingLotPatch {
    fn from(r: UpdateParkingRequest) -> Self {
        ParkingLotPatch {
            name: r.name,
            description: r.description,
            address: r.address,
            province: r.province,
            district: r.district,
            total_capacity: r.total_capacity,
            operating_hours: r.operating_hours,
            hourly_rate: r.hourly_rate,
            services: r.services,
            type_rates: r.type_rates,
        }
    }
}

/// Parking lot details in API responses
#[derive(Debug, Serialize, ToSchema)]
pub struct ParkingLotDto {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub province: String,
    pub district: String,
    pub total_capacity: u32,
    #[schema(value_type = Object)]
    pub operating_hours: OperatingHours,
    #[schema(value_type = Object)]
    pub hourly_rate: HourlyRate,
    /// Flat rate, or the day rate of a day/night pair
    pub reference_rate_cents: i64,
    #[schema(value_type = Object)]
    pub services: BTreeMap<ServiceKind, i64>,
    #[schema(value_type = Object)]
    pub type_rates: BTreeMap<SpaceType, i64>,
    /// Draft, Active or Suspended
    pub status: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ParkingLot> for ParkingLotDto {
    fn from(lot: ParkingLot) -> Self {
        Self {
            reference_rate_cents: lot.hourly_rate.reference_cents(),
            status: lot.status.to_string(),
            id: lot.id,
            owner_id: lot.owner_id,
            name: lot.name,
            description: lot.description,
            address: lot.address,
            province: lot.province,
            district: lot.district,
            total_capacity: lot.total_capacity,
            operating_hours: lot.operating_hours,
            hourly_rate: lot.hourly_rate,
            services: lot.services,
            type_rates: lot.type_rates,
            version: lot.version,
            created_at: lot.created_at,
            updated_at: lot.updated_at,
        }
    }
}

/// Availability search filters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive exact match
    pub province: Option<String>,
    /// Case-insensitive exact match
    pub district: Option<String>,
    pub max_price_cents: Option<i64>,
    /// Comma separated service kinds, e.g. `car_wash,valet`
    pub services: Option<String>,
    /// regular | compact | disabled | electric_charging
    pub space_type: Option<String>,
    /// Local date-time the lot must be open at, e.g. `2024-03-04T23:30:00`
    #[param(value_type = Option<String>)]
    pub open_at: Option<NaiveDateTime>,
    /// Skip lots without an available space
    pub available_only: Option<bool>,
    /// Maximum number of results (default 50, at most 200)
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Search criteria plus the result limit
    pub fn into_criteria(self) -> Result<(SearchCriteria, usize), DomainError> {
        let space_type = match self.space_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(SpaceType::parse(raw).ok_or_else(|| {
                DomainError::Validation(format!("unknown space type '{}'", raw))
            })?),
        };

        let mut required_services = BTreeSet::new();
        for raw in self
            .services
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let service = ServiceKind::parse(raw)
                .ok_or_else(|| DomainError::Validation(format!("unknown service '{}'", raw)))?;
            required_services.insert(service);
        }

        let limit = self
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        Ok((
            SearchCriteria {
                province: self.province.filter(|p| !p.trim().is_empty()),
                district: self.district.filter(|d| !d.trim().is_empty()),
                max_price_cents: self.max_price_cents,
                required_services,
                space_type,
                open_at: self.open_at,
                available_only: self.available_only.unwrap_or(false),
            },
            limit,
        ))
    }
}

/// One search result
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHitDto {
    pub parking: ParkingLotDto,
    /// Hourly price for the requested space type and time
    pub price_cents: i64,
    /// Available spaces of the requested type, or of any type
    pub available_spaces: u32,
}

impl From<SearchHit> for SearchHitDto {
    fn from(hit: SearchHit) -> Self {
        Self {
            parking: hit.lot.into(),
            price_cents: hit.price_cents,
            available_spaces: hit.available_spaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_parses_lists_and_clamps_limit() {
        let query = SearchQuery {
            services: Some("car_wash, valet,".into()),
            space_type: Some("Compact".into()),
            limit: Some(10_000),
            ..Default::default()
        };
        let (criteria, limit) = query.into_criteria().unwrap();
        assert_eq!(
            criteria.required_services,
            BTreeSet::from([ServiceKind::CarWash, ServiceKind::Valet])
        );
        assert_eq!(criteria.space_type, Some(SpaceType::Compact));
        assert_eq!(limit, MAX_SEARCH_LIMIT);
        assert!(!criteria.available_only);
    }

    #[test]
    fn unknown_filters_are_rejected() {
        let query = SearchQuery {
            space_type: Some("truck".into()),
            ..Default::default()
        };
        assert!(matches!(
            query.into_criteria(),
            Err(DomainError::Validation(_))
        ));

        let query = SearchQuery {
            services: Some("helipad".into()),
            ..Default::default()
        };
        assert!(query.into_criteria().is_err());
    }
}
