//! Parking lot domain entity

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::space::SpaceType;
use crate::shared::errors::DomainError;

/// Hours of the day (local time) billed at the day rate of a day/night pair.
const DAY_RATE_START_HOUR: u32 = 6;
const DAY_RATE_END_HOUR: u32 = 19;

/// Lot lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotStatus {
    /// Registered, spaces not configured yet
    Draft,
    /// Spaces configured, open for reservations
    Active,
    /// Taken offline by the owner
    Suspended,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Suspended => "Suspended",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Active" => Self::Active,
            "Suspended" => Self::Suspended,
            _ => Self::Draft,
        }
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Paid extras a lot can offer on top of parking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    CarWash,
    EvCharging,
    Surveillance,
    Valet,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::CarWash,
        ServiceKind::EvCharging,
        ServiceKind::Surveillance,
        ServiceKind::Valet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CarWash => "car_wash",
            Self::EvCharging => "ev_charging",
            Self::Surveillance => "surveillance",
            Self::Valet => "valet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opening window on a set of weekdays. `close <= open` wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub days: Vec<Weekday>,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatingHours {
    /// "24/7"
    AlwaysOpen,
    Daily {
        open: NaiveTime,
        close: NaiveTime,
    },
    Custom {
        schedule: Vec<DaySchedule>,
    },
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self::AlwaysOpen
    }
}

fn wraps(open: NaiveTime, close: NaiveTime) -> bool {
    close <= open
}

fn within(open: NaiveTime, close: NaiveTime, t: NaiveTime) -> bool {
    if open == close {
        true
    } else if wraps(open, close) {
        t >= open || t < close
    } else {
        open <= t && t < close
    }
}

impl OperatingHours {
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        let t = at.time();
        match self {
            Self::AlwaysOpen => true,
            Self::Daily { open, close } => within(*open, *close, t),
            Self::Custom { schedule } => {
                let today = at.weekday();
                let yesterday = today.pred();
                schedule.iter().any(|s| {
                    let opened_today = s.days.contains(&today)
                        && if wraps(s.open, s.close) && s.open != s.close {
                            t >= s.open
                        } else {
                            within(s.open, s.close, t)
                        };
                    let spill_from_yesterday = s.open != s.close
                        && wraps(s.open, s.close)
                        && s.days.contains(&yesterday)
                        && t < s.close;
                    opened_today || spill_from_yesterday
                })
            }
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if let Self::Custom { schedule } = self {
            if schedule.is_empty() {
                return Err(DomainError::Validation(
                    "custom operating hours need at least one schedule".into(),
                ));
            }
            if schedule.iter().any(|s| s.days.is_empty()) {
                return Err(DomainError::Validation(
                    "every schedule entry must name at least one day".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Hourly price, in the smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HourlyRate {
    Flat { cents: i64 },
    DayNight { day_cents: i64, night_cents: i64 },
}

impl HourlyRate {
    pub fn flat(cents: i64) -> Self {
        Self::Flat { cents }
    }

    pub fn rate_at(&self, t: NaiveTime) -> i64 {
        match *self {
            Self::Flat { cents } => cents,
            Self::DayNight {
                day_cents,
                night_cents,
            } => {
                let h = t.hour();
                if (DAY_RATE_START_HOUR..DAY_RATE_END_HOUR).contains(&h) {
                    day_cents
                } else {
                    night_cents
                }
            }
        }
    }

    /// Price used for ranking and price filters when no time is given.
    pub fn reference_cents(&self) -> i64 {
        match *self {
            Self::Flat { cents } => cents,
            Self::DayNight { day_cents, .. } => day_cents,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        let negative = match *self {
            Self::Flat { cents } => cents < 0,
            Self::DayNight {
                day_cents,
                night_cents,
            } => day_cents < 0 || night_cents < 0,
        };
        if negative {
            return Err(DomainError::Validation(
                "hourly rate cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Lowercase, trim, collapse whitespace and drop spaces before commas, so
/// "Av. Principal 123 ,  Lima " and "av. principal 123, lima" collide.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" ,", ",")
        .to_lowercase()
}

/// Attributes supplied by the owner at registration
#[derive(Debug, Clone)]
pub struct NewParkingLot {
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub province: String,
    pub district: String,
    pub total_capacity: u32,
    pub operating_hours: OperatingHours,
    pub hourly_rate: HourlyRate,
    pub services: BTreeMap<ServiceKind, i64>,
    pub type_rates: BTreeMap<SpaceType, i64>,
}

/// Partial update; `None` leaves the field as is
#[derive(Debug, Clone, Default)]
pub struct ParkingLotPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub total_capacity: Option<u32>,
    pub operating_hours: Option<OperatingHours>,
    pub hourly_rate: Option<HourlyRate>,
    pub services: Option<BTreeMap<ServiceKind, i64>>,
    pub type_rates: Option<BTreeMap<SpaceType, i64>>,
}

/// Parking lot
#[derive(Debug, Clone, PartialEq)]
pub struct ParkingLot {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Address as typed by the owner
    pub address: String,
    /// Unique key derived with [`normalize_address`]
    pub normalized_address: String,
    pub province: String,
    pub district: String,
    pub total_capacity: u32,
    pub operating_hours: OperatingHours,
    pub hourly_rate: HourlyRate,
    pub services: BTreeMap<ServiceKind, i64>,
    /// Per space type overrides of the hourly rate
    pub type_rates: BTreeMap<SpaceType, i64>,
    pub status: LotStatus,
    /// Optimistic concurrency counter, bumped on every change
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_prices(
    services: &BTreeMap<ServiceKind, i64>,
    type_rates: &BTreeMap<SpaceType, i64>,
) -> Result<(), DomainError> {
    if let Some((kind, _)) = services.iter().find(|(_, price)| **price < 0) {
        return Err(DomainError::Validation(format!(
            "price of service {} cannot be negative",
            kind
        )));
    }
    if let Some((space_type, _)) = type_rates.iter().find(|(_, price)| **price < 0) {
        return Err(DomainError::Validation(format!(
            "rate for {} spaces cannot be negative",
            space_type
        )));
    }
    Ok(())
}

fn validate_capacity(total_capacity: u32) -> Result<(), DomainError> {
    if total_capacity == 0 {
        return Err(DomainError::Validation(
            "total capacity must be greater than 0".into(),
        ));
    }
    Ok(())
}

impl ParkingLot {
    /// Build a new `Draft` lot from validated owner input.
    pub fn register(
        owner_id: impl Into<String>,
        attrs: NewParkingLot,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        require_text("name", &attrs.name)?;
        require_text("address", &attrs.address)?;
        require_text("province", &attrs.province)?;
        require_text("district", &attrs.district)?;
        validate_capacity(attrs.total_capacity)?;
        attrs.operating_hours.validate()?;
        attrs.hourly_rate.validate()?;
        validate_prices(&attrs.services, &attrs.type_rates)?;

        let address = attrs.address.trim().to_string();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: attrs.name.trim().to_string(),
            description: attrs.description,
            normalized_address: normalize_address(&address),
            address,
            province: attrs.province.trim().to_string(),
            district: attrs.district.trim().to_string(),
            total_capacity: attrs.total_capacity,
            operating_hours: attrs.operating_hours,
            hourly_rate: attrs.hourly_rate,
            services: attrs.services,
            type_rates: attrs.type_rates,
            status: LotStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, actor_id: &str) -> bool {
        self.owner_id == actor_id
    }

    /// Only active lots accept reservations and show up in search.
    pub fn is_bookable(&self) -> bool {
        self.status == LotStatus::Active
    }

    /// Apply an owner patch. Capacity is frozen once spaces exist.
    pub fn patched(
        &self,
        patch: ParkingLotPatch,
        has_spaces: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut next = self.clone();

        if let Some(name) = patch.name {
            require_text("name", &name)?;
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = Some(description);
        }
        if let Some(address) = patch.address {
            require_text("address", &address)?;
            next.address = address.trim().to_string();
            next.normalized_address = normalize_address(&next.address);
        }
        if let Some(province) = patch.province {
            require_text("province", &province)?;
            next.province = province.trim().to_string();
        }
        if let Some(district) = patch.district {
            require_text("district", &district)?;
            next.district = district.trim().to_string();
        }
        if let Some(total_capacity) = patch.total_capacity {
            validate_capacity(total_capacity)?;
            if has_spaces && total_capacity != self.total_capacity {
                return Err(DomainError::Validation(
                    "total capacity cannot change once spaces are configured".into(),
                ));
            }
            next.total_capacity = total_capacity;
        }
        if let Some(hours) = patch.operating_hours {
            hours.validate()?;
            next.operating_hours = hours;
        }
        if let Some(rate) = patch.hourly_rate {
            rate.validate()?;
            next.hourly_rate = rate;
        }
        if let Some(services) = patch.services {
            next.services = services;
        }
        if let Some(type_rates) = patch.type_rates {
            next.type_rates = type_rates;
        }
        validate_prices(&next.services, &next.type_rates)?;

        next.touch(now);
        Ok(next)
    }

    pub fn with_status(&self, status: LotStatus, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.touch(now);
        next
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

// ── Tests ──────────────────────────────────────────────────────
