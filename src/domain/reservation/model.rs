//! Reservation domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::space::{Space, SpaceState};
use crate::shared::errors::DomainError;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Granted, the driver has not arrived yet
    Pending,
    /// The driver checked in
    Active,
    /// The driver checked out
    Completed,
    /// Cancelled by a participant or released by the system
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Active" => Self::Active,
            "Completed" => Self::Completed,
            _ => Self::Cancelled,
        }
    }

    /// Pending or Active
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a reservation is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Driver left, the stay is over
    CheckedOut,
    /// Driver never showed up
    NoShow,
    /// Space withdrawn by the operator
    Maintenance,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckedOut => "checked_out",
            Self::NoShow => "no_show",
            Self::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-open time window `[start, end)`. No end means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl ReservationWindow {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, DomainError> {
        if let Some(end) = end {
            if end <= start {
                return Err(DomainError::Validation(
                    "reservation end time must be after its start time".into(),
                ));
            }
        }
        Ok(Self { start, end })
    }

    /// Starts now, no end
    pub fn walk_in(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: None,
        }
    }

    pub fn overlaps(&self, other: &ReservationWindow) -> bool {
        let starts_before_other_ends = other.end.map_or(true, |end| self.start < end);
        let other_starts_before_end = self.end.map_or(true, |end| other.start < end);
        starts_before_other_ends && other_starts_before_end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub space_id: Uuid,
    pub lot_id: Uuid,
    pub driver_id: String,
    pub start_time: DateTime<Utc>,
    /// `None` for a walk-in
    pub end_time: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn pending(
        space: &Space,
        driver_id: impl Into<String>,
        window: ReservationWindow,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            space_id: space.id,
            lot_id: space.lot_id,
            driver_id: driver_id.into(),
            start_time: window.start,
            end_time: window.end,
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> ReservationWindow {
        ReservationWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Pending -> Active
    pub fn confirmed(&self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.status {
            ReservationStatus::Pending => Ok(self.with_status(ReservationStatus::Active, now)),
            other => Err(self.invalid(other, "confirm")),
        }
    }

    /// CheckedOut: Active -> Completed. NoShow / Maintenance: open -> Cancelled.
    pub fn released(&self, reason: ReleaseReason, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match (self.status, reason) {
            (ReservationStatus::Active, ReleaseReason::CheckedOut) => {
                Ok(self.with_status(ReservationStatus::Completed, now))
            }
            (
                ReservationStatus::Pending | ReservationStatus::Active,
                ReleaseReason::NoShow | ReleaseReason::Maintenance,
            ) => Ok(self.with_status(ReservationStatus::Cancelled, now)),
            (other, _) => Err(self.invalid(other, "release")),
        }
    }

    /// Open -> Cancelled
    pub fn cancelled(&self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.is_open() {
            Ok(self.with_status(ReservationStatus::Cancelled, now))
        } else {
            Err(self.invalid(self.status, "cancel"))
        }
    }

    fn with_status(&self, status: ReservationStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: now,
            ..self.clone()
        }
    }

    fn invalid(&self, from: ReservationStatus, action: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            entity: "Reservation",
            from: from.to_string(),
            action,
        }
    }
}

/// State a space must show given its open reservations.
pub fn occupancy_state<'a>(open: impl IntoIterator<Item = &'a Reservation>) -> SpaceState {
    let mut state = SpaceState::Available;
    for reservation in open {
        match reservation.status {
            ReservationStatus::Active => return SpaceState::Occupied,
            ReservationStatus::Pending => state = SpaceState::Reserved,
            _ => {}
        }
    }
    state
}
