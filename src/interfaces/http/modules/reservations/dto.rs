//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::domain::reservation::{ReleaseReason, Reservation, ReservationStatus, ReservationWindow};
use crate::domain::DomainError;

/// Request to reserve a space. Without times the reservation is a walk-in
/// starting now; without `end_time` it stays open until released.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    /// Defaults to now
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive end of the window
    pub end_time: Option<DateTime<Utc>>,
}

impl CreateReservationRequest {
    pub fn window(&self, now: DateTime<Utc>) -> Result<ReservationWindow, DomainError> {
        ReservationWindow::new(self.start_time.unwrap_or(now), self.end_time)
    }
}

/// Reservation details in API responses
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDto {
    pub id: Uuid,
    pub space_id: Uuid,
    pub parking_id: Uuid,
    pub driver_id: String,
    pub start_time: DateTime<Utc>,
    /// `null` for walk-ins
    pub end_time: Option<DateTime<Utc>>,
    /// Pending, Active, Completed, Cancelled
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            status: r.status.to_string(),
            id: r.id,
            space_id: r.space_id,
            parking_id: r.lot_id,
            driver_id: r.driver_id,
            start_time: r.start_time,
            end_time: r.end_time,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationAction {
    /// Pending -> Active (the driver arrived)
    Confirm,
    /// Close an open reservation and free the space
    Release,
    /// Withdraw the reservation
    Cancel,
}

/// Lifecycle transition
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReservationActionRequest {
    pub action: ReservationAction,
    /// Only for `release`: checked_out (default), no_show or maintenance
    #[schema(value_type = Option<String>)]
    pub reason: Option<ReleaseReason>,
}

/// Filters for the caller's reservation list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservationListQuery {
    /// Pending | Active | Completed | Cancelled (case-insensitive)
    pub status: Option<String>,
}

impl ReservationListQuery {
    pub fn status(&self) -> Result<Option<ReservationStatus>, DomainError> {
        let raw = match self.status.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };
        [
            ReservationStatus::Pending,
            ReservationStatus::Active,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ]
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(raw))
        .map(Some)
        .ok_or_else(|| DomainError::Validation(format!("unknown reservation status '{}'", raw)))
    }
}
