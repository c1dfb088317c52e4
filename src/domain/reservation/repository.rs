//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Reservation, ReservationStatus};
use crate::domain::space::Space;
use crate::domain::DomainResult;

/// One reservation write together with the space revision it implies.
#[derive(Debug, Clone)]
pub struct ReservationTransition {
    pub reservation: Reservation,
    /// Status the stored reservation must still have; `None` inserts.
    pub expected_status: Option<ReservationStatus>,
    /// New revision of the reserved space
    pub space: Space,
    pub expected_space_version: i32,
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Find reservation by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>>;

    /// Pending and Active reservations of a space
    async fn find_open_for_space(&self, space_id: Uuid) -> DomainResult<Vec<Reservation>>;

    /// Pending and Active reservations of a lot
    async fn find_open_for_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Reservation>>;

    /// Reservations of a driver, newest first, optionally only in `status`
    async fn find_by_driver(
        &self,
        driver_id: &str,
        status: Option<ReservationStatus>,
    ) -> DomainResult<Vec<Reservation>>;

    /// Pending reservations whose end time is before `now`
    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    /// Commit a transition atomically: the reservation write and the space
    /// compare-and-set both happen or neither does. A stale status or
    /// space version yields `Busy`.
    async fn apply(&self, transition: ReservationTransition) -> DomainResult<()>;
}
