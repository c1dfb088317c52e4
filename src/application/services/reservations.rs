//! Reservation lifecycle with per-space exclusive sections
//!
//! Every state change of a reservation runs while holding the lock of its
//! space, re-reads the current records, derives the new space state from
//! the space's open reservations and commits both through a single
//! `ReservationRepository::apply` call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::reservation::{
    occupancy_state, ReleaseReason, Reservation, ReservationStatus, ReservationTransition,
    ReservationWindow,
};
use crate::domain::space::{Space, SpaceState};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::utils::{with_storage_retry, KeyedLocks, RetryConfig};

pub struct ReservationManager {
    repos: Arc<dyn RepositoryProvider>,
    space_locks: Arc<KeyedLocks>,
    retry: RetryConfig,
}

impl ReservationManager {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        space_locks: Arc<KeyedLocks>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            space_locks,
            retry,
        }
    }

    /// Grant a `Pending` reservation on a space for `window`.
    pub async fn reserve(
        &self,
        space_id: Uuid,
        driver_id: &str,
        window: ReservationWindow,
    ) -> DomainResult<Reservation> {
        let result = self.reserve_locked(space_id, driver_id, window).await;
        self.space_locks.forget(&space_id);

        let outcome = match &result {
            Ok(_) => "granted",
            Err(DomainError::SpaceNotAvailable(_)) => "unavailable",
            Err(DomainError::Busy(_)) => "busy",
            Err(_) => "rejected",
        };
        metrics::counter!("parking_reservations_total", "outcome" => outcome).increment(1);
        result
    }

    async fn reserve_locked(
        &self,
        space_id: Uuid,
        driver_id: &str,
        window: ReservationWindow,
    ) -> DomainResult<Reservation> {
        let window = ReservationWindow::new(window.start, window.end)?;

        let _guard = self.space_locks.acquire(space_id).await?;
        let space = self.load_space(space_id).await?;
        if space.state == SpaceState::OutOfService {
            return Err(DomainError::SpaceNotAvailable(space_id));
        }

        let lot = with_storage_retry(&self.retry, "load parking lot", || {
            self.repos.parking_lots().find_by_id(space.lot_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("ParkingLot", space.lot_id))?;
        if !lot.is_bookable() {
            return Err(DomainError::SpaceNotAvailable(space_id));
        }

        let open = self.open_for_space(space_id).await?;
        if let Some(conflict) = open.iter().find(|r| r.window().overlaps(&window)) {
            debug!(space_id = %space_id, conflicting = %conflict.id, "Reservation window overlaps");
            return Err(DomainError::SpaceNotAvailable(space_id));
        }

        let now = Utc::now();
        let reservation = Reservation::pending(&space, driver_id, window, now);
        let state = occupancy_state(open.iter().chain(std::iter::once(&reservation)));
        self.commit(reservation.clone(), None, &space, state, now)
            .await?;

        info!(
            reservation_id = %reservation.id,
            space_id = %space_id,
            lot_id = %reservation.lot_id,
            driver_id = %driver_id,
            walk_in = reservation.end_time.is_none(),
            "Reservation granted"
        );
        Ok(reservation)
    }

    /// `Pending -> Active`; the space becomes `Occupied`.
    pub async fn confirm(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        let space_id = self.get(reservation_id).await?.space_id;
        let result = self.confirm_locked(reservation_id, space_id).await;
        self.space_locks.forget(&space_id);
        result
    }

    async fn confirm_locked(&self, reservation_id: Uuid, space_id: Uuid) -> DomainResult<Reservation> {
        let _guard = self.space_locks.acquire(space_id).await?;
        let current = self.get(reservation_id).await?;
        let next = current.confirmed(Utc::now())?;

        let others = self.other_open(&current).await?;
        if others.iter().any(|r| r.status == ReservationStatus::Active) {
            return Err(DomainError::SpaceNotAvailable(space_id));
        }

        let space = self.load_space(space_id).await?;
        let state = occupancy_state(others.iter().chain(std::iter::once(&next)));
        self.commit(next.clone(), Some(current.status), &space, state, next.updated_at)
            .await?;

        info!(reservation_id = %reservation_id, space_id = %space_id, "Reservation confirmed");
        Ok(next)
    }

    /// Close a reservation for `reason` and free its hold on the space.
    pub async fn release(&self, reservation_id: Uuid, reason: ReleaseReason) -> DomainResult<Reservation> {
        let space_id = self.get(reservation_id).await?.space_id;
        let result = self.release_locked(reservation_id, space_id, reason).await;
        self.space_locks.forget(&space_id);
        result
    }

    async fn release_locked(
        &self,
        reservation_id: Uuid,
        space_id: Uuid,
        reason: ReleaseReason,
    ) -> DomainResult<Reservation> {
        let _guard = self.space_locks.acquire(space_id).await?;
        let current = self.get(reservation_id).await?;
        let next = current.released(reason, Utc::now())?;
        self.close(&current, next.clone()).await?;

        info!(
            reservation_id = %reservation_id,
            space_id = %space_id,
            reason = %reason,
            status = %next.status,
            "Reservation released"
        );
        Ok(next)
    }

    /// Cancel on behalf of the driver or the lot owner. Cancelling twice is
    /// a no-op.
    pub async fn cancel(&self, reservation_id: Uuid, actor_id: &str) -> DomainResult<Reservation> {
        let reservation = self.ensure_participant(reservation_id, actor_id).await?;
        if reservation.status == ReservationStatus::Cancelled {
            return Ok(reservation);
        }

        let space_id = reservation.space_id;
        let result = self.cancel_locked(reservation_id, space_id).await;
        self.space_locks.forget(&space_id);
        result
    }

    async fn cancel_locked(&self, reservation_id: Uuid, space_id: Uuid) -> DomainResult<Reservation> {
        let _guard = self.space_locks.acquire(space_id).await?;
        let current = self.get(reservation_id).await?;
        if current.status == ReservationStatus::Cancelled {
            return Ok(current);
        }
        let next = current.cancelled(Utc::now())?;
        self.close(&current, next.clone()).await?;

        info!(reservation_id = %reservation_id, space_id = %space_id, "Reservation cancelled");
        Ok(next)
    }

    /// Load a reservation and check `actor_id` is its driver or the owner
    /// of its lot.
    pub async fn ensure_participant(&self, reservation_id: Uuid, actor_id: &str) -> DomainResult<Reservation> {
        let reservation = self.get(reservation_id).await?;
        if reservation.driver_id == actor_id {
            return Ok(reservation);
        }

        let lot = with_storage_retry(&self.retry, "load parking lot", || {
            self.repos.parking_lots().find_by_id(reservation.lot_id)
        })
        .await?;
        match lot {
            Some(lot) if lot.is_owned_by(actor_id) => Ok(reservation),
            _ => Err(DomainError::Forbidden(format!(
                "reservation {} belongs to another driver",
                reservation_id
            ))),
        }
    }

    pub async fn get(&self, reservation_id: Uuid) -> DomainResult<Reservation> {
        with_storage_retry(&self.retry, "load reservation", || {
            self.repos.reservations().find_by_id(reservation_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("Reservation", reservation_id))
    }

    pub async fn list_for_driver(
        &self,
        driver_id: &str,
        status: Option<ReservationStatus>,
    ) -> DomainResult<Vec<Reservation>> {
        with_storage_retry(&self.retry, "list driver reservations", || {
            self.repos.reservations().find_by_driver(driver_id, status)
        })
        .await
    }

    pub async fn list_open_for_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Reservation>> {
        with_storage_retry(&self.retry, "list lot reservations", || {
            self.repos.reservations().find_open_for_lot(lot_id)
        })
        .await
    }

    /// `Pending` reservations whose window already ended.
    pub async fn overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        with_storage_retry(&self.retry, "list overdue reservations", || {
            self.repos.reservations().find_overdue_pending(now)
        })
        .await
    }

    /// Commit a transition that takes `current` out of the open set.
    async fn close(&self, current: &Reservation, next: Reservation) -> DomainResult<()> {
        let others = self.other_open(current).await?;
        let space = self.load_space(current.space_id).await?;
        let now = next.updated_at;
        self.commit(next, Some(current.status), &space, occupancy_state(&others), now)
            .await
    }

    async fn commit(
        &self,
        reservation: Reservation,
        expected_status: Option<ReservationStatus>,
        space: &Space,
        state: SpaceState,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let transition = ReservationTransition {
            reservation,
            expected_status,
            space: space.with_state(state, now),
            expected_space_version: space.version,
        };
        with_storage_retry(&self.retry, "apply reservation transition", || {
            self.repos.reservations().apply(transition.clone())
        })
        .await
    }

    async fn other_open(&self, reservation: &Reservation) -> DomainResult<Vec<Reservation>> {
        let mut open = self.open_for_space(reservation.space_id).await?;
        open.retain(|r| r.id != reservation.id);
        Ok(open)
    }

    async fn open_for_space(&self, space_id: Uuid) -> DomainResult<Vec<Reservation>> {
        with_storage_retry(&self.retry, "load open reservations", || {
            self.repos.reservations().find_open_for_space(space_id)
        })
        .await
    }

    async fn load_space(&self, space_id: Uuid) -> DomainResult<Space> {
        with_storage_retry(&self.retry, "load space", || {
            self.repos.spaces().find_by_id(space_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("Space", space_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{configured_lot, core};
    use chrono::Duration;

    fn window(from_hours: i64, to_hours: i64) -> ReservationWindow {
        let base = Utc::now() + Duration::days(1);
        ReservationWindow::new(
            base + Duration::hours(from_hours),
            Some(base + Duration::hours(to_hours)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reserve_marks_space_reserved() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 2).await;

        let r = core
            .reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.lot_id, spaces[0].lot_id);
        let space = core.allocator.get_space(spaces[0].id).await.unwrap();
        assert_eq!(space.state, SpaceState::Reserved);
    }

    #[tokio::test]
    async fn second_walk_in_on_same_space_is_rejected() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        core.reservations
            .reserve(space_id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        let err = core
            .reservations
            .reserve(space_id, "driver-2", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SpaceNotAvailable(id) if id == space_id));
    }

    #[tokio::test]
    async fn disjoint_windows_share_a_space() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        core.reservations.reserve(space_id, "driver-1", window(0, 2)).await.unwrap();
        core.reservations.reserve(space_id, "driver-2", window(2, 4)).await.unwrap();
        let err = core
            .reservations
            .reserve(space_id, "driver-3", window(1, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SpaceNotAvailable(_)));
        assert_eq!(core.reservations.list_open_for_lot(spaces[0].lot_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inverted_window_is_a_validation_error() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let now = Utc::now();
        let bad = ReservationWindow {
            start: now,
            end: Some(now - Duration::minutes(5)),
        };
        let err = core.reservations.reserve(spaces[0].id, "driver-1", bad).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_space_is_not_found() {
        let core = core();
        let err = core
            .reservations
            .reserve(Uuid::new_v4(), "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Space", .. }));
    }

    #[tokio::test]
    async fn full_lifecycle_frees_the_space() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        let r = core
            .reservations
            .reserve(space_id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        let active = core.reservations.confirm(r.id).await.unwrap();
        assert_eq!(active.status, ReservationStatus::Active);
        assert_eq!(
            core.allocator.get_space(space_id).await.unwrap().state,
            SpaceState::Occupied
        );

        let done = core
            .reservations
            .release(r.id, ReleaseReason::CheckedOut)
            .await
            .unwrap();
        assert_eq!(done.status, ReservationStatus::Completed);
        assert_eq!(
            core.allocator.get_space(space_id).await.unwrap().state,
            SpaceState::Available
        );

        let err = core
            .reservations
            .release(r.id, ReleaseReason::NoShow)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let err = core.reservations.confirm(r.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(
            core.allocator.get_space(space_id).await.unwrap().state,
            SpaceState::Available
        );
        assert_eq!(
            core.reservations.get(r.id).await.unwrap().status,
            ReservationStatus::Completed
        );
    }

    #[tokio::test]
    async fn driver_listing_filters_by_status() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 2).await;

        let done = core
            .reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        core.reservations.cancel(done.id, "driver-1").await.unwrap();
        let open = core
            .reservations
            .reserve(spaces[1].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        let all = core.reservations.list_for_driver("driver-1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        let pending = core
            .reservations
            .list_for_driver("driver-1", Some(ReservationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![open.id]);
        let cancelled = core
            .reservations
            .list_for_driver("driver-1", Some(ReservationStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(cancelled.iter().map(|r| r.id).collect::<Vec<_>>(), vec![done.id]);
        assert!(core
            .reservations
            .list_for_driver("driver-2", Some(ReservationStatus::Pending))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn confirm_is_refused_while_another_reservation_is_active() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        let early = core.reservations.reserve(space_id, "driver-1", window(0, 1)).await.unwrap();
        let late = core.reservations.reserve(space_id, "driver-2", window(1, 2)).await.unwrap();
        core.reservations.confirm(early.id).await.unwrap();

        let err = core.reservations.confirm(late.id).await.unwrap_err();
        assert!(matches!(err, DomainError::SpaceNotAvailable(_)));
        assert_eq!(
            core.reservations.get(late.id).await.unwrap().status,
            ReservationStatus::Pending
        );
    }

    #[tokio::test]
    async fn checkout_from_pending_is_invalid() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let r = core
            .reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        let err = core
            .reservations
            .release(r.id, ReleaseReason::CheckedOut)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(
            core.allocator.get_space(spaces[0].id).await.unwrap().state,
            SpaceState::Reserved
        );
    }

    #[tokio::test]
    async fn releasing_one_of_two_keeps_space_reserved() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        let first = core.reservations.reserve(space_id, "driver-1", window(0, 1)).await.unwrap();
        core.reservations.reserve(space_id, "driver-2", window(3, 4)).await.unwrap();
        core.reservations
            .release(first.id, ReleaseReason::Maintenance)
            .await
            .unwrap();
        assert_eq!(
            core.allocator.get_space(space_id).await.unwrap().state,
            SpaceState::Reserved
        );
    }

    #[tokio::test]
    async fn cancel_policy() {
        let core = core();
        let (lot, spaces) = configured_lot(&core, "Calle 1", 2).await;
        let r = core
            .reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        let err = core.reservations.cancel(r.id, "driver-2").await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(core.reservations.get(r.id).await.unwrap().status, ReservationStatus::Pending);

        let cancelled = core.reservations.cancel(r.id, &lot.owner_id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(
            core.allocator.get_space(spaces[0].id).await.unwrap().state,
            SpaceState::Available
        );

        // repeated cancel changes nothing
        let again = core.reservations.cancel(r.id, "driver-1").await.unwrap();
        assert_eq!(again, cancelled);

        let other = core
            .reservations
            .reserve(spaces[1].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        core.reservations.confirm(other.id).await.unwrap();
        core.reservations.release(other.id, ReleaseReason::CheckedOut).await.unwrap();
        let err = core.reservations.cancel(other.id, "driver-1").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_unknown_reservation_is_not_found() {
        let core = core();
        let err = core.reservations.cancel(Uuid::new_v4(), "driver-1").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn maintenance_release_lets_owner_block_the_space() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let r = core
            .reservations
            .reserve(spaces[0].id, "driver-1", window(0, 1))
            .await
            .unwrap();
        core.reservations.release(r.id, ReleaseReason::Maintenance).await.unwrap();
        core.allocator.set_out_of_service(spaces[0].id, true).await.unwrap();
        assert_eq!(
            core.allocator.get_space(spaces[0].id).await.unwrap().state,
            SpaceState::OutOfService
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reservations_have_exactly_one_winner() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;
        let space_id = spaces[0].id;

        let mut handles = Vec::new();
        for i in 0..32 {
            let manager = core.reservations.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .reserve(space_id, &format!("driver-{i}"), ReservationWindow::walk_in(Utc::now()))
                    .await
            }));
        }

        let mut granted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(e) => assert!(
                    matches!(e, DomainError::SpaceNotAvailable(_) | DomainError::Busy(_)),
                    "unexpected error: {e}"
                ),
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(core.reservations.list_open_for_lot(spaces[0].lot_id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_on_distinct_spaces_all_succeed() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 16).await;

        let mut handles = Vec::new();
        for space in spaces.iter() {
            let manager = core.reservations.clone();
            let space_id = space.id;
            handles.push(tokio::spawn(async move {
                manager
                    .reserve(space_id, "driver-1", ReservationWindow::walk_in(Utc::now()))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let occupancy = core.allocator.occupancy(spaces[0].lot_id).await.unwrap();
        assert_eq!(occupancy.reserved, 16);
        assert_eq!(occupancy.available, 0);
    }
}
