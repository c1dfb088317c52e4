//! Background task that periodically releases no-show reservations.
//!
//! Runs in a tokio::spawn loop, checking every `check_interval_secs` for
//! `Pending` reservations whose window already ended and releasing them
//! with [`ReleaseReason::NoShow`].

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use super::reservations::ReservationManager;
use crate::domain::reservation::ReleaseReason;
use crate::domain::DomainResult;
use crate::shared::shutdown::ShutdownSignal;

/// Start the reservation expiry background task.
pub fn start_reservation_expiry_task(
    manager: Arc<ReservationManager>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "Reservation expiry task started"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = release_no_shows(&manager).await {
                        warn!(error = %e, "Reservation expiry check error");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Reservation expiry task shutting down");
                    break;
                }
            }
        }

        info!("Reservation expiry task stopped");
    })
}

/// One sweep. Returns how many reservations were released.
pub async fn release_no_shows(manager: &ReservationManager) -> DomainResult<usize> {
    let overdue = manager.overdue_pending(Utc::now()).await?;
    if overdue.is_empty() {
        return Ok(0);
    }

    info!(count = overdue.len(), "Releasing overdue reservations");

    let mut released = 0;
    for reservation in overdue {
        match manager.release(reservation.id, ReleaseReason::NoShow).await {
            Ok(_) => released += 1,
            Err(e) => warn!(
                reservation_id = %reservation.id,
                error = %e,
                "Failed to release overdue reservation"
            ),
        }
    }

    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{configured_lot, core};
    use crate::domain::reservation::{ReservationStatus, ReservationWindow};
    use crate::domain::space::SpaceState;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn overdue_pending_reservations_are_released() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 2).await;
        let now = Utc::now();

        let stale_window =
            ReservationWindow::new(now - ChronoDuration::hours(3), Some(now - ChronoDuration::hours(1)))
                .unwrap();
        let stale = core
            .reservations
            .reserve(spaces[0].id, "driver-1", stale_window)
            .await
            .unwrap();
        let current = core
            .reservations
            .reserve(spaces[1].id, "driver-2", ReservationWindow::walk_in(now))
            .await
            .unwrap();

        assert_eq!(release_no_shows(&core.reservations).await.unwrap(), 1);
        assert_eq!(
            core.reservations.get(stale.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );
        assert_eq!(
            core.reservations.get(current.id).await.unwrap().status,
            ReservationStatus::Pending
        );
        assert_eq!(
            core.allocator.get_space(spaces[0].id).await.unwrap().state,
            SpaceState::Available
        );

        assert_eq!(release_no_shows(&core.reservations).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn task_stops_on_shutdown() {
        let core = core();
        let shutdown = ShutdownSignal::new();
        let handle = start_reservation_expiry_task(core.reservations.clone(), shutdown.clone(), 3600);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop")
            .unwrap();
    }
}
