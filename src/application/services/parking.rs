//! Parking lot lifecycle: registration, owner edits, status and removal

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::parking::{LotStatus, NewParkingLot, ParkingLot, ParkingLotPatch};
use crate::domain::principal::{Principal, Role};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::utils::{with_storage_retry, RetryConfig};

/// Service for parking lot operations
pub struct ParkingLotService {
    repos: Arc<dyn RepositoryProvider>,
    retry: RetryConfig,
    max_capacity: u32,
}

impl ParkingLotService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, retry: RetryConfig, max_capacity: u32) -> Self {
        Self {
            repos,
            retry,
            max_capacity,
        }
    }

    /// Register a new lot in `Draft` for an owner principal.
    pub async fn register(&self, owner: &Principal, attrs: NewParkingLot) -> DomainResult<ParkingLot> {
        owner.require(Role::Owner)?;
        self.check_capacity(attrs.total_capacity)?;

        let lot = ParkingLot::register(owner.id.clone(), attrs, Utc::now())?;
        self.ensure_address_free(&lot).await?;

        with_storage_retry(&self.retry, "create parking lot", || {
            self.repos.parking_lots().create(lot.clone())
        })
        .await?;

        info!(
            lot_id = %lot.id,
            owner_id = %lot.owner_id,
            capacity = lot.total_capacity,
            "Parking lot registered"
        );
        Ok(lot)
    }

    /// Apply an owner patch with an optimistic version check.
    pub async fn update(
        &self,
        lot_id: Uuid,
        actor_id: &str,
        patch: ParkingLotPatch,
    ) -> DomainResult<ParkingLot> {
        let current = self.ensure_owner(lot_id, actor_id).await?;
        if let Some(capacity) = patch.total_capacity {
            self.check_capacity(capacity)?;
        }

        let has_spaces = !with_storage_retry(&self.retry, "load spaces", || {
            self.repos.spaces().find_by_lot(lot_id)
        })
        .await?
        .is_empty();

        let next = current.patched(patch, has_spaces, Utc::now())?;
        if next.normalized_address != current.normalized_address {
            self.ensure_address_free(&next).await?;
        }

        self.store(next, current.version).await
    }

    /// Take a lot offline. Existing reservations are kept.
    pub async fn deactivate(&self, lot_id: Uuid, actor_id: &str) -> DomainResult<ParkingLot> {
        let current = self.ensure_owner(lot_id, actor_id).await?;
        if current.status == LotStatus::Suspended {
            return Ok(current);
        }
        let next = current.with_status(LotStatus::Suspended, Utc::now());
        let lot = self.store(next, current.version).await?;
        info!(lot_id = %lot_id, "Parking lot deactivated");
        Ok(lot)
    }

    /// Bring a suspended lot back: `Active` if it has spaces, `Draft` otherwise.
    pub async fn reactivate(&self, lot_id: Uuid, actor_id: &str) -> DomainResult<ParkingLot> {
        let current = self.ensure_owner(lot_id, actor_id).await?;
        if current.status != LotStatus::Suspended {
            return Ok(current);
        }

        let has_spaces = !with_storage_retry(&self.retry, "load spaces", || {
            self.repos.spaces().find_by_lot(lot_id)
        })
        .await?
        .is_empty();
        let status = if has_spaces {
            LotStatus::Active
        } else {
            LotStatus::Draft
        };

        let next = current.with_status(status, Utc::now());
        let lot = self.store(next, current.version).await?;
        info!(lot_id = %lot_id, status = %lot.status, "Parking lot reactivated");
        Ok(lot)
    }

    /// Remove a lot with its spaces, cancelling every open reservation.
    pub async fn delete(&self, lot_id: Uuid, actor_id: &str) -> DomainResult<()> {
        self.ensure_owner(lot_id, actor_id).await?;
        let cancelled = with_storage_retry(&self.retry, "delete parking lot", || {
            self.repos.parking_lots().delete_cascade(lot_id, Utc::now())
        })
        .await?;
        info!(lot_id = %lot_id, cancelled_reservations = cancelled, "Parking lot deleted");
        Ok(())
    }

    pub async fn get(&self, lot_id: Uuid) -> DomainResult<ParkingLot> {
        with_storage_retry(&self.retry, "load parking lot", || {
            self.repos.parking_lots().find_by_id(lot_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("ParkingLot", lot_id))
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> DomainResult<Vec<ParkingLot>> {
        with_storage_retry(&self.retry, "list owner lots", || {
            self.repos.parking_lots().find_by_owner(owner_id)
        })
        .await
    }

    /// Load a lot and check `actor_id` owns it.
    pub async fn ensure_owner(&self, lot_id: Uuid, actor_id: &str) -> DomainResult<ParkingLot> {
        let lot = self.get(lot_id).await?;
        if !lot.is_owned_by(actor_id) {
            return Err(DomainError::Forbidden(format!(
                "parking lot {} belongs to another owner",
                lot_id
            )));
        }
        Ok(lot)
    }

    fn check_capacity(&self, capacity: u32) -> DomainResult<()> {
        if capacity > self.max_capacity {
            return Err(DomainError::Validation(format!(
                "total capacity {} exceeds the maximum of {}",
                capacity, self.max_capacity
            )));
        }
        Ok(())
    }

    async fn ensure_address_free(&self, lot: &ParkingLot) -> DomainResult<()> {
        let existing = with_storage_retry(&self.retry, "find lot by address", || {
            self.repos.parking_lots().find_by_address(&lot.normalized_address)
        })
        .await?;
        match existing {
            Some(other) if other.id != lot.id => {
                Err(DomainError::DuplicateAddress(lot.address.clone()))
            }
            _ => Ok(()),
        }
    }

    async fn store(&self, next: ParkingLot, expected_version: i32) -> DomainResult<ParkingLot> {
        with_storage_retry(&self.retry, "update parking lot", || {
            self.repos.parking_lots().update(next.clone(), expected_version)
        })
        .await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{core, lot_attrs, regular_plan};
    use crate::domain::reservation::{ReservationStatus, ReservationWindow};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn register_creates_draft_lot() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle Test 456", 30))
            .await
            .unwrap();
        assert_eq!(lot.status, LotStatus::Draft);
        assert_eq!(core.lots.get(lot.id).await.unwrap(), lot);
    }

    #[tokio::test]
    async fn drivers_cannot_register() {
        let core = core();
        let err = core
            .lots
            .register(&Principal::driver("driver-1"), lot_attrs("Calle Test 456", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_address_is_rejected_after_normalization() {
        let core = core();
        let owner = Principal::owner("owner-1");
        core.lots
            .register(&owner, lot_attrs("Av. Principal 123, Lima", 30))
            .await
            .unwrap();
        let err = core
            .lots
            .register(&Principal::owner("owner-2"), lot_attrs("av. principal 123, lima ", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn capacity_above_maximum_is_rejected() {
        let core = core();
        let err = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 10_001))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_owner_may_update() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 10))
            .await
            .unwrap();
        let patch = ParkingLotPatch {
            name: Some("Hijacked".into()),
            ..Default::default()
        };
        let err = core.lots.update(lot.id, "owner-2", patch).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(core.lots.get(lot.id).await.unwrap().name, lot.name);
    }

    #[tokio::test]
    async fn update_to_taken_address_is_rejected() {
        let core = core();
        let owner = Principal::owner("owner-1");
        core.lots.register(&owner, lot_attrs("Calle 1", 10)).await.unwrap();
        let second = core.lots.register(&owner, lot_attrs("Calle 2", 10)).await.unwrap();

        let patch = ParkingLotPatch {
            address: Some(" CALLE  1".into()),
            ..Default::default()
        };
        let err = core.lots.update(second.id, "owner-1", patch).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn services_change_without_touching_spaces() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 10))
            .await
            .unwrap();
        let plan = core.allocator.suggested_distribution(lot.id).await.unwrap();
        let set = core.allocator.configure(lot.id, plan).await.unwrap();

        let patch = ParkingLotPatch {
            services: Some(BTreeMap::from([(
                crate::domain::parking::ServiceKind::CarWash,
                1500,
            )])),
            ..Default::default()
        };
        let updated = core.lots.update(lot.id, "owner-1", patch).await.unwrap();
        assert_eq!(updated.services.len(), 1);
        assert_eq!(core.allocator.list_spaces(lot.id).await.unwrap(), set.spaces);
    }

    #[tokio::test]
    async fn deactivate_blocks_new_reservations_and_reactivate_restores() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 2))
            .await
            .unwrap();
        let plan = core.registry.suggest(lot.id, 2);
        let set = core.allocator.configure(lot.id, plan).await.unwrap();
        let kept = core
            .reservations
            .reserve(set.spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        let suspended = core.lots.deactivate(lot.id, "owner-1").await.unwrap();
        assert_eq!(suspended.status, LotStatus::Suspended);
        // idempotent
        assert_eq!(core.lots.deactivate(lot.id, "owner-1").await.unwrap().version, suspended.version);

        let err = core
            .reservations
            .reserve(set.spaces[1].id, "driver-2", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SpaceNotAvailable(_)));
        assert_eq!(
            core.reservations.get(kept.id).await.unwrap().status,
            ReservationStatus::Pending
        );

        let active = core.lots.reactivate(lot.id, "owner-1").await.unwrap();
        assert_eq!(active.status, LotStatus::Active);
    }

    #[tokio::test]
    async fn reactivate_without_spaces_returns_to_draft() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 2))
            .await
            .unwrap();
        core.lots.deactivate(lot.id, "owner-1").await.unwrap();
        let back = core.lots.reactivate(lot.id, "owner-1").await.unwrap();
        assert_eq!(back.status, LotStatus::Draft);
    }

    #[tokio::test]
    async fn delete_cascades_to_spaces_and_reservations() {
        let core = core();
        let lot = core
            .lots
            .register(&Principal::owner("owner-1"), lot_attrs("Calle 1", 3))
            .await
            .unwrap();
        let plan = regular_plan(lot.id, 3);
        let set = core.allocator.configure(lot.id, plan).await.unwrap();
        let r = core
            .reservations
            .reserve(set.spaces[2].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        assert!(matches!(
            core.lots.delete(lot.id, "owner-2").await,
            Err(DomainError::Forbidden(_))
        ));
        core.lots.delete(lot.id, "owner-1").await.unwrap();

        assert!(matches!(core.lots.get(lot.id).await, Err(DomainError::NotFound { .. })));
        assert!(matches!(
            core.allocator.list_spaces(lot.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert_eq!(
            core.reservations.get(r.id).await.unwrap().status,
            ReservationStatus::Cancelled
        );
    }
}
