//! Partitioning a lot's capacity into typed spaces

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::space_types::SpaceTypeRegistry;
use crate::domain::parking::{LotStatus, ParkingLot};
use crate::domain::space::{AllocationPlan, Occupancy, Space, SpaceSet, SpaceState};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::utils::{with_storage_retry, KeyedLocks, RetryConfig};

pub struct SpaceAllocator {
    repos: Arc<dyn RepositoryProvider>,
    registry: Arc<SpaceTypeRegistry>,
    lot_locks: KeyedLocks,
    /// Shared with the reservation manager
    space_locks: Arc<KeyedLocks>,
    retry: RetryConfig,
}

impl SpaceAllocator {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: Arc<SpaceTypeRegistry>,
        lot_locks: KeyedLocks,
        space_locks: Arc<KeyedLocks>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            registry,
            lot_locks,
            space_locks,
            retry,
        }
    }

    pub async fn suggested_distribution(&self, lot_id: Uuid) -> DomainResult<AllocationPlan> {
        let lot = self.load_lot(lot_id).await?;
        Ok(self.registry.suggest(lot.id, lot.total_capacity))
    }

    /// Replace the lot's spaces with the layout described by `plan`.
    pub async fn configure(&self, lot_id: Uuid, plan: AllocationPlan) -> DomainResult<SpaceSet> {
        let result = self.configure_locked(lot_id, plan).await;
        self.lot_locks.forget(&lot_id);

        let outcome = match &result {
            Ok(_) => "configured",
            Err(DomainError::CapacityMismatch { .. }) => "capacity_mismatch",
            Err(DomainError::AlreadyConfigured(_)) => "already_configured",
            Err(DomainError::Busy(_)) => "busy",
            Err(_) => "error",
        };
        metrics::counter!("parking_space_configurations_total", "outcome" => outcome).increment(1);
        result
    }

    async fn configure_locked(&self, lot_id: Uuid, plan: AllocationPlan) -> DomainResult<SpaceSet> {
        if plan.lot_id != lot_id {
            return Err(DomainError::Validation(format!(
                "allocation plan targets lot {} instead of {}",
                plan.lot_id, lot_id
            )));
        }

        let actual = plan
            .total()
            .ok_or_else(|| DomainError::Validation("space counts exceed the supported range".into()))?;

        let _guard = self.lot_locks.acquire(lot_id).await?;
        let lot = self.load_lot(lot_id).await?;

        if actual != lot.total_capacity {
            return Err(DomainError::CapacityMismatch {
                expected: lot.total_capacity,
                actual,
            });
        }

        let existing = self.list_spaces_of(lot_id).await?;
        if existing.iter().any(|s| !s.is_available()) {
            return Err(DomainError::AlreadyConfigured(lot_id));
        }

        let now = Utc::now();
        let spaces = plan.build_spaces(now);
        let status = match lot.status {
            LotStatus::Draft => LotStatus::Active,
            other => other,
        };
        let next = lot.with_status(status, now);

        with_storage_retry(&self.retry, "replace lot spaces", || {
            self.repos
                .spaces()
                .replace_for_lot(next.clone(), lot.version, spaces.clone())
        })
        .await?;

        info!(
            lot_id = %lot_id,
            spaces = spaces.len(),
            replaced = existing.len(),
            status = %next.status,
            "Parking spaces configured"
        );
        Ok(SpaceSet { lot: next, spaces })
    }

    /// Maintenance toggle: `Available` <-> `OutOfService`.
    pub async fn set_out_of_service(&self, space_id: Uuid, out_of_service: bool) -> DomainResult<Space> {
        let result = self.toggle_locked(space_id, out_of_service).await;
        self.space_locks.forget(&space_id);
        result
    }

    async fn toggle_locked(&self, space_id: Uuid, out_of_service: bool) -> DomainResult<Space> {
        let _guard = self.space_locks.acquire(space_id).await?;
        let space = self.get_space(space_id).await?;

        let (from, to, action) = if out_of_service {
            (SpaceState::Available, SpaceState::OutOfService, "take out of service")
        } else {
            (SpaceState::OutOfService, SpaceState::Available, "return to service")
        };
        if space.state != from {
            return Err(DomainError::InvalidTransition {
                entity: "Space",
                from: space.state.to_string(),
                action,
            });
        }

        let next = space.with_state(to, Utc::now());
        with_storage_retry(&self.retry, "update space state", || {
            self.repos.spaces().update_state(next.clone(), space.version)
        })
        .await?;

        if out_of_service {
            warn!(space_id = %space_id, label = %next.label(), "Space taken out of service");
        } else {
            info!(space_id = %space_id, label = %next.label(), "Space back in service");
        }
        Ok(next)
    }

    pub async fn get_space(&self, space_id: Uuid) -> DomainResult<Space> {
        with_storage_retry(&self.retry, "load space", || {
            self.repos.spaces().find_by_id(space_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("Space", space_id))
    }

    pub async fn list_spaces(&self, lot_id: Uuid) -> DomainResult<Vec<Space>> {
        self.load_lot(lot_id).await?;
        self.list_spaces_of(lot_id).await
    }

    pub async fn occupancy(&self, lot_id: Uuid) -> DomainResult<Occupancy> {
        let spaces = self.list_spaces(lot_id).await?;
        Ok(Occupancy::from_spaces(&spaces))
    }

    async fn list_spaces_of(&self, lot_id: Uuid) -> DomainResult<Vec<Space>> {
        with_storage_retry(&self.retry, "load spaces", || {
            self.repos.spaces().find_by_lot(lot_id)
        })
        .await
    }

    async fn load_lot(&self, lot_id: Uuid) -> DomainResult<ParkingLot> {
        with_storage_retry(&self.retry, "load parking lot", || {
            self.repos.parking_lots().find_by_id(lot_id)
        })
        .await?
        .ok_or_else(|| DomainError::not_found("ParkingLot", lot_id))
    }
}
