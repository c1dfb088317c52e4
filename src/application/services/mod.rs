//! Application services

mod allocator;
mod parking;
mod reservation_expiry;
mod reservations;
mod search;
mod space_types;

use std::sync::Arc;
use std::time::Duration;

pub use allocator::SpaceAllocator;
pub use parking::ParkingLotService;
pub use reservation_expiry::{release_no_shows, start_reservation_expiry_task};
pub use reservations::ReservationManager;
pub use search::{AvailabilitySearch, SearchCriteria, SearchHit};
pub use space_types::SpaceTypeRegistry;

use crate::domain::RepositoryProvider;
use crate::shared::utils::{KeyedLocks, RetryConfig};

/// Tunables shared by the services
#[derive(Debug, Clone)]
pub struct CoreSettings {
    /// Longest wait for a per-space or per-lot section
    pub lock_timeout: Duration,
    pub max_capacity: u32,
    pub retry: RetryConfig,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            max_capacity: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Every service wired over one repository provider. The allocator and the
/// reservation manager share the per-space locks.
#[derive(Clone)]
pub struct ParkingCore {
    pub registry: Arc<SpaceTypeRegistry>,
    pub lots: Arc<ParkingLotService>,
    pub allocator: Arc<SpaceAllocator>,
    pub reservations: Arc<ReservationManager>,
    pub search: Arc<AvailabilitySearch>,
}

impl ParkingCore {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: SpaceTypeRegistry,
        settings: CoreSettings,
    ) -> Self {
        let registry = Arc::new(registry);
        let space_locks = Arc::new(KeyedLocks::new("space", settings.lock_timeout));

        Self {
            lots: Arc::new(ParkingLotService::new(
                repos.clone(),
                settings.retry.clone(),
                settings.max_capacity,
            )),
            allocator: Arc::new(SpaceAllocator::new(
                repos.clone(),
                registry.clone(),
                KeyedLocks::new("lot", settings.lock_timeout),
                space_locks.clone(),
                settings.retry.clone(),
            )),
            reservations: Arc::new(ReservationManager::new(
                repos.clone(),
                space_locks,
                settings.retry.clone(),
            )),
            search: Arc::new(AvailabilitySearch::new(repos, registry.clone(), settings.retry)),
            registry,
        }
    }
}
