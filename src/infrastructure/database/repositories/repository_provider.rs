//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::parking::ParkingLotRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::ReservationRepository;
use crate::domain::space::SpaceRepository;

use super::parking_lot_repository::SeaOrmParkingLotRepository;
use super::reservation_repository::SeaOrmReservationRepository;
use super::space_repository::SeaOrmSpaceRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let lot = repos.parking_lots().find_by_id(lot_id).await?;
/// let open = repos.reservations().find_open_for_space(space_id).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    db: DatabaseConnection,
    parking_lots: SeaOrmParkingLotRepository,
    spaces: SeaOrmSpaceRepository,
    reservations: SeaOrmReservationRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            parking_lots: SeaOrmParkingLotRepository::new(db.clone()),
            spaces: SeaOrmSpaceRepository::new(db.clone()),
            reservations: SeaOrmReservationRepository::new(db.clone()),
            db,
        }
    }

    /// Underlying connection, used by the health probe
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn parking_lots(&self) -> &dyn ParkingLotRepository {
        &self.parking_lots
    }

    fn spaces(&self) -> &dyn SpaceRepository {
        &self.spaces
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }
}
