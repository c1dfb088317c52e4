//! Domain layer: entities, value types and repository interfaces

pub mod parking;
pub mod principal;
pub mod repositories;
pub mod reservation;
pub mod space;

pub use parking::{LotStatus, ParkingLot};
pub use principal::{Principal, Role};
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{Reservation, ReservationStatus};
pub use space::{Space, SpaceState, SpaceType};

pub use crate::shared::errors::DomainError;
