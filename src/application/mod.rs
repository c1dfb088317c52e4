//! Application layer: use cases over the domain repositories

pub mod services;

pub use services::{
    AvailabilitySearch, CoreSettings, ParkingCore, ParkingLotService, ReservationManager,
    SearchCriteria, SearchHit, SpaceAllocator, SpaceTypeRegistry,
};
