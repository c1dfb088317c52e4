//! Parking lot aggregate
//!
//! Contains the ParkingLot entity, its value types, and repository interface.

pub mod model;
pub mod repository;

pub use model::{
    normalize_address, DaySchedule, HourlyRate, LotStatus, NewParkingLot, OperatingHours,
    ParkingLot, ParkingLotPatch, ServiceKind,
};
pub use repository::ParkingLotRepository;
