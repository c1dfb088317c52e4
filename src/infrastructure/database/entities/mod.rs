//! Database entities module

pub mod parking_lot;
pub mod reservation;
pub mod space;

pub use parking_lot::Entity as ParkingLot;
pub use reservation::Entity as Reservation;
pub use space::Entity as Space;
