//! Reservation aggregate
//!
//! Contains the Reservation entity, related types, and repository interface.

pub mod model;
pub mod repository;

pub use model::{
    occupancy_state, ReleaseReason, Reservation, ReservationStatus, ReservationWindow,
};
pub use repository::{ReservationRepository, ReservationTransition};
