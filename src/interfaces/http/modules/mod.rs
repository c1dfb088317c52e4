pub mod health;
pub mod metrics;
pub mod parkings;
pub mod reservations;
pub mod spaces;
