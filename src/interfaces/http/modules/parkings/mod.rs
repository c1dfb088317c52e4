//! Parking lot registration, ownership and search

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
