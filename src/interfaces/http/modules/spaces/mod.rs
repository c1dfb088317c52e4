//! Space layout, occupancy and maintenance

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
