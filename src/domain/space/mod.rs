//! Space aggregate
//!
//! Typed spaces of a lot, the allocation plan that produces them, and the
//! repository interface.

pub mod model;
pub mod repository;

pub use model::{AllocationPlan, Occupancy, Space, SpaceSet, SpaceState, SpaceType};
pub use repository::SpaceRepository;
