//! HTTP REST API interfaces
//!
//! - `middleware`: bearer token resolution into a `Principal`
//! - `modules`: handlers and DTOs per resource
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::create_api_router;
