//! # ParkeoYa parking core
//!
//! Space allocation and reservations for parking lots, served over a REST
//! API.
//!
//! ## Architecture
//!
//! - **domain**: entities, value types and repository traits
//! - **application**: the services (lots, allocator, reservations, search)
//! - **infrastructure**: SeaORM and in-memory storage, JWT verification
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::ParkingCore;
pub use infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
pub use interfaces::http::create_api_router;
