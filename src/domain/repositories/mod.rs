//! Repository access for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::parking::ParkingLotRepository;
use super::reservation::ReservationRepository;
use super::space::SpaceRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// Services receive an `Arc<dyn RepositoryProvider>` and request only the
/// repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) -> DomainResult<()> {
///     let lot = repos.parking_lots().find_by_id(lot_id).await?;
///     let spaces = repos.spaces().find_by_lot(lot_id).await?;
///     Ok(())
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn parking_lots(&self) -> &dyn ParkingLotRepository;
    fn spaces(&self) -> &dyn SpaceRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
}
