//! Space repository interface

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Space, SpaceType};
use crate::domain::parking::ParkingLot;
use crate::domain::DomainResult;

#[async_trait]
pub trait SpaceRepository: Send + Sync {
    /// Find space by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Space>>;

    /// All spaces of a lot ordered by index
    async fn find_by_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Space>>;

    /// Atomically swap the lot's space set and store the updated lot.
    ///
    /// Fails with `AlreadyConfigured` if any current space is not
    /// `Available`, and with `Busy` if the stored lot version differs from
    /// `expected_lot_version`. Nothing is written on failure.
    async fn replace_for_lot(
        &self,
        lot: ParkingLot,
        expected_lot_version: i32,
        spaces: Vec<Space>,
    ) -> DomainResult<()>;

    /// Write a new revision of a space if the stored version still equals
    /// `expected_version`, `Busy` otherwise.
    async fn update_state(&self, space: Space, expected_version: i32) -> DomainResult<()>;

    /// Number of `Available` spaces per type
    async fn available_counts(&self, lot_id: Uuid) -> DomainResult<BTreeMap<SpaceType, u32>>;
}
