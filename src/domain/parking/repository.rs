//! Parking lot repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{LotStatus, ParkingLot};
use crate::domain::DomainResult;

#[async_trait]
pub trait ParkingLotRepository: Send + Sync {
    /// Save a new lot. Fails with `DuplicateAddress` when the normalized
    /// address is taken.
    async fn create(&self, lot: ParkingLot) -> DomainResult<()>;

    /// Find lot by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<ParkingLot>>;

    /// Find the lot registered at a normalized address
    async fn find_by_address(&self, normalized_address: &str)
        -> DomainResult<Option<ParkingLot>>;

    /// All lots of one owner, oldest first
    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<ParkingLot>>;

    /// All lots in a given status
    async fn find_by_status(&self, status: LotStatus) -> DomainResult<Vec<ParkingLot>>;

    /// Replace a stored lot if its version still equals `expected_version`,
    /// `Busy` otherwise.
    async fn update(&self, lot: ParkingLot, expected_version: i32) -> DomainResult<()>;

    /// Cancel the lot's open reservations, remove its spaces and the lot
    /// itself in one step. Returns the number of cancelled reservations.
    async fn delete_cascade(&self, lot_id: Uuid, now: DateTime<Utc>) -> DomainResult<u64>;
}
