//! In-memory repositories
//!
//! Every lot owns one `DashMap` entry holding the lot and its spaces.
//! Writes that span several records (space replacement, reservation
//! transitions, cascading delete) hold that entry's shard lock for their
//! whole duration, so they commit as a unit. Secondary maps are only
//! touched while the lot entry is held, never the other way round.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::parking::{LotStatus, ParkingLot, ParkingLotRepository};
use crate::domain::reservation::{
    Reservation, ReservationRepository, ReservationStatus, ReservationTransition,
};
use crate::domain::space::{Space, SpaceRepository, SpaceType};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

struct LotEntry {
    lot: ParkingLot,
    /// Ordered by index
    spaces: Vec<Space>,
}

/// In-memory storage for development and testing
pub struct InMemoryRepositoryProvider {
    lots: DashMap<Uuid, LotEntry>,
    /// normalized address -> lot id
    addresses: DashMap<String, Uuid>,
    /// space id -> lot id
    space_lots: DashMap<Uuid, Uuid>,
    reservations: DashMap<Uuid, Reservation>,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            lots: DashMap::new(),
            addresses: DashMap::new(),
            space_lots: DashMap::new(),
            reservations: DashMap::new(),
        }
    }

    fn lot_of_space(&self, space_id: Uuid) -> Option<Uuid> {
        self.space_lots.get(&space_id).map(|id| *id)
    }

    fn stale(what: &str, id: Uuid) -> DomainError {
        DomainError::Busy(format!("{} {} was modified concurrently", what, id))
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn parking_lots(&self) -> &dyn ParkingLotRepository {
        self
    }

    fn spaces(&self) -> &dyn SpaceRepository {
        self
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        self
    }
}

// ── Parking lots ───────────────────────────────────────────────

#[async_trait]
impl ParkingLotRepository for InMemoryRepositoryProvider {
    async fn create(&self, lot: ParkingLot) -> DomainResult<()> {
        match self.addresses.entry(lot.normalized_address.clone()) {
            Entry::Occupied(_) => return Err(DomainError::DuplicateAddress(lot.address)),
            Entry::Vacant(slot) => {
                slot.insert(lot.id);
            }
        }
        self.lots.insert(
            lot.id,
            LotEntry {
                lot,
                spaces: Vec::new(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<ParkingLot>> {
        Ok(self.lots.get(&id).map(|e| e.lot.clone()))
    }

    async fn find_by_address(&self, normalized_address: &str) -> DomainResult<Option<ParkingLot>> {
        let Some(id) = self.addresses.get(normalized_address).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.lots.get(&id).map(|e| e.lot.clone()))
    }

    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<ParkingLot>> {
        let mut lots: Vec<ParkingLot> = self
            .lots
            .iter()
            .filter(|e| e.lot.owner_id == owner_id)
            .map(|e| e.lot.clone())
            .collect();
        lots.sort_by_key(|l| (l.created_at, l.id));
        Ok(lots)
    }

    async fn find_by_status(&self, status: LotStatus) -> DomainResult<Vec<ParkingLot>> {
        let mut lots: Vec<ParkingLot> = self
            .lots
            .iter()
            .filter(|e| e.lot.status == status)
            .map(|e| e.lot.clone())
            .collect();
        lots.sort_by_key(|l| l.id);
        Ok(lots)
    }

    async fn update(&self, lot: ParkingLot, expected_version: i32) -> DomainResult<()> {
        let mut entry = self
            .lots
            .get_mut(&lot.id)
            .ok_or_else(|| DomainError::not_found("ParkingLot", lot.id))?;
        if entry.lot.version != expected_version {
            return Err(Self::stale("parking lot", lot.id));
        }

        if entry.lot.normalized_address != lot.normalized_address {
            match self.addresses.entry(lot.normalized_address.clone()) {
                Entry::Occupied(owner) if *owner.get() != lot.id => {
                    return Err(DomainError::DuplicateAddress(lot.address));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(lot.id);
                }
            }
            self.addresses.remove(&entry.lot.normalized_address);
        }

        entry.lot = lot;
        Ok(())
    }

    async fn delete_cascade(&self, lot_id: Uuid, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut cancelled = 0;
        let removed = self.lots.remove_if(&lot_id, |_, entry| {
            for mut r in self.reservations.iter_mut() {
                if r.lot_id == lot_id && r.is_open() {
                    r.status = ReservationStatus::Cancelled;
                    r.updated_at = now;
                    cancelled += 1;
                }
            }
            for space in &entry.spaces {
                self.space_lots.remove(&space.id);
            }
            self.addresses.remove(&entry.lot.normalized_address);
            true
        });

        match removed {
            Some(_) => Ok(cancelled),
            None => Err(DomainError::not_found("ParkingLot", lot_id)),
        }
    }
}

// ── Spaces ─────────────────────────────────────────────────────

#[async_trait]
impl SpaceRepository for InMemoryRepositoryProvider {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Space>> {
        let Some(lot_id) = self.lot_of_space(id) else {
            return Ok(None);
        };
        Ok(self
            .lots
            .get(&lot_id)
            .and_then(|e| e.spaces.iter().find(|s| s.id == id).cloned()))
    }

    async fn find_by_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Space>> {
        Ok(self
            .lots
            .get(&lot_id)
            .map(|e| e.spaces.clone())
            .unwrap_or_default())
    }

    async fn replace_for_lot(
        &self,
        lot: ParkingLot,
        expected_lot_version: i32,
        spaces: Vec<Space>,
    ) -> DomainResult<()> {
        let mut entry = self
            .lots
            .get_mut(&lot.id)
            .ok_or_else(|| DomainError::not_found("ParkingLot", lot.id))?;
        if entry.spaces.iter().any(|s| !s.is_available()) {
            return Err(DomainError::AlreadyConfigured(lot.id));
        }
        if entry.lot.version != expected_lot_version {
            return Err(Self::stale("parking lot", lot.id));
        }

        for old in &entry.spaces {
            self.space_lots.remove(&old.id);
        }
        for space in &spaces {
            self.space_lots.insert(space.id, lot.id);
        }
        entry.spaces = spaces;
        entry.lot = lot;
        Ok(())
    }

    async fn update_state(&self, space: Space, expected_version: i32) -> DomainResult<()> {
        let lot_id = self
            .lot_of_space(space.id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        let mut entry = self
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        let slot = entry
            .spaces
            .iter_mut()
            .find(|s| s.id == space.id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        if slot.version != expected_version {
            return Err(Self::stale("space", space.id));
        }
        *slot = space;
        Ok(())
    }

    async fn available_counts(&self, lot_id: Uuid) -> DomainResult<BTreeMap<SpaceType, u32>> {
        let mut counts = BTreeMap::new();
        if let Some(entry) = self.lots.get(&lot_id) {
            for space in entry.spaces.iter().filter(|s| s.is_available()) {
                *counts.entry(space.space_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

// ── Reservations ───────────────────────────────────────────────

#[async_trait]
impl ReservationRepository for InMemoryRepositoryProvider {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn find_open_for_space(&self, space_id: Uuid) -> DomainResult<Vec<Reservation>> {
        let mut open: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.space_id == space_id && r.is_open())
            .map(|r| r.clone())
            .collect();
        open.sort_by_key(|r| (r.start_time, r.id));
        Ok(open)
    }

    async fn find_open_for_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Reservation>> {
        let mut open: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.lot_id == lot_id && r.is_open())
            .map(|r| r.clone())
            .collect();
        open.sort_by_key(|r| (r.start_time, r.id));
        Ok(open)
    }

    async fn find_by_driver(
        &self,
        driver_id: &str,
        status: Option<ReservationStatus>,
    ) -> DomainResult<Vec<Reservation>> {
        let mut mine: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.driver_id == driver_id && status.map_or(true, |s| r.status == s))
            .map(|r| r.clone())
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(mine)
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| {
                r.status == ReservationStatus::Pending && r.end_time.is_some_and(|end| end < now)
            })
            .map(|r| r.clone())
            .collect())
    }

    async fn apply(&self, transition: ReservationTransition) -> DomainResult<()> {
        let ReservationTransition {
            reservation,
            expected_status,
            space,
            expected_space_version,
        } = transition;

        let lot_id = self
            .lot_of_space(space.id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        let mut entry = self
            .lots
            .get_mut(&lot_id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        let slot = entry
            .spaces
            .iter_mut()
            .find(|s| s.id == space.id)
            .ok_or_else(|| DomainError::not_found("Space", space.id))?;
        if slot.version != expected_space_version {
            return Err(Self::stale("space", space.id));
        }

        match (self.reservations.entry(reservation.id), expected_status) {
            (Entry::Vacant(new), None) => {
                new.insert(reservation);
            }
            (Entry::Occupied(mut stored), Some(expected)) if stored.get().status == expected => {
                stored.insert(reservation);
            }
            _ => return Err(Self::stale("reservation", reservation.id)),
        }
        *slot = space;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parking::{HourlyRate, NewParkingLot, OperatingHours};
    use crate::domain::reservation::ReservationWindow;
    use crate::domain::space::{AllocationPlan, SpaceState};

    fn lot(address: &str) -> ParkingLot {
        ParkingLot::register(
            "owner-1",
            NewParkingLot {
                name: "Central".into(),
                description: None,
                address: address.into(),
                province: "Lima".into(),
                district: "Miraflores".into(),
                total_capacity: 2,
                operating_hours: OperatingHours::AlwaysOpen,
                hourly_rate: HourlyRate::flat(500),
                services: BTreeMap::new(),
                type_rates: BTreeMap::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    async fn configured(repo: &InMemoryRepositoryProvider, address: &str) -> (ParkingLot, Vec<Space>) {
        let lot = lot(address);
        repo.create(lot.clone()).await.unwrap();
        let spaces = AllocationPlan::new(lot.id, [(SpaceType::Regular, 2)].into_iter().collect())
            .build_spaces(Utc::now());
        let active = lot.with_status(LotStatus::Active, Utc::now());
        repo.replace_for_lot(active.clone(), lot.version, spaces.clone())
            .await
            .unwrap();
        (active, spaces)
    }

    fn reserve(space: &Space) -> ReservationTransition {
        ReservationTransition {
            reservation: Reservation::pending(space, "driver-1", ReservationWindow::walk_in(Utc::now()), Utc::now()),
            expected_status: None,
            space: space.with_state(SpaceState::Reserved, Utc::now()),
            expected_space_version: space.version,
        }
    }

    #[tokio::test]
    async fn duplicate_address_is_rejected() {
        let repo = InMemoryRepositoryProvider::new();
        repo.create(lot("Av. Principal 123, Lima")).await.unwrap();
        let err = repo.create(lot("av. principal 123 , lima")).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateAddress(_)));
    }

    #[tokio::test]
    async fn stale_lot_update_is_busy() {
        let repo = InMemoryRepositoryProvider::new();
        let original = lot("Calle 1");
        repo.create(original.clone()).await.unwrap();

        let first = original.with_status(LotStatus::Suspended, Utc::now());
        repo.update(first, original.version).await.unwrap();
        let second = original.with_status(LotStatus::Active, Utc::now());
        let err = repo.update(second, original.version).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn apply_commits_reservation_and_space_together() {
        let repo = InMemoryRepositoryProvider::new();
        let (_, spaces) = configured(&repo, "Calle 2").await;

        let transition = reserve(&spaces[0]);
        let id = transition.reservation.id;
        repo.apply(transition.clone()).await.unwrap();

        let space = SpaceRepository::find_by_id(&repo, spaces[0].id).await.unwrap().unwrap();
        assert_eq!(space.state, SpaceState::Reserved);
        assert!(ReservationRepository::find_by_id(&repo, id).await.unwrap().is_some());

        // same space version again: compare-and-set fails, nothing written
        let again = reserve(&spaces[0]);
        let again_id = again.reservation.id;
        assert!(repo.apply(again).await.unwrap_err().is_retryable());
        assert!(ReservationRepository::find_by_id(&repo, again_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_refuses_once_a_space_is_held() {
        let repo = InMemoryRepositoryProvider::new();
        let (lot, spaces) = configured(&repo, "Calle 3").await;
        repo.apply(reserve(&spaces[1])).await.unwrap();

        let fresh = AllocationPlan::new(lot.id, [(SpaceType::Compact, 2)].into_iter().collect())
            .build_spaces(Utc::now());
        let err = repo
            .replace_for_lot(lot.clone(), lot.version, fresh)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyConfigured(id) if id == lot.id));

        let kept: Vec<Uuid> = repo.find_by_lot(lot.id).await.unwrap().iter().map(|s| s.id).collect();
        let original: Vec<Uuid> = spaces.iter().map(|s| s.id).collect();
        assert_eq!(kept, original);
    }

    #[tokio::test]
    async fn delete_cascade_cancels_open_reservations() {
        let repo = InMemoryRepositoryProvider::new();
        let (lot, spaces) = configured(&repo, "Calle 4").await;
        let transition = reserve(&spaces[0]);
        let reservation_id = transition.reservation.id;
        repo.apply(transition).await.unwrap();

        let cancelled = repo.delete_cascade(lot.id, Utc::now()).await.unwrap();
        assert_eq!(cancelled, 1);
        assert!(ParkingLotRepository::find_by_id(&repo, lot.id).await.unwrap().is_none());
        assert!(SpaceRepository::find_by_id(&repo, spaces[0].id).await.unwrap().is_none());

        let r = ReservationRepository::find_by_id(&repo, reservation_id).await.unwrap().unwrap();
        assert_eq!(r.status, ReservationStatus::Cancelled);
        assert_eq!(r.lot_id, lot.id);

        // address is free again
        repo.create(self::lot("Calle 4")).await.unwrap();
    }
}
