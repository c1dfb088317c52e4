//! Availability search over active lots
//!
//! Candidates are read, filtered and ranked on the first poll. Space
//! counts are then fetched per lot while the caller drains the stream, so
//! a consumer that stops early never pays for the remaining lots.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use super::space_types::SpaceTypeRegistry;
use crate::domain::parking::{LotStatus, ParkingLot, ServiceKind};
use crate::domain::space::SpaceType;
use crate::domain::{DomainResult, RepositoryProvider};
use crate::shared::utils::{with_storage_retry, RetryConfig};

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Case-insensitive exact match
    pub province: Option<String>,
    /// Case-insensitive exact match
    pub district: Option<String>,
    pub max_price_cents: Option<i64>,
    pub required_services: BTreeSet<ServiceKind>,
    pub space_type: Option<SpaceType>,
    /// Only lots open at this local time
    pub open_at: Option<NaiveDateTime>,
    /// Skip lots without any available space
    pub available_only: bool,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub lot: ParkingLot,
    pub price_cents: i64,
    /// Available spaces of the requested type, or of any type
    pub available_spaces: u32,
}

fn same_text(wanted: &Option<String>, actual: &str) -> bool {
    wanted
        .as_deref()
        .map_or(true, |w| w.trim().to_lowercase() == actual.trim().to_lowercase())
}

impl SearchCriteria {
    fn admits(&self, lot: &ParkingLot, price_cents: i64) -> bool {
        same_text(&self.province, &lot.province)
            && same_text(&self.district, &lot.district)
            && self.max_price_cents.map_or(true, |max| price_cents <= max)
            && self
                .required_services
                .iter()
                .all(|s| lot.services.contains_key(s))
            && self
                .open_at
                .map_or(true, |at| lot.operating_hours.is_open_at(at))
    }
}

pub struct AvailabilitySearch {
    repos: Arc<dyn RepositoryProvider>,
    registry: Arc<SpaceTypeRegistry>,
    retry: RetryConfig,
}

impl AvailabilitySearch {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        registry: Arc<SpaceTypeRegistry>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            registry,
            retry,
        }
    }

    /// Matching lots, cheapest first, ties broken by lot id.
    pub fn search(&self, criteria: SearchCriteria) -> BoxStream<'static, DomainResult<SearchHit>> {
        let criteria = Arc::new(criteria);
        let candidates = ranked_candidates(
            self.repos.clone(),
            self.registry.clone(),
            self.retry.clone(),
            criteria.clone(),
        );

        let repos = self.repos.clone();
        let retry = self.retry.clone();
        stream::once(candidates)
            .map_ok(|ranked| stream::iter(ranked.into_iter().map(DomainResult::Ok)))
            .try_flatten()
            .and_then(move |(lot, price_cents)| {
                with_availability(repos.clone(), retry.clone(), criteria.clone(), lot, price_cents)
            })
            .try_filter_map(|hit| futures_util::future::ready(Ok(hit)))
            .boxed()
    }
}

async fn ranked_candidates(
    repos: Arc<dyn RepositoryProvider>,
    registry: Arc<SpaceTypeRegistry>,
    retry: RetryConfig,
    criteria: Arc<SearchCriteria>,
) -> DomainResult<Vec<(ParkingLot, i64)>> {
    let lots = with_storage_retry(&retry, "load active lots", || {
        repos.parking_lots().find_by_status(LotStatus::Active)
    })
    .await?;

    let at = criteria.open_at.map(|t| t.time());
    let mut ranked: Vec<(ParkingLot, i64)> = lots
        .into_iter()
        .map(|lot| {
            let price = registry.hourly_rate_cents(&lot, criteria.space_type, at);
            (lot, price)
        })
        .filter(|(lot, price)| criteria.admits(lot, *price))
        .collect();
    ranked.sort_by(|(a, pa), (b, pb)| pa.cmp(pb).then(a.id.cmp(&b.id)));
    debug!(candidates = ranked.len(), "Search candidates ranked");
    Ok(ranked)
}

/// Attach the live space count, or `None` when the lot has nothing to offer.
async fn with_availability(
    repos: Arc<dyn RepositoryProvider>,
    retry: RetryConfig,
    criteria: Arc<SearchCriteria>,
    lot: ParkingLot,
    price_cents: i64,
) -> DomainResult<Option<SearchHit>> {
    let counts = with_storage_retry(&retry, "count available spaces", || {
        repos.spaces().available_counts(lot.id)
    })
    .await?;

    let available_spaces = match criteria.space_type {
        Some(space_type) => counts.get(&space_type).copied().unwrap_or(0),
        None => counts.values().sum(),
    };
    if available_spaces == 0 && (criteria.space_type.is_some() || criteria.available_only) {
        return Ok(None);
    }
    Ok(Some(SearchHit {
        lot,
        price_cents,
        available_spaces,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{configured_lot, core, registered_lot};
    use crate::domain::parking::{HourlyRate, OperatingHours, ParkingLotPatch};
    use crate::domain::reservation::ReservationWindow;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use std::collections::BTreeMap;

    async fn collect(core: &crate::application::services::ParkingCore, criteria: SearchCriteria) -> Vec<SearchHit> {
        core.search.search(criteria).try_collect().await.unwrap()
    }

    async fn priced(core: &crate::application::services::ParkingCore, address: &str, capacity: u32, cents: i64) -> ParkingLot {
        let (lot, _) = configured_lot(core, address, capacity).await;
        let patch = ParkingLotPatch {
            hourly_rate: Some(HourlyRate::flat(cents)),
            ..Default::default()
        };
        core.lots.update(lot.id, &lot.owner_id, patch).await.unwrap()
    }

    #[tokio::test]
    async fn only_active_lots_ranked_by_price() {
        let core = core();
        let expensive = priced(&core, "Calle 1", 2, 800).await;
        let cheap = priced(&core, "Calle 2", 2, 300).await;
        registered_lot(&core, "Calle 3", 2).await; // still draft

        let hits = collect(&core, SearchCriteria::default()).await;
        let ids: Vec<_> = hits.iter().map(|h| h.lot.id).collect();
        assert_eq!(ids, vec![cheap.id, expensive.id]);
        assert_eq!(hits[0].price_cents, 300);
        assert_eq!(hits[0].available_spaces, 2);
    }

    #[tokio::test]
    async fn province_match_ignores_case_and_price_cap_applies() {
        let core = core();
        priced(&core, "Calle 1", 2, 800).await;
        let cheap = priced(&core, "Calle 2", 2, 300).await;

        let hits = collect(
            &core,
            SearchCriteria {
                province: Some("LIMA".into()),
                district: Some("miraflores".into()),
                max_price_cents: Some(500),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lot.id, cheap.id);

        let none = collect(
            &core,
            SearchCriteria {
                province: Some("Cusco".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn available_only_drops_full_lots() {
        let core = core();
        let (full, spaces) = configured_lot(&core, "Calle 1", 1).await;
        configured_lot(&core, "Calle 2", 1).await;
        core.reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();

        let all = collect(&core, SearchCriteria::default()).await;
        assert_eq!(all.len(), 2);
        let hits = collect(
            &core,
            SearchCriteria {
                available_only: true,
                ..Default::default()
            },
        )
        .await;
        assert_eq!(hits.len(), 1);
        assert_ne!(hits[0].lot.id, full.id);
    }

    #[tokio::test]
    async fn space_type_filter_uses_type_price_and_counts() {
        let core = core();
        let (lot, _) = configured_lot(&core, "Calle 1", 10).await;
        let patch = ParkingLotPatch {
            type_rates: Some(BTreeMap::from([(SpaceType::Compact, 250)])),
            ..Default::default()
        };
        core.lots.update(lot.id, &lot.owner_id, patch).await.unwrap();

        let hits = collect(
            &core,
            SearchCriteria {
                space_type: Some(SpaceType::Compact),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].price_cents, 250);
        assert_eq!(hits[0].available_spaces, 2);

        let none = collect(
            &core,
            SearchCriteria {
                space_type: Some(SpaceType::ElectricCharging),
                ..Default::default()
            },
        )
        .await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn services_and_opening_hours_filter() {
        let core = core();
        let (lot, _) = configured_lot(&core, "Calle 1", 2).await;
        let patch = ParkingLotPatch {
            services: Some(BTreeMap::from([(ServiceKind::Valet, 2000)])),
            operating_hours: Some(OperatingHours::Daily {
                open: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            }),
            ..Default::default()
        };
        core.lots.update(lot.id, &lot.owner_id, patch).await.unwrap();
        configured_lot(&core, "Calle 2", 2).await;

        let valet = collect(
            &core,
            SearchCriteria {
                required_services: BTreeSet::from([ServiceKind::Valet]),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(valet.len(), 1);
        assert_eq!(valet[0].lot.id, lot.id);

        let midnight = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        let open_late = collect(
            &core,
            SearchCriteria {
                open_at: Some(midnight),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(open_late.len(), 1);
        assert_ne!(open_late[0].lot.id, lot.id);
    }

    #[tokio::test]
    async fn stream_reflects_latest_committed_state() {
        let core = core();
        let (_, spaces) = configured_lot(&core, "Calle 1", 1).await;

        let stream = core.search.search(SearchCriteria {
            available_only: true,
            ..Default::default()
        });
        // reserved after the stream was built but before it was polled
        core.reservations
            .reserve(spaces[0].id, "driver-1", ReservationWindow::walk_in(Utc::now()))
            .await
            .unwrap();
        let hits: Vec<SearchHit> = stream.try_collect().await.unwrap();
        assert!(hits.is_empty());
    }
}
