//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::space_repository::write_state;
use super::{db_err, is_unique_violation, stale};
use crate::domain::reservation::{
    Reservation, ReservationRepository, ReservationStatus, ReservationTransition,
};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> Reservation {
    Reservation {
        id: m.id,
        space_id: m.space_id,
        lot_id: m.lot_id,
        driver_id: m.driver_id,
        start_time: m.start_time,
        end_time: m.end_time,
        status: ReservationStatus::from_str(&m.status),
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn domain_to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id),
        space_id: Set(r.space_id),
        lot_id: Set(r.lot_id),
        driver_id: Set(r.driver_id.clone()),
        start_time: Set(r.start_time),
        end_time: Set(r.end_time),
        status: Set(r.status.as_str().to_string()),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    }
}

fn open_statuses() -> [&'static str; 2] {
    [
        ReservationStatus::Pending.as_str(),
        ReservationStatus::Active.as_str(),
    ]
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_open_for_space(&self, space_id: Uuid) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::SpaceId.eq(space_id))
            .filter(reservation::Column::Status.is_in(open_statuses()))
            .order_by_asc(reservation::Column::StartTime)
            .order_by_asc(reservation::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_open_for_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::LotId.eq(lot_id))
            .filter(reservation::Column::Status.is_in(open_statuses()))
            .order_by_asc(reservation::Column::StartTime)
            .order_by_asc(reservation::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_by_driver(
        &self,
        driver_id: &str,
        status: Option<ReservationStatus>,
    ) -> DomainResult<Vec<Reservation>> {
        let mut query = reservation::Entity::find().filter(reservation::Column::DriverId.eq(driver_id));
        if let Some(status) = status {
            query = query.filter(reservation::Column::Status.eq(status.as_str()));
        }
        let models = query
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_asc(reservation::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservation::Column::EndTime.is_not_null())
            .filter(reservation::Column::EndTime.lt(now))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn apply(&self, transition: ReservationTransition) -> DomainResult<()> {
        let ReservationTransition {
            reservation: r,
            expected_status,
            space,
            expected_space_version,
        } = transition;
        debug!(
            "Applying reservation {}: {:?} -> {}, space {} -> {}",
            r.id, expected_status, r.status, space.id, space.state
        );

        let txn = self.db.begin().await.map_err(db_err)?;

        write_state(&txn, &space, expected_space_version).await?;

        match expected_status {
            None => match domain_to_active(&r).insert(&txn).await {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(stale("reservation", r.id)),
                Err(e) => return Err(db_err(e)),
            },
            Some(expected) => {
                let result = reservation::Entity::update_many()
                    .set(domain_to_active(&r))
                    .filter(reservation::Column::Id.eq(r.id))
                    .filter(reservation::Column::Status.eq(expected.as_str()))
                    .exec(&txn)
                    .await
                    .map_err(db_err)?;
                if result.rows_affected == 0 {
                    return Err(stale("reservation", r.id));
                }
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }
}
