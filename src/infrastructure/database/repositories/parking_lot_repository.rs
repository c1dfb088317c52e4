//! SeaORM implementation of ParkingLotRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::{corrupt, db_err, is_unique_violation, stale};
use crate::domain::parking::{LotStatus, ParkingLot, ParkingLotRepository};
use crate::domain::reservation::ReservationStatus;
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{parking_lot, reservation, space};

pub struct SeaOrmParkingLotRepository {
    db: DatabaseConnection,
}

impl SeaOrmParkingLotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

pub(crate) fn model_to_domain(m: parking_lot::Model) -> DomainResult<ParkingLot> {
    let id = m.id;
    let json = |field: &str, e: serde_json::Error| corrupt("parking lot", id, format!("{}: {}", field, e));

    Ok(ParkingLot {
        id: m.id,
        owner_id: m.owner_id,
        name: m.name,
        description: m.description,
        address: m.address,
        normalized_address: m.normalized_address,
        province: m.province,
        district: m.district,
        total_capacity: u32::try_from(m.total_capacity)
            .map_err(|e| corrupt("parking lot", id, e))?,
        operating_hours: serde_json::from_str(&m.operating_hours)
            .map_err(|e| json("operating_hours", e))?,
        hourly_rate: serde_json::from_str(&m.hourly_rate).map_err(|e| json("hourly_rate", e))?,
        services: serde_json::from_str(&m.services).map_err(|e| json("services", e))?,
        type_rates: serde_json::from_str(&m.type_rates).map_err(|e| json("type_rates", e))?,
        status: LotStatus::from_str(&m.status),
        version: m.version,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

pub(crate) fn domain_to_active(lot: &ParkingLot) -> DomainResult<parking_lot::ActiveModel> {
    let json = |e: serde_json::Error| {
        DomainError::Internal(format!("Cannot encode parking lot {}: {}", lot.id, e))
    };

    Ok(parking_lot::ActiveModel {
        id: Set(lot.id),
        owner_id: Set(lot.owner_id.clone()),
        name: Set(lot.name.clone()),
        description: Set(lot.description.clone()),
        address: Set(lot.address.clone()),
        normalized_address: Set(lot.normalized_address.clone()),
        province: Set(lot.province.clone()),
        district: Set(lot.district.clone()),
        total_capacity: Set(i32::try_from(lot.total_capacity).map_err(|e| {
            DomainError::Validation(format!("capacity {} is too large: {}", lot.total_capacity, e))
        })?),
        operating_hours: Set(serde_json::to_string(&lot.operating_hours).map_err(json)?),
        hourly_rate: Set(serde_json::to_string(&lot.hourly_rate).map_err(json)?),
        services: Set(serde_json::to_string(&lot.services).map_err(json)?),
        type_rates: Set(serde_json::to_string(&lot.type_rates).map_err(json)?),
        status: Set(lot.status.as_str().to_string()),
        version: Set(lot.version),
        created_at: Set(lot.created_at),
        updated_at: Set(lot.updated_at),
    })
}

fn collect(models: Vec<parking_lot::Model>) -> DomainResult<Vec<ParkingLot>> {
    models.into_iter().map(model_to_domain).collect()
}

// ── ParkingLotRepository impl ───────────────────────────────────

#[async_trait]
impl ParkingLotRepository for SeaOrmParkingLotRepository {
    async fn create(&self, lot: ParkingLot) -> DomainResult<()> {
        debug!("Saving parking lot: {} at {}", lot.id, lot.normalized_address);

        let model = domain_to_active(&lot)?;
        match model.insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::DuplicateAddress(lot.address)),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<ParkingLot>> {
        parking_lot::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_address(&self, normalized_address: &str) -> DomainResult<Option<ParkingLot>> {
        parking_lot::Entity::find()
            .filter(parking_lot::Column::NormalizedAddress.eq(normalized_address))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_owner(&self, owner_id: &str) -> DomainResult<Vec<ParkingLot>> {
        let models = parking_lot::Entity::find()
            .filter(parking_lot::Column::OwnerId.eq(owner_id))
            .order_by_asc(parking_lot::Column::CreatedAt)
            .order_by_asc(parking_lot::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        collect(models)
    }

    async fn find_by_status(&self, status: LotStatus) -> DomainResult<Vec<ParkingLot>> {
        let models = parking_lot::Entity::find()
            .filter(parking_lot::Column::Status.eq(status.as_str()))
            .order_by_asc(parking_lot::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        collect(models)
    }

    async fn update(&self, lot: ParkingLot, expected_version: i32) -> DomainResult<()> {
        debug!(
            "Updating parking lot: {} (version {} -> {})",
            lot.id, expected_version, lot.version
        );

        let model = domain_to_active(&lot)?;
        let result = parking_lot::Entity::update_many()
            .set(model)
            .filter(parking_lot::Column::Id.eq(lot.id))
            .filter(parking_lot::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await;

        match result {
            Ok(r) if r.rows_affected > 0 => Ok(()),
            Ok(_) => match self.find_by_id(lot.id).await? {
                Some(_) => Err(stale("parking lot", lot.id)),
                None => Err(DomainError::not_found("ParkingLot", lot.id)),
            },
            Err(e) if is_unique_violation(&e) => Err(DomainError::DuplicateAddress(lot.address)),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn delete_cascade(&self, lot_id: Uuid, now: DateTime<Utc>) -> DomainResult<u64> {
        debug!("Deleting parking lot {} with its spaces", lot_id);

        let txn = self.db.begin().await.map_err(db_err)?;

        let cancelled = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Cancelled.as_str()),
            )
            .col_expr(reservation::Column::UpdatedAt, Expr::value(now))
            .filter(reservation::Column::LotId.eq(lot_id))
            .filter(reservation::Column::Status.is_in([
                ReservationStatus::Pending.as_str(),
                ReservationStatus::Active.as_str(),
            ]))
            .exec(&txn)
            .await
            .map_err(db_err)?
            .rows_affected;

        space::Entity::delete_many()
            .filter(space::Column::LotId.eq(lot_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let removed = parking_lot::Entity::delete_by_id(lot_id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if removed.rows_affected == 0 {
            // dropping the transaction rolls the cancellations back
            return Err(DomainError::not_found("ParkingLot", lot_id));
        }

        txn.commit().await.map_err(db_err)?;
        Ok(cancelled)
    }
}
