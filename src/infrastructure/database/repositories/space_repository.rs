//! SeaORM implementation of SpaceRepository

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::parking_lot_repository::domain_to_active as lot_to_active;
use super::{corrupt, db_err, stale};
use crate::domain::parking::ParkingLot;
use crate::domain::space::{Space, SpaceRepository, SpaceState, SpaceType};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{parking_lot, space};

pub struct SeaOrmSpaceRepository {
    db: DatabaseConnection,
}

impl SeaOrmSpaceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: space::Model) -> DomainResult<Space> {
    let space_type = SpaceType::parse(&m.space_type)
        .ok_or_else(|| corrupt("space", m.id, format!("unknown type '{}'", m.space_type)))?;
    Ok(Space {
        id: m.id,
        lot_id: m.lot_id,
        space_type,
        index: u32::try_from(m.position).map_err(|e| corrupt("space", m.id, e))?,
        state: SpaceState::from_str(&m.state),
        version: m.version,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(s: &Space) -> space::ActiveModel {
    space::ActiveModel {
        id: Set(s.id),
        lot_id: Set(s.lot_id),
        space_type: Set(s.space_type.as_str().to_string()),
        position: Set(s.index as i32),
        state: Set(s.state.as_str().to_string()),
        version: Set(s.version),
        updated_at: Set(s.updated_at),
    }
}

/// Compare-and-set of a space's state. Shared with the reservation
/// repository, which moves a space inside its own transaction.
pub(crate) async fn write_state<C: ConnectionTrait>(
    conn: &C,
    next: &Space,
    expected_version: i32,
) -> DomainResult<()> {
    let result = space::Entity::update_many()
        .col_expr(space::Column::State, Expr::value(next.state.as_str()))
        .col_expr(space::Column::Version, Expr::value(next.version))
        .col_expr(space::Column::UpdatedAt, Expr::value(next.updated_at))
        .filter(space::Column::Id.eq(next.id))
        .filter(space::Column::Version.eq(expected_version))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    let exists = space::Entity::find_by_id(next.id)
        .one(conn)
        .await
        .map_err(db_err)?
        .is_some();
    if exists {
        Err(stale("space", next.id))
    } else {
        Err(DomainError::not_found("Space", next.id))
    }
}

// ── SpaceRepository impl ────────────────────────────────────────

#[async_trait]
impl SpaceRepository for SeaOrmSpaceRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Space>> {
        space::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_lot(&self, lot_id: Uuid) -> DomainResult<Vec<Space>> {
        space::Entity::find()
            .filter(space::Column::LotId.eq(lot_id))
            .order_by_asc(space::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    async fn replace_for_lot(
        &self,
        lot: ParkingLot,
        expected_lot_version: i32,
        spaces: Vec<Space>,
    ) -> DomainResult<()> {
        debug!(
            "Replacing spaces of lot {}: {} new spaces",
            lot.id,
            spaces.len()
        );

        let txn = self.db.begin().await.map_err(db_err)?;

        let held = space::Entity::find()
            .filter(space::Column::LotId.eq(lot.id))
            .filter(space::Column::State.ne(SpaceState::Available.as_str()))
            .count(&txn)
            .await
            .map_err(db_err)?;
        if held > 0 {
            return Err(DomainError::AlreadyConfigured(lot.id));
        }

        let lot_update = parking_lot::Entity::update_many()
            .set(lot_to_active(&lot)?)
            .filter(parking_lot::Column::Id.eq(lot.id))
            .filter(parking_lot::Column::Version.eq(expected_lot_version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if lot_update.rows_affected == 0 {
            let exists = parking_lot::Entity::find_by_id(lot.id)
                .one(&txn)
                .await
                .map_err(db_err)?
                .is_some();
            return Err(if exists {
                stale("parking lot", lot.id)
            } else {
                DomainError::not_found("ParkingLot", lot.id)
            });
        }

        let existing = space::Entity::find()
            .filter(space::Column::LotId.eq(lot.id))
            .count(&txn)
            .await
            .map_err(db_err)?;
        let removed = space::Entity::delete_many()
            .filter(space::Column::LotId.eq(lot.id))
            .filter(space::Column::State.eq(SpaceState::Available.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if removed.rows_affected != existing {
            // a space got held between the check and the delete
            return Err(DomainError::AlreadyConfigured(lot.id));
        }

        if !spaces.is_empty() {
            space::Entity::insert_many(spaces.iter().map(domain_to_active))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update_state(&self, space: Space, expected_version: i32) -> DomainResult<()> {
        debug!(
            "Updating space {} to {} (version {})",
            space.id, space.state, space.version
        );
        write_state(&self.db, &space, expected_version).await
    }

    async fn available_counts(&self, lot_id: Uuid) -> DomainResult<BTreeMap<SpaceType, u32>> {
        let models = space::Entity::find()
            .filter(space::Column::LotId.eq(lot_id))
            .filter(space::Column::State.eq(SpaceState::Available.as_str()))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut counts = BTreeMap::new();
        for m in models {
            if let Some(space_type) = SpaceType::parse(&m.space_type) {
                *counts.entry(space_type).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
