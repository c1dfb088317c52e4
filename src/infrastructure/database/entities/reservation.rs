//! Reservation entity
//!
//! Not tied to `spaces` by a foreign key: reservations outlive the space
//! set they were made against (reconfiguration, lot removal).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub space_id: Uuid,
    pub lot_id: Uuid,
    pub driver_id: String,

    pub start_time: DateTimeUtc,

    /// Absent for walk-ins
    #[sea_orm(nullable)]
    pub end_time: Option<DateTimeUtc>,

    /// Reservation status: Pending, Active, Completed, Cancelled
    pub status: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
