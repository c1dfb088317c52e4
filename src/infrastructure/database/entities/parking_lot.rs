//! Parking lot entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parking_lots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: String,
    pub name: String,

    #[sea_orm(nullable)]
    pub description: Option<String>,

    pub address: String,

    #[sea_orm(unique)]
    pub normalized_address: String,

    pub province: String,
    pub district: String,
    pub total_capacity: i32,

    /// JSON encoded `OperatingHours`
    pub operating_hours: String,
    /// JSON encoded `HourlyRate`
    pub hourly_rate: String,
    /// JSON object: service kind -> price in cents
    pub services: String,
    /// JSON object: space type -> hourly price in cents
    pub type_rates: String,

    /// Lot status: Draft, Active, Suspended
    pub status: String,
    pub version: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::space::Entity")]
    Spaces,
}

impl Related<super::space::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spaces.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
