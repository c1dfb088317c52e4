//! Create spaces table
//!
//! One row per typed space of a lot; removed together with the lot.

use sea_orm_migration::prelude::*;

use super::m20240601_000001_create_parking_lots::ParkingLots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Spaces::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Spaces::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Spaces::LotId).uuid().not_null())
                    .col(ColumnDef::new(Spaces::SpaceType).string().not_null())
                    .col(ColumnDef::new(Spaces::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Spaces::State)
                            .string()
                            .not_null()
                            .default("Available"),
                    )
                    .col(
                        ColumnDef::new(Spaces::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Spaces::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_spaces_parking_lot")
                            .from(Spaces::Table, Spaces::LotId)
                            .to(ParkingLots::Table, ParkingLots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_spaces_lot_position")
                    .table(Spaces::Table)
                    .col(Spaces::LotId)
                    .col(Spaces::Position)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Spaces::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Spaces {
    Table,
    Id,
    LotId,
    SpaceType,
    Position,
    State,
    Version,
    UpdatedAt,
}
