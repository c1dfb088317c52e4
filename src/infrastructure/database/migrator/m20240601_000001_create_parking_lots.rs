//! Create parking_lots table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ParkingLots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParkingLots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ParkingLots::OwnerId).string().not_null())
                    .col(ColumnDef::new(ParkingLots::Name).string().not_null())
                    .col(ColumnDef::new(ParkingLots::Description).text())
                    .col(ColumnDef::new(ParkingLots::Address).string().not_null())
                    .col(
                        ColumnDef::new(ParkingLots::NormalizedAddress)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ParkingLots::Province).string().not_null())
                    .col(ColumnDef::new(ParkingLots::District).string().not_null())
                    .col(
                        ColumnDef::new(ParkingLots::TotalCapacity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::OperatingHours)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ParkingLots::HourlyRate).text().not_null())
                    .col(
                        ColumnDef::new(ParkingLots::Services)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::TypeRates)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::Status)
                            .string()
                            .not_null()
                            .default("Draft"),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParkingLots::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parking_lots_owner")
                    .table(ParkingLots::Table)
                    .col(ParkingLots::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parking_lots_status")
                    .table(ParkingLots::Table)
                    .col(ParkingLots::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ParkingLots::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ParkingLots {
    Table,
    Id,
    OwnerId,
    Name,
    Description,
    Address,
    NormalizedAddress,
    Province,
    District,
    TotalCapacity,
    OperatingHours,
    HourlyRate,
    Services,
    TypeRates,
    Status,
    Version,
    CreatedAt,
    UpdatedAt,
}
