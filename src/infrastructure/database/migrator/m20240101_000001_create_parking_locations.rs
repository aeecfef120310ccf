//! Create parking_locations table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ParkingLocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParkingLocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ParkingLocations::Name).string().not_null())
                    .col(ColumnDef::new(ParkingLocations::Address).string())
                    .col(ColumnDef::new(ParkingLocations::Latitude).double().not_null())
                    .col(ColumnDef::new(ParkingLocations::Longitude).double().not_null())
                    .col(ColumnDef::new(ParkingLocations::PhotoUrl).string())
                    .col(
                        ColumnDef::new(ParkingLocations::Capacity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParkingLocations::Available)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParkingLocations::CategoryCounts)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(ParkingLocations::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParkingLocations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParkingLocations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(Expr::col(ParkingLocations::Available).gte(0))
                    .check(
                        Expr::col(ParkingLocations::Available)
                            .lte(Expr::col(ParkingLocations::Capacity)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_parking_locations_name")
                    .table(ParkingLocations::Table)
                    .col(ParkingLocations::Name)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ParkingLocations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ParkingLocations {
    Table,
    Id,
    Name,
    Address,
    Latitude,
    Longitude,
    PhotoUrl,
    Capacity,
    Available,
    CategoryCounts,
    Version,
    CreatedAt,
    UpdatedAt,
}
