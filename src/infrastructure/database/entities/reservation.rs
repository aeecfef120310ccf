//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,
    pub parking_location_id: String,
    pub spot_category: String,

    pub expires_at: DateTimeUtc,

    /// Reservation status: active, released
    pub status: String,

    /// cancelled or expired, set together with released_at
    #[sea_orm(nullable)]
    pub release_reason: Option<String>,

    pub created_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub released_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parking_location::Entity",
        from = "Column::ParkingLocationId",
        to = "super::parking_location::Column::Id"
    )]
    ParkingLocation,
}

impl Related<super::parking_location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParkingLocation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
