//! SeaORM implementation of ReservationStore
//!
//! Every mutation runs inside one database transaction and starts with a
//! conditional UPDATE, so the write lock is taken before anything is read.
//! The capacity check lives in that UPDATE's filter, which makes the
//! decrement atomic without comparing against an earlier read.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::domain::{
    Coordinates, DomainError, DomainResult, ParkingLocation, ReleaseOutcome, ReleaseReason,
    Reservation, ReservationStatus, ReservationStore, SpotCategory,
};
use crate::infrastructure::database::entities::{parking_location, reservation};
use crate::shared::{db_err, InfraError};

pub struct SeaOrmReservationStore {
    db: DatabaseConnection,
}

impl SeaOrmReservationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn location_to_domain(m: parking_location::Model) -> DomainResult<ParkingLocation> {
    let category_counts: BTreeMap<SpotCategory, i32> =
        serde_json::from_str(&m.category_counts).map_err(InfraError::from)?;
    Ok(ParkingLocation {
        id: m.id,
        name: m.name,
        address: m.address,
        coordinates: Coordinates {
            latitude: m.latitude,
            longitude: m.longitude,
        },
        photo_url: m.photo_url,
        capacity: m.capacity,
        available: m.available,
        category_counts,
        version: m.version,
        updated_at: m.updated_at,
    })
}

fn corrupt_row(id: &str, column: &str, value: &str) -> DomainError {
    DomainError::Unavailable(format!(
        "reservation {} has unreadable {} '{}'",
        id, column, value
    ))
}

fn reservation_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let spot_category: SpotCategory = m
        .spot_category
        .parse()
        .map_err(|_| corrupt_row(&m.id, "spot_category", &m.spot_category))?;
    let status = ReservationStatus::parse(&m.status)
        .ok_or_else(|| corrupt_row(&m.id, "status", &m.status))?;
    let release_reason = match m.release_reason.as_deref() {
        None => None,
        Some(raw) => Some(
            ReleaseReason::parse(raw).ok_or_else(|| corrupt_row(&m.id, "release_reason", raw))?,
        ),
    };
    Ok(Reservation {
        id: m.id,
        user_id: m.user_id,
        parking_location_id: m.parking_location_id,
        spot_category,
        expires_at: m.expires_at,
        status,
        release_reason,
        created_at: m.created_at,
        released_at: m.released_at,
    })
}

fn reservation_to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id.clone()),
        user_id: Set(r.user_id.clone()),
        parking_location_id: Set(r.parking_location_id.clone()),
        spot_category: Set(r.spot_category.as_str().to_string()),
        expires_at: Set(r.expires_at),
        status: Set(r.status.as_str().to_string()),
        release_reason: Set(r.release_reason.map(|reason| reason.as_str().to_string())),
        created_at: Set(r.created_at),
        released_at: Set(r.released_at),
    }
}

async fn load_location(txn: &DatabaseTransaction, id: &str) -> DomainResult<ParkingLocation> {
    let model = parking_location::Entity::find_by_id(id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| DomainError::location_not_found(id))?;
    location_to_domain(model)
}

async fn load_reservation(txn: &DatabaseTransaction, id: &str) -> DomainResult<Reservation> {
    reservation::Entity::find_by_id(id)
        .one(txn)
        .await
        .map_err(db_err)?
        .map(reservation_to_domain)
        .transpose()?
        .ok_or_else(|| DomainError::reservation_not_found(id))
}

async fn reserve_in(txn: &DatabaseTransaction, r: &Reservation) -> DomainResult<ParkingLocation> {
    let claimed = parking_location::Entity::update_many()
        .col_expr(
            parking_location::Column::Available,
            Expr::col(parking_location::Column::Available).sub(1),
        )
        .col_expr(
            parking_location::Column::Version,
            Expr::col(parking_location::Column::Version).add(1),
        )
        .col_expr(parking_location::Column::UpdatedAt, Expr::value(r.created_at))
        .filter(parking_location::Column::Id.eq(r.parking_location_id.as_str()))
        .filter(parking_location::Column::Available.gt(0))
        .exec(txn)
        .await
        .map_err(db_err)?;

    if claimed.rows_affected == 0 {
        let current = load_location(txn, &r.parking_location_id).await?;
        return Err(DomainError::NoCapacity(current.id));
    }

    let existing = reservation::Entity::find()
        .filter(reservation::Column::UserId.eq(r.user_id.as_str()))
        .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
        .one(txn)
        .await
        .map_err(db_err)?;
    if existing.is_some() {
        return Err(DomainError::AlreadyReserved(r.user_id.clone()));
    }

    reservation_to_active(r).insert(txn).await.map_err(db_err)?;
    load_location(txn, &r.parking_location_id).await
}

async fn release_in(
    txn: &DatabaseTransaction,
    reservation_id: &str,
    released_at: DateTime<Utc>,
    reason: ReleaseReason,
) -> DomainResult<ReleaseOutcome> {
    let flipped = reservation::Entity::update_many()
        .col_expr(
            reservation::Column::Status,
            Expr::value(ReservationStatus::Released.as_str()),
        )
        .col_expr(reservation::Column::ReleaseReason, Expr::value(reason.as_str()))
        .col_expr(reservation::Column::ReleasedAt, Expr::value(released_at))
        .filter(reservation::Column::Id.eq(reservation_id))
        .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
        .exec(txn)
        .await
        .map_err(db_err)?;

    let reservation = load_reservation(txn, reservation_id).await?;
    if flipped.rows_affected == 0 {
        return Ok(ReleaseOutcome::AlreadyReleased(reservation));
    }

    let returned = parking_location::Entity::update_many()
        .col_expr(
            parking_location::Column::Available,
            Expr::col(parking_location::Column::Available).add(1),
        )
        .col_expr(
            parking_location::Column::Version,
            Expr::col(parking_location::Column::Version).add(1),
        )
        .col_expr(parking_location::Column::UpdatedAt, Expr::value(released_at))
        .filter(parking_location::Column::Id.eq(reservation.parking_location_id.as_str()))
        .filter(
            Expr::col(parking_location::Column::Available)
                .lt(Expr::col(parking_location::Column::Capacity)),
        )
        .exec(txn)
        .await
        .map_err(db_err)?;
    if returned.rows_affected == 0 {
        warn!(
            "Location {} already at capacity while releasing {}",
            reservation.parking_location_id, reservation_id
        );
    }

    let location = load_location(txn, &reservation.parking_location_id).await?;
    Ok(ReleaseOutcome::Released {
        reservation,
        location,
    })
}

/// Commit on `Ok`, roll back on `Err`.
async fn finish<T>(txn: DatabaseTransaction, result: DomainResult<T>) -> DomainResult<T> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(db_err)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = txn.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

// ── ReservationStore impl ───────────────────────────────────────

#[async_trait]
impl ReservationStore for SeaOrmReservationStore {
    async fn seed_location(&self, location: ParkingLocation) -> DomainResult<bool> {
        location.validate()?;

        let existing = parking_location::Entity::find_by_id(location.id.as_str())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Ok(false);
        }

        debug!("Seeding parking location: {}", location.id);
        let category_counts =
            serde_json::to_string(&location.category_counts).map_err(InfraError::from)?;
        let now = Utc::now();
        let model = parking_location::ActiveModel {
            id: Set(location.id),
            name: Set(location.name),
            address: Set(location.address),
            latitude: Set(location.coordinates.latitude),
            longitude: Set(location.coordinates.longitude),
            photo_url: Set(location.photo_url),
            capacity: Set(location.capacity),
            available: Set(location.available),
            category_counts: Set(category_counts),
            version: Set(location.version),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(true)
    }

    async fn find_location(&self, id: &str) -> DomainResult<Option<ParkingLocation>> {
        parking_location::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(location_to_domain)
            .transpose()
    }

    async fn list_locations(&self) -> DomainResult<Vec<ParkingLocation>> {
        parking_location::Entity::find()
            .order_by_asc(parking_location::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(location_to_domain)
            .collect()
    }

    async fn find_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(reservation_to_domain).transpose()
    }

    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Reservation>> {
        let model = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(reservation_to_domain).transpose()
    }

    async fn find_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .filter(reservation::Column::ExpiresAt.lte(now))
            .order_by_asc(reservation::Column::ExpiresAt)
            .limit(limit as u64)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models.into_iter().map(reservation_to_domain).collect()
    }

    async fn commit_reserve(&self, reservation: &Reservation) -> DomainResult<ParkingLocation> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let result = reserve_in(&txn, reservation).await;
        finish(txn, result).await
    }

    async fn commit_release(
        &self,
        reservation_id: &str,
        released_at: DateTime<Utc>,
        reason: ReleaseReason,
    ) -> DomainResult<ReleaseOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let result = release_in(&txn, reservation_id, released_at, reason).await;
        finish(txn, result).await
    }
}
