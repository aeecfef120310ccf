//! Reservation DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::ActiveReservationView;
use crate::domain::Reservation;

/// Request to reserve a spot.
///
/// Give either `duration_minutes` or `expires_at`; with neither the
/// configured default duration applies.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub location_id: String,
    /// Spot category (`regular`, `electric-vehicle`, `ev`, ...)
    #[validate(length(min = 1, message = "must not be empty"))]
    pub spot_category: String,
    #[validate(range(min = 1, max = 525600, message = "must be between 1 minute and 1 year"))]
    pub duration_minutes: Option<i64>,
    /// Absolute expiry time (RFC 3339)
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub user_id: String,
    pub location_id: String,
    pub spot_category: String,
    /// `active` or `released`
    pub status: String,
    /// `cancelled` or `expired` once released
    pub release_reason: Option<String>,
    pub expires_at: String,
    pub created_at: String,
    pub released_at: Option<String>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            location_id: r.parking_location_id,
            spot_category: r.spot_category.as_str().to_string(),
            status: r.status.as_str().to_string(),
            release_reason: r.release_reason.map(|reason| reason.as_str().to_string()),
            expires_at: r.expires_at.to_rfc3339(),
            created_at: r.created_at.to_rfc3339(),
            released_at: r.released_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// The caller's active reservation with its live countdown
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveReservationDto {
    pub reservation: ReservationDto,
    pub location_name: Option<String>,
    pub seconds_remaining: i64,
    /// e.g. `9m 58s`
    pub countdown: String,
}

impl From<ActiveReservationView> for ActiveReservationDto {
    fn from(view: ActiveReservationView) -> Self {
        Self {
            reservation: view.reservation.into(),
            location_name: view.location_name,
            seconds_remaining: view.seconds_remaining,
            countdown: view.countdown,
        }
    }
}
