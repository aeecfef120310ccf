//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};

use crate::application::{ParkingQueries, ReservationAllocator, ReserveRequest};
use crate::domain::{DomainError, SpotCategory};
use crate::interfaces::http::common::{
    ApiError, ApiResponse, ApiResult, CurrentUser, ValidatedJson,
};

use super::dto::*;

#[derive(Clone)]
pub struct ReservationState {
    pub allocator: Arc<ReservationAllocator>,
    pub queries: Arc<ParkingQueries>,
    /// Used when the request names neither a duration nor an expiry time
    pub default_duration: Duration,
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    security(("user_id" = [])),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Invalid category or duration"),
        (status = 401, description = "Missing X-User-Id"),
        (status = 404, description = "Location not found"),
        (status = 409, description = "No capacity left or user already holds a reservation"),
        (status = 422, description = "Body failed validation"),
        (status = 503, description = "Store unavailable or contention did not settle")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationState>,
    CurrentUser(user_id): CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError> {
    let spot_category: SpotCategory = request.spot_category.parse()?;
    let duration = requested_duration(&request, state.default_duration, state.allocator.clock().now())?;

    let reservation = state
        .allocator
        .reserve(ReserveRequest {
            user_id,
            location_id: request.location_id,
            spot_category,
            duration,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(reservation.into())),
    ))
}

fn requested_duration(
    request: &CreateReservationRequest,
    default: Duration,
    now: DateTime<Utc>,
) -> Result<Duration, ApiError> {
    match (request.duration_minutes, request.expires_at.as_deref()) {
        (Some(_), Some(_)) => Err(ApiError::bad_request(
            "Give either duration_minutes or expires_at, not both",
        )),
        (Some(minutes), None) => Ok(Duration::minutes(minutes)),
        (None, Some(raw)) => {
            let expires_at = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| ApiError::bad_request(format!("Invalid expires_at: {}", e)))?
                .with_timezone(&Utc);
            Ok(expires_at - now)
        }
        (None, None) => Ok(default),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/active",
    tag = "Reservations",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Active reservation, or null data when there is none", body = ApiResponse<ActiveReservationDto>),
        (status = 401, description = "Missing X-User-Id")
    )
)]
pub async fn get_active_reservation(
    State(state): State<ReservationState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Option<ActiveReservationDto>> {
    let view = state.queries.active_reservation(&user_id).await?;
    Ok(Json(ApiResponse::success(view.map(Into::into))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    security(("user_id" = [])),
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<ReservationState>,
    CurrentUser(user_id): CurrentUser,
    Path(reservation_id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.queries.get_reservation(&reservation_id).await?;
    if reservation.user_id != user_id {
        return Err(DomainError::Forbidden("reservation belongs to another user".into()).into());
    }
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    security(("user_id" = [])),
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation released (repeat calls are no-ops)", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Reservation not found"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn cancel_reservation(
    State(state): State<ReservationState>,
    CurrentUser(user_id): CurrentUser,
    Path(reservation_id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.queries.get_reservation(&reservation_id).await?;
    if reservation.user_id != user_id {
        return Err(DomainError::Forbidden("only the owner may cancel a reservation".into()).into());
    }

    state.allocator.cancel(&reservation_id).await?;

    let released = state.queries.get_reservation(&reservation_id).await?;
    Ok(Json(ApiResponse::success(released.into())))
}
