//! Reservation HTTP handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::application::ParkingCore;
use crate::domain::reservation::ReleaseReason;
use crate::domain::{DomainError, Role};
use crate::interfaces::http::common::{ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::middleware::Authenticated;

use super::dto::*;

#[utoipa::path(
    post,
    path = "/api/v1/spaces/{space_id}/reservations",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("space_id" = Uuid, Path, description = "Space ID")),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation granted as Pending", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Invalid window"),
        (status = 403, description = "Caller is not a driver"),
        (status = 409, description = "Space not available or busy")
    )
)]
pub async fn create_reservation(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(space_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ReservationDto>>)> {
    principal.require(Role::Driver)?;
    let window = body.window(Utc::now())?;
    let reservation = core
        .reservations
        .reserve(space_id, &principal.id, window)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(reservation.into())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/mine",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(ReservationListQuery),
    responses(
        (status = 200, description = "Reservations of the calling driver, newest first", body = ApiResponse<Vec<ReservationDto>>),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Missing token")
    )
)]
pub async fn list_my_reservations(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Query(query): Query<ReservationListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ReservationDto>>>> {
    principal.require(Role::Driver)?;
    let status = query.status()?;
    let reservations = core
        .reservations
        .list_for_driver(&principal.id, status)
        .await?;
    Ok(Json(ApiResponse::success(
        reservations.into_iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/parkings/{parking_id}/reservations",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Open reservations of the lot", body = ApiResponse<Vec<ReservationDto>>),
        (status = 403, description = "Lot belongs to another owner")
    )
)]
pub async fn list_parking_reservations(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<ReservationDto>>>> {
    principal.require(Role::Owner)?;
    core.lots.ensure_owner(parking_id, &principal.id).await?;
    let reservations = core.reservations.list_open_for_lot(parking_id).await?;
    Ok(Json(ApiResponse::success(
        reservations.into_iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("reservation_id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Caller is neither the driver nor the lot owner"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ReservationDto>>> {
    let reservation = core
        .reservations
        .ensure_participant(reservation_id, &principal.id)
        .await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    security(("bearer_auth" = [])),
    params(("reservation_id" = Uuid, Path, description = "Reservation ID")),
    request_body = ReservationActionRequest,
    responses(
        (status = 200, description = "Reservation after the transition", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Transition not allowed from the current status"),
        (status = 403, description = "Caller is neither the driver nor the lot owner"),
        (status = 409, description = "Concurrent update, retry")
    )
)]
pub async fn transition_reservation(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(reservation_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ReservationActionRequest>,
) -> ApiResult<Json<ApiResponse<ReservationDto>>> {
    if body.reason.is_some() && body.action != ReservationAction::Release {
        return Err(DomainError::Validation("reason only applies to release".into()).into());
    }

    let manager = &core.reservations;
    let reservation = match body.action {
        ReservationAction::Confirm => {
            manager
                .ensure_participant(reservation_id, &principal.id)
                .await?;
            manager.confirm(reservation_id).await?
        }
        ReservationAction::Release => {
            manager
                .ensure_participant(reservation_id, &principal.id)
                .await?;
            let reason = body.reason.unwrap_or(ReleaseReason::CheckedOut);
            manager.release(reservation_id, reason).await?
        }
        ReservationAction::Cancel => manager.cancel(reservation_id, &principal.id).await?,
    };
    Ok(Json(ApiResponse::success(reservation.into())))
}
