//! Parking lot HTTP handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use futures_util::{StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::application::ParkingCore;
use crate::domain::Role;
use crate::interfaces::http::common::{ApiResponse, ApiResult, EmptyData, ValidatedJson};
use crate::interfaces::http::middleware::Authenticated;

use super::dto::*;

#[utoipa::path(
    post,
    path = "/api/v1/parkings",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    request_body = RegisterParkingRequest,
    responses(
        (status = 201, description = "Parking lot registered as draft", body = ApiResponse<ParkingLotDto>),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Caller is not an owner"),
        (status = 409, description = "Address already registered"),
        (status = 422, description = "Invalid body")
    )
)]
pub async fn register_parking(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    ValidatedJson(body): ValidatedJson<RegisterParkingRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ParkingLotDto>>)> {
    let lot = core.lots.register(&principal, body.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(lot.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/parkings",
    tag = "Parkings",
    params(SearchQuery),
    responses(
        (status = 200, description = "Active lots, cheapest first", body = ApiResponse<Vec<SearchHitDto>>),
        (status = 400, description = "Unknown filter value")
    )
)]
pub async fn search_parkings(
    State(core): State<ParkingCore>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ApiResponse<Vec<SearchHitDto>>>> {
    let (criteria, limit) = query.into_criteria()?;
    let hits: Vec<SearchHitDto> = core
        .search
        .search(criteria)
        .take(limit)
        .map_ok(SearchHitDto::from)
        .try_collect()
        .await?;
    Ok(Json(ApiResponse::success(hits)))
}

#[utoipa::path(
    get,
    path = "/api/v1/parkings/mine",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Lots of the calling owner", body = ApiResponse<Vec<ParkingLotDto>>),
        (status = 401, description = "Missing token")
    )
)]
pub async fn list_my_parkings(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
) -> ApiResult<Json<ApiResponse<Vec<ParkingLotDto>>>> {
    principal.require(Role::Owner)?;
    let lots = core.lots.list_by_owner(&principal.id).await?;
    Ok(Json(ApiResponse::success(
        lots.into_iter().map(ParkingLotDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/parkings/{parking_id}",
    tag = "Parkings",
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Parking lot", body = ApiResponse<ParkingLotDto>),
        (status = 404, description = "Parking lot not found")
    )
)]
pub async fn get_parking(
    State(core): State<ParkingCore>,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ParkingLotDto>>> {
    let lot = core.lots.get(parking_id).await?;
    Ok(Json(ApiResponse::success(lot.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/parkings/{parking_id}",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    request_body = UpdateParkingRequest,
    responses(
        (status = 200, description = "Updated parking lot", body = ApiResponse<ParkingLotDto>),
        (status = 400, description = "Capacity frozen or invalid value"),
        (status = 403, description = "Lot belongs to another owner"),
        (status = 409, description = "Address taken or concurrent update")
    )
)]
pub async fn update_parking(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateParkingRequest>,
) -> ApiResult<Json<ApiResponse<ParkingLotDto>>> {
    principal.require(Role::Owner)?;
    let lot = core
        .lots
        .update(parking_id, &principal.id, body.into())
        .await?;
    Ok(Json(ApiResponse::success(lot.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/parkings/{parking_id}",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Lot, spaces removed; open reservations cancelled", body = ApiResponse<EmptyData>),
        (status = 403, description = "Lot belongs to another owner"),
        (status = 404, description = "Parking lot not found")
    )
)]
pub async fn delete_parking(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<EmptyData>>> {
    principal.require(Role::Owner)?;
    core.lots.delete(parking_id, &principal.id).await?;
    Ok(Json(ApiResponse::success(EmptyData {})))
}

#[utoipa::path(
    post,
    path = "/api/v1/parkings/{parking_id}/deactivate",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Lot suspended", body = ApiResponse<ParkingLotDto>),
        (status = 403, description = "Lot belongs to another owner")
    )
)]
pub async fn deactivate_parking(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ParkingLotDto>>> {
    principal.require(Role::Owner)?;
    let lot = core.lots.deactivate(parking_id, &principal.id).await?;
    Ok(Json(ApiResponse::success(lot.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/parkings/{parking_id}/reactivate",
    tag = "Parkings",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Lot back to Active, or Draft when it has no spaces", body = ApiResponse<ParkingLotDto>),
        (status = 403, description = "Lot belongs to another owner")
    )
)]
pub async fn reactivate_parking(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ParkingLotDto>>> {
    principal.require(Role::Owner)?;
    let lot = core.lots.reactivate(parking_id, &principal.id).await?;
    Ok(Json(ApiResponse::success(lot.into())))
}
