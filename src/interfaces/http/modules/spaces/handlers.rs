//! Space HTTP handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::application::ParkingCore;
use crate::domain::space::Occupancy;
use crate::domain::Role;
use crate::interfaces::http::common::{ApiResponse, ApiResult, ValidatedJson};
use crate::interfaces::http::middleware::Authenticated;

use super::dto::*;

#[utoipa::path(
    get,
    path = "/api/v1/parkings/{parking_id}/spaces/suggestion",
    tag = "Spaces",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Default split of the lot capacity", body = ApiResponse<AllocationDto>),
        (status = 403, description = "Lot belongs to another owner"),
        (status = 404, description = "Parking lot not found")
    )
)]
pub async fn suggest_distribution(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AllocationDto>>> {
    principal.require(Role::Owner)?;
    core.lots.ensure_owner(parking_id, &principal.id).await?;
    let plan = core.allocator.suggested_distribution(parking_id).await?;
    Ok(Json(ApiResponse::success(plan.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/parkings/{parking_id}/spaces/config",
    tag = "Spaces",
    security(("bearer_auth" = [])),
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    request_body = ConfigureSpacesRequest,
    responses(
        (status = 201, description = "Spaces created; a draft lot becomes Active", body = ApiResponse<SpaceConfigurationDto>),
        (status = 400, description = "Counts do not match the capacity"),
        (status = 403, description = "Lot belongs to another owner"),
        (status = 409, description = "A space is already reserved or occupied")
    )
)]
pub async fn configure_spaces(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(parking_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ConfigureSpacesRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SpaceConfigurationDto>>)> {
    principal.require(Role::Owner)?;
    core.lots.ensure_owner(parking_id, &principal.id).await?;

    let plan = body.into_plan(parking_id)?;
    let set = core.allocator.configure(parking_id, plan).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SpaceConfigurationDto {
            parking: set.lot.into(),
            spaces: set.spaces.into_iter().map(SpaceDto::from).collect(),
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/parkings/{parking_id}/spaces",
    tag = "Spaces",
    params(("parking_id" = Uuid, Path, description = "Parking lot ID")),
    responses(
        (status = 200, description = "Spaces in index order with occupancy", body = ApiResponse<SpaceListDto>),
        (status = 404, description = "Parking lot not found")
    )
)]
pub async fn list_spaces(
    State(core): State<ParkingCore>,
    Path(parking_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<SpaceListDto>>> {
    let spaces = core.allocator.list_spaces(parking_id).await?;
    let occupancy = Occupancy::from_spaces(&spaces);
    Ok(Json(ApiResponse::success(SpaceListDto {
        occupancy: occupancy.into(),
        spaces: spaces.into_iter().map(SpaceDto::from).collect(),
    })))
}

#[utoipa::path(
    patch,
    path = "/api/v1/spaces/{space_id}/maintenance",
    tag = "Spaces",
    security(("bearer_auth" = [])),
    params(("space_id" = Uuid, Path, description = "Space ID")),
    request_body = MaintenanceRequest,
    responses(
        (status = 200, description = "Space state after the toggle", body = ApiResponse<SpaceDto>),
        (status = 400, description = "Space is reserved or occupied"),
        (status = 403, description = "Space belongs to another owner's lot")
    )
)]
pub async fn set_maintenance(
    State(core): State<ParkingCore>,
    Authenticated(principal): Authenticated,
    Path(space_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<MaintenanceRequest>,
) -> ApiResult<Json<ApiResponse<SpaceDto>>> {
    principal.require(Role::Owner)?;
    let space = core.allocator.get_space(space_id).await?;
    core.lots.ensure_owner(space.lot_id, &principal.id).await?;

    let space = core
        .allocator
        .set_out_of_service(space_id, body.out_of_service)
        .await?;
    Ok(Json(ApiResponse::success(space.into())))
}
