use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};

use super::model::{
    ActivityImage, ActivityListQuery, CreateActivityRequest, ReplaceCommoditiesRequest,
    parse_status_filter,
};
use crate::{
    AppState,
    common::ApiResponse,
    error::{AppError, AppResult},
    utils::success_to_api_response,
};

type ApiJson<T> = Json<ApiResponse<T>>;

fn activity_not_found() -> AppError {
    AppError::not_found("活动不存在")
}

#[axum::debug_handler]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityListQuery>,
) -> AppResult<ApiJson<Vec<ActivityImage>>> {
    let status = parse_status_filter(query.status.as_deref())?;
    Ok(success_to_api_response(
        ActivityImage::list(&state.pool, &state.redis, status).await?,
    ))
}

#[axum::debug_handler]
pub async fn create_activity(
    State(state): State<AppState>,
    Json(req): Json<CreateActivityRequest>,
) -> AppResult<(StatusCode, ApiJson<ActivityImage>)> {
    let activity = ActivityImage::create(&state.pool, &state.redis, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(activity)))
}

#[axum::debug_handler]
pub async fn activity_online(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiJson<ActivityImage>> {
    let activity = ActivityImage::set_online(&state.pool, &state.redis, id, true)
        .await?
        .ok_or_else(activity_not_found)?;
    Ok(success_to_api_response(activity))
}

#[axum::debug_handler]
pub async fn activity_offline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiJson<ActivityImage>> {
    let activity = ActivityImage::set_online(&state.pool, &state.redis, id, false)
        .await?
        .ok_or_else(activity_not_found)?;
    Ok(success_to_api_response(activity))
}

#[axum::debug_handler]
pub async fn replace_commodities(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ReplaceCommoditiesRequest>,
) -> AppResult<ApiJson<ActivityImage>> {
    let activity = ActivityImage::replace_commodities(&state.pool, &state.redis, id, req.commodities)
        .await?
        .ok_or_else(activity_not_found)?;
    Ok(success_to_api_response(activity))
}
