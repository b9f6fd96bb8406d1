use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::routes::customer_id;
use crate::{
    AppState,
    common::ApiResponse,
    error::AppResult,
    models::user::{
        LoginRequest, LoginResponse, MobileQuery, RefreshRequest, RefreshResponse,
        RegisterRequest, RegisterResponse, UpdateProfileRequest, User, WechatLoginRequest,
    },
    utils::{Claims, success_to_api_response},
};

type ApiJson<T> = Json<ApiResponse<T>>;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, ApiJson<RegisterResponse>)> {
    let created = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(created)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiJson<LoginResponse>> {
    Ok(success_to_api_response(state.auth.login(req).await?))
}

#[axum::debug_handler]
pub async fn wechat_login(
    State(state): State<AppState>,
    Json(req): Json<WechatLoginRequest>,
) -> AppResult<ApiJson<LoginResponse>> {
    Ok(success_to_api_response(state.auth.wechat_login(req).await?))
}

#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiJson<RefreshResponse>> {
    Ok(success_to_api_response(
        state.auth.refresh(req.refresh.as_deref())?,
    ))
}

#[axum::debug_handler]
pub async fn me(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<ApiJson<User>> {
    let user_id = customer_id(&claims)?;
    Ok(success_to_api_response(state.auth.profile(user_id).await?))
}

#[axum::debug_handler]
pub async fn update_me(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<ApiJson<User>> {
    let user_id = customer_id(&claims)?;
    Ok(success_to_api_response(
        state.auth.update_profile(user_id, req).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<ApiJson<User>> {
    Ok(success_to_api_response(state.auth.profile(user_id).await?))
}

#[axum::debug_handler]
pub async fn find_by_mobile(
    State(state): State<AppState>,
    Query(query): Query<MobileQuery>,
) -> AppResult<ApiJson<User>> {
    Ok(success_to_api_response(
        state.auth.find_by_mobile(&query.mobile).await?,
    ))
}
