use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use super::model::{
    ChangePasswordRequest, CreateOperatorRequest, OperationUser, OperatorLoginRequest,
    OperatorLoginResponse,
};
use crate::{
    AppState,
    common::{ApiResponse, EmptyResponse},
    error::{AppError, AppResult},
    utils::{Claims, Role, hash_password, is_valid_mobile, success_to_api_response, verify_password},
};

type ApiJson<T> = Json<ApiResponse<T>>;

#[axum::debug_handler]
pub async fn operator_login(
    State(state): State<AppState>,
    Json(req): Json<OperatorLoginRequest>,
) -> AppResult<ApiJson<OperatorLoginResponse>> {
    let mobile = req.mobile.trim();
    if !is_valid_mobile(mobile) {
        return Err(AppError::validation("手机号格式不正确"));
    }

    let operator = OperationUser::find_by_mobile(&state.pool, mobile)
        .await?
        .ok_or_else(|| AppError::not_found("运营账号不存在"))?;

    if !operator.is_active {
        return Err(AppError::Unauthorized("账号已停用".into()));
    }
    if !verify_password(&req.password, &operator.password_hash).await? {
        return Err(AppError::Unauthorized("密码错误".into()));
    }

    let tokens = state.tokens.issue(&operator.user_id, Role::Operator)?;
    tracing::info!("Operator {} signed in", operator.user_id);

    Ok(success_to_api_response(OperatorLoginResponse {
        user_id: operator.user_id,
        user_type: operator.user_type,
        access: tokens.access,
        refresh: tokens.refresh,
    }))
}

#[axum::debug_handler]
pub async fn create_operator(
    State(state): State<AppState>,
    Json(req): Json<CreateOperatorRequest>,
) -> AppResult<(StatusCode, ApiJson<OperationUser>)> {
    req.validate()?;
    let password_hash = hash_password(&req.password).await?;
    let operator = OperationUser::create(&state.pool, &req, &password_hash).await?;
    Ok((StatusCode::CREATED, success_to_api_response(operator)))
}

#[axum::debug_handler]
pub async fn change_password(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<ApiJson<EmptyResponse>> {
    req.validate()?;

    let operator = OperationUser::find(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::not_found("运营账号不存在"))?;
    if !verify_password(&req.old_password, &operator.password_hash).await? {
        return Err(AppError::Unauthorized("原密码错误".into()));
    }

    let password_hash = hash_password(&req.new_password).await?;
    if !OperationUser::update_password(&state.pool, &operator.user_id, &password_hash).await? {
        return Err(AppError::not_found("运营账号不存在"));
    }

    tracing::info!("Operator {} changed password", operator.user_id);
    Ok(success_to_api_response(EmptyResponse {}))
}
