use axum::{
    extract::{Json, State},
    http::StatusCode,
};

use super::model::{AccessToken, RegisteredIp};
use crate::{
    AppState,
    common::ApiResponse,
    error::AppResult,
    middleware::ClientIp,
    utils::success_to_api_response,
};

#[axum::debug_handler]
pub async fn obtain_access_token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> AppResult<(StatusCode, Json<ApiResponse<AccessToken>>)> {
    let (token, created) = AccessToken::find_or_create(&state.pool, &ip).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, success_to_api_response(token)))
}

#[axum::debug_handler]
pub async fn list_registered_ips(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<RegisteredIp>>>> {
    Ok(success_to_api_response(
        AccessToken::list_ips(&state.pool).await?,
    ))
}
