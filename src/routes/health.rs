use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, common::ApiResponse, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// 存活检查，不访问数据库
pub async fn health(State(_state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    success_to_api_response(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
