use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

use super::model::{Address, AddressRequest};
use crate::{
    AppState,
    common::{ApiResponse, EmptyResponse},
    error::{AppError, AppResult},
    routes::customer_id,
    utils::{Claims, success_to_api_response},
};

type ApiJson<T> = Json<ApiResponse<T>>;

fn address_not_found() -> AppError {
    AppError::not_found("地址不存在")
}

#[axum::debug_handler]
pub async fn add_address(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AddressRequest>,
) -> AppResult<(StatusCode, ApiJson<Address>)> {
    let user_id = customer_id(&claims)?;
    let fields = req.validate()?;
    let address = Address::create(&state.pool, user_id, fields).await?;
    Ok((StatusCode::CREATED, success_to_api_response(address)))
}

#[axum::debug_handler]
pub async fn list_addresses(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<ApiJson<Vec<Address>>> {
    let user_id = customer_id(&claims)?;
    Ok(success_to_api_response(
        Address::list(&state.pool, user_id).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_address(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(address_id): Path<i64>,
) -> AppResult<ApiJson<Address>> {
    let user_id = customer_id(&claims)?;
    let address = Address::find(&state.pool, user_id, address_id)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(success_to_api_response(address))
}

#[axum::debug_handler]
pub async fn update_address(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(address_id): Path<i64>,
    Json(req): Json<AddressRequest>,
) -> AppResult<ApiJson<Address>> {
    let user_id = customer_id(&claims)?;
    let fields = req.validate()?;
    let address = Address::update(&state.pool, user_id, address_id, fields)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(success_to_api_response(address))
}

#[axum::debug_handler]
pub async fn set_default_address(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(address_id): Path<i64>,
) -> AppResult<ApiJson<Address>> {
    let user_id = customer_id(&claims)?;
    let address = Address::set_default(&state.pool, user_id, address_id)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(success_to_api_response(address))
}

#[axum::debug_handler]
pub async fn delete_address(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(address_id): Path<i64>,
) -> AppResult<ApiJson<EmptyResponse>> {
    let user_id = customer_id(&claims)?;
    if !Address::delete(&state.pool, user_id, address_id).await? {
        return Err(address_not_found());
    }
    Ok(success_to_api_response(EmptyResponse {}))
}
