use axum::extract::{Extension, Json, Path, State};

use super::model::{
    AddToCartRequest, BatchDeleteRequest, CartItem, CartLine, DeletedResponse,
    SetQuantityRequest, MAX_CART_QUANTITY, check_quantity,
};
use crate::{
    AppState,
    common::ApiResponse,
    error::{AppError, AppResult},
    routes::{commodity_exists, customer_id},
    utils::{Claims, require_text, success_to_api_response},
};

type ApiJson<T> = Json<ApiResponse<T>>;

fn item_not_found() -> AppError {
    AppError::not_found("购物车商品不存在")
}

#[axum::debug_handler]
pub async fn add_to_cart(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AddToCartRequest>,
) -> AppResult<ApiJson<CartItem>> {
    let user_id = customer_id(&claims)?;
    let sku = require_text(&req.sku, "商品编号")?;
    check_quantity(req.quantity)?;
    if !commodity_exists(&state.pool, &sku).await? {
        return Err(AppError::not_found("商品不存在"));
    }

    let item = CartItem::add(&state.pool, user_id, &sku, req.quantity).await?;
    Ok(success_to_api_response(item))
}

#[axum::debug_handler]
pub async fn list_cart(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<ApiJson<Vec<CartLine>>> {
    let user_id = customer_id(&claims)?;
    Ok(success_to_api_response(
        CartItem::list(&state.pool, user_id).await?,
    ))
}

#[axum::debug_handler]
pub async fn set_quantity(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(req): Json<SetQuantityRequest>,
) -> AppResult<ApiJson<CartItem>> {
    let user_id = customer_id(&claims)?;
    check_quantity(req.quantity)?;
    let item = CartItem::set_quantity(&state.pool, user_id, item_id, req.quantity)
        .await?
        .ok_or_else(item_not_found)?;
    Ok(success_to_api_response(item))
}

#[axum::debug_handler]
pub async fn increase(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<ApiJson<CartItem>> {
    let user_id = customer_id(&claims)?;
    match CartItem::increase(&state.pool, user_id, item_id).await? {
        Some(item) => Ok(success_to_api_response(item)),
        None if CartItem::exists(&state.pool, user_id, item_id).await? => Err(
            AppError::validation(format!("商品数量不能超过{}", MAX_CART_QUANTITY)),
        ),
        None => Err(item_not_found()),
    }
}

#[axum::debug_handler]
pub async fn decrease(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<ApiJson<CartItem>> {
    let user_id = customer_id(&claims)?;
    match CartItem::decrease(&state.pool, user_id, item_id).await? {
        Some(item) => Ok(success_to_api_response(item)),
        None if CartItem::exists(&state.pool, user_id, item_id).await? => {
            Err(AppError::validation("商品数量已为1，不能再减少"))
        }
        None => Err(item_not_found()),
    }
}

#[axum::debug_handler]
pub async fn batch_delete(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteRequest>,
) -> AppResult<ApiJson<DeletedResponse>> {
    let user_id = customer_id(&claims)?;
    if req.ids.is_empty() {
        return Err(AppError::validation("请选择要删除的商品"));
    }
    let deleted = CartItem::delete_many(&state.pool, user_id, &req.ids).await?;
    Ok(success_to_api_response(DeletedResponse { deleted }))
}

#[axum::debug_handler]
pub async fn clear_cart(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> AppResult<ApiJson<DeletedResponse>> {
    let user_id = customer_id(&claims)?;
    let deleted = CartItem::clear(&state.pool, user_id).await?;
    Ok(success_to_api_response(DeletedResponse { deleted }))
}
