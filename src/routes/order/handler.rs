use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::routes::customer_id;
use crate::{
    AppState,
    application::Actor,
    common::{ApiResponse, PaginatedResponse},
    error::AppResult,
    models::order::{
        BatchOrdersRequest, CreateOrderRequest, CreateOrderResponse, ListOrdersQuery, Order,
        PayOrderRequest, ShipOrderRequest, UpdateExpressRequest, UpdateReceiverRequest,
    },
    utils::{Claims, success_to_api_response},
};

type ApiJson<T> = Json<ApiResponse<T>>;

#[axum::debug_handler]
pub async fn create_order(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, ApiJson<CreateOrderResponse>)> {
    let user_id = customer_id(&claims)?;
    let order = state.orders.create(user_id, req).await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response(CreateOrderResponse {
            order_id: order.order_id,
            status: order.status,
            order_time: order.order_time,
        }),
    ))
}

#[axum::debug_handler]
pub async fn list_orders(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<ApiJson<PaginatedResponse<Order>>> {
    let actor = Actor::from_claims(&claims)?;
    Ok(success_to_api_response(state.orders.list(&actor, query).await?))
}

#[axum::debug_handler]
pub async fn batch_orders(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<BatchOrdersRequest>,
) -> AppResult<ApiJson<Vec<Order>>> {
    let actor = Actor::from_claims(&claims)?;
    Ok(success_to_api_response(state.orders.batch(&actor, req).await?))
}

#[axum::debug_handler]
pub async fn get_order(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ApiJson<Order>> {
    let actor = Actor::from_claims(&claims)?;
    Ok(success_to_api_response(state.orders.get(&actor, &order_id).await?))
}

#[axum::debug_handler]
pub async fn pay_order(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    body: Option<Json<PayOrderRequest>>,
) -> AppResult<ApiJson<Order>> {
    let actor = Actor::from_claims(&claims)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(success_to_api_response(
        state.orders.pay(&actor, &order_id, req).await?,
    ))
}

#[axum::debug_handler]
pub async fn cancel_order(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ApiJson<Order>> {
    let actor = Actor::from_claims(&claims)?;
    Ok(success_to_api_response(
        state.orders.cancel(&actor, &order_id).await?,
    ))
}

#[axum::debug_handler]
pub async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<ShipOrderRequest>,
) -> AppResult<ApiJson<Order>> {
    Ok(success_to_api_response(
        state.orders.ship(&order_id, req).await?,
    ))
}

#[axum::debug_handler]
pub async fn deliver_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ApiJson<Order>> {
    Ok(success_to_api_response(state.orders.deliver(&order_id).await?))
}

#[axum::debug_handler]
pub async fn update_receiver(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateReceiverRequest>,
) -> AppResult<ApiJson<Order>> {
    let actor = Actor::from_claims(&claims)?;
    Ok(success_to_api_response(
        state.orders.update_receiver(&actor, &order_id, req).await?,
    ))
}

#[axum::debug_handler]
pub async fn update_express(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateExpressRequest>,
) -> AppResult<ApiJson<Order>> {
    Ok(success_to_api_response(
        state.orders.update_express(&order_id, req).await?,
    ))
}
