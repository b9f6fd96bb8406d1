use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};

use super::model::{
    BatchRequest, Commodity, CommodityDetail, CommoditySituation, CreateCommodityRequest,
    SearchQuery, UpdateCommodityRequest,
};
use crate::{
    AppState,
    common::{ApiResponse, EmptyResponse, PageRequest, PaginatedResponse},
    error::{AppError, AppResult},
    utils::success_to_api_response,
};

type ApiJson<T> = Json<ApiResponse<T>>;

async fn existing(state: &AppState, commodity_id: &str) -> AppResult<Commodity> {
    Commodity::find(&state.pool, commodity_id)
        .await?
        .ok_or_else(|| AppError::not_found("商品不存在"))
}

#[axum::debug_handler]
pub async fn get_commodity(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
) -> AppResult<ApiJson<CommodityDetail>> {
    let commodity = existing(&state, &commodity_id).await?;
    let situation = CommoditySituation::get_or_create(&state.pool, &commodity_id).await?;
    Ok(success_to_api_response(CommodityDetail {
        commodity,
        situation,
    }))
}

#[axum::debug_handler]
pub async fn search_commodities(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiJson<PaginatedResponse<Commodity>>> {
    let page = PageRequest::new(query.page, query.page_size);
    let (items, total) = Commodity::search(&state.pool, &query.name, page).await?;
    Ok(success_to_api_response(page.paginate(items, total)))
}

#[axum::debug_handler]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<ApiJson<Vec<String>>> {
    let categories = Commodity::categories(&state.pool, &state.redis).await?;
    Ok(success_to_api_response(categories))
}

#[axum::debug_handler]
pub async fn batch_commodities(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> AppResult<ApiJson<Vec<Commodity>>> {
    let ids = req.validated_ids()?;
    Ok(success_to_api_response(
        Commodity::find_many(&state.pool, &ids).await?,
    ))
}

#[axum::debug_handler]
pub async fn create_commodity(
    State(state): State<AppState>,
    Json(req): Json<CreateCommodityRequest>,
) -> AppResult<(StatusCode, ApiJson<Commodity>)> {
    req.validate()?;
    let commodity = Commodity::create(&state.pool, &state.redis, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(commodity)))
}

#[axum::debug_handler]
pub async fn update_commodity(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
    Json(req): Json<UpdateCommodityRequest>,
) -> AppResult<ApiJson<Commodity>> {
    let update = req.validate()?;
    let commodity = Commodity::update(&state.pool, &state.redis, &commodity_id, &update)
        .await?
        .ok_or_else(|| AppError::not_found("商品不存在"))?;
    Ok(success_to_api_response(commodity))
}

#[axum::debug_handler]
pub async fn delete_commodity(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
) -> AppResult<ApiJson<EmptyResponse>> {
    if !Commodity::delete(&state.pool, &state.redis, &commodity_id).await? {
        return Err(AppError::not_found("商品不存在"));
    }
    Ok(success_to_api_response(EmptyResponse {}))
}

#[axum::debug_handler]
pub async fn put_online(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
) -> AppResult<ApiJson<CommoditySituation>> {
    existing(&state, &commodity_id).await?;
    Ok(success_to_api_response(
        CommoditySituation::set_online(&state.pool, &commodity_id, true).await?,
    ))
}

#[axum::debug_handler]
pub async fn take_offline(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
) -> AppResult<ApiJson<CommoditySituation>> {
    existing(&state, &commodity_id).await?;
    Ok(success_to_api_response(
        CommoditySituation::set_online(&state.pool, &commodity_id, false).await?,
    ))
}

#[axum::debug_handler]
pub async fn commodity_status(
    State(state): State<AppState>,
    Path(commodity_id): Path<String>,
) -> AppResult<ApiJson<CommoditySituation>> {
    existing(&state, &commodity_id).await?;
    Ok(success_to_api_response(
        CommoditySituation::get_or_create(&state.pool, &commodity_id).await?,
    ))
}
