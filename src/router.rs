use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors, require_operator},
    routes,
};

// 无需登录的路由
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health))
        // 账号
        .route("/auth/register", post(routes::user::register))
        .route("/auth/login", post(routes::user::login))
        .route("/auth/wechat-login", post(routes::user::wechat_login))
        .route("/auth/refresh", post(routes::user::refresh_token))
        .route("/access-token", post(routes::access_token::obtain_access_token))
        // 商品浏览
        .route("/commodities/search", get(routes::commodity::search_commodities))
        .route("/commodities/categories", get(routes::commodity::list_categories))
        .route("/commodities/batch", post(routes::commodity::batch_commodities))
        .route("/commodities/{id}", get(routes::commodity::get_commodity))
        .route("/activities", get(routes::activity::list_activities))
        .route("/operators/login", post(routes::operator::operator_login))
}

// 登录顾客使用的路由
fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(routes::user::me).put(routes::user::update_me),
        )
        // 购物车
        .route(
            "/cart",
            get(routes::cart::list_cart)
                .post(routes::cart::add_to_cart)
                .delete(routes::cart::clear_cart),
        )
        .route("/cart/batch-delete", post(routes::cart::batch_delete))
        .route("/cart/{id}", put(routes::cart::set_quantity))
        .route("/cart/{id}/increase", post(routes::cart::increase))
        .route("/cart/{id}/decrease", post(routes::cart::decrease))
        // 收货地址
        .route(
            "/addresses",
            get(routes::address::list_addresses).post(routes::address::add_address),
        )
        .route(
            "/addresses/{id}",
            get(routes::address::get_address)
                .put(routes::address::update_address)
                .delete(routes::address::delete_address),
        )
        .route("/addresses/{id}/default", post(routes::address::set_default_address))
        // 订单
        .route(
            "/orders",
            get(routes::order::list_orders).post(routes::order::create_order),
        )
        .route("/orders/batch", post(routes::order::batch_orders))
        .route("/orders/{id}", get(routes::order::get_order))
        .route("/orders/{id}/pay", post(routes::order::pay_order))
        .route("/orders/{id}/cancel", post(routes::order::cancel_order))
        .route("/orders/{id}/receiver", put(routes::order::update_receiver))
}

// 仅限运营账号的路由
fn operator_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/ship", post(routes::order::ship_order))
        .route("/orders/{id}/deliver", post(routes::order::deliver_order))
        .route("/orders/{id}/express", put(routes::order::update_express))
        .route("/users/by-mobile", get(routes::user::find_by_mobile))
        .route("/users/{id}", get(routes::user::get_user))
        // 商品管理
        .route("/commodities", post(routes::commodity::create_commodity))
        .route(
            "/commodities/{id}",
            put(routes::commodity::update_commodity).delete(routes::commodity::delete_commodity),
        )
        .route("/commodities/{id}/online", post(routes::commodity::put_online))
        .route("/commodities/{id}/offline", post(routes::commodity::take_offline))
        .route("/commodities/{id}/status", get(routes::commodity::commodity_status))
        // 活动图
        .route("/activities", post(routes::activity::create_activity))
        .route("/activities/{id}/online", post(routes::activity::activity_online))
        .route("/activities/{id}/offline", post(routes::activity::activity_offline))
        .route(
            "/activities/{id}/commodities",
            put(routes::activity::replace_commodities),
        )
        // 运营账号
        .route("/operators", post(routes::operator::create_operator))
        .route("/operators/password", post(routes::operator::change_password))
        .route("/access-token/ips", get(routes::access_token::list_registered_ips))
        .layer(from_fn(require_operator))
}

/// 组装全部路由；限流与 CORS 由启动代码按环境追加
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(customer_routes())
        .merge(operator_routes())
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes()).merge(protected),
        )
        .layer(from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
