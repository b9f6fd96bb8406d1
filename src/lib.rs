use std::sync::Arc;

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

use application::{AuthService, OrderService};
use database::{OrderRepository, UserRepository};
use infrastructure::IdentityProvider;
use utils::TokenService;

pub mod application;
pub mod common;
pub mod config;
pub mod database;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub tokens: TokenService,
    pub auth: AuthService,
    pub orders: OrderService,
}

impl AppState {
    /// 账号与订单走存储接口，其余模块直接使用连接池
    pub fn new(
        pool: PgPool,
        config: Config,
        redis: RedisClient,
        users: Arc<dyn UserRepository>,
        orders: Arc<dyn OrderRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let tokens = TokenService::from_config(&config);
        Self {
            auth: AuthService::new(users, identity, tokens.clone()),
            orders: OrderService::new(orders),
            tokens,
            pool,
            config,
            redis: Arc::new(redis),
        }
    }
}
