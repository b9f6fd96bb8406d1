use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;
use std::net::SocketAddr;

use super::client_ip::client_ip;
use crate::{config::Config, error::AppError};

/// 基于 Redis 的固定窗口限流，按客户端IP计数
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: Config) -> Self {
        Self {
            redis: Arc::new(redis),
            config: Arc::new(config),
        }
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, AppError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let ip = client_ip(req.headers(), peer)
            .or_else(|| peer.map(|addr| addr.ip()))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let key = format!("rate_limit:{}", ip);
        let window = self.config.rate_limit_window().as_secs();
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::internal(format!("Redis连接失败: {}", e)))?;

        // INCR + EXPIRE 实现计数窗口
        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| AppError::internal(format!("Redis计数失败: {}", e)))?;

        if count == 1 {
            let _: () = conn
                .expire(&key, window as i64)
                .await
                .map_err(|e| AppError::internal(format!("Redis设置过期失败: {}", e)))?;
        }

        if count > self.config.rate_limit_requests as u64 {
            tracing::info!("Rate limit exceeded for {} ({} requests)", ip, count);
            return Err(AppError::RateLimited(window));
        }

        Ok(next.run(req).await)
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}
