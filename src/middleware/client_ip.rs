use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::error::AppError;

/// 客户端IP：依次取 X-Real-IP、X-Forwarded-For 的第一项、连接对端地址。
/// 选中的头部值不是合法IP时返回 None，不再回退到对端地址。
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    let forwarded = header("x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        });

    match forwarded {
        Some(raw) => raw.parse().ok(),
        None => peer.map(|addr| addr.ip()),
    }
}

/// 从请求中提取客户端IP的提取器
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);

        client_ip(&parts.headers, peer)
            .map(|ip| ClientIp(ip.to_string()))
            .ok_or_else(|| AppError::validation("无法识别客户端IP"))
    }
}
