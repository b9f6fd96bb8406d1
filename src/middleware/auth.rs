use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;

use crate::{AppState, error::AppError, utils::Claims};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// 取 Bearer 令牌，没有时退回到 `access_token` 查询参数
fn bearer_token(req: &Request<Body>) -> Option<String> {
    if let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.access_token)
        .filter(|t| !t.is_empty())
}

/// 校验访问令牌，并把 Claims 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Unauthorized("缺少访问令牌".into()))?;

    let claims = state.tokens.verify_access(&token)?;
    tracing::debug!("Authenticated {:?} {}", claims.role, claims.sub);

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// 仅允许运营账号访问，需放在 auth_middleware 之后
pub async fn require_operator(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("缺少访问令牌".into()))?;

    if !claims.is_operator() {
        return Err(AppError::Forbidden("需要运营账号权限".into()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_from_header_or_query() {
        let req = Request::builder()
            .uri("/api/orders")
            .header("authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = Request::builder()
            .uri("/api/orders?page=2&access_token=xyz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).as_deref(), Some("xyz"));

        let req = Request::builder()
            .uri("/api/orders")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
