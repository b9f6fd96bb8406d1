use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::infrastructure::IdentityError;
use crate::models::order::OrderStatus;
use crate::utils::{error_codes, error_to_api_response, token::TokenError};

/// 统一的业务错误，在处理器边界转换为 HTTP 响应
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("请求过于频繁，请在{0}秒后重试")]
    RateLimited(u64),

    #[error("订单当前状态为{from}，不允许{action}")]
    InvalidState {
        from: OrderStatus,
        action: &'static str,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_ERROR,
            Self::Conflict(_) => error_codes::CONFLICT,
            Self::Unauthorized(_) => error_codes::AUTH_FAILED,
            Self::Forbidden(_) => error_codes::PERMISSION_DENIED,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::RateLimited(_) => error_codes::RATE_LIMIT,
            Self::InvalidState { .. } => error_codes::INVALID_STATE,
            Self::Upstream(_) => error_codes::UPSTREAM_ERROR,
            Self::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// 机器可读的错误原因，客户端依赖此字段，不可随意修改
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{}已存在", what)),
            StoreError::Database(e) => AppError::Internal(format!("数据库错误: {}", e)),
            StoreError::Corrupted(msg) => AppError::Internal(format!("数据损坏: {}", msg)),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Internal(format!("生成令牌失败: {}", e)),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("密码哈希失败: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 内部错误只在服务端记录详情，客户端拿到通用提示
        let msg = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "内部服务器错误".to_string()
            }
            other => {
                tracing::debug!(reason = other.reason(), status = %status, "request rejected: {}", other);
                other.to_string()
            }
        };

        let mut body = error_to_api_response::<()>(self.code(), msg);
        body.0.reason = Some(self.reason());

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
