use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use serde::Serialize;

use crate::common::ApiResponse;

pub mod token;

pub use token::{Claims, Role, TokenKind, TokenPair, TokenService};

/// bcrypt 计算放到阻塞线程池，避免占用异步工作线程
pub async fn hash_password(password: &str) -> Result<String, crate::error::AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(password.as_bytes(), DEFAULT_COST))
        .await
        .map_err(|e| crate::error::AppError::internal(format!("密码哈希任务失败: {}", e)))??;
    Ok(hashed)
}

pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, crate::error::AppError> {
    let password = password.to_owned();
    let hashed = hashed.to_owned();
    let matched = tokio::task::spawn_blocking(move || verify(password.as_bytes(), &hashed))
        .await
        .map_err(|e| crate::error::AppError::internal(format!("密码校验任务失败: {}", e)))??;
    Ok(matched)
}

/// 大陆手机号：11位数字，1开头，第二位3-9
pub fn is_valid_mobile(mobile: &str) -> bool {
    let bytes = mobile.as_bytes();
    bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit)
}

pub fn is_valid_password(password: &str) -> bool {
    (6..=24).contains(&password.chars().count())
}

/// 微信用户默认昵称，取 openid 前8位
pub fn wechat_nickname(openid: &str) -> String {
    let prefix: String = openid.chars().take(8).collect();
    format!("微信用户_{}", prefix)
}

/// 手机用户默认昵称，取手机号后4位
pub fn mobile_nickname(mobile: &str) -> String {
    let count = mobile.chars().count();
    let suffix: String = mobile.chars().skip(count.saturating_sub(4)).collect();
    format!("手机用户_{}", suffix)
}

/// 必填文本字段：去掉首尾空白后不能为空
pub fn require_text(value: &str, field: &str) -> Result<String, crate::error::AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::AppError::validation(format!("{}不能为空", field)));
    }
    Ok(trimmed.to_string())
}

/// 按字符数检查长度上限，与数据库列宽一致
pub fn check_length(value: &str, field: &str, max: usize) -> Result<(), crate::error::AppError> {
    if value.chars().count() > max {
        return Err(crate::error::AppError::validation(format!(
            "{}不能超过{}个字符",
            field, max
        )));
    }
    Ok(())
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        reason: None,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        reason: None,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const CONFLICT: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INVALID_STATE: i32 = 1006;
    pub const UPSTREAM_ERROR: i32 = 1007;
    pub const INTERNAL_ERROR: i32 = 5000;
}
