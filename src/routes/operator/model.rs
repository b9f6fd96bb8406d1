use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    database::StoreError,
    error::AppError,
    utils::{is_valid_mobile, is_valid_password, require_text},
};

pub const MAX_OPERATOR_ID_ATTEMPTS: usize = 5;

/// 运营与客服账号
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OperationUser {
    pub user_id: String,
    pub nickname: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub user_type: String,
    pub level: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    Operation,
    Service,
}

impl OperatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operation => "operation",
            Self::Service => "service",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OperatorLoginRequest {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct OperatorLoginResponse {
    pub user_id: String,
    pub user_type: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOperatorRequest {
    pub nickname: String,
    pub mobile: String,
    pub password: String,
    pub user_type: OperatorKind,
    #[serde(default)]
    pub level: i32,
}

impl CreateOperatorRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.nickname, "昵称")?;
        if !is_valid_mobile(self.mobile.trim()) {
            return Err(AppError::validation("手机号格式不正确"));
        }
        if !is_valid_password(&self.password) {
            return Err(AppError::validation("密码长度必须在6到24个字符之间"));
        }
        if self.level < 0 {
            return Err(AppError::validation("账号级别不能为负数"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_password(&self.new_password) {
            return Err(AppError::validation("密码长度必须在6到24个字符之间"));
        }
        if self.new_password == self.old_password {
            return Err(AppError::validation("新密码不能与旧密码相同"));
        }
        Ok(())
    }
}

/// 6位数字编号，首位不为0
pub fn generate_operator_id() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

const OPERATOR_COLUMNS: &str =
    "user_id, nickname, mobile, password_hash, user_type, level, is_active, created_at";

impl OperationUser {
    pub async fn find_by_mobile(pool: &PgPool, mobile: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            "SELECT {} FROM operation_user WHERE mobile = $1",
            OPERATOR_COLUMNS
        );
        let user = sqlx::query_as::<_, OperationUser>(&sql)
            .bind(mobile)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find(pool: &PgPool, user_id: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            "SELECT {} FROM operation_user WHERE user_id = $1",
            OPERATOR_COLUMNS
        );
        let user = sqlx::query_as::<_, OperationUser>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// 编号冲突时换一个重试，手机号冲突直接返回
    pub async fn create(
        pool: &PgPool,
        req: &CreateOperatorRequest,
        password_hash: &str,
    ) -> Result<Self, AppError> {
        let sql = format!(
            r#"
            INSERT INTO operation_user (user_id, nickname, mobile, password_hash, user_type, level)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            OPERATOR_COLUMNS
        );

        for attempt in 1..=MAX_OPERATOR_ID_ATTEMPTS {
            let user_id = generate_operator_id();
            let result = sqlx::query_as::<_, OperationUser>(&sql)
                .bind(&user_id)
                .bind(req.nickname.trim())
                .bind(req.mobile.trim())
                .bind(password_hash)
                .bind(req.user_type.as_str())
                .bind(req.level)
                .fetch_one(pool)
                .await;

            match result {
                Ok(user) => {
                    tracing::info!("Created {} operator {}", user.user_type, user.user_id);
                    return Ok(user);
                }
                Err(e) => {
                    let constraint = e
                        .as_database_error()
                        .filter(|db| db.is_unique_violation())
                        .and_then(|db| db.constraint().map(str::to_string));
                    match constraint.as_deref() {
                        Some("operation_user_pkey") => {
                            tracing::warn!(
                                "Operator id {} collided (attempt {}/{})",
                                user_id,
                                attempt,
                                MAX_OPERATOR_ID_ATTEMPTS
                            );
                        }
                        _ => return Err(StoreError::on_insert(e, "手机号").into()),
                    }
                }
            }
        }

        Err(AppError::Conflict("运营账号编号生成冲突，请稍后重试".into()))
    }

    pub async fn update_password(
        pool: &PgPool,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE operation_user SET password_hash = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
