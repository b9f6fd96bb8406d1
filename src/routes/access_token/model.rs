use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::StoreError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccessToken {
    #[serde(skip_serializing)]
    pub id: i64,
    pub ip_address: String,
    pub access_token: String,
    pub register_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RegisteredIp {
    pub ip_address: String,
    pub register_time: DateTime<Utc>,
}

/// 32位十六进制随机令牌
pub fn generate_access_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl AccessToken {
    pub async fn find_by_ip(pool: &PgPool, ip: &str) -> Result<Option<Self>, StoreError> {
        let token = sqlx::query_as::<_, AccessToken>(
            "SELECT id, ip_address, access_token, register_time FROM access_token WHERE ip_address = $1",
        )
        .bind(ip)
        .fetch_optional(pool)
        .await?;
        Ok(token)
    }

    /// 返回该IP的令牌，以及是否为本次新建
    pub async fn find_or_create(pool: &PgPool, ip: &str) -> Result<(Self, bool), StoreError> {
        if let Some(existing) = Self::find_by_ip(pool, ip).await? {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, AccessToken>(
            r#"
            INSERT INTO access_token (ip_address, access_token)
            VALUES ($1, $2)
            ON CONFLICT (ip_address) DO NOTHING
            RETURNING id, ip_address, access_token, register_time
            "#,
        )
        .bind(ip)
        .bind(generate_access_token())
        .fetch_optional(pool)
        .await
        .map_err(|e| StoreError::on_insert(e, "访问令牌"))?;

        match inserted {
            Some(token) => {
                tracing::info!("Registered access token for {}", ip);
                Ok((token, true))
            }
            // 并发请求已为该IP写入
            None => Self::find_by_ip(pool, ip)
                .await?
                .map(|token| (token, false))
                .ok_or_else(|| StoreError::Corrupted(format!("access token for {} vanished", ip))),
        }
    }

    pub async fn list_ips(pool: &PgPool) -> Result<Vec<RegisteredIp>, StoreError> {
        let ips = sqlx::query_as::<_, RegisteredIp>(
            "SELECT ip_address, register_time FROM access_token ORDER BY register_time DESC",
        )
        .fetch_all(pool)
        .await?;
        Ok(ips)
    }
}
