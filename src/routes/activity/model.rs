use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{database::StoreError, error::AppError, utils::require_text};

// 缓存相关常量
const ACTIVITY_CACHE_PREFIX: &str = "activity:list:"; // 活动列表缓存前缀
const CACHE_EXPIRE: u64 = 120; // 缓存过期时间，单位秒

pub const ACTIVITY_STATUSES: [&str; 3] = ["pending", "online", "offline"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityImage {
    pub id: i64,
    pub image_url: String,
    pub status: String,
    pub online_time: Option<DateTime<Utc>>,
    pub offline_time: Option<DateTime<Utc>>,
    pub commodities: Vec<String>,
    pub category: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub image_url: String,
    #[serde(default)]
    pub commodities: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceCommoditiesRequest {
    pub commodities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityListQuery {
    pub status: Option<String>,
}

/// 去掉空白项和重复项，保持原有顺序
pub fn normalize_commodities(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

pub fn parse_status_filter(status: Option<&str>) -> Result<Option<&'static str>, AppError> {
    match status.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => ACTIVITY_STATUSES
            .into_iter()
            .find(|known| *known == s)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("未知的活动状态: {}", s))),
    }
}

const ACTIVITY_COLUMNS: &str = "id, image_url, status, online_time, offline_time, commodities, \
    category, notes, created_at, updated_at";

async fn invalidate_cache(redis: &Arc<RedisClient>) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let keys: Vec<String> = ACTIVITY_STATUSES
            .iter()
            .map(|s| format!("{}{}", ACTIVITY_CACHE_PREFIX, s))
            .chain(std::iter::once(format!("{}all", ACTIVITY_CACHE_PREFIX)))
            .collect();
        let result: redis::RedisResult<()> = conn.del(keys).await;
        if let Err(e) = result {
            tracing::warn!("Failed to invalidate activity cache: {}", e);
        }
    }
}

impl ActivityImage {
    pub async fn create(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        req: CreateActivityRequest,
    ) -> Result<Self, AppError> {
        let image_url = require_text(&req.image_url, "图片地址")?;
        let sql = format!(
            r#"
            INSERT INTO activity_image (image_url, status, commodities, category, notes)
            VALUES ($1, 'pending', $2, $3, $4)
            RETURNING {}
            "#,
            ACTIVITY_COLUMNS
        );
        let activity = sqlx::query_as::<_, ActivityImage>(&sql)
            .bind(image_url)
            .bind(normalize_commodities(req.commodities))
            .bind(req.category.trim())
            .bind(req.notes.trim())
            .fetch_one(pool)
            .await
            .map_err(StoreError::from)?;

        invalidate_cache(redis).await;
        tracing::info!("Created activity image {}", activity.id);
        Ok(activity)
    }

    pub async fn list(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        status: Option<&str>,
    ) -> Result<Vec<Self>, StoreError> {
        let cache_key = format!("{}{}", ACTIVITY_CACHE_PREFIX, status.unwrap_or("all"));

        // 尝试从缓存获取
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;
            if let Ok(json_str) = cached {
                if let Ok(activities) = serde_json::from_str::<Vec<ActivityImage>>(&json_str) {
                    tracing::debug!("Get activities from cache: {}", cache_key);
                    return Ok(activities);
                }
            }
        }

        let sql = format!(
            r#"
            SELECT {} FROM activity_image
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "#,
            ACTIVITY_COLUMNS
        );
        let activities = sqlx::query_as::<_, ActivityImage>(&sql)
            .bind(status)
            .fetch_all(pool)
            .await?;

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            if let Ok(json_str) = serde_json::to_string(&activities) {
                let _: redis::RedisResult<()> = conn.set_ex(&cache_key, json_str, CACHE_EXPIRE).await;
            }
        }

        Ok(activities)
    }

    pub async fn set_online(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        id: i64,
        online: bool,
    ) -> Result<Option<Self>, StoreError> {
        let sql = if online {
            format!(
                "UPDATE activity_image SET status = 'online', online_time = NOW(), updated_at = NOW() \
                 WHERE id = $1 RETURNING {}",
                ACTIVITY_COLUMNS
            )
        } else {
            format!(
                "UPDATE activity_image SET status = 'offline', offline_time = NOW(), updated_at = NOW() \
                 WHERE id = $1 RETURNING {}",
                ACTIVITY_COLUMNS
            )
        };
        let activity = sqlx::query_as::<_, ActivityImage>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        invalidate_cache(redis).await;
        Ok(activity)
    }

    pub async fn replace_commodities(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        id: i64,
        commodities: Vec<String>,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            "UPDATE activity_image SET commodities = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let activity = sqlx::query_as::<_, ActivityImage>(&sql)
            .bind(id)
            .bind(normalize_commodities(commodities))
            .fetch_optional(pool)
            .await?;

        invalidate_cache(redis).await;
        Ok(activity)
    }
}
