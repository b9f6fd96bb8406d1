use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    common::PageRequest,
    database::StoreError,
    error::AppError,
    models::order::max_order_amount,
    utils::{check_length, require_text},
};

// 缓存相关常量
const CATEGORY_CACHE_KEY: &str = "commodity:categories";
const CACHE_EXPIRE: u64 = 120; // 缓存过期时间，单位秒

pub const MAX_BATCH_IDS: usize = 100;

const COMMODITY_COLUMNS: &str = "commodity_id, name, style_code, category, category_detail, \
    price, image, size, color, notes, created_at";

const SITUATION_COLUMNS: &str =
    "commodity_id, status, online_time, offline_time, sales_volume, remarks";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commodity {
    pub commodity_id: String,
    pub name: String,
    pub style_code: Option<String>,
    pub category: String,
    pub category_detail: Option<String>,
    pub price: Decimal,
    pub image: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommoditySituation {
    pub commodity_id: String,
    pub status: String,
    pub online_time: Option<DateTime<Utc>>,
    pub offline_time: Option<DateTime<Utc>>,
    pub sales_volume: i64,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommodityDetail {
    #[serde(flatten)]
    pub commodity: Commodity,
    pub situation: CommoditySituation,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommodityRequest {
    pub commodity_id: String,
    pub name: String,
    pub style_code: Option<String>,
    pub category: String,
    pub category_detail: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

// 与 commodity_data 列宽一致
const ID_MAX: usize = 100;
const NAME_MAX: usize = 255;
const CODE_MAX: usize = 50;
const CATEGORY_MAX: usize = 100;
const IMAGE_MAX: usize = 255;

fn check_price(price: Decimal) -> Result<(), AppError> {
    if price.is_sign_negative() {
        return Err(AppError::validation("商品价格不能为负数"));
    }
    if price.round_dp(2) >= max_order_amount() {
        return Err(AppError::validation("商品价格超出上限"));
    }
    Ok(())
}

fn check_optional(value: &Option<String>, field: &str, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) => check_length(v, field, max),
        None => Ok(()),
    }
}

impl CreateCommodityRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.commodity_id, "商品编号")?;
        require_text(&self.name, "商品名称")?;
        require_text(&self.category, "商品分类")?;
        check_length(self.commodity_id.trim(), "商品编号", ID_MAX)?;
        check_length(self.name.trim(), "商品名称", NAME_MAX)?;
        check_length(self.category.trim(), "商品分类", CATEGORY_MAX)?;
        check_length(&self.image, "商品图片", IMAGE_MAX)?;
        check_optional(&self.style_code, "款号", CODE_MAX)?;
        check_optional(&self.category_detail, "分类详情", CATEGORY_MAX)?;
        check_optional(&self.size, "尺码", CODE_MAX)?;
        check_optional(&self.color, "颜色", CODE_MAX)?;
        check_price(self.price)
    }
}

/// 修改商品时只覆盖提供了非空值的字段
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommodityRequest {
    pub name: Option<String>,
    pub style_code: Option<String>,
    pub category: Option<String>,
    pub category_detail: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct CommodityUpdate {
    pub name: Option<String>,
    pub style_code: Option<String>,
    pub category: Option<String>,
    pub category_detail: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

fn present(value: Option<String>, field: &str, max: usize) -> Result<Option<String>, AppError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_length(&v, field, max)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

impl UpdateCommodityRequest {
    pub fn validate(self) -> Result<CommodityUpdate, AppError> {
        if let Some(price) = self.price {
            check_price(price)?;
        }
        let update = CommodityUpdate {
            name: present(self.name, "商品名称", NAME_MAX)?,
            style_code: present(self.style_code, "款号", CODE_MAX)?,
            category: present(self.category, "商品分类", CATEGORY_MAX)?,
            category_detail: present(self.category_detail, "分类详情", CATEGORY_MAX)?,
            price: self.price,
            image: present(self.image, "商品图片", IMAGE_MAX)?,
            size: present(self.size, "尺码", CODE_MAX)?,
            color: present(self.color, "颜色", CODE_MAX)?,
            notes: self.notes.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
        };
        if update == CommodityUpdate::default() {
            return Err(AppError::validation("没有需要修改的字段"));
        }
        Ok(update)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<String>,
}

impl BatchRequest {
    /// 去重后的商品编号，数量在 1..=100 之间
    pub fn validated_ids(self) -> Result<Vec<String>, AppError> {
        let mut ids: Vec<String> = Vec::with_capacity(self.ids.len());
        for id in self.ids {
            let id = id.trim().to_string();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(AppError::validation("商品编号列表不能为空"));
        }
        if ids.len() > MAX_BATCH_IDS {
            return Err(AppError::validation(format!(
                "一次最多查询{}个商品",
                MAX_BATCH_IDS
            )));
        }
        Ok(ids)
    }
}

/// ILIKE 子串匹配模式，转义通配符
pub fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Commodity {
    pub async fn find(pool: &PgPool, commodity_id: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            "SELECT {} FROM commodity_data WHERE commodity_id = $1",
            COMMODITY_COLUMNS
        );
        let commodity = sqlx::query_as::<_, Commodity>(&sql)
            .bind(commodity_id)
            .fetch_optional(pool)
            .await?;
        Ok(commodity)
    }

    pub async fn find_many(pool: &PgPool, ids: &[String]) -> Result<Vec<Self>, StoreError> {
        let sql = format!(
            "SELECT {} FROM commodity_data WHERE commodity_id = ANY($1) ORDER BY commodity_id",
            COMMODITY_COLUMNS
        );
        let commodities = sqlx::query_as::<_, Commodity>(&sql)
            .bind(ids)
            .fetch_all(pool)
            .await?;
        Ok(commodities)
    }

    pub async fn search(
        pool: &PgPool,
        keyword: &str,
        page: PageRequest,
    ) -> Result<(Vec<Self>, i64), StoreError> {
        let pattern = like_pattern(keyword);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commodity_data WHERE name ILIKE $1")
                .bind(&pattern)
                .fetch_one(pool)
                .await?;

        let sql = format!(
            r#"
            SELECT {} FROM commodity_data
            WHERE name ILIKE $1
            ORDER BY created_at DESC, commodity_id
            LIMIT $2 OFFSET $3
            "#,
            COMMODITY_COLUMNS
        );
        let items = sqlx::query_as::<_, Commodity>(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    pub async fn categories(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
    ) -> Result<Vec<String>, StoreError> {
        // 尝试从缓存获取
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(CATEGORY_CACHE_KEY).await;
            if let Ok(json_str) = cached {
                if let Ok(categories) = serde_json::from_str::<Vec<String>>(&json_str) {
                    tracing::debug!("Get commodity categories from cache");
                    return Ok(categories);
                }
            }
        }

        let categories: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM commodity_data ORDER BY category")
                .fetch_all(pool)
                .await?;

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            if let Ok(json_str) = serde_json::to_string(&categories) {
                let cached: redis::RedisResult<()> =
                    conn.set_ex(CATEGORY_CACHE_KEY, json_str, CACHE_EXPIRE).await;
                if let Err(e) = cached {
                    tracing::warn!("Failed to cache commodity categories: {}", e);
                }
            }
        }

        Ok(categories)
    }

    pub async fn create(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        req: CreateCommodityRequest,
    ) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO commodity_data (
                commodity_id, name, style_code, category, category_detail, price, image,
                size, color, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            COMMODITY_COLUMNS
        );
        let commodity = sqlx::query_as::<_, Commodity>(&sql)
            .bind(req.commodity_id.trim())
            .bind(req.name.trim())
            .bind(&req.style_code)
            .bind(req.category.trim())
            .bind(&req.category_detail)
            .bind(req.price)
            .bind(&req.image)
            .bind(&req.size)
            .bind(&req.color)
            .bind(&req.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::on_insert(e, "商品"))?;

        sqlx::query(
            r#"
            INSERT INTO commodity_situation (commodity_id, status, online_time)
            VALUES ($1, 'online', NOW())
            ON CONFLICT (commodity_id) DO NOTHING
            "#,
        )
        .bind(&commodity.commodity_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // 分类可能变化，清除缓存
        invalidate_categories(redis).await;

        tracing::info!("Created commodity {}", commodity.commodity_id);
        Ok(commodity)
    }

    /// 未提供的字段保持原值；商品不存在时返回 None
    pub async fn update(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        commodity_id: &str,
        update: &CommodityUpdate,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            r#"
            UPDATE commodity_data SET
                name = COALESCE($2, name),
                style_code = COALESCE($3, style_code),
                category = COALESCE($4, category),
                category_detail = COALESCE($5, category_detail),
                price = COALESCE($6, price),
                image = COALESCE($7, image),
                size = COALESCE($8, size),
                color = COALESCE($9, color),
                notes = COALESCE($10, notes)
            WHERE commodity_id = $1
            RETURNING {}
            "#,
            COMMODITY_COLUMNS
        );
        let commodity = sqlx::query_as::<_, Commodity>(&sql)
            .bind(commodity_id)
            .bind(&update.name)
            .bind(&update.style_code)
            .bind(&update.category)
            .bind(&update.category_detail)
            .bind(update.price)
            .bind(&update.image)
            .bind(&update.size)
            .bind(&update.color)
            .bind(&update.notes)
            .fetch_optional(pool)
            .await?;

        if commodity.is_some() && update.category.is_some() {
            invalidate_categories(redis).await;
        }
        if commodity.is_some() {
            tracing::info!("Updated commodity {}", commodity_id);
        }
        Ok(commodity)
    }

    /// 连同状态行与各购物车中的条目一起删除，返回是否删除了商品
    pub async fn delete(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        commodity_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM commodity_situation WHERE commodity_id = $1")
            .bind(commodity_id)
            .execute(&mut *tx)
            .await?;
        let carts = sqlx::query("DELETE FROM cart_cartitem WHERE commodity_id = $1")
            .bind(commodity_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM commodity_data WHERE commodity_id = $1")
            .bind(commodity_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;

        invalidate_categories(redis).await;
        tracing::info!(
            "Deleted commodity {} and {} cart items",
            commodity_id,
            carts.rows_affected()
        );
        Ok(true)
    }
}

async fn invalidate_categories(redis: &Arc<RedisClient>) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let _: redis::RedisResult<()> = conn.del(CATEGORY_CACHE_KEY).await;
    }
}

impl CommoditySituation {
    /// 状态行不存在时按上架、销量0创建
    pub async fn get_or_create(pool: &PgPool, commodity_id: &str) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO commodity_situation (commodity_id, status, online_time)
            VALUES ($1, 'online', NOW())
            ON CONFLICT (commodity_id) DO NOTHING
            "#,
        )
        .bind(commodity_id)
        .execute(pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM commodity_situation WHERE commodity_id = $1",
            SITUATION_COLUMNS
        );
        let situation = sqlx::query_as::<_, CommoditySituation>(&sql)
            .bind(commodity_id)
            .fetch_one(pool)
            .await?;
        Ok(situation)
    }

    pub async fn set_online(
        pool: &PgPool,
        commodity_id: &str,
        online: bool,
    ) -> Result<Self, StoreError> {
        let (status, time_column) = if online {
            ("online", "online_time")
        } else {
            ("offline", "offline_time")
        };
        let sql = format!(
            r#"
            INSERT INTO commodity_situation (commodity_id, status, {col})
            VALUES ($1, $2, NOW())
            ON CONFLICT (commodity_id)
            DO UPDATE SET status = EXCLUDED.status, {col} = EXCLUDED.{col}
            RETURNING {cols}
            "#,
            col = time_column,
            cols = SITUATION_COLUMNS
        );
        let situation = sqlx::query_as::<_, CommoditySituation>(&sql)
            .bind(commodity_id)
            .bind(status)
            .fetch_one(pool)
            .await?;

        tracing::info!("Commodity {} is now {}", commodity_id, status);
        Ok(situation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("连衣裙"), "%连衣裙%");
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern(""), "%%");
    }

    fn create_request() -> CreateCommodityRequest {
        serde_json::from_value(serde_json::json!({
            "commodity_id": "A1",
            "name": "条纹T恤",
            "category": "上衣",
            "price": "59.00",
            "size": "110",
        }))
        .unwrap()
    }

    #[test]
    fn create_request_respects_column_limits() {
        assert!(create_request().validate().is_ok());

        let mut long_id = create_request();
        long_id.commodity_id = "A".repeat(101);
        assert!(matches!(long_id.validate(), Err(AppError::Validation(_))));

        let mut long_size = create_request();
        long_size.size = Some("1".repeat(51));
        assert!(matches!(long_size.validate(), Err(AppError::Validation(_))));

        let mut expensive = create_request();
        expensive.price = Decimal::from(100_000_000i64);
        assert!(matches!(expensive.validate(), Err(AppError::Validation(_))));

        let mut negative = create_request();
        negative.price = Decimal::from(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn update_keeps_only_present_fields() {
        let req: UpdateCommodityRequest = serde_json::from_value(serde_json::json!({
            "name": " 新款T恤 ",
            "color": "",
            "price": "69.90",
        }))
        .unwrap();
        let update = req.validate().unwrap();
        assert_eq!(update.name.as_deref(), Some("新款T恤"));
        assert_eq!(update.color, None);
        assert_eq!(update.price, Some(Decimal::new(6990, 2)));
        assert_eq!(update.category, None);
    }

    #[test]
    fn update_rejects_empty_and_out_of_range() {
        assert!(matches!(
            UpdateCommodityRequest::default().validate(),
            Err(AppError::Validation(_))
        ));

        let blanks = UpdateCommodityRequest {
            name: Some("  ".into()),
            notes: Some("".into()),
            ..Default::default()
        };
        assert!(blanks.validate().is_err());

        let negative = UpdateCommodityRequest {
            price: Some(Decimal::from(-5)),
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let long_category = UpdateCommodityRequest {
            category: Some("类".repeat(101)),
            ..Default::default()
        };
        assert!(long_category.validate().is_err());
    }

    #[test]
    fn batch_ids_are_deduplicated_and_bounded() {
        let ids = BatchRequest {
            ids: vec!["A1".into(), " A1 ".into(), "B2".into(), "".into()],
        }
        .validated_ids()
        .unwrap();
        assert_eq!(ids, vec!["A1".to_string(), "B2".to_string()]);

        assert!(BatchRequest { ids: vec![] }.validated_ids().is_err());

        let too_many = BatchRequest {
            ids: (0..=MAX_BATCH_IDS).map(|i| format!("C{}", i)).collect(),
        };
        assert!(too_many.validated_ids().is_err());
    }
}
