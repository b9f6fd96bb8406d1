use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{database::StoreError, error::AppError};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub commodity_id: String,
    pub quantity: i32,
    pub selected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 购物车列表项，附带商品名称、价格与图片
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
    pub id: i64,
    pub commodity_id: String,
    pub quantity: i32,
    pub selected: bool,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(alias = "commodity_id")]
    pub sku: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// 单个购物车条目的数量上限
pub const MAX_CART_QUANTITY: i32 = 999;

pub fn check_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::validation("商品数量必须大于0"));
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(AppError::validation(format!(
            "商品数量不能超过{}",
            MAX_CART_QUANTITY
        )));
    }
    Ok(())
}

const CART_COLUMNS: &str = "id, user_id, commodity_id, quantity, selected, created_at, updated_at";

impl CartItem {
    /// 同一商品已在购物车中时累加数量，累加结果不超过上限
    pub async fn add(
        pool: &PgPool,
        user_id: i64,
        commodity_id: &str,
        quantity: i32,
    ) -> Result<Self, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO cart_cartitem (user_id, commodity_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, commodity_id)
            DO UPDATE SET quantity = LEAST(cart_cartitem.quantity + EXCLUDED.quantity, {}),
                          updated_at = NOW()
            RETURNING {}
            "#,
            MAX_CART_QUANTITY, CART_COLUMNS
        );
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .bind(commodity_id)
            .bind(quantity)
            .fetch_one(pool)
            .await?;
        Ok(item)
    }

    pub async fn list(pool: &PgPool, user_id: i64) -> Result<Vec<CartLine>, StoreError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT c.id, c.commodity_id, c.quantity, c.selected,
                   d.name, d.price, d.image, c.updated_at
            FROM cart_cartitem c
            LEFT JOIN commodity_data d ON d.commodity_id = c.commodity_id
            WHERE c.user_id = $1
            ORDER BY c.updated_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(lines)
    }

    pub async fn set_quantity(
        pool: &PgPool,
        user_id: i64,
        item_id: i64,
        quantity: i32,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            r#"
            UPDATE cart_cartitem SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            CART_COLUMNS
        );
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(item_id)
            .bind(user_id)
            .bind(quantity)
            .fetch_optional(pool)
            .await?;
        Ok(item)
    }

    /// 已到上限时不再增加，返回 None 由调用方区分
    pub async fn increase(
        pool: &PgPool,
        user_id: i64,
        item_id: i64,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            r#"
            UPDATE cart_cartitem SET quantity = quantity + 1, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND quantity < {}
            RETURNING {}
            "#,
            MAX_CART_QUANTITY, CART_COLUMNS
        );
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(item_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(item)
    }

    /// 数量为1时不再减少，返回 None 由调用方区分不存在与已到下限
    pub async fn decrease(
        pool: &PgPool,
        user_id: i64,
        item_id: i64,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            r#"
            UPDATE cart_cartitem SET quantity = quantity - 1, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND quantity > 1
            RETURNING {}
            "#,
            CART_COLUMNS
        );
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(item_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(item)
    }

    pub async fn exists(pool: &PgPool, user_id: i64, item_id: i64) -> Result<bool, StoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM cart_cartitem WHERE id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn delete_many(pool: &PgPool, user_id: i64, ids: &[i64]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_cartitem WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn clear(pool: &PgPool, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_cartitem WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_defaults_quantity() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"commodity_id":"A1"}"#).unwrap();
        assert_eq!(req.sku, "A1");
        assert_eq!(req.quantity, 1);
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(check_quantity(1).is_ok());
        assert!(matches!(check_quantity(0), Err(AppError::Validation(_))));
        assert!(check_quantity(MAX_CART_QUANTITY).is_ok());
        assert!(matches!(
            check_quantity(MAX_CART_QUANTITY + 1),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(check_quantity(i32::MAX), Err(AppError::Validation(_))));
    }
}
