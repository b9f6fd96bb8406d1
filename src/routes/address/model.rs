use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    database::StoreError,
    error::AppError,
    utils::{is_valid_mobile, require_text},
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    #[serde(default)]
    pub is_default: bool,
}

/// 校验后的地址字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFields {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    pub is_default: bool,
}

impl AddressRequest {
    pub fn validate(self) -> Result<AddressFields, AppError> {
        let receiver_phone = self.receiver_phone.trim().to_string();
        if !is_valid_mobile(&receiver_phone) {
            return Err(AppError::validation("收货人手机号格式不正确"));
        }
        Ok(AddressFields {
            receiver_name: require_text(&self.receiver_name, "收货人")?,
            receiver_phone,
            province: require_text(&self.province, "省份")?,
            city: require_text(&self.city, "城市")?,
            county: require_text(&self.county, "区县")?,
            detailed_address: require_text(&self.detailed_address, "详细地址")?,
            is_default: self.is_default,
        })
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, receiver_name, receiver_phone, province, city, \
    county, detailed_address, is_default, created_at, updated_at";

impl Address {
    /// 用户的第一个地址自动成为默认地址
    pub async fn create(
        pool: &PgPool,
        user_id: i64,
        fields: AddressFields,
    ) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM address_address WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = fields.is_default || !has_any;

        if is_default {
            sqlx::query(
                "UPDATE address_address SET is_default = FALSE WHERE user_id = $1 AND is_default",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            r#"
            INSERT INTO address_address (
                user_id, receiver_name, receiver_phone, province, city, county,
                detailed_address, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ADDRESS_COLUMNS
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .bind(&fields.receiver_name)
            .bind(&fields.receiver_phone)
            .bind(&fields.province)
            .bind(&fields.city)
            .bind(&fields.county)
            .bind(&fields.detailed_address)
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::on_insert(e, "默认地址"))?;

        tx.commit().await?;
        Ok(address)
    }

    pub async fn list(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM address_address
            WHERE user_id = $1
            ORDER BY is_default DESC, updated_at DESC, id DESC
            "#,
            ADDRESS_COLUMNS
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(addresses)
    }

    pub async fn find(
        pool: &PgPool,
        user_id: i64,
        address_id: i64,
    ) -> Result<Option<Self>, StoreError> {
        let sql = format!(
            "SELECT {} FROM address_address WHERE id = $1 AND user_id = $2",
            ADDRESS_COLUMNS
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(address)
    }

    pub async fn update(
        pool: &PgPool,
        user_id: i64,
        address_id: i64,
        fields: AddressFields,
    ) -> Result<Option<Self>, StoreError> {
        let mut tx = pool.begin().await?;

        if fields.is_default {
            sqlx::query(
                "UPDATE address_address SET is_default = FALSE WHERE user_id = $1 AND is_default AND id <> $2",
            )
            .bind(user_id)
            .bind(address_id)
            .execute(&mut *tx)
            .await?;
        }

        // is_default 为 false 时保持原值，取消默认只能通过设置另一个默认地址
        let sql = format!(
            r#"
            UPDATE address_address SET
                receiver_name = $3, receiver_phone = $4, province = $5, city = $6,
                county = $7, detailed_address = $8, is_default = is_default OR $9,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ADDRESS_COLUMNS
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(address_id)
            .bind(user_id)
            .bind(&fields.receiver_name)
            .bind(&fields.receiver_phone)
            .bind(&fields.province)
            .bind(&fields.city)
            .bind(&fields.county)
            .bind(&fields.detailed_address)
            .bind(fields.is_default)
            .fetch_optional(&mut *tx)
            .await?;

        if address.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(address)
    }

    pub async fn set_default(
        pool: &PgPool,
        user_id: i64,
        address_id: i64,
    ) -> Result<Option<Self>, StoreError> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE address_address SET is_default = FALSE WHERE user_id = $1 AND is_default AND id <> $2",
        )
        .bind(user_id)
        .bind(address_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            r#"
            UPDATE address_address SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ADDRESS_COLUMNS
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        // 地址不存在时撤销对原默认地址的修改
        if address.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        Ok(address)
    }

    /// 删除默认地址后，最近更新的地址成为新的默认地址
    pub async fn delete(pool: &PgPool, user_id: i64, address_id: i64) -> Result<bool, StoreError> {
        let mut tx = pool.begin().await?;

        let deleted: Option<bool> = sqlx::query_scalar(
            "DELETE FROM address_address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(was_default) = deleted else {
            tx.rollback().await?;
            return Ok(false);
        };

        if was_default {
            sqlx::query(
                r#"
                UPDATE address_address SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM address_address WHERE user_id = $1
                    ORDER BY updated_at DESC, id DESC LIMIT 1
                )
                "#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
