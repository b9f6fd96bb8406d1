use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use super::{OrderRepository, StoreError, UserRepository};
use crate::common::PageRequest;
use crate::models::order::{
    ExpressUpdate, NewOrder, Order, OrderFilter, OrderStatus, ReceiverUpdate, StatusChange,
};
use crate::models::user::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "user_id, openid, mobile, password_hash, nickname, user_img, \
    default_receiver, province, city, county, detailed_address, membership_level, \
    total_spending, remarks, is_active, is_staff, registration_date, last_login";

const ORDER_COLUMNS: &str = "order_id, user_id, receiver_name, receiver_phone, province, city, \
    county, detailed_address, order_amount, product_list, status, payment_method, payment_time, \
    delivery_method, express_company, express_number, logistics_process, order_time, remarks";

/// 用户与订单存储的 Postgres 实现
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn status_strs(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn push_order_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(begin) = filter.begin {
        builder.push(" AND order_time >= ").push_bind(begin);
    }
    if let Some(end) = filter.end {
        builder.push(" AND order_time < ").push_bind(end);
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users_user WHERE user_id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users_user WHERE mobile = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_openid(&self, openid: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users_user WHERE openid = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(openid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users_user (mobile, openid, password_hash, nickname)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let what = if user.mobile.is_some() { "手机号" } else { "微信账号" };

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&user.mobile)
            .bind(&user.openid)
            .bind(&user.password_hash)
            .bind(&user.nickname)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::on_insert(e, what))?;

        tracing::info!("Created user: {}", user.user_id);
        Ok(user)
    }

    async fn record_login(&self, user_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users_user SET last_login = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users_user SET
                nickname = COALESCE($2, nickname),
                user_img = COALESCE($3, user_img),
                default_receiver = COALESCE($4, default_receiver),
                province = COALESCE($5, province),
                city = COALESCE($6, city),
                county = COALESCE($7, county),
                detailed_address = COALESCE($8, detailed_address),
                remarks = COALESCE($9, remarks)
            WHERE user_id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(&update.nickname)
            .bind(&update.user_img)
            .bind(&update.default_receiver)
            .bind(&update.province)
            .bind(&update.city)
            .bind(&update.county)
            .bind(&update.detailed_address)
            .bind(&update.remarks)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO order_data (
                order_id, user_id, receiver_name, receiver_phone, province, city, county,
                detailed_address, order_amount, product_list, status, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(&order.order_id)
            .bind(order.user_id)
            .bind(&order.receiver_name)
            .bind(&order.receiver_phone)
            .bind(&order.province)
            .bind(&order.city)
            .bind(&order.county)
            .bind(&order.detailed_address)
            .bind(order.order_amount)
            .bind(Json(&order.items))
            .bind(OrderStatus::Pending.as_str())
            .bind(&order.remarks)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::on_insert(e, "订单号"))?;
        Ok(created)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {} FROM order_data WHERE order_id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn find_orders(&self, order_ids: &[String]) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {} FROM order_data WHERE order_id = ANY($1) ORDER BY order_time DESC, order_id DESC",
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM order_data");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM order_data", ORDER_COLUMNS));
        push_order_filter(&mut select, filter);
        select
            .push(" ORDER BY order_time DESC, order_id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let orders = select
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;

        Ok((orders, total))
    }

    async fn apply_status_change(
        &self,
        order_id: &str,
        change: &StatusChange,
    ) -> Result<Option<Order>, StoreError> {
        let action = change.action();
        let allowed = action.allowed_from_strs();
        let target = action.target().as_str();

        let mut tx = self.pool.begin().await?;

        let updated = match change {
            StatusChange::Pay { payment_method } => {
                let sql = format!(
                    r#"
                    UPDATE order_data
                    SET status = $2, payment_method = $3, payment_time = NOW()
                    WHERE order_id = $1 AND status = ANY($4)
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                );
                let order = sqlx::query_as::<_, Order>(&sql)
                    .bind(order_id)
                    .bind(target)
                    .bind(payment_method)
                    .bind(&allowed)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(order) = &order {
                    sqlx::query(
                        "UPDATE users_user SET total_spending = total_spending + $2 WHERE user_id = $1",
                    )
                    .bind(order.user_id)
                    .bind(order.order_amount)
                    .execute(&mut *tx)
                    .await?;
                }
                order
            }
            StatusChange::Ship(shipment) => {
                let sql = format!(
                    r#"
                    UPDATE order_data
                    SET status = $2, express_company = $3, express_number = $4
                    WHERE order_id = $1 AND status = ANY($5)
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                );
                let order = sqlx::query_as::<_, Order>(&sql)
                    .bind(order_id)
                    .bind(target)
                    .bind(&shipment.carrier)
                    .bind(&shipment.tracking)
                    .bind(&allowed)
                    .fetch_optional(&mut *tx)
                    .await?;

                if let Some(order) = &order {
                    sqlx::query(
                        r#"
                        INSERT INTO order_logistics (order_id, express_company, express_number, status, details)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(order_id)
                    .bind(&shipment.carrier)
                    .bind(&shipment.tracking)
                    .bind(OrderStatus::Shipped.as_str())
                    .bind("订单已发货")
                    .execute(&mut *tx)
                    .await?;

                    // 销量累加，商品状态行不存在时按上架状态创建
                    for item in order.product_list.0.iter() {
                        sqlx::query(
                            r#"
                            INSERT INTO commodity_situation (commodity_id, status, online_time, sales_volume)
                            VALUES ($1, 'online', NOW(), $2)
                            ON CONFLICT (commodity_id)
                            DO UPDATE SET sales_volume = commodity_situation.sales_volume + EXCLUDED.sales_volume
                            "#,
                        )
                        .bind(&item.sku)
                        .bind(item.qty as i64)
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                order
            }
            StatusChange::Cancel | StatusChange::Deliver => {
                let sql = format!(
                    r#"
                    UPDATE order_data
                    SET status = $2
                    WHERE order_id = $1 AND status = ANY($3)
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                );
                sqlx::query_as::<_, Order>(&sql)
                    .bind(order_id)
                    .bind(target)
                    .bind(&allowed)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(updated)
    }

    async fn update_receiver(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ReceiverUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let address = update.address.as_ref();
        let sql = format!(
            r#"
            UPDATE order_data SET
                receiver_name = COALESCE($2, receiver_name),
                receiver_phone = COALESCE($3, receiver_phone),
                province = COALESCE($4, province),
                city = COALESCE($5, city),
                county = COALESCE($6, county),
                detailed_address = COALESCE($7, detailed_address)
            WHERE order_id = $1 AND status = ANY($8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(&update.receiver_name)
            .bind(&update.receiver_phone)
            .bind(address.map(|a| a.province.as_str()))
            .bind(address.map(|a| a.city.as_str()))
            .bind(address.map(|a| a.county.as_str()))
            .bind(address.map(|a| a.detailed_address.as_str()))
            .bind(status_strs(allowed))
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn update_express(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ExpressUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let sql = format!(
            r#"
            UPDATE order_data SET
                express_company = COALESCE($2, express_company),
                express_number = COALESCE($3, express_number),
                logistics_process = COALESCE($4, logistics_process)
            WHERE order_id = $1 AND status = ANY($5)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(&update.carrier)
            .bind(&update.tracking)
            .bind(update.logistics_process.as_ref().map(Json))
            .bind(status_strs(allowed))
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }
}
