// 数据库模块
// 用户与订单的存储接口，以及基于 Postgres 的实现

use async_trait::async_trait;
use thiserror::Error;

use crate::common::PageRequest;
use crate::models::order::{ExpressUpdate, NewOrder, Order, OrderFilter, OrderStatus, ReceiverUpdate, StatusChange};
use crate::models::user::{NewUser, ProfileUpdate, User};

pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// 唯一约束冲突，参数为冲突对象的描述
    #[error("{0}已存在")]
    Duplicate(&'static str),

    #[error("数据库错误: {0}")]
    Database(#[source] sqlx::Error),

    #[error("数据损坏: {0}")]
    Corrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupted(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    /// 插入语句专用：唯一约束冲突转换为 Duplicate
    pub fn on_insert(err: sqlx::Error, what: &'static str) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            StoreError::Duplicate(what)
        } else {
            err.into()
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_openid(&self, openid: &str) -> Result<Option<User>, StoreError>;

    /// 手机号或 openid 已被占用时返回 Duplicate
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn record_login(&self, user_id: i64) -> Result<(), StoreError>;

    async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 订单号重复时返回 Duplicate
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError>;

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    /// 按订单号批量查询，不存在的编号直接忽略，按下单时间倒序
    async fn find_orders(&self, order_ids: &[String]) -> Result<Vec<Order>, StoreError>;

    /// 按下单时间倒序分页，同时返回符合条件的总数
    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), StoreError>;

    /// 仅当当前状态在允许范围内时写入，连同附带写入在同一事务中完成；
    /// 没有匹配的行时返回 None
    async fn apply_status_change(
        &self,
        order_id: &str,
        change: &StatusChange,
    ) -> Result<Option<Order>, StoreError>;

    async fn update_receiver(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ReceiverUpdate,
    ) -> Result<Option<Order>, StoreError>;

    async fn update_express(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ExpressUpdate,
    ) -> Result<Option<Order>, StoreError>;
}
