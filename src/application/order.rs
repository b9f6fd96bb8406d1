use std::sync::Arc;

use chrono::Utc;

use crate::common::{PageRequest, PaginatedResponse};
use crate::database::{OrderRepository, StoreError};
use crate::error::{AppError, AppResult};
use crate::models::order::{
    BatchOrdersRequest, CreateOrderRequest, EXPRESS_EDITABLE, ListOrdersQuery, Order,
    OrderStatus, PayOrderRequest, RECEIVER_EDITABLE, ShipOrderRequest, StatusChange,
    UpdateExpressRequest, UpdateReceiverRequest, generate_order_id,
};
use crate::utils::{Claims, Role};

/// 订单号冲突时的最大尝试次数
pub const MAX_ORDER_ID_ATTEMPTS: usize = 5;

/// 发起订单操作的一方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Customer(i64),
    Operator(String),
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> AppResult<Self> {
        match claims.role {
            Role::Operator => Ok(Actor::Operator(claims.sub.clone())),
            Role::Customer => claims
                .sub
                .parse::<i64>()
                .map(Actor::Customer)
                .map_err(|_| AppError::Unauthorized("令牌无效".into())),
        }
    }

    fn can_see(&self, order: &Order) -> bool {
        match self {
            Actor::Customer(user_id) => order.user_id == *user_id,
            Actor::Operator(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    pub async fn create(&self, user_id: i64, req: CreateOrderRequest) -> AppResult<Order> {
        let mut new_order = req.into_new_order(user_id, String::new())?;

        for attempt in 1..=MAX_ORDER_ID_ATTEMPTS {
            new_order.order_id = generate_order_id(Utc::now());
            match self.orders.insert_order(&new_order).await {
                Ok(order) => {
                    tracing::info!(
                        "Created order {} for user {} ({} items)",
                        order.order_id,
                        user_id,
                        new_order.items.len()
                    );
                    return Ok(order);
                }
                Err(StoreError::Duplicate(_)) => {
                    tracing::warn!(
                        "Order id {} collided (attempt {}/{})",
                        new_order.order_id,
                        attempt,
                        MAX_ORDER_ID_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict("订单号生成冲突，请稍后重试".into()))
    }

    /// 顾客只能看到自己的订单，其他订单一律视为不存在
    pub async fn get(&self, actor: &Actor, order_id: &str) -> AppResult<Order> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .filter(|order| actor.can_see(order))
            .ok_or_else(|| AppError::not_found("订单不存在"))?;
        Ok(order)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: ListOrdersQuery,
    ) -> AppResult<PaginatedResponse<Order>> {
        let mut filter = query.to_filter()?;
        if let Actor::Customer(user_id) = actor {
            filter.user_id = Some(*user_id);
        }
        let page = PageRequest::new(query.page, query.page_size);

        let (orders, total) = self.orders.list_orders(&filter, page).await?;
        Ok(page.paginate(orders, total))
    }

    /// 批量查询；顾客只能拿到自己的订单，其余编号静默忽略
    pub async fn batch(&self, actor: &Actor, req: BatchOrdersRequest) -> AppResult<Vec<Order>> {
        let ids = req.validated_ids()?;
        let orders = self.orders.find_orders(&ids).await?;
        Ok(orders
            .into_iter()
            .filter(|order| actor.can_see(order))
            .collect())
    }

    pub async fn pay(&self, actor: &Actor, order_id: &str, req: PayOrderRequest) -> AppResult<Order> {
        if !matches!(actor, Actor::Customer(_)) {
            return Err(AppError::Forbidden("只有下单用户可以支付订单".into()));
        }
        self.get(actor, order_id).await?;

        let payment_method = req.payment_method()?;

        self.transition(order_id, StatusChange::Pay { payment_method })
            .await
    }

    pub async fn cancel(&self, actor: &Actor, order_id: &str) -> AppResult<Order> {
        self.get(actor, order_id).await?;
        self.transition(order_id, StatusChange::Cancel).await
    }

    pub async fn ship(&self, order_id: &str, req: ShipOrderRequest) -> AppResult<Order> {
        let shipment = req.validate()?;
        self.transition(order_id, StatusChange::Ship(shipment)).await
    }

    pub async fn deliver(&self, order_id: &str) -> AppResult<Order> {
        self.transition(order_id, StatusChange::Deliver).await
    }

    pub async fn update_receiver(
        &self,
        actor: &Actor,
        order_id: &str,
        req: UpdateReceiverRequest,
    ) -> AppResult<Order> {
        let update = req.validate()?;
        self.get(actor, order_id).await?;

        match self
            .orders
            .update_receiver(order_id, &RECEIVER_EDITABLE, &update)
            .await?
        {
            Some(order) => Ok(order),
            None => Err(self.rejection(order_id, &RECEIVER_EDITABLE, "修改收货信息").await),
        }
    }

    pub async fn update_express(
        &self,
        order_id: &str,
        req: UpdateExpressRequest,
    ) -> AppResult<Order> {
        let update = req.validate()?;

        match self
            .orders
            .update_express(order_id, &EXPRESS_EDITABLE, &update)
            .await?
        {
            Some(order) => Ok(order),
            None => Err(self.rejection(order_id, &EXPRESS_EDITABLE, "修改物流信息").await),
        }
    }

    async fn transition(&self, order_id: &str, change: StatusChange) -> AppResult<Order> {
        let action = change.action();

        if let Some(order) = self.orders.apply_status_change(order_id, &change).await? {
            tracing::info!("Order {} -> {}", order_id, order.status.as_str());
            return Ok(order);
        }

        Err(self
            .rejection(order_id, action.allowed_from(), action.label())
            .await)
    }

    /// 条件写入未命中时，重新读取以区分订单不存在与状态不允许
    async fn rejection(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        action: &'static str,
    ) -> AppError {
        match self.orders.find_order(order_id).await {
            Ok(None) => AppError::not_found("订单不存在"),
            Ok(Some(order)) if !allowed.contains(&order.status) => AppError::InvalidState {
                from: order.status,
                action,
            },
            Ok(Some(_)) => AppError::Conflict("订单状态已变化，请重试".into()),
            Err(e) => e.into(),
        }
    }
}
