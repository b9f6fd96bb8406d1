mod common;

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use backend::{
    application::{Actor, MAX_ORDER_ID_ATTEMPTS, OrderService},
    common::PageRequest,
    database::{OrderRepository, StoreError},
    error::AppError,
    models::OrderStatus,
    models::order::{
        BatchOrdersRequest, CreateOrderRequest, ExpressUpdate, ListOrdersQuery, NewOrder, Order,
        OrderFilter, PayOrderRequest, ReceiverUpdate, ShipOrderRequest, StatusChange,
        UpdateExpressRequest, UpdateReceiverRequest, is_valid_order_id,
    },
};
use common::MemoryStore;
use rust_decimal::Decimal;
use serde_json::json;

const CUSTOMER: i64 = 1;

fn service(store: &Arc<MemoryStore>) -> OrderService {
    OrderService::new(store.clone())
}

fn operator() -> Actor {
    Actor::Operator("100001".into())
}

fn order_request() -> CreateOrderRequest {
    serde_json::from_value(json!({
        "receiver_name": "张三",
        "receiver_phone": "13800138000",
        "province": "浙江省",
        "city": "杭州市",
        "county": "西湖区",
        "detailed_address": "文三路1号",
        "order_amount": "39.80",
        "items": [{"sku": "A1", "qty": 2}],
    }))
    .unwrap()
}

fn ship_request(carrier: &str, tracking: &str) -> ShipOrderRequest {
    serde_json::from_value(json!({"carrier": carrier, "tracking": tracking})).unwrap()
}

/// 顾客 1 先注册，支付时累计消费金额
async fn store_with_customer() -> Arc<MemoryStore> {
    use backend::database::UserRepository;
    use backend::models::NewUser;

    let store = MemoryStore::new();
    store
        .insert_user(NewUser {
            mobile: Some("13800138000".into()),
            openid: None,
            password_hash: None,
            nickname: "张三".into(),
        })
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn create_pay_ship_deliver() {
    let store = store_with_customer().await;
    let orders = service(&store);
    let customer = Actor::Customer(CUSTOMER);

    let order = orders.create(CUSTOMER, order_request()).await.unwrap();
    assert!(is_valid_order_id(&order.order_id));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.order_amount, Decimal::from_str("39.80").unwrap());

    let paid = orders
        .pay(&customer, &order.order_id, PayOrderRequest::default())
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.payment_method.as_deref(), Some("微信支付"));
    assert!(paid.payment_time.is_some());
    assert_eq!(
        store.user(CUSTOMER).total_spending,
        Decimal::from_str("39.80").unwrap()
    );

    let shipped = orders
        .ship(&order.order_id, ship_request("SF", "SF123"))
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.express_company.as_deref(), Some("SF"));
    assert_eq!(shipped.express_number.as_deref(), Some("SF123"));
    assert_eq!(store.sales_volume("A1"), 2);
    assert_eq!(
        store.logistics(),
        vec![(order.order_id.clone(), "SF".to_string(), "SF123".to_string())]
    );

    let delivered = orders.deliver(&order.order_id).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let err = orders.cancel(&customer, &order.order_id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            from: OrderStatus::Delivered,
            ..
        }
    ));
}

#[tokio::test]
async fn cancel_rules() {
    let store = store_with_customer().await;
    let orders = service(&store);
    let customer = Actor::Customer(CUSTOMER);

    // 待支付可由顾客取消，取消后不能再支付
    let pending = orders.create(CUSTOMER, order_request()).await.unwrap();
    let cancelled = orders.cancel(&customer, &pending.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = orders
        .pay(&customer, &pending.order_id, PayOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            from: OrderStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(store.user(CUSTOMER).total_spending, Decimal::ZERO);

    // 已支付可由运营取消，已发货不可取消
    let paid = orders.create(CUSTOMER, order_request()).await.unwrap();
    orders
        .pay(&customer, &paid.order_id, PayOrderRequest::default())
        .await
        .unwrap();
    let cancelled = orders.cancel(&operator(), &paid.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let shipped = orders.create(CUSTOMER, order_request()).await.unwrap();
    orders
        .pay(&customer, &shipped.order_id, PayOrderRequest::default())
        .await
        .unwrap();
    orders
        .ship(&shipped.order_id, ship_request("YTO", "YT0001"))
        .await
        .unwrap();
    let err = orders.cancel(&customer, &shipped.order_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState { .. }));
}

#[tokio::test]
async fn shipping_requires_payment() {
    let store = store_with_customer().await;
    let orders = service(&store);

    let order = orders.create(CUSTOMER, order_request()).await.unwrap();
    let err = orders
        .ship(&order.order_id, ship_request("SF", "SF123"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            from: OrderStatus::Pending,
            ..
        }
    ));
    assert_eq!(store.sales_volume("A1"), 0);

    let err = orders
        .ship(&order.order_id, ship_request("SF", "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = orders.deliver("Y2026101800000000").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let store = store_with_customer().await;
    let orders = service(&store);

    let mine = orders.create(CUSTOMER, order_request()).await.unwrap();
    orders.create(2, order_request()).await.unwrap();

    let stranger = Actor::Customer(2);
    let err = orders.get(&stranger, &mine.order_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = orders
        .pay(&stranger, &mine.order_id, PayOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = orders
        .pay(&operator(), &mine.order_id, PayOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(
        orders.get(&operator(), &mine.order_id).await.unwrap().order_id,
        mine.order_id
    );

    // 顾客传入其他用户编号也只能查到自己的订单
    let page = orders
        .list(
            &Actor::Customer(CUSTOMER),
            ListOrdersQuery {
                user_id: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].order_id, mine.order_id);

    let all = orders
        .list(&operator(), ListOrdersQuery::default())
        .await
        .unwrap();
    assert_eq!(all.pagination.total, 2);
    assert_eq!(all.pagination.page, 1);
    assert_eq!(all.pagination.page_size, 20);

    let by_user = orders
        .list(
            &operator(),
            ListOrdersQuery {
                user_id: Some(2),
                status: Some("pending".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_user.pagination.total, 1);
    assert_eq!(by_user.items[0].user_id, 2);
}

#[tokio::test]
async fn invalid_creation_input() {
    let store = store_with_customer().await;
    let orders = service(&store);

    let mut empty = order_request();
    empty.items.clear();
    let err = orders.create(CUSTOMER, empty).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut zero_qty = order_request();
    zero_qty.items[0].qty = 0;
    let err = orders.create(CUSTOMER, zero_qty).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut negative = order_request();
    negative.order_amount = Decimal::from_str("-1").unwrap();
    let err = orders.create(CUSTOMER, negative).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let page = orders
        .list(&operator(), ListOrdersQuery::default())
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 0);
}

#[tokio::test]
async fn receiver_and_express_edits_follow_status() {
    let store = store_with_customer().await;
    let orders = service(&store);
    let customer = Actor::Customer(CUSTOMER);
    let order = orders.create(CUSTOMER, order_request()).await.unwrap();

    let updated = orders
        .update_receiver(
            &customer,
            &order.order_id,
            UpdateReceiverRequest {
                receiver_name: Some("李四".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.receiver_name, "李四");
    assert_eq!(updated.city, "杭州市");

    // 地址字段必须同时提供
    let err = orders
        .update_receiver(
            &customer,
            &order.order_id,
            UpdateReceiverRequest {
                city: Some("宁波市".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = orders
        .update_express(
            &order.order_id,
            UpdateExpressRequest {
                carrier: Some("ZTO".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            from: OrderStatus::Pending,
            ..
        }
    ));

    orders
        .pay(&customer, &order.order_id, PayOrderRequest::default())
        .await
        .unwrap();
    orders
        .ship(&order.order_id, ship_request("SF", "SF123"))
        .await
        .unwrap();

    let err = orders
        .update_receiver(
            &customer,
            &order.order_id,
            UpdateReceiverRequest {
                receiver_name: Some("王五".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            from: OrderStatus::Shipped,
            ..
        }
    ));

    let updated = orders
        .update_express(
            &order.order_id,
            UpdateExpressRequest {
                tracking: Some("SF456".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.express_company.as_deref(), Some("SF"));
    assert_eq!(updated.express_number.as_deref(), Some("SF456"));
}

#[tokio::test]
async fn concurrent_change_is_reported_as_conflict() {
    let store = store_with_customer().await;
    let orders = service(&store);
    let order = orders.create(CUSTOMER, order_request()).await.unwrap();

    store.drop_next_status_write();
    let err = orders
        .pay(
            &Actor::Customer(CUSTOMER),
            &order.order_id,
            PayOrderRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let order = orders
        .get(&Actor::Customer(CUSTOMER), &order.order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

/// 前若干次插入报订单号重复，其余操作交给内存存储
struct CollidingOrders {
    inner: Arc<MemoryStore>,
    collisions: AtomicUsize,
    attempts: AtomicUsize,
}

impl CollidingOrders {
    fn new(inner: Arc<MemoryStore>, collisions: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            collisions: AtomicUsize::new(collisions),
            attempts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl OrderRepository for CollidingOrders {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let collided = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collided {
            return Err(StoreError::Duplicate("订单号"));
        }
        self.inner.insert_order(order).await
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        self.inner.find_order(order_id).await
    }

    async fn find_orders(&self, order_ids: &[String]) -> Result<Vec<Order>, StoreError> {
        self.inner.find_orders(order_ids).await
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), StoreError> {
        self.inner.list_orders(filter, page).await
    }

    async fn apply_status_change(
        &self,
        order_id: &str,
        change: &StatusChange,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.apply_status_change(order_id, change).await
    }

    async fn update_receiver(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ReceiverUpdate,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.update_receiver(order_id, allowed, update).await
    }

    async fn update_express(
        &self,
        order_id: &str,
        allowed: &[OrderStatus],
        update: &ExpressUpdate,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.update_express(order_id, allowed, update).await
    }
}

#[tokio::test]
async fn order_id_collisions_are_retried() {
    let store = store_with_customer().await;
    let colliding = CollidingOrders::new(store.clone(), MAX_ORDER_ID_ATTEMPTS - 1);
    let orders = OrderService::new(colliding.clone());

    let order = orders.create(CUSTOMER, order_request()).await.unwrap();
    assert!(is_valid_order_id(&order.order_id));
    assert_eq!(colliding.attempts.load(Ordering::SeqCst), MAX_ORDER_ID_ATTEMPTS);
    assert!(store.find_order(&order.order_id).await.unwrap().is_some());
}

#[tokio::test]
async fn exhausted_order_id_attempts_are_a_conflict() {
    let store = store_with_customer().await;
    let colliding = CollidingOrders::new(store.clone(), MAX_ORDER_ID_ATTEMPTS);
    let orders = OrderService::new(colliding.clone());

    let err = orders.create(CUSTOMER, order_request()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(colliding.attempts.load(Ordering::SeqCst), MAX_ORDER_ID_ATTEMPTS);

    let page = orders
        .list(&operator(), ListOrdersQuery::default())
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 0);
}

#[tokio::test]
async fn batch_lookup_is_scoped_to_the_customer() {
    use backend::database::UserRepository;
    use backend::models::NewUser;

    let store = store_with_customer().await;
    let other = store
        .insert_user(NewUser {
            mobile: Some("13900139000".into()),
            openid: None,
            password_hash: None,
            nickname: "李四".into(),
        })
        .await
        .unwrap();
    let orders = service(&store);
    let mine = orders.create(CUSTOMER, order_request()).await.unwrap();
    let theirs = orders.create(other.user_id, order_request()).await.unwrap();

    let ids = vec![
        mine.order_id.clone(),
        theirs.order_id.clone(),
        "Y2000010112345678".to_string(),
        mine.order_id.clone(),
    ];
    let found = orders
        .batch(
            &Actor::Customer(CUSTOMER),
            BatchOrdersRequest {
                order_ids: ids.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].order_id, mine.order_id);

    let found = orders
        .batch(&operator(), BatchOrdersRequest { order_ids: ids })
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let err = orders
        .batch(&operator(), BatchOrdersRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
