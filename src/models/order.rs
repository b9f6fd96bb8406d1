use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::error::AppError;
use crate::utils::check_length;

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "待支付",
            Self::Paid => "已支付",
            Self::Shipped => "已发货",
            Self::Delivered => "已送达",
            Self::Cancelled => "已取消",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("未知的订单状态: {}", s))
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 改变订单状态的操作，每个操作只能从固定的状态出发
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Pay,
    Cancel,
    Ship,
    Deliver,
}

impl OrderAction {
    pub fn allowed_from(&self) -> &'static [OrderStatus] {
        match self {
            Self::Pay => &[OrderStatus::Pending],
            Self::Cancel => &[OrderStatus::Pending, OrderStatus::Paid],
            Self::Ship => &[OrderStatus::Paid],
            Self::Deliver => &[OrderStatus::Shipped],
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            Self::Pay => OrderStatus::Paid,
            Self::Cancel => OrderStatus::Cancelled,
            Self::Ship => OrderStatus::Shipped,
            Self::Deliver => OrderStatus::Delivered,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pay => "支付",
            Self::Cancel => "取消",
            Self::Ship => "发货",
            Self::Deliver => "确认送达",
        }
    }

    /// 当前状态允许该操作时返回目标状态
    pub fn apply(&self, from: OrderStatus) -> Result<OrderStatus, AppError> {
        if self.allowed_from().contains(&from) {
            Ok(self.target())
        } else {
            Err(AppError::InvalidState {
                from,
                action: self.label(),
            })
        }
    }

    /// 以字符串形式给出的前置状态，用于 `status = ANY($n)`
    pub fn allowed_from_strs(&self) -> Vec<String> {
        self.allowed_from()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

/// 下单时冻结的商品快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(alias = "commodity_id")]
    pub sku: String,
    #[serde(alias = "quantity")]
    pub qty: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub order_id: String,
    pub user_id: i64,
    pub receiver_name: String,
    pub receiver_phone: Option<String>,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    pub order_amount: Decimal,
    pub product_list: Json<Vec<LineItem>>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub delivery_method: Option<String>,
    pub express_company: Option<String>,
    pub express_number: Option<String>,
    pub logistics_process: Option<Json<serde_json::Value>>,
    pub order_time: DateTime<Utc>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub receiver_name: String,
    #[serde(default)]
    pub receiver_phone: Option<String>,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    pub order_amount: Decimal,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// 校验通过、待写入的订单
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: String,
    pub user_id: i64,
    pub receiver_name: String,
    pub receiver_phone: Option<String>,
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
    pub order_amount: Decimal,
    pub items: Vec<LineItem>,
    pub remarks: Option<String>,
}

// 与 order_data 列宽一致
const NAME_MAX: usize = 100;
const PHONE_MAX: usize = 15;
const REGION_MAX: usize = 50;
const ADDRESS_MAX: usize = 255;
const EXPRESS_MAX: usize = 50;

/// NUMERIC(10,2) 的上限（不含）
pub fn max_order_amount() -> Decimal {
    Decimal::from(100_000_000i64)
}

fn non_blank(value: &str, field: &str, max: usize) -> Result<String, AppError> {
    let text = crate::utils::require_text(value, field)?;
    check_length(&text, field, max)?;
    Ok(text)
}

fn optional_text(value: Option<String>, field: &str, max: usize) -> Result<Option<String>, AppError> {
    let text = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if let Some(t) = &text {
        check_length(t, field, max)?;
    }
    Ok(text)
}

impl CreateOrderRequest {
    /// 校验并整理下单参数，订单号由调用方生成
    pub fn into_new_order(self, user_id: i64, order_id: String) -> Result<NewOrder, AppError> {
        if self.items.is_empty() {
            return Err(AppError::validation("商品列表不能为空"));
        }
        for item in &self.items {
            if item.sku.trim().is_empty() {
                return Err(AppError::validation("商品编号不能为空"));
            }
            if item.qty < 1 {
                return Err(AppError::validation(format!(
                    "商品{}的数量必须大于0",
                    item.sku
                )));
            }
        }
        if self.order_amount.is_sign_negative() {
            return Err(AppError::validation("订单金额不能为负数"));
        }
        let order_amount = self.order_amount.round_dp(2);
        if order_amount >= max_order_amount() {
            return Err(AppError::validation("订单金额超出上限"));
        }

        Ok(NewOrder {
            order_id,
            user_id,
            receiver_name: non_blank(&self.receiver_name, "收货人", NAME_MAX)?,
            receiver_phone: optional_text(self.receiver_phone, "收货电话", PHONE_MAX)?,
            province: non_blank(&self.province, "省份", REGION_MAX)?,
            city: non_blank(&self.city, "城市", REGION_MAX)?,
            county: non_blank(&self.county, "区县", REGION_MAX)?,
            detailed_address: non_blank(&self.detailed_address, "详细地址", ADDRESS_MAX)?,
            order_amount,
            items: self
                .items
                .into_iter()
                .map(|item| LineItem {
                    sku: item.sku.trim().to_string(),
                    ..item
                })
                .collect(),
            remarks: self
                .remarks
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayOrderRequest {
    #[serde(default)]
    pub payment_method: Option<String>,
}

pub const DEFAULT_PAYMENT_METHOD: &str = "微信支付";

impl PayOrderRequest {
    /// 未填写时使用默认支付方式
    pub fn payment_method(self) -> Result<String, AppError> {
        Ok(optional_text(self.payment_method, "支付方式", EXPRESS_MAX)?
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipOrderRequest {
    #[serde(alias = "express_company")]
    pub carrier: String,
    #[serde(alias = "express_number")]
    pub tracking: String,
}

/// 发货参数：承运商与运单号均不能为空
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub carrier: String,
    pub tracking: String,
}

impl ShipOrderRequest {
    pub fn validate(self) -> Result<Shipment, AppError> {
        Ok(Shipment {
            carrier: non_blank(&self.carrier, "快递公司", EXPRESS_MAX)?,
            tracking: non_blank(&self.tracking, "快递单号", EXPRESS_MAX)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReceiverRequest {
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub detailed_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverAddress {
    pub province: String,
    pub city: String,
    pub county: String,
    pub detailed_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverUpdate {
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub address: Option<ReceiverAddress>,
}

impl UpdateReceiverRequest {
    /// 至少修改一项；省、市、区县、详细地址必须同时提供
    pub fn validate(self) -> Result<ReceiverUpdate, AppError> {
        let receiver_name = match self.receiver_name {
            Some(name) => Some(non_blank(&name, "收货人", NAME_MAX)?),
            None => None,
        };
        let receiver_phone = self.receiver_phone.map(|p| p.trim().to_string());
        if let Some(phone) = &receiver_phone {
            check_length(phone, "收货电话", PHONE_MAX)?;
        }

        let address = match (self.province, self.city, self.county, self.detailed_address) {
            (None, None, None, None) => None,
            (Some(province), Some(city), Some(county), Some(detailed)) => Some(ReceiverAddress {
                province: non_blank(&province, "省份", REGION_MAX)?,
                city: non_blank(&city, "城市", REGION_MAX)?,
                county: non_blank(&county, "区县", REGION_MAX)?,
                detailed_address: non_blank(&detailed, "详细地址", ADDRESS_MAX)?,
            }),
            _ => {
                return Err(AppError::validation(
                    "修改地址时省份、城市、区县和详细地址必须同时提供",
                ));
            }
        };

        if receiver_name.is_none() && receiver_phone.is_none() && address.is_none() {
            return Err(AppError::validation("没有需要修改的收货信息"));
        }

        Ok(ReceiverUpdate {
            receiver_name,
            receiver_phone,
            address,
        })
    }
}

impl ReceiverUpdate {
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(name) = &self.receiver_name {
            order.receiver_name = name.clone();
        }
        if let Some(phone) = &self.receiver_phone {
            order.receiver_phone = Some(phone.clone());
        }
        if let Some(addr) = &self.address {
            order.province = addr.province.clone();
            order.city = addr.city.clone();
            order.county = addr.county.clone();
            order.detailed_address = addr.detailed_address.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExpressRequest {
    #[serde(default, alias = "express_company")]
    pub carrier: Option<String>,
    #[serde(default, alias = "express_number")]
    pub tracking: Option<String>,
    #[serde(default)]
    pub logistics_process: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressUpdate {
    pub carrier: Option<String>,
    pub tracking: Option<String>,
    pub logistics_process: Option<serde_json::Value>,
}

impl UpdateExpressRequest {
    pub fn validate(self) -> Result<ExpressUpdate, AppError> {
        let carrier = match self.carrier {
            Some(c) => Some(non_blank(&c, "快递公司", EXPRESS_MAX)?),
            None => None,
        };
        let tracking = match self.tracking {
            Some(t) => Some(non_blank(&t, "快递单号", EXPRESS_MAX)?),
            None => None,
        };
        if carrier.is_none() && tracking.is_none() && self.logistics_process.is_none() {
            return Err(AppError::validation("没有需要修改的物流信息"));
        }
        Ok(ExpressUpdate {
            carrier,
            tracking,
            logistics_process: self.logistics_process,
        })
    }
}

impl ExpressUpdate {
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(carrier) = &self.carrier {
            order.express_company = Some(carrier.clone());
        }
        if let Some(tracking) = &self.tracking {
            order.express_number = Some(tracking.clone());
        }
        if let Some(process) = &self.logistics_process {
            order.logistics_process = Some(Json(process.clone()));
        }
    }
}

/// 状态变更及其附带写入，由存储层以比较并设置的方式执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Pay { payment_method: String },
    Cancel,
    Ship(Shipment),
    Deliver,
}

impl StatusChange {
    pub fn action(&self) -> OrderAction {
        match self {
            Self::Pay { .. } => OrderAction::Pay,
            Self::Cancel => OrderAction::Cancel,
            Self::Ship(_) => OrderAction::Ship,
            Self::Deliver => OrderAction::Deliver,
        }
    }
}

/// 修改收货信息只允许在发货前
pub const RECEIVER_EDITABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Paid];
/// 修改物流信息只允许在发货后
pub const EXPRESS_EDITABLE: [OrderStatus; 2] = [OrderStatus::Shipped, OrderStatus::Delivered];

/// 批量查询订单时一次最多的订单号数量
pub const MAX_BATCH_ORDERS: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOrdersRequest {
    #[serde(alias = "ids")]
    pub order_ids: Vec<String>,
}

impl BatchOrdersRequest {
    /// 去重后的订单号，保持请求顺序
    pub fn validated_ids(self) -> Result<Vec<String>, AppError> {
        let mut ids: Vec<String> = Vec::with_capacity(self.order_ids.len());
        for id in self.order_ids {
            let id = id.trim().to_string();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(AppError::validation("订单号列表不能为空"));
        }
        if ids.len() > MAX_BATCH_ORDERS {
            return Err(AppError::validation(format!(
                "一次最多查询{}个订单",
                MAX_BATCH_ORDERS
            )));
        }
        Ok(ids)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<i64>,
    pub status: Option<String>,
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    /// 含
    pub begin: Option<DateTime<Utc>>,
    /// 不含
    pub end: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|id| order.user_id == id)
            && self.status.is_none_or(|s| order.status == s)
            && self.begin.is_none_or(|b| order.order_time >= b)
            && self.end.is_none_or(|e| order.order_time < e)
    }
}

const ORDER_ID_PREFIX: char = 'Y';
const ORDER_ID_RANDOM_DIGITS: usize = 8;
const BEIJING_OFFSET_HOURS: i64 = 8;

/// 订单号：Y + 北京时间日期 + 8位随机数字
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..ORDER_ID_RANDOM_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    let local = now + Duration::hours(BEIJING_OFFSET_HOURS);
    format!("{}{}{}", ORDER_ID_PREFIX, local.format("%Y%m%d"), digits)
}

pub fn is_valid_order_id(order_id: &str) -> bool {
    let mut chars = order_id.chars();
    chars.next() == Some(ORDER_ID_PREFIX)
        && order_id.len() == 1 + 8 + ORDER_ID_RANDOM_DIGITS
        && chars.all(|c| c.is_ascii_digit())
}

fn parse_day(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{}格式错误，应为YYYY-MM-DD", field)))
}

fn beijing_midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::default()).and_utc() - Duration::hours(BEIJING_OFFSET_HOURS)
}

/// 北京时间日期区间转换为 UTC 的 [begin, end)，结束日期包含当天
pub fn parse_date_range(
    begin: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    let begin = begin
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_day(s, "开始日期"))
        .transpose()?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_day(s, "结束日期"))
        .transpose()?;

    if let (Some(b), Some(e)) = (begin, end) {
        if b > e {
            return Err(AppError::validation("开始日期不能晚于结束日期"));
        }
    }

    let end = match end {
        Some(day) => Some(
            day.succ_opt()
                .map(beijing_midnight)
                .ok_or_else(|| AppError::validation("结束日期超出范围"))?,
        ),
        None => None,
    };

    Ok((begin.map(beijing_midnight), end))
}

impl ListOrdersQuery {
    pub fn to_filter(&self) -> Result<OrderFilter, AppError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<OrderStatus>().map_err(AppError::Validation)?),
        };
        let (begin, end) = parse_date_range(self.begin_time.as_deref(), self.end_time.as_deref())?;
        Ok(OrderFilter {
            user_id: self.user_id,
            status,
            begin,
            end,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub order_time: DateTime<Utc>,
}
