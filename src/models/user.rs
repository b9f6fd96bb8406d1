use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::utils::{is_valid_mobile, is_valid_password, mobile_nickname, require_text};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub openid: Option<String>,
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub nickname: String,
    pub user_img: Option<String>,
    pub default_receiver: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub detailed_address: Option<String>,
    pub membership_level: i32,
    pub total_spending: Decimal,
    pub remarks: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub registration_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// 新建用户，手机号与 openid 至少有一个
#[derive(Debug, Clone)]
pub struct NewUser {
    pub mobile: Option<String>,
    pub openid: Option<String>,
    pub password_hash: Option<String>,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub mobile: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl RegisterRequest {
    /// 返回整理后的手机号与昵称
    pub fn validate(&self) -> Result<(String, String), AppError> {
        let mobile = self.mobile.trim();
        if !is_valid_mobile(mobile) {
            return Err(AppError::validation("手机号格式不正确"));
        }
        if !is_valid_password(&self.password) {
            return Err(AppError::validation("密码长度必须在6到24个字符之间"));
        }
        let nickname = match self.nickname.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => mobile_nickname(mobile),
        };
        Ok((mobile.to_string(), nickname))
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub nickname: String,
    pub registration_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct WechatLoginRequest {
    pub code: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub user_img: Option<String>,
    pub default_receiver: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub detailed_address: Option<String>,
    pub remarks: Option<String>,
    /// 手机号不允许通过资料接口修改
    pub mobile: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub user_img: Option<String>,
    pub default_receiver: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub detailed_address: Option<String>,
    pub remarks: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(self) -> Result<ProfileUpdate, AppError> {
        if self.mobile.is_some() {
            return Err(AppError::Forbidden("不允许修改手机号".into()));
        }
        let nickname = match self.nickname {
            Some(n) => Some(require_text(&n, "昵称")?),
            None => None,
        };
        Ok(ProfileUpdate {
            nickname,
            user_img: self.user_img,
            default_receiver: self.default_receiver,
            province: self.province,
            city: self.city,
            county: self.county,
            detailed_address: self.detailed_address,
            remarks: self.remarks,
        })
    }
}

impl ProfileUpdate {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.nickname {
            user.nickname = v.clone();
        }
        let optional = [
            (&self.user_img, &mut user.user_img),
            (&self.default_receiver, &mut user.default_receiver),
            (&self.province, &mut user.province),
            (&self.city, &mut user.city),
            (&self.county, &mut user.county),
            (&self.detailed_address, &mut user.detailed_address),
            (&self.remarks, &mut user.remarks),
        ];
        for (update, field) in optional {
            if let Some(v) = update {
                *field = Some(v.clone());
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MobileQuery {
    pub mobile: String,
}
