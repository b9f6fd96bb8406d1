use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("请求微信服务失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("微信服务返回无法解析的响应: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("微信登录失败({code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("微信登录失败: 未返回openid")]
    MissingOpenId,
}

/// 第三方身份提供方：用一次性授权码换取用户的 openid
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl SessionResponse {
    fn into_openid(self) -> Result<String, IdentityError> {
        if self.errcode != 0 {
            return Err(IdentityError::Rejected {
                code: self.errcode,
                msg: self.errmsg,
            });
        }
        self.openid
            .filter(|id| !id.is_empty())
            .ok_or(IdentityError::MissingOpenId)
    }
}

/// 微信小程序 code2session
#[derive(Clone)]
pub struct WechatClient {
    http: reqwest::Client,
    app_id: String,
    app_secret: String,
    login_url: String,
}

impl WechatClient {
    pub fn new(app_id: String, app_secret: String, login_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_id,
            app_secret,
            login_url,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.wechat_app_id.clone(),
            config.wechat_app_secret.clone(),
            config.wechat_login_url.clone(),
        )
    }
}

#[async_trait]
impl IdentityProvider for WechatClient {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .get(&self.login_url)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?;

        // 微信接口以 text/plain 返回 JSON
        let body = response.text().await?;
        let session: SessionResponse = serde_json::from_str(&body)?;
        let openid = session.into_openid().inspect_err(|e| {
            tracing::warn!("wechat code exchange rejected: {}", e);
        })?;

        tracing::debug!("wechat code exchanged for openid {}", openid);
        Ok(openid)
    }
}
