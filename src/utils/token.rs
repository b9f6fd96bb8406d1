use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Operator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 用户ID（运营账号为6位编号）
    pub iat: i64,      // 签发时间
    pub nbf: i64,      // 生效时间，等于签发时间
    pub exp: i64,      // 过期时间
    pub typ: TokenKind,
    pub role: Role,
}

impl Claims {
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("签名失败: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("令牌已过期")]
    Expired,

    #[error("令牌无效")]
    Invalid,

    #[error("令牌类型错误")]
    WrongKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// 访问令牌与刷新令牌的签发和校验，HS256 共享密钥
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    pub fn issue(&self, subject: &str, role: Role) -> Result<TokenPair, TokenError> {
        self.issue_at(subject, role, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.sign(subject, role, TokenKind::Access, now)?,
            refresh: self.sign(subject, role, TokenKind::Refresh, now)?,
        })
    }

    fn sign(
        &self,
        subject: &str,
        role: Role,
        typ: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = match typ {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            nbf: iat,
            exp: iat + ttl.as_secs() as i64,
            typ,
            role,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// 校验签名、算法与有效期，不区分令牌类型
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!("token rejected: {:?}", e.kind());
                    TokenError::Invalid
                }
            })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.typ != TokenKind::Access {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// 用刷新令牌换取新的访问令牌，刷新令牌本身不轮换
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenError> {
        self.refresh_at(refresh_token, Utc::now())
    }

    pub(crate) fn refresh_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = self.verify(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(TokenError::WrongKind);
        }
        self.sign(&claims.sub, claims.role, TokenKind::Access, now)
    }
}
