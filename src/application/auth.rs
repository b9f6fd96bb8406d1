use std::sync::Arc;

use crate::database::{StoreError, UserRepository};
use crate::error::{AppError, AppResult};
use crate::infrastructure::IdentityProvider;
use crate::models::user::{
    LoginRequest, LoginResponse, NewUser, RefreshResponse, RegisterRequest, RegisterResponse,
    UpdateProfileRequest, User, WechatLoginRequest,
};
use crate::utils::{Role, TokenService, hash_password, is_valid_mobile, verify_password, wechat_nickname};

/// 注册、登录、令牌刷新与个人资料
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
        tokens: TokenService,
    ) -> Self {
        Self {
            users,
            identity,
            tokens,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<RegisterResponse> {
        let (mobile, nickname) = req.validate()?;
        let password_hash = hash_password(&req.password).await?;

        let user = self
            .users
            .insert_user(NewUser {
                mobile: Some(mobile),
                openid: None,
                password_hash: Some(password_hash),
                nickname,
            })
            .await?;

        Ok(RegisterResponse {
            user_id: user.user_id,
            nickname: user.nickname,
            registration_time: user.registration_date,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let mobile = req.mobile.trim();
        if !is_valid_mobile(mobile) {
            return Err(AppError::validation("手机号格式不正确"));
        }

        let user = self
            .users
            .find_user_by_mobile(mobile)
            .await?
            .ok_or_else(|| AppError::not_found("用户不存在"))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("账号已停用".into()));
        }
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::Unauthorized("该账号未设置密码，请使用微信登录".into()));
        };
        if !verify_password(&req.password, hash).await? {
            return Err(AppError::Unauthorized("密码错误".into()));
        }

        self.sign_in(&user).await
    }

    pub async fn wechat_login(&self, req: WechatLoginRequest) -> AppResult<LoginResponse> {
        let code = req.code.trim();
        if code.is_empty() {
            return Err(AppError::validation("缺少微信登录code"));
        }

        let openid = self.identity.exchange_code(code).await?;

        let user = match self.users.find_user_by_openid(&openid).await? {
            Some(user) => user,
            None => self.create_wechat_user(&openid, req.nickname).await?,
        };

        if !user.is_active {
            return Err(AppError::Unauthorized("账号已停用".into()));
        }

        self.sign_in(&user).await
    }

    async fn create_wechat_user(&self, openid: &str, nickname: Option<String>) -> AppResult<User> {
        let nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| wechat_nickname(openid));

        let created = self
            .users
            .insert_user(NewUser {
                mobile: None,
                openid: Some(openid.to_string()),
                password_hash: None,
                nickname,
            })
            .await;

        match created {
            Ok(user) => Ok(user),
            // 并发的首次登录，另一请求已创建该用户
            Err(StoreError::Duplicate(_)) => self
                .users
                .find_user_by_openid(openid)
                .await?
                .ok_or_else(|| AppError::internal("openid 冲突但查询不到用户")),
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_in(&self, user: &User) -> AppResult<LoginResponse> {
        let subject = user.user_id.to_string();
        let tokens = self.tokens.issue(&subject, Role::Customer)?;

        if let Err(e) = self.users.record_login(user.user_id).await {
            tracing::warn!("Failed to record login for user {}: {}", user.user_id, e);
        }

        tracing::info!("User {} signed in", user.user_id);
        Ok(LoginResponse {
            user_id: subject,
            access: tokens.access,
            refresh: tokens.refresh,
        })
    }

    pub fn refresh(&self, refresh_token: Option<&str>) -> AppResult<RefreshResponse> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("缺少刷新令牌".into()))?;

        let access = self.tokens.refresh(token)?;
        Ok(RefreshResponse { access })
    }

    pub async fn profile(&self, user_id: i64) -> AppResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("用户不存在"))
    }

    pub async fn update_profile(&self, user_id: i64, req: UpdateProfileRequest) -> AppResult<User> {
        let update = req.validate()?;
        self.users
            .update_profile(user_id, &update)
            .await?
            .ok_or_else(|| AppError::not_found("用户不存在"))
    }

    pub async fn find_by_mobile(&self, mobile: &str) -> AppResult<User> {
        let mobile = mobile.trim();
        if !is_valid_mobile(mobile) {
            return Err(AppError::validation("手机号格式不正确"));
        }
        self.users
            .find_user_by_mobile(mobile)
            .await?
            .ok_or_else(|| AppError::not_found("用户不存在"))
    }
}
