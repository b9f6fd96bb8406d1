mod common;

use std::sync::Arc;

use backend::{
    application::AuthService,
    error::AppError,
    models::user::{
        LoginRequest, RegisterRequest, UpdateProfileRequest, WechatLoginRequest,
    },
    utils::{Role, TokenKind},
};
use common::{MemoryStore, StubIdentity, token_service};

fn auth_service(store: Arc<MemoryStore>) -> AuthService {
    AuthService::new(store, Arc::new(StubIdentity), token_service())
}

fn register_request(mobile: &str) -> RegisterRequest {
    serde_json::from_value(serde_json::json!({
        "mobile": mobile,
        "password": "secret12",
    }))
    .unwrap()
}

fn login_request(mobile: &str, password: &str) -> LoginRequest {
    LoginRequest {
        mobile: mobile.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_then_login_issues_customer_tokens() {
    let store = MemoryStore::new();
    let auth = auth_service(store.clone());

    let registered = auth.register(register_request("13800138000")).await.unwrap();
    assert_eq!(registered.nickname, "手机用户_8000");

    let login = auth
        .login(login_request("13800138000", "secret12"))
        .await
        .unwrap();
    assert_eq!(login.user_id, registered.user_id.to_string());

    let claims = token_service().verify_access(&login.access).unwrap();
    assert_eq!(claims.sub, login.user_id);
    assert_eq!(claims.role, Role::Customer);
    assert_eq!(claims.typ, TokenKind::Access);

    assert!(store.user(registered.user_id).last_login.is_some());
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let store = MemoryStore::new();
    let auth = auth_service(store.clone());

    auth.register(register_request("13800138000")).await.unwrap();
    let err = auth
        .register(register_request("13800138000"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(store.user_count(), 1);
}

#[tokio::test]
async fn login_failures() {
    let auth = auth_service(MemoryStore::new());
    auth.register(register_request("13800138000")).await.unwrap();

    let err = auth
        .login(login_request("12345", "secret12"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth
        .login(login_request("13900139000", "secret12"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = auth
        .login(login_request("13800138000", "wrong-password"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn wechat_login_creates_user_once() {
    let store = MemoryStore::new();
    let auth = auth_service(store.clone());

    let first = auth
        .wechat_login(WechatLoginRequest {
            code: "abcdefghijk".into(),
            nickname: None,
        })
        .await
        .unwrap();
    let second = auth
        .wechat_login(WechatLoginRequest {
            code: "abcdefghijk".into(),
            nickname: Some("小明".into()),
        })
        .await
        .unwrap();

    assert_eq!(first.user_id, second.user_id);
    assert_eq!(store.user_count(), 1);

    let user_id: i64 = first.user_id.parse().unwrap();
    let user = store.user(user_id);
    assert_eq!(user.nickname, "微信用户_openid-a");
    assert!(user.password_hash.is_none());
}

#[tokio::test]
async fn wechat_only_account_cannot_use_password_login() {
    let store = MemoryStore::new();
    let auth = auth_service(store.clone());

    auth.wechat_login(WechatLoginRequest {
        code: "code1".into(),
        nickname: None,
    })
    .await
    .unwrap();

    // 微信账号绑定手机号后仍没有密码
    let user_id = 1;
    let mut user = store.user(user_id);
    user.mobile = Some("13700137000".into());
    store.replace_user(user);

    let err = auth
        .login(login_request("13700137000", "secret12"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn upstream_rejection_is_reported() {
    let auth = auth_service(MemoryStore::new());

    for code in ["rejected", "no-openid"] {
        let err = auth
            .wechat_login(WechatLoginRequest {
                code: code.into(),
                nickname: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)), "{code}: {err:?}");
    }

    let err = auth
        .wechat_login(WechatLoginRequest {
            code: "  ".into(),
            nickname: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn refresh_only_accepts_refresh_tokens() {
    let auth = auth_service(MemoryStore::new());
    auth.register(register_request("13800138000")).await.unwrap();
    let login = auth
        .login(login_request("13800138000", "secret12"))
        .await
        .unwrap();

    let refreshed = auth.refresh(Some(&login.refresh)).unwrap();
    let claims = token_service().verify_access(&refreshed.access).unwrap();
    assert_eq!(claims.sub, login.user_id);

    assert!(matches!(
        auth.refresh(Some(&login.access)),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(auth.refresh(None), Err(AppError::Unauthorized(_))));
    assert!(matches!(
        auth.refresh(Some("not-a-token")),
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn profile_update_rules() {
    let auth = auth_service(MemoryStore::new());
    let registered = auth.register(register_request("13800138000")).await.unwrap();

    let updated = auth
        .update_profile(
            registered.user_id,
            UpdateProfileRequest {
                nickname: Some("新昵称".into()),
                city: Some("杭州市".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nickname, "新昵称");
    assert_eq!(updated.city.as_deref(), Some("杭州市"));
    assert_eq!(updated.mobile.as_deref(), Some("13800138000"));

    let err = auth
        .update_profile(
            registered.user_id,
            UpdateProfileRequest {
                mobile: Some(serde_json::json!("13900139000")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = auth
        .update_profile(
            registered.user_id,
            UpdateProfileRequest {
                nickname: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
