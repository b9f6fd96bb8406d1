use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub wechat_app_id: String,
    pub wechat_app_secret: String,
    pub wechat_login_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

const DEFAULT_WECHAT_LOGIN_URL: &str = "https://api.weixin.qq.com/sns/jscode2session";

/// 读取可选环境变量，缺失或解析失败时使用默认值
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let access_minutes = env_or::<u64>("JWT_ACCESS_TTL_MINUTES", 60);
        let refresh_hours = env::var("JWT_REFRESH_TTL_HOURS")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            access_token_ttl_secs: access_minutes * 60,
            refresh_token_ttl_secs: refresh_hours * 3600,
            wechat_app_id: env::var("WECHAT_APP_ID")?,
            wechat_app_secret: env::var("WECHAT_APP_SECRET")?,
            wechat_login_url: env::var("WECHAT_LOGIN_URL")
                .unwrap_or_else(|_| DEFAULT_WECHAT_LOGIN_URL.to_string()),
            rate_limit_window_secs: env_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 100),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "::".to_string()),
            server_port: env_or("SERVER_PORT", 3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".to_string()),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
