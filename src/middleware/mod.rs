mod auth;
mod client_ip;
mod error_handler;
mod rate_limit;

pub use auth::{auth_middleware, require_operator};
pub use client_ip::{ClientIp, client_ip};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, rate_limit};
