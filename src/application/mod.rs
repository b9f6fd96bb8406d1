pub mod auth;
pub mod order;

pub use auth::AuthService;
pub use order::{Actor, MAX_ORDER_ID_ATTEMPTS, OrderService};
