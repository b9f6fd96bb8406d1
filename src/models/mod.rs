pub mod order;
pub mod user;

pub use order::{LineItem, NewOrder, Order, OrderAction, OrderFilter, OrderStatus};
pub use user::{NewUser, ProfileUpdate, User};
