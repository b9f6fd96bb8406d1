pub mod wechat;

pub use wechat::{IdentityError, IdentityProvider, WechatClient};
