mod handler;

pub use handler::{
    find_by_mobile, get_user, login, me, refresh_token, register, update_me, wechat_login,
};
