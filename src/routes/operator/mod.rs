mod handler;
mod model;

pub use handler::{change_password, create_operator, operator_login};
