mod handler;
mod model;

pub use handler::{list_registered_ips, obtain_access_token};
