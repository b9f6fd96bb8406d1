mod handler;
mod model;

pub use handler::{
    add_to_cart, batch_delete, clear_cart, decrease, increase, list_cart, set_quantity,
};
