mod handler;

pub use handler::{
    batch_orders, cancel_order, create_order, deliver_order, get_order, list_orders, pay_order, ship_order,
    update_express, update_receiver,
};
