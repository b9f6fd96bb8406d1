mod handler;
mod model;

pub use handler::{
    batch_commodities, commodity_status, create_commodity, delete_commodity, get_commodity,
    list_categories, put_online, search_commodities, take_offline, update_commodity,
};
