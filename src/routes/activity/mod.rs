mod handler;
mod model;

pub use handler::{
    activity_offline, activity_online, create_activity, list_activities, replace_commodities,
};
