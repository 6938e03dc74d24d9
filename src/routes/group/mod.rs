mod handler;
pub mod model;

pub use handler::{
    create_group,
    delete_group,
    get_group_details,
    get_groups,
    update_group,
};
