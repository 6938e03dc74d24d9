mod handler;
pub mod model;

pub use handler::{
    create_contact,
    delete_contact,
    get_contact,
    get_contacts,
    update_contact,
};
