mod handler;
pub mod model;

pub use handler::{
    SharingOptions,
    create_club,
    delete_club,
    get_club_details,
    get_club_edit_data,
    get_member_clubs,
    get_owned_clubs,
    get_sharing_options,
    update_club,
};
