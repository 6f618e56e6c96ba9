pub mod handler;

pub use handler::{create_user, find_all_users, find_user, remove_user, update_user};
