pub mod handler;
pub mod model;

pub use handler::{set_failure_probability, status, toggle_cache};
