pub mod handler;

pub use handler::rate_limit_probe;
