pub mod auth;
pub mod chaos;
pub mod health;
pub mod probe;
pub mod user;
