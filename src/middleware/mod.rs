mod auth;
mod error_handler;
mod metrics;
mod rate_limit;

pub use auth::{auth_middleware, require_admin};
pub use error_handler::log_errors;
pub use self::metrics::track_metrics;
pub use rate_limit::{SkipRateLimit, TOO_MANY_REQUESTS_MSG, client_identifier, rate_limit};
