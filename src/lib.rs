use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

pub mod cache;
pub mod common;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod result;
pub mod router;
pub mod routes;
pub mod telemetry;
pub mod user;
pub mod utils;

use cache::{CacheStore, ChaosControl};
use config::Config;
use database::UserStore;
use user::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<UserDirectory>,
    pub user_store: Arc<dyn UserStore>,
    pub cache_store: Arc<dyn CacheStore>,
    pub chaos: Arc<ChaosControl>,
    pub metrics: Option<PrometheusHandle>,
}
