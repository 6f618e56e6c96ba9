use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    AppState,
    config::Config,
    middleware::{auth_middleware, log_errors, rate_limit, track_metrics},
    rate_limit::{Clock, RateLimitRule, RateLimiter},
    routes,
};

/// 测试接口的严格限流：10 秒 3 次
pub const PROBE_RULE: RateLimitRule = RateLimitRule {
    limit: 3,
    window: Duration::from_millis(10_000),
};

fn prefixed(config: &Config, path: &str) -> String {
    format!("{}{}", config.api_base_uri.trim_end_matches('/'), path)
}

/// 按配置构建限流器，包含路由级规则和跳过前缀
pub fn build_rate_limiter(config: &Config, clock: Arc<dyn Clock>) -> RateLimiter {
    RateLimiter::from_config(config, clock)
        .with_route_rule(prefixed(config, "/test/rate-limit"), PROBE_RULE)
        .skip_prefix(prefixed(config, "/metrics"))
}

pub fn create_router(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/users", post(routes::user::create_user))
        .route("/test/rate-limit", get(routes::probe::rate_limit_probe))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics));

    let protected_routes = Router::new()
        .route("/auth/profile", get(routes::auth::profile))
        .route("/users", get(routes::user::find_all_users))
        .route(
            "/users/{id}",
            get(routes::user::find_user)
                .patch(routes::user::update_user)
                .delete(routes::user::remove_user),
        )
        // 故障注入接口，处理函数内校验管理员
        .route("/chaos/toggle-cache", post(routes::chaos::toggle_cache))
        .route(
            "/chaos/set-failure-probability",
            post(routes::chaos::set_failure_probability),
        )
        .route("/chaos/status", get(routes::chaos::status))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = public_routes.merge(protected_routes);

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    // 指标层在限流层外侧，429 也会被统计
    router
        .layer(from_fn(log_errors))
        .layer(from_fn_with_state(limiter, rate_limit))
        .layer(from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
