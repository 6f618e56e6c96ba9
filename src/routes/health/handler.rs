use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::AppState;

use super::model::HealthStatus;

/// 探测缓存可用性时读取的键，不要求存在
const CACHE_PROBE_KEY: &str = "health:probe";

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut health = HealthStatus::new();

    match state.user_store.ping().await {
        Ok(()) => health.add_check("database", true, None),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            health.add_check("database", false, Some(e.to_string()));
        }
    }

    // 直接访问存储，不经过故障注入
    match state.cache_store.get(CACHE_PROBE_KEY).await {
        Ok(_) => health.add_check("cache", true, None),
        Err(e) => {
            tracing::error!("Cache health check failed: {}", e);
            health.add_check("cache", false, Some(e.to_string()));
        }
    }

    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

/// Prometheus 文本格式
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
