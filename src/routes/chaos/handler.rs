use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    cache::ChaosStatus,
    common::MessageResponse,
    middleware::require_admin,
    result::{ApiResult, ok},
    utils::AuthUser,
};

use super::model::{SetFailureProbabilityRequest, ToggleCacheRequest};

#[axum::debug_handler]
pub async fn toggle_cache(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ToggleCacheRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    require_admin(&auth)?;
    let Json(req) = payload?;

    state.chaos.toggle_enabled(req.enabled);
    let label = if req.enabled { "enabled" } else { "disabled" };
    tracing::warn!(admin_id = %auth.id, "Cache {} via chaos control", label);
    ok(MessageResponse::new(format!("Cache {}", label)))
}

#[axum::debug_handler]
pub async fn set_failure_probability(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<SetFailureProbabilityRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    require_admin(&auth)?;
    let Json(req) = payload?;

    state.chaos.set_failure_probability(req.probability)?;
    tracing::warn!(
        admin_id = %auth.id,
        probability = req.probability,
        "Cache failure probability changed"
    );
    ok(MessageResponse::new(format!(
        "Set cache failure probability to {}",
        req.probability
    )))
}

#[axum::debug_handler]
pub async fn status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<ChaosStatus> {
    require_admin(&auth)?;
    ok(state.chaos.status())
}
