use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    result::{ApiResult, created, ok},
    user::{CreateUserRequest, LoginRequest, User},
    utils::{AuthUser, generate_token},
};

use super::model::AuthResponse;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload?;
    let user = state.users.create(req).await?;
    let (access_token, expires_at) = generate_token(&user, &state.config)?;
    created(AuthResponse {
        access_token,
        expires_at,
        user,
    })
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(req) = payload?;
    let user = state
        .users
        .validate_credentials(&req.email, &req.password)
        .await?;
    let (access_token, expires_at) = generate_token(&user, &state.config)?;
    tracing::info!(user_id = %user.id, "User logged in");
    ok(AuthResponse {
        access_token,
        expires_at,
        user,
    })
}

/// 当前登录用户的资料，走缓存读取
#[axum::debug_handler]
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<User> {
    ok(state.users.find_one(auth.id).await?)
}
