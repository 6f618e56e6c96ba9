use axum::{
    Json,
    extract::{Extension, Path, State, rejection::{JsonRejection, PathRejection}},
};
use uuid::Uuid;

use crate::{
    AppState,
    common::MessageResponse,
    error::AppError,
    middleware::require_admin,
    result::{ApiResult, created, ok},
    user::{CreateUserRequest, UpdateUserRequest, User},
    utils::AuthUser,
};

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(req) = payload?;
    let user = state.users.create(req).await?;
    created(user)
}

#[axum::debug_handler]
pub async fn find_all_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<User>> {
    require_admin(&auth)?;
    ok(state.users.find_all().await?)
}

#[axum::debug_handler]
pub async fn find_user(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<User> {
    let Path(id) = id?;
    ok(state.users.find_one(id).await?)
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Path(id) = id?;
    // 本人或管理员才能修改
    if auth.id != id && !auth.is_admin() {
        return Err(AppError::forbidden("You can only update your own profile"));
    }
    let Json(req) = payload?;
    ok(state.users.update(id, req).await?)
}

#[axum::debug_handler]
pub async fn remove_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<MessageResponse> {
    require_admin(&auth)?;
    let Path(id) = id?;
    state.users.remove(id).await?;
    ok(MessageResponse::new(format!("User {} deleted", id)))
}
