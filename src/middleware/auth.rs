use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{
    AppState,
    error::AppError,
    utils::{AuthUser, verify_token},
};

/// 校验 Bearer 令牌，通过后把 `AuthUser` 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
        return Err(AppError::unauthorized("Missing bearer token"));
    };

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        AppError::unauthorized("Invalid or expired token")
    })?;

    let user = AuthUser::from_claims(claims)
        .ok_or_else(|| AppError::unauthorized("Invalid token subject"))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// 仅管理员可以继续
pub fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, "Admin access denied");
        Err(AppError::forbidden("Admin role required"))
    }
}
