use axum::Json;
use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::ApiResponse;
use crate::config::Config;
use crate::user::{Role, User};

/// bcrypt 计算成本
pub const PASSWORD_HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), PASSWORD_HASH_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 用户ID
    pub email: String, // 登录邮箱
    pub role: Role,
    pub exp: i64, // 过期时间
    pub iat: i64, // 签发时间
}

/// 签发访问令牌，返回令牌和过期时间戳
pub fn generate_token(
    user: &User,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let issued_at = Utc::now().timestamp();
    let lifetime = i64::try_from(config.jwt_expiration().as_secs()).unwrap_or(i64::MAX);
    let expiration = issued_at.saturating_add(lifetime);

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        exp: expiration,
        iat: issued_at,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    tracing::debug!(user_id = %user.id, "Generated access token");
    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// 已认证的调用方，由认证中间件放入请求扩展
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let id = Uuid::parse_str(&claims.sub).ok()?;
        Some(Self {
            id,
            email: claims.email,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg: msg.into(),
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}
