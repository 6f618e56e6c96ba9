use serde::{Deserialize, Serialize};

use crate::user::User;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// 令牌过期时间戳（秒）
    pub expires_at: i64,
    pub user: User,
}
