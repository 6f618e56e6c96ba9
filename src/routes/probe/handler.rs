use chrono::Utc;
use serde::Serialize;

use crate::result::{ApiResult, ok};

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub message: String,
    pub timestamp: String,
}

/// 限流严格的测试接口，用于观察 429 响应
#[axum::debug_handler]
pub async fn rate_limit_probe() -> ApiResult<ProbeResponse> {
    ok(ProbeResponse {
        message: "Rate limit test endpoint".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
