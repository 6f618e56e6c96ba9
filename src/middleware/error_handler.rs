use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};

/// 日志中最多保留的响应体字节数，响应本身不截断
const LOGGED_BODY_LIMIT: usize = 4096;

/// 5xx 响应的内容写入错误日志，响应本身原样返回
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%method, %path, status = %parts.status, "Failed to read error body: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    tracing::error!(
        %method,
        %path,
        status = %parts.status,
        body_len = bytes.len(),
        body = %String::from_utf8_lossy(&bytes[..bytes.len().min(LOGGED_BODY_LIMIT)]),
        "Server error response"
    );

    Response::from_parts(parts, Body::from(bytes))
}
