use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};

/// 记录请求数、耗时和进行中的请求数
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // 未匹配的路径统一归类，避免标签基数失控
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let in_progress = gauge!(
        "http_requests_in_progress",
        "method" => method.clone(),
        "route" => route.clone()
    );
    in_progress.increment(1.0);

    let response = next.run(req).await;

    in_progress.decrement(1.0);

    let labels = [
        ("method", method),
        ("route", route),
        ("status_code", response.status().as_u16().to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());

    response
}
