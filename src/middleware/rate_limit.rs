use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;

use crate::{
    rate_limit::{Decision, RateLimiter, types::ceil_secs},
    utils::{error_codes, error_to_api_response},
};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub const TOO_MANY_REQUESTS_MSG: &str = "ThrottlerException: Too Many Requests";

/// 放入请求扩展后该请求不计入限流
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipRateLimit;

/// 客户端标识，默认取连接地址
///
/// 只有 `trust_proxy` 为真时才依次读取 X-Real-IP 和 X-Forwarded-For
/// 第一个非空值，这两个头可以由客户端任意伪造。
pub fn client_identifier<B>(req: &Request<B>, trust_proxy: bool) -> Option<String> {
    // 从连接信息获取原始IP
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    if !trust_proxy {
        return remote_ip;
    }

    let headers = req.headers();
    let header_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        });

    header_ip.map(str::to_string).or(remote_ip)
}

/// 路由模板优先，`/users/1` 和 `/users/2` 共用同一个计数
fn route_path<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.extensions().get::<SkipRateLimit>().is_some() {
        return next.run(req).await;
    }

    let client = client_identifier(&req, limiter.trusts_proxy());
    let route = route_path(&req);

    match limiter.check_and_record(client.as_deref(), &route) {
        Decision::Exempt => next.run(req).await,
        Decision::Allowed {
            count,
            limit,
            remaining,
            reset_after,
        } => {
            tracing::debug!(client = ?client, route = %route, count, limit, "Request allowed");
            let mut response = next.run(req).await;
            set_limit_headers(response.headers_mut(), limit, remaining, ceil_secs(reset_after));
            response
        }
        Decision::Denied {
            count,
            limit,
            retry_after,
        } => {
            let retry_secs = ceil_secs(retry_after);
            tracing::warn!(
                client = ?client,
                route = %route,
                count,
                limit,
                retry_after_secs = retry_secs,
                "Rate limit exceeded"
            );
            counter!("rate_limit_denied_total", "route" => route).increment(1);

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                error_to_api_response::<()>(error_codes::RATE_LIMIT, TOO_MANY_REQUESTS_MSG),
            )
                .into_response();
            let headers = response.headers_mut();
            set_limit_headers(headers, limit, 0, retry_secs);
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_secs));
            response
        }
    }
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::time::Duration;

    use axum::{Router, body::to_bytes, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::rate_limit::{ManualClock, RateLimitRule};

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .route("/other", get(|| async { "ok" }))
            .route("/users/{id}", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .route("/metrics", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, rate_limit))
    }

    fn limiter(limit: u32, clock: Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(
            RateLimitRule::new(limit, Duration::from_millis(60_000)),
            clock,
        )
        .skip_prefix("/metrics")
    }

    fn setup(limit: u32) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (app(Arc::new(limiter(limit, clock.clone()))), clock)
    }

    /// 模拟来自 `ip` 的连接
    fn request(path: &str, ip: &str) -> Request<Body> {
        let peer: IpAddr = ip.parse().unwrap();
        let mut req = Request::builder().uri(path).body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(peer, 40_000)));
        req
    }

    fn header(response: &Response, name: &str) -> String {
        response.headers()[name].to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_limit_then_429_then_reset() {
        let (app, clock) = setup(10);

        for expected_remaining in (0..10).rev() {
            let response = app.clone().oneshot(request("/test", "127.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header(&response, "x-ratelimit-limit"), "10");
            assert_eq!(
                header(&response, "x-ratelimit-remaining"),
                expected_remaining.to_string()
            );
        }

        let denied = app.clone().oneshot(request("/test", "127.0.0.1")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&denied, "retry-after"), "60");
        assert_eq!(header(&denied, "x-ratelimit-remaining"), "0");

        let body = to_bytes(denied.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], error_codes::RATE_LIMIT);
        assert_eq!(json["msg"], TOO_MANY_REQUESTS_MSG);

        clock.advance(Duration::from_millis(61_000));
        let response = app.oneshot(request("/test", "127.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-remaining"), "9");
    }

    #[tokio::test]
    async fn test_retry_after_counts_down_with_window() {
        let (app, clock) = setup(1);
        app.clone().oneshot(request("/test", "10.0.0.1")).await.unwrap();

        clock.advance(Duration::from_millis(45_500));
        let denied = app.oneshot(request("/test", "10.0.0.1")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&denied, "retry-after"), "15");
        assert_eq!(header(&denied, "x-ratelimit-reset"), "15");
    }

    #[tokio::test]
    async fn test_clients_and_routes_are_independent() {
        let (app, _) = setup(2);

        for _ in 0..2 {
            for (path, ip) in [("/test", "1.1.1.1"), ("/test", "2.2.2.2"), ("/other", "1.1.1.1")] {
                let response = app.clone().oneshot(request(path, ip)).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
            }
        }

        let denied = app.oneshot(request("/test", "1.1.1.1")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_route_template_shares_bucket() {
        let (app, _) = setup(1);

        let first = app.clone().oneshot(request("/users/1", "1.1.1.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(request("/users/2", "1.1.1.1")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_exempt_routes_are_never_limited() {
        let (app, _) = setup(1);

        for _ in 0..5 {
            for path in ["/health", "/metrics"] {
                let response = app.clone().oneshot(request(path, "1.1.1.1")).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                assert!(response.headers().get("x-ratelimit-limit").is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_skip_extension_bypasses_limiter() {
        let (app, _) = setup(1);

        for _ in 0..3 {
            let mut req = request("/test", "1.1.1.1");
            req.extensions_mut().insert(SkipRateLimit);
            let response = app.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_spoofed_forwarding_headers_are_ignored_by_default() {
        let (app, _) = setup(1);

        let mut statuses = Vec::new();
        for i in 0..20 {
            let mut req = request("/test", "203.0.113.9");
            req.headers_mut()
                .insert("x-real-ip", HeaderValue::from_str(&format!("spoof-{}", i)).unwrap());
            req.headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_str(&format!("10.9.{}.1", i)).unwrap());
            statuses.push(app.clone().oneshot(req).await.unwrap().status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(
            statuses[1..]
                .iter()
                .all(|s| *s == StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[tokio::test]
    async fn test_forwarding_headers_used_behind_trusted_proxy() {
        let clock = Arc::new(ManualClock::new(0));
        let app = app(Arc::new(limiter(1, clock).trust_proxy(true)));

        // 同一个代理转发两个不同的客户端
        for client in ["198.51.100.1", "198.51.100.2"] {
            let mut req = request("/test", "10.0.0.2");
            req.headers_mut()
                .insert("x-real-ip", HeaderValue::from_str(client).unwrap());
            let response = app.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let mut req = request("/test", "10.0.0.2");
        req.headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_client_identifier_precedence() {
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000)));

        let mut req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        req.extensions_mut().insert(peer.clone());
        assert_eq!(client_identifier(&req, false).as_deref(), Some("192.0.2.1"));
        assert_eq!(client_identifier(&req, true).as_deref(), Some("198.51.100.2"));

        let req = Request::builder()
            .header("x-forwarded-for", " , 203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_identifier(&req, true).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_identifier(&req, false), None);

        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut().insert(peer);
        assert_eq!(client_identifier(&req, true).as_deref(), Some("192.0.2.1"));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_identifier(&req, true), None);
    }
}
