use crate::error::error_response;
use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_security::{constant_time_eq, RateLimiter};
use tracing::warn;

/// Bucket key for callers whose address is unknown.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Auth configuration for the direct API.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// API keys that are allowed to call. Empty = no auth required.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: api_keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    /// Returns true if authentication is enabled (at least one key configured).
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| constant_time_eq(k, key))
    }
}

/// Shared middleware state.
#[derive(Clone)]
pub struct MiddlewareState {
    pub rate_limiter: Arc<RateLimiter>,
    pub auth: AuthConfig,
    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

#[derive(Deserialize, Default)]
pub struct AuthQuery {
    pub api_key: Option<String>,
}

/// An API key [`auth_middleware`] has accepted for this request.
#[derive(Clone, Debug)]
pub struct AuthenticatedKey(pub String);

fn bearer_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Identify the caller for rate limiting: an authenticated API key, then the
/// forwarded client address (trusted proxies only), then the peer address.
pub fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if let Some(AuthenticatedKey(key)) = request.extensions().get::<AuthenticatedKey>() {
        return format!("key:{key}");
    }
    if trust_forwarded_for {
        if let Some(ip) = forwarded_client(request.headers()) {
            return format!("ip:{ip}");
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(
            || ANONYMOUS_CLIENT.to_string(),
            |ConnectInfo(addr)| format!("ip:{}", addr.ip()),
        )
}

/// Auth middleware: validates API key from header or query param.
///
/// Checks `Authorization: Bearer <key>` header first, then `?api_key=<key>` query param.
/// If no API keys are configured, all requests are allowed.
pub async fn auth_middleware(
    State(state): State<Arc<MiddlewareState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.auth.is_enabled() {
        return next.run(request).await;
    }

    match bearer_key(&headers).or(query.api_key) {
        Some(k) if state.auth.accepts(&k) => {
            request.extensions_mut().insert(AuthenticatedKey(k));
            next.run(request).await
        }
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected request: invalid API key");
            error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid API key")
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request: missing API key");
            error_response(StatusCode::UNAUTHORIZED, "unauthorized", "API key required")
        }
    }
}

/// Rate limiting middleware: one token bucket per client key. Must sit
/// inside [`auth_middleware`] so accepted keys get their own bucket.
pub async fn rate_limit_middleware(
    State(state): State<Arc<MiddlewareState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request, state.trust_forwarded_for);

    if !state.rate_limiter.check(&client).await {
        warn!(path = %request.uri().path(), "Rate limited request");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests, please try again later",
        );
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware as axum_mw, routing::get, Router};
    use tower::ServiceExt;

    fn request(xff: Option<&str>, peer: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/chat");
        if let Some(xff) = xff {
            builder = builder.header("x-forwarded-for", xff);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            request
                .extensions_mut()
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        request
    }

    fn guarded(state: MiddlewareState) -> Router {
        let state = Arc::new(state);
        Router::new()
            .route("/api/chat", get(|| async { "ok" }))
            .layer(axum_mw::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(axum_mw::from_fn_with_state(state, auth_middleware))
    }

    #[test]
    fn test_auth_config_disabled() {
        let config = AuthConfig::new(vec![]);
        assert!(!config.is_enabled());
        assert!(!AuthConfig::new(vec![String::new()]).is_enabled());
    }

    #[test]
    fn test_auth_config_enabled() {
        let config = AuthConfig::new(vec!["key123".to_string()]);
        assert!(config.is_enabled());
        assert!(config.accepts("key123"));
        assert!(!config.accepts("key124"));
    }

    #[test]
    fn test_client_key_prefers_peer_over_untrusted_header() {
        assert_eq!(client_key(&request(None, None), false), ANONYMOUS_CLIENT);
        assert_eq!(
            client_key(&request(Some("203.0.113.9"), Some("198.51.100.4:5123")), false),
            "ip:198.51.100.4"
        );
        assert_eq!(
            client_key(&request(Some("203.0.113.9, 10.0.0.1"), Some("10.0.0.1:5123")), true),
            "ip:203.0.113.9"
        );

        let mut authed = request(Some("203.0.113.9"), Some("10.0.0.1:5123"));
        authed.extensions_mut().insert(AuthenticatedKey("k1".into()));
        assert_eq!(client_key(&authed, true), "key:k1");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_shares_peer_bucket() {
        let state = MiddlewareState {
            rate_limiter: Arc::new(RateLimiter::new(1.0, 0.001)),
            auth: AuthConfig::default(),
            trust_forwarded_for: false,
        };
        let limiter = state.rate_limiter.clone();
        let app = guarded(state);

        let mut allowed = 0;
        for n in 0..20 {
            let xff = format!("203.0.113.{n}");
            let resp = app
                .clone()
                .oneshot(request(Some(&xff), Some("198.51.100.4:40000")))
                .await
                .unwrap();
            if resp.status() == StatusCode::OK {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(limiter.bucket_count().await, 1);
    }

    #[tokio::test]
    async fn test_unaccepted_bearer_gets_no_bucket() {
        let state = MiddlewareState {
            rate_limiter: Arc::new(RateLimiter::new(5.0, 5.0)),
            auth: AuthConfig::new(vec!["good-key".into()]),
            trust_forwarded_for: false,
        };
        let limiter = state.rate_limiter.clone();
        let app = guarded(state);

        for n in 0..10 {
            let req = axum::http::Request::builder()
                .uri("/api/chat")
                .header("authorization", format!("Bearer forged-{n}"))
                .body(Body::empty())
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(limiter.bucket_count().await, 0);

        let req = axum::http::Request::builder()
            .uri("/api/chat")
            .header("authorization", "Bearer good-key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
        assert_eq!(limiter.bucket_count().await, 1);
    }
}
