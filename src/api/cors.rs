//! 跨域策略
//!
//! 只允许 GET；浏览器来源必须在白名单内，没有 Origin 的请求（curl、服务端调用）
//! 和同源请求总是放行。

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            HOST, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::error::ApiError;

/// 跨域白名单
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_origins: allowed_origins
                .into_iter()
                .map(|origin| origin.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }
}

/// Origin 与 Host 指向同一站点
fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    origin
        .split_once("://")
        .map(|(_, authority)| authority.trim_end_matches('/').eq_ignore_ascii_case(host))
        .unwrap_or(false)
}

pub async fn enforce(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(origin) = origin else {
        return next.run(request).await;
    };
    if is_same_origin(&origin, request.headers()) {
        return next.run(request).await;
    }
    if !policy.allows(&origin) {
        warn!("拒绝跨域请求: {} {}", origin, request.uri().path());
        return ApiError::cors_rejected(&origin).into_response();
    }

    let allow_origin = HeaderValue::from_str(&origin).ok();

    // 预检请求直接应答
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        apply_origin(headers, allow_origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_origin(response.headers_mut(), allow_origin);
    response
}

fn apply_origin(headers: &mut HeaderMap, origin: Option<HeaderValue>) {
    if let Some(origin) = origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.append(VARY, HeaderValue::from_static("Origin"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_matches_exact_origins() {
        let policy = CorsPolicy::new(vec!["https://app.example/".to_string()]);
        assert!(policy.allows("https://app.example"));
        assert!(policy.allows("HTTPS://APP.EXAMPLE"));
        assert!(!policy.allows("https://evil.example"));
        assert!(!policy.allows("http://app.example"));
    }

    #[test]
    fn same_origin_compares_authority_with_host() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:3000"));
        assert!(is_same_origin("http://localhost:3000", &headers));
        assert!(!is_same_origin("http://localhost:4000", &headers));
        assert!(!is_same_origin("localhost:3000", &headers));
        assert!(!is_same_origin("http://localhost:3000", &HeaderMap::new()));
    }
}
