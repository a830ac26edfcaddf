//! Cross-origin handling.
//!
//! Requests carrying an `Origin` header must come from the service's own
//! origin or from the configured allow-list. Anything else is refused with
//! 403 before reaching a handler. For allowed origins the CORS layer adds
//! the response headers and answers preflights.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::error::ApiError;
use crate::config::CorsConfig;
use crate::AppState;

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// `{proto}://{host}` as seen by the client, honouring proxy headers
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = header_str(headers, "x-forwarded-host").or_else(|| header_str(headers, "host"))?;
    let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
    Some(format!("{}://{}", proto, host))
}

fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    request_origin(headers)
        .map(|own| own.eq_ignore_ascii_case(origin))
        .unwrap_or(false)
}

fn normalize_origin(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}

fn is_allow_listed(origin: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .any(|a| normalize_origin(a).eq_ignore_ascii_case(origin))
}

/// CORS layer for the configured allow-list, with credentials
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .map(|o| normalize_origin(o))
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Middleware refusing origins that are neither our own nor allow-listed
pub async fn origin_guard(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(origin) = header_str(request.headers(), header::ORIGIN.as_str()) else {
        return next.run(request).await;
    };

    if is_same_origin(origin, request.headers())
        || is_allow_listed(origin, &state.config.cors.allowed_origins)
    {
        return next.run(request).await;
    }

    tracing::warn!(
        origin = %origin,
        path = %request.uri().path(),
        "Rejected cross-origin request"
    );
    ApiError::forbidden("Origin not allowed").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_request_origin_prefers_forwarded_headers() {
        let h = headers(&[("host", "internal:8080")]);
        assert_eq!(request_origin(&h).as_deref(), Some("http://internal:8080"));

        let h = headers(&[
            ("host", "internal:8080"),
            ("x-forwarded-host", "shop.example.com"),
            ("x-forwarded-proto", "https"),
        ]);
        assert_eq!(request_origin(&h).as_deref(), Some("https://shop.example.com"));

        assert!(request_origin(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_same_origin_and_allow_list() {
        let h = headers(&[("host", "localhost:8080")]);
        assert!(is_same_origin("http://localhost:8080", &h));
        assert!(!is_same_origin("https://localhost:8080", &h));

        let allowed = vec!["https://app.example.com/".to_string()];
        assert!(is_allow_listed("https://app.example.com", &allowed));
        assert!(!is_allow_listed("https://evil.example.com", &allowed));
    }
}
