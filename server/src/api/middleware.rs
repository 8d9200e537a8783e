//! HTTP middleware (CORS)

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Allowed dashboard origins
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Build the allow-list from the configured host/port plus an optional
    /// extra UI origin. Localhost aliases are always included for local
    /// dashboard development.
    pub fn new(host: &str, port: u16, ui_origin: Option<&str>) -> Self {
        let mut origins = Vec::new();
        origins.push(format!("http://{}:{}", host, port));

        if host == "127.0.0.1" || host == "localhost" {
            origins.push(format!("http://localhost:{}", port));
            origins.push(format!("http://127.0.0.1:{}", port));
        }

        if let Some(extra) = ui_origin
            && !origins.iter().any(|o| o == extra)
        {
            origins.push(extra.to_string());
        }

        Self { origins }
    }

    /// Check if an origin is allowed
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create the CORS layer for the query API
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_aliases_included() {
        let allowed = AllowedOrigins::new("127.0.0.1", 8321, None);
        assert!(allowed.is_allowed("http://127.0.0.1:8321"));
        assert!(allowed.is_allowed("http://localhost:8321"));
        assert!(!allowed.is_allowed("http://evil.example"));
    }

    #[test]
    fn test_extra_ui_origin() {
        let allowed = AllowedOrigins::new("127.0.0.1", 8321, Some("http://dash.local:5173"));
        assert!(allowed.is_allowed("http://dash.local:5173"));
    }

    #[test]
    fn test_non_localhost_host_skips_aliases() {
        let allowed = AllowedOrigins::new("10.0.0.5", 8321, None);
        assert!(allowed.is_allowed("http://10.0.0.5:8321"));
        assert!(!allowed.is_allowed("http://localhost:8321"));
    }

    #[test]
    fn test_duplicate_ui_origin_not_added_twice() {
        let allowed = AllowedOrigins::new("127.0.0.1", 8321, Some("http://localhost:8321"));
        let count = allowed
            .origins
            .iter()
            .filter(|o| o.as_str() == "http://localhost:8321")
            .count();
        assert_eq!(count, 1);
    }
}
