//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Browser origins allowed to call the API
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Loopback hosts and the configured host, with and without the port
    pub fn new(host: &str, port: u16) -> Self {
        let hosts: Vec<&str> = if is_local_or_any(host) {
            vec!["localhost", "127.0.0.1"]
        } else {
            vec![host]
        };

        let origins = hosts
            .iter()
            .flat_map(|h| [format!("http://{}:{}", h, port), format!("http://{}", h)])
            .collect();
        Self { origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

fn is_local_or_any(host: &str) -> bool {
    matches!(
        host,
        "0.0.0.0" | "::" | "127.0.0.1" | "::1" | "localhost"
    )
}

pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

pub async fn handle_404(req: Request) -> StatusCode {
    tracing::debug!(method = %req.method(), uri = %req.uri(), "[404] No route");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_origins() {
        let allowed = AllowedOrigins::new("0.0.0.0", 5400);
        assert!(allowed.is_allowed("http://localhost:5400"));
        assert!(allowed.is_allowed("http://127.0.0.1:5400"));
        assert!(allowed.is_allowed("http://localhost"));
        assert!(!allowed.is_allowed("http://evil.example:5400"));
    }

    #[test]
    fn test_explicit_host_origins() {
        let allowed = AllowedOrigins::new("10.0.0.7", 8080);
        assert!(allowed.is_allowed("http://10.0.0.7:8080"));
        assert!(!allowed.is_allowed("http://localhost:8080"));
    }
}
