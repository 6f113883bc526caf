use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::extract::ROLE_HEADER;

/// Build a CORS layer from the `PORTAL_CORS_ORIGINS` env var.
///
/// - Origins: comma-separated list (default: `http://localhost:5173`, the web front end in dev)
/// - Methods: GET, POST, PUT, DELETE, OPTIONS
/// - Headers: Content-Type, x-portal-role
/// - Max age: 3600s
pub fn build_cors_layer() -> CorsLayer {
    let origins_str = std::env::var("PORTAL_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());
    cors_layer_for(&origins_str)
}

fn parse_origins(origins_str: &str) -> Vec<HeaderValue> {
    origins_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect()
}

fn cors_layer_for(origins_str: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_origins(origins_str))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static(ROLE_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blanks_skipped() {
        let origins = parse_origins(" http://localhost:5173 , ,https://portal.example.org");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1], "https://portal.example.org");
    }
}
