//! CORS layer built from `[server.cors]`.

use axum::http::{header, HeaderValue, Method};
use sr_domain::config::CorsConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may end in `:*` to match any port on that host
/// (e.g. `http://localhost:*`).  A lone `"*"` allows every origin.
pub fn layer(cors: &CorsConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\", all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE]);
    }

    let matcher = OriginMatcher::new(&cors.allowed_origins);
    let allow_origin = if matcher.port_wildcards.is_empty() {
        AllowOrigin::list(matcher.exact)
    } else {
        AllowOrigin::predicate(move |origin, _| matcher.allows(origin))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE])
}

struct OriginMatcher {
    exact: Vec<HeaderValue>,
    /// `scheme://host:` prefixes taken from `…:*` entries.
    port_wildcards: Vec<String>,
}

impl OriginMatcher {
    fn new(origins: &[String]) -> Self {
        let mut exact = Vec::new();
        let mut port_wildcards = Vec::new();
        for origin in origins {
            if let Some(prefix) = origin.strip_suffix('*').filter(|p| p.ends_with(':')) {
                port_wildcards.push(prefix.to_owned());
            } else if let Ok(value) = origin.parse::<HeaderValue>() {
                exact.push(value);
            } else {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
            }
        }
        Self {
            exact,
            port_wildcards,
        }
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        if self.exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
            return true;
        }
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        self.port_wildcards.iter().any(|prefix| {
            origin
                .strip_prefix(prefix.as_str())
                .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(origins: &[&str]) -> OriginMatcher {
        let owned: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        OriginMatcher::new(&owned)
    }

    fn hv(s: &str) -> HeaderValue {
        HeaderValue::from_str(s).unwrap()
    }

    #[test]
    fn port_wildcard_matches_numeric_ports_only() {
        let m = matcher(&["http://localhost:*"]);
        assert!(m.allows(&hv("http://localhost:5173")));
        assert!(m.allows(&hv("http://localhost:3000")));
        assert!(!m.allows(&hv("http://localhost:")));
        assert!(!m.allows(&hv("http://localhost:80.evil.com")));
        assert!(!m.allows(&hv("https://localhost:5173")));
    }

    #[test]
    fn exact_origins_match_verbatim() {
        let m = matcher(&["https://app.example.com", "http://127.0.0.1:*"]);
        assert!(m.allows(&hv("https://app.example.com")));
        assert!(m.allows(&hv("http://127.0.0.1:8080")));
        assert!(!m.allows(&hv("https://app.example.com.evil")));
    }
}
