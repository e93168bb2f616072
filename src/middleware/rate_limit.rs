//! Rate-limit keying for deployments behind a reverse proxy
//!
//! The governor layer needs a stable per-client key. Behind a proxy the
//! peer address is the proxy itself, so forwarded headers are consulted
//! first and the socket address is only a fallback.

use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;
use tower_governor::{key_extractor::KeyExtractor, GovernorError};

#[derive(Clone)]
pub struct ProxyAwareKeyExtractor;

impl KeyExtractor for ProxyAwareKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return Ok(ip);
        }
        req.extensions()
            .get::<SocketAddr>()
            .map(|addr| addr.ip().to_string())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// First plausible client IP from the common proxy headers, in order of
/// how often real proxies set them
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(list) = header_str(headers, "X-Forwarded-For") {
        // Comma-separated chain; the leftmost entry is the original client
        if let Some(ip) = list.split(',').next().map(str::trim).filter(|ip| plausible_ip(ip)) {
            return Some(ip.to_string());
        }
    }
    if let Some(forwarded) = header_str(headers, "Forwarded") {
        // RFC 7239: "for=192.0.2.60;proto=http;by=203.0.113.43"
        for part in forwarded.split(';') {
            if let Some(raw) = part.trim().strip_prefix("for=") {
                let ip = raw.trim_matches('"').trim();
                if plausible_ip(ip) {
                    return Some(ip.to_string());
                }
            }
        }
    }
    header_str(headers, "X-Real-IP")
        .map(str::trim)
        .filter(|ip| plausible_ip(ip))
        .map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn plausible_ip(candidate: &str) -> bool {
    !candidate.is_empty() && (candidate.contains('.') || candidate.contains(':'))
}
