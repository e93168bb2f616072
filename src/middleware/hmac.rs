//! HMAC verification for the inbound webhook route
//!
//! Every webhook request carries a hex HMAC-SHA256 signature over
//! `timestamp || body` and the unix timestamp it was signed at. Requests
//! outside the drift window are rejected before the body is read, which
//! bounds replay exposure to the window itself.
//!
//! Secret rotation: both the current and the previous secret verify during
//! the grace period, and a match against the old secret is logged.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::error::AppError;

/// Headers the webhook sender must supply
pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Largest body the verifier will buffer
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Verification state shared across requests
#[derive(Clone)]
pub struct HmacState {
    /// Valid signing secrets; index 0 is the current one
    secrets: Arc<Vec<Vec<u8>>>,
    /// Accepted clock skew between sender and receiver, in seconds
    max_drift_secs: i64,
}

impl HmacState {
    /// State with a single signing secret
    pub fn new(secret: String, max_drift_secs: i64) -> Self {
        Self::with_rotation(vec![secret], max_drift_secs)
    }

    /// State accepting several secrets during a rotation grace period.
    /// Empty strings are dropped rather than treated as valid keys.
    pub fn with_rotation(secrets: Vec<String>, max_drift_secs: i64) -> Self {
        let secrets: Vec<Vec<u8>> = secrets
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::into_bytes)
            .collect();
        if secrets.is_empty() {
            tracing::warn!("HMAC state built with no usable secrets; every request will be rejected");
        }
        Self {
            secrets: Arc::new(secrets),
            max_drift_secs,
        }
    }

    pub fn is_rotation_active(&self) -> bool {
        self.secrets.len() > 1
    }
}

enum Verification {
    /// Matched the secret at this index
    Valid(usize),
    Invalid,
}

/// Middleware: reject the request unless its signature and timestamp check out
pub async fn hmac_verify(
    State(state): State<Arc<HmacState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let signature = match header_value(&headers, SIGNATURE_HEADER) {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };
    let timestamp_str = match header_value(&headers, TIMESTAMP_HEADER) {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };

    let Ok(timestamp) = timestamp_str.parse::<i64>() else {
        return AppError::Validation("Timestamp header is not a unix timestamp".to_string())
            .into_response();
    };

    let drift = (Utc::now().timestamp() - timestamp).abs();
    if drift > state.max_drift_secs {
        tracing::warn!(
            timestamp,
            drift,
            max_drift = state.max_drift_secs,
            "Webhook timestamp outside the accepted window"
        );
        return AppError::Auth(format!(
            "Request expired (drift {}s, max {}s)",
            drift, state.max_drift_secs
        ))
        .into_response();
    }

    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Could not read request body".to_string()).into_response()
        }
    };

    match verify_with_secrets(&state.secrets, &signature, &timestamp_str, &body_bytes) {
        Verification::Valid(0) => {
            tracing::debug!(body_size = body_bytes.len(), "Webhook signature verified");
            next.run(Request::from_parts(parts, Body::from(body_bytes))).await
        }
        Verification::Valid(index) => {
            tracing::info!(
                secret_index = index,
                "Webhook signature verified with rotated secret"
            );
            next.run(Request::from_parts(parts, Body::from(body_bytes))).await
        }
        Verification::Invalid => {
            tracing::warn!(
                secrets_tried = state.secrets.len(),
                "Webhook signature rejected"
            );
            AppError::Auth("Invalid signature".to_string()).into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, AppError> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(str::to_string)
            .map_err(|_| AppError::Validation(format!("Header {} is not valid ASCII", name))),
        None => Err(AppError::Auth(format!("Missing {} header", name))),
    }
}

/// The signed payload is the timestamp string immediately followed by the
/// raw body bytes
fn verify_with_secrets(
    secrets: &[Vec<u8>],
    signature: &str,
    timestamp_str: &str,
    body: &[u8],
) -> Verification {
    for (index, secret) in secrets.iter().enumerate() {
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
            continue;
        };
        mac.update(timestamp_str.as_bytes());
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());

        if constant_time_compare(signature, &expected) {
            return Verification::Valid(index);
        }
    }
    Verification::Invalid
}

/// Comparison that does not short-circuit on the first mismatching byte
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
