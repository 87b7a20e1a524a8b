//! Utility functions for request/response processing

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Check that the request declares a JSON body
///
/// Only the media type is compared; parameters such as `charset` are ignored.
pub(crate) fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Client Authorization header, if present and valid ASCII
pub(crate) fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Short fingerprint of a credential for logs (never log the actual key!)
///
/// `Bearer ` is stripped first so the same key hashes identically however
/// the client spelled the scheme.
pub(crate) fn credential_fingerprint(value: &str) -> String {
    let key = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value);

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    format!("{:x}", hash)[..16].to_string()
}

/// Render request headers for debug logs with credentials fingerprinted
pub(crate) fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            let shown = if is_auth_header(name.as_str()) {
                format!("sha256:{}", credential_fingerprint(value))
            } else {
                value.to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// Check if a header carries credentials
fn is_auth_header(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "authorization" || lower == "x-api-key"
}
