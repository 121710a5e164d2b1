//! # Token Inspection
//!
//! Debug helper for looking inside access tokens and API keys. Only the
//! payload segment is decoded; signatures are never checked, so nothing here
//! may be used to make an authorization decision.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Why a token could not be inspected. The messages are shown to operators as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Invalid JWT format")]
    Format,

    #[error("Error decoding: {0}")]
    Decoding(String),
}

/// Decodes the payload (middle segment) of a `header.payload.signature` token
pub fn decode_payload(token: &str) -> Result<Value, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(DecodeError::Format);
    };

    // Accept both alphabets and optional padding
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| DecodeError::Decoding(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Decoding(e.to_string()))
}

/// Pretty-printed payload, or the reason it could not be decoded
pub fn describe(token: &str) -> String {
    match decode_payload(token) {
        Ok(payload) => serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
        Err(e) => e.to_string(),
    }
}

/// A string claim such as `role` or `sub`
pub fn claim_str<'a>(payload: &'a Value, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(Value::as_str)
}

/// The `exp` claim as a UTC timestamp
pub fn expires_at(payload: &Value) -> Option<DateTime<Utc>> {
    let exp = payload.get("exp")?;
    let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(secs, 0)
}

/// Whether the token had expired at `now`. Tokens without `exp` never expire.
pub fn is_expired(payload: &Value, now: DateTime<Utc>) -> bool {
    expires_at(payload).is_some_and(|exp| exp <= now)
}
