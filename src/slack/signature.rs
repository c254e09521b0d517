//! Slack request signing (`X-Slack-Signature`, `v0` scheme)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Requests older than this are rejected as possible replays
pub const MAX_SKEW_SECS: i64 = 60 * 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature headers")]
    Missing,
    #[error("signature must use v0=<hex> format")]
    Format,
    #[error("invalid request timestamp")]
    Timestamp,
    #[error("request timestamp outside allowed window")]
    Stale,
    #[error("signature verification failed")]
    Mismatch,
}

/// Check `signature` over `v0:{timestamp}:{body}` with the app's signing secret
pub fn verify(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::Timestamp)?;
    if now_unix.abs_diff(sent_at) > MAX_SKEW_SECS.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let digest = signature
        .strip_prefix("v0=")
        .ok_or(SignatureError::Format)
        .and_then(decode_hex)?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(b"v0:");
    mac.update(timestamp.trim().as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| SignatureError::Mismatch)
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, SignatureError> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(SignatureError::Format);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or(SignatureError::Format)
        })
        .collect()
}
