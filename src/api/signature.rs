//! Shared-secret request signatures
//!
//! `signature = hex(sha1(concat(sort([token, timestamp, nonce]))))`, with a 10-digit
//! epoch-seconds timestamp no older than five minutes and no more than ten seconds
//! ahead.

use sha1::{Digest, Sha1};
use thiserror::Error;

const MAX_AGE_SECS: i64 = 300;
const MAX_SKEW_SECS: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature parameters")]
    Missing,
    #[error("malformed timestamp")]
    MalformedTimestamp,
    #[error("timestamp outside the accepted window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn verify(
    token: &str,
    signature: &str,
    timestamp: &str,
    nonce: &str,
    now_secs: i64,
) -> Result<(), SignatureError> {
    if signature.is_empty() || timestamp.is_empty() || nonce.is_empty() {
        return Err(SignatureError::Missing);
    }
    if timestamp.len() != 10 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SignatureError::MalformedTimestamp);
    }
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;
    if ts < now_secs - MAX_AGE_SECS || ts > now_secs + MAX_SKEW_SECS {
        return Err(SignatureError::Expired);
    }
    if !sign(token, timestamp, nonce).eq_ignore_ascii_case(signature) {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}
