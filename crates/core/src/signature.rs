//! Payment webhook signature verification.
//!
//! The processor sends `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is the HMAC-SHA256 of `"<t>.<raw body>"` under the
//! endpoint secret. Several `v1` entries appear while a secret is being
//! rolled; any one matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::Timestamp;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default accepted clock skew between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SCHEME: &str = "v1";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No matching signature found")]
    NoMatch,
}

/// Verify `header` against the raw `payload`.
///
/// `header` is `None` when the request did not carry one.
pub fn verify_signature(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: Timestamp,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            SCHEME => {
                if let Some(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    // `t` is caller-controlled; an overflowing difference is out of range.
    let skew = now.timestamp().checked_sub(timestamp).map(i64::unsigned_abs);
    if skew.is_none_or(|skew| skew > tolerance_secs.unsigned_abs()) {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let matched = signatures.iter().any(|candidate| {
        signing_mac(secret, timestamp, payload)
            .verify_slice(candidate)
            .is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::NoMatch)
    }
}

/// Build a header value for `payload` signed at `timestamp`.
///
/// Used by tests and local tooling that replays events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let digest = signing_mac(secret, timestamp, payload).finalize().into_bytes();
    format!("t={timestamp},{SCHEME}={}", hex::encode(digest))
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or a non-hex digit.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}
