//! Request signature verification.
//!
//! Callers sign each request with HMAC-SHA256 over `timestamp + body` and
//! send the hex digest in `X-Sigflow-Signature` alongside the Unix timestamp
//! in `X-Sigflow-Timestamp`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Unix epoch seconds the request was signed at.
pub const TIMESTAMP_HEADER: &str = "x-sigflow-timestamp";

/// Header carrying the hex HMAC digest.
pub const SIGNATURE_HEADER: &str = "x-sigflow-signature";

/// Compute the hex signature for a request.
pub fn sign_request(signing_key: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a request signature.
///
/// Returns `false` for missing fields, stale or unparsable timestamps,
/// non-hex signatures and digest mismatches. The digest comparison is
/// constant-time.
pub fn verify_request_signature(
    signing_key: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    max_age_seconds: u64,
) -> bool {
    if signing_key.is_empty() || timestamp.is_empty() || signature.is_empty() {
        warn!(
            has_signing_key = !signing_key.is_empty(),
            has_timestamp = !timestamp.is_empty(),
            has_signature = !signature.is_empty(),
            "request_signature_missing_fields"
        );
        return false;
    }

    let request_time: u64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(timestamp = %timestamp, "request_signature_invalid_timestamp");
            return false;
        }
    };

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let age = current_time.abs_diff(request_time);
    if age > max_age_seconds {
        warn!(
            request_time,
            current_time,
            age_seconds = age,
            max_age_seconds,
            "request_signature_stale"
        );
        return false;
    }

    let provided = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "request_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(signing_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("request_signature_invalid_key");
            return false;
        }
    };
    mac.update(timestamp.as_bytes());
    mac.update(body);

    let valid = mac.verify_slice(&provided).is_ok();
    if !valid {
        warn!(body_length = body.len(), "request_signature_mismatch");
    }

    valid
}

/// Check if request signature verification is enabled.
pub fn is_signature_verification_enabled(signing_key: &Option<String>) -> bool {
    signing_key
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string()
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        assert!(!verify_request_signature("", "123", b"{}", "ab", 300));
        assert!(!verify_request_signature("key", "", b"{}", "ab", 300));
        assert!(!verify_request_signature("key", "123", b"{}", "", 300));
    }

    #[test]
    fn test_verify_signature_invalid_timestamp() {
        assert!(!verify_request_signature("key", "yesterday", b"{}", "ab", 300));
    }

    #[test]
    fn test_verify_signature_stale() {
        let signature = sign_request("key", "946684800", b"{}").unwrap();
        assert!(!verify_request_signature("key", "946684800", b"{}", &signature, 300));
    }

    #[test]
    fn test_verify_signature_valid() {
        let timestamp = now();
        let body = br#"{"script_type":"both"}"#;
        let signature = sign_request("test-signing-key", &timestamp, body).unwrap();

        assert!(verify_request_signature("test-signing-key", &timestamp, body, &signature, 300));
    }

    #[test]
    fn test_verify_signature_rejects_tampered_body() {
        let timestamp = now();
        let signature = sign_request("test-signing-key", &timestamp, b"original").unwrap();

        assert!(!verify_request_signature("test-signing-key", &timestamp, b"tampered", &signature, 300));
        assert!(!verify_request_signature("test-signing-key", &timestamp, b"original", "zz", 300));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(&None));
        assert!(!is_signature_verification_enabled(&Some("".to_string())));
        assert!(!is_signature_verification_enabled(&Some("   ".to_string())));
        assert!(is_signature_verification_enabled(&Some("key123".to_string())));
    }
}
