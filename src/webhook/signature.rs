//! Webhook signature verification.
//!
//! The provider signs `timestamp + "." + raw_body` with HMAC-SHA256 and
//! sends the signature as lowercase hex. Verification recomputes the MAC
//! and compares in constant time; malformed or wrong-length signatures are
//! rejected before any comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature.
///
/// The payload is the exact raw body; any re-serialization breaks the MAC.
pub fn verify_signature(
    shared_secret: &[u8],
    timestamp: &str,
    body: &[u8],
    signature_hex: &str,
) -> bool {
    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(shared_secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    // verify_slice is constant-time and rejects length mismatches.
    mac.verify_slice(&signature).is_ok()
}

/// Compute the signature the provider would send (lowercase hex). Used by
/// provider doubles and webhook simulation in tests.
pub fn compute_signature(shared_secret: &[u8], timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(shared_secret).expect("HMAC accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test_secret";

    #[test]
    fn test_valid_signature() {
        let body = br#"{"event_id":"evt_1","type":"transfer.completed","data":{}}"#;
        let signature = compute_signature(SECRET, "1760000000", body);
        assert!(verify_signature(SECRET, "1760000000", body, &signature));
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let signature = compute_signature(SECRET, "1760000000", b"{}");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let signature = compute_signature(SECRET, "1760000000", body);
        assert!(!verify_signature(b"other_secret", "1760000000", body, &signature));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = compute_signature(SECRET, "1760000000", b"{\"amount\":100}");
        assert!(!verify_signature(SECRET, "1760000000", b"{\"amount\":999}", &signature));
    }

    #[test]
    fn test_tampered_timestamp_rejected() {
        let body = b"{}";
        let signature = compute_signature(SECRET, "1760000000", body);
        assert!(!verify_signature(SECRET, "1760000099", body, &signature));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        assert!(!verify_signature(SECRET, "1760000000", b"{}", "not-hex"));
        assert!(!verify_signature(SECRET, "1760000000", b"{}", ""));
        // Valid hex, wrong length.
        assert!(!verify_signature(SECRET, "1760000000", b"{}", "deadbeef"));
    }

    #[test]
    fn test_exact_raw_body_required() {
        // Whitespace differences are a different payload.
        let signature = compute_signature(SECRET, "1760000000", b"{\"a\":1}");
        assert!(!verify_signature(SECRET, "1760000000", b"{ \"a\": 1 }", &signature));
    }
}
