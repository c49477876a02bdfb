//! Gateway signature verification.
//!
//! Payment confirmations carry an HMAC-SHA256 over
//! `gateway_order_id|gateway_payment_id`; webhooks carry an HMAC over the
//! raw body. Comparisons are constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    // Compare even on length mismatch to keep timing flat.
    if a.len() != b.len() {
        let _ = a.as_bytes().ct_eq(a.as_bytes());
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Signature over `{gateway_order_id}|{gateway_payment_id}`.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let message = format!("{gateway_order_id}|{gateway_payment_id}");
    let expected = hmac_hex(secret, message.as_bytes());
    constant_time_eq(&expected, &signature.to_ascii_lowercase())
}

/// Signature over the raw webhook body.
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = hmac_hex(secret, body);
    constant_time_eq(&expected, &signature.to_ascii_lowercase())
}

/// Test-side helper for producing valid signatures.
pub fn sign_payment(gateway_order_id: &str, gateway_payment_id: &str, secret: &str) -> String {
    hmac_hex(secret, format!("{gateway_order_id}|{gateway_payment_id}").as_bytes())
}

pub fn sign_webhook(body: &[u8], secret: &str) -> String {
    hmac_hex(secret, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-gateway-secret";

    #[test]
    fn valid_payment_signature_verifies() {
        let sig = sign_payment("order_abc", "pay_xyz", SECRET);
        assert!(verify_payment_signature("order_abc", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn tampered_payment_id_fails() {
        let sig = sign_payment("order_abc", "pay_xyz", SECRET);
        assert!(!verify_payment_signature("order_abc", "pay_other", &sig, SECRET));
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = sign_payment("order_abc", "pay_xyz", SECRET);
        assert!(!verify_payment_signature("order_abc", "pay_xyz", &sig, "other"));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let sig = sign_payment("order_abc", "pay_xyz", SECRET).to_ascii_uppercase();
        assert!(verify_payment_signature("order_abc", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn webhook_body_roundtrip() {
        let body = br#"{"event":"payment.captured","payment_id":"pay_1"}"#;
        let sig = sign_webhook(body, SECRET);
        assert!(verify_webhook_signature(body, &sig, SECRET));
        assert!(!verify_webhook_signature(b"{}", &sig, SECRET));
    }
}
