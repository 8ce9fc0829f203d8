//! HMAC-SHA256 signatures used by the payment provider.
//!
//! Webhooks sign the raw request body with the webhook secret. Redirects sign
//! `link_id|reference_id|status|payment_id` with the API key secret.

use crate::error::SignatureError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `payload` under `secret`.
#[must_use]
pub fn sign(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature (either case) in constant time.
///
/// # Errors
///
/// - [`SignatureError::Missing`] for an empty signature
/// - [`SignatureError::Malformed`] if it is not hex
/// - [`SignatureError::Mismatch`] if it does not match
pub fn verify(secret: &[u8], payload: &[u8], signature: &str) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }
    let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Message the provider signs for a payment-link redirect.
#[must_use]
pub fn redirect_payload(link_id: &str, reference_id: &str, status: &str, payment_id: &str) -> String {
    format!("{link_id}|{reference_id}|{status}|{payment_id}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verification_accepts_either_case() {
        let sig = sign(b"whsec", b"{\"event\":\"payment.captured\"}");
        assert!(verify(b"whsec", b"{\"event\":\"payment.captured\"}", &sig).is_ok());
        assert!(verify(b"whsec", b"{\"event\":\"payment.captured\"}", &sig.to_uppercase()).is_ok());
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(verify(b"k", b"p", ""), Err(SignatureError::Missing));
        assert_eq!(verify(b"k", b"p", "zz"), Err(SignatureError::Malformed));
        assert_eq!(verify(b"k", b"p", &sign(b"other", b"p")), Err(SignatureError::Mismatch));
    }

    #[test]
    fn redirect_payload_layout() {
        assert_eq!(
            redirect_payload("plink_1", "EVT-0A1B2C3D4E", "paid", "pay_1"),
            "plink_1|EVT-0A1B2C3D4E|paid|pay_1"
        );
    }

    proptest! {
        #[test]
        fn any_single_byte_change_is_rejected(
            body in proptest::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let sig = sign(b"secret", &body);
            let mut tampered = body.clone();
            let at = index.index(tampered.len());
            tampered[at] ^= flip;
            prop_assert_eq!(verify(b"secret", &tampered, &sig), Err(SignatureError::Mismatch));
            prop_assert!(verify(b"secret", &body, &sig).is_ok());
        }
    }
}
