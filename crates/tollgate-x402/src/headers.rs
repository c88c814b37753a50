//! HTTP header encoding and decoding for x402 protocol messages.
//!
//! Payment authorizations arrive Base64-encoded in the
//! `X-PAYMENT-SIGNATURE` or `PAYMENT-SIGNATURE` request header;
//! settlement results leave in `X-Payment-Response` / `Payment-Response`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::error::X402Error;
use crate::types::{PaymentPayload, SettleResponse};

/// Canonical payment header name.
pub const X_PAYMENT_SIGNATURE: &str = "x-payment-signature";

/// Alternate payment header name.
pub const PAYMENT_SIGNATURE: &str = "payment-signature";

/// Response header names carrying the Base64 settlement result.
pub const X_PAYMENT_RESPONSE: &str = "x-payment-response";
pub const PAYMENT_RESPONSE: &str = "payment-response";

/// Decode a payment header value into a [`PaymentPayload`].
///
/// Returns `None` on malformed Base64 or JSON; malformed input is a
/// client error surfaced as a missing payment, never a server fault.
#[must_use]
pub fn decode_payment_header(value: &str) -> Option<PaymentPayload> {
    let bytes = match STANDARD.decode(value.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "Payment header is not valid base64");
            return None;
        }
    };

    match serde_json::from_slice::<PaymentPayload>(&bytes) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "Payment header is not a valid payment payload");
            None
        }
    }
}

/// Encode a settlement response for the payment-response headers.
///
/// # Errors
///
/// Returns [`X402Error::Serialize`] if JSON serialization fails.
pub fn encode_settlement(settlement: &SettleResponse) -> Result<String, X402Error> {
    let json = serde_json::to_vec(settlement)?;
    Ok(STANDARD.encode(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let json = serde_json::json!({
            "x402Version": 2,
            "payload": {"signature": "0xsig"}
        });
        let encoded = STANDARD.encode(serde_json::to_vec(&json).unwrap());

        let payload = decode_payment_header(&encoded).unwrap();
        assert_eq!(payload.x402_version, 2);
        assert_eq!(payload.payload["signature"], "0xsig");
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let json = serde_json::json!({"x402Version": 2, "payload": {}});
        let encoded = format!("  {}  ", STANDARD.encode(serde_json::to_vec(&json).unwrap()));
        assert!(decode_payment_header(&encoded).is_some());
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert!(decode_payment_header("not-base64!!!").is_none());
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = STANDARD.encode(b"{not json");
        assert!(decode_payment_header(&encoded).is_none());
    }

    #[test]
    fn test_decode_wrong_shape() {
        let encoded = STANDARD.encode(b"[1, 2, 3]");
        assert!(decode_payment_header(&encoded).is_none());
    }

    #[test]
    fn test_encode_settlement_roundtrip() {
        let settlement = SettleResponse {
            success: true,
            transaction: Some("0xT".to_string()),
            network: Some("eip155:84532".to_string()),
            payer: None,
            error_reason: None,
        };

        let encoded = encode_settlement(&settlement).unwrap();
        let decoded: SettleResponse =
            serde_json::from_slice(&STANDARD.decode(&encoded).unwrap()).unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.transaction.as_deref(), Some("0xT"));
    }
}
