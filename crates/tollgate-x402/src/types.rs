//! Wire format types for the x402 protocol (version 2).
//!
//! All types serialize as camelCase JSON. The protocol version is the
//! integer `2` throughout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::usd_to_stable;
use crate::networks;

/// The x402 protocol version spoken by this implementation.
pub const X402_VERSION: u8 = 2;

/// Default payment validity window advertised in requirements.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// EIP-712 domain fields of the payment asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetExtra {
    /// Domain name (e.g., "USDC").
    pub name: String,
    /// Domain version (e.g., "2").
    pub version: String,
}

/// Payment terms advertised by the seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme; always `exact` here.
    pub scheme: String,

    /// CAIP-2 chain id (e.g., `eip155:8453`).
    pub network: String,

    /// Atomic amount as a decimal string.
    pub amount: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum seconds the authorization stays acceptable.
    pub max_timeout_seconds: u64,

    /// Stablecoin asset address.
    pub asset: String,

    /// Asset domain fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<AssetExtra>,
}

impl PaymentRequirements {
    /// Build the exact-scheme requirement for a USD price.
    #[must_use]
    pub fn exact(price_usd: Decimal, pay_to: &str, testnet: bool, max_timeout_seconds: u64) -> Self {
        let stable = usd_to_stable(price_usd, testnet);
        Self {
            scheme: "exact".to_string(),
            network: networks::network_for(testnet).to_string(),
            amount: stable.amount,
            pay_to: pay_to.to_string(),
            max_timeout_seconds,
            asset: stable.asset,
            extra: Some(stable.extra),
        }
    }
}

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    pub url: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the resource content.
    pub mime_type: String,
}

impl ResourceInfo {
    /// Resource metadata for a JSON API endpoint.
    #[must_use]
    pub fn json(url: &str, description: &str) -> Self {
        Self {
            url: url.to_string(),
            description: description.to_string(),
            mime_type: "application/json".to_string(),
        }
    }
}

/// A signed payment authorization presented by the client.
///
/// `payload` is scheme-specific and treated as opaque here; for the
/// exact scheme it typically holds `{signature, authorization:{from, to,
/// value, validAfter, validBefore, nonce}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version.
    pub x402_version: u8,

    /// Scheme-specific signed payload.
    pub payload: serde_json::Value,

    /// The requirement the payer accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<PaymentRequirements>,

    /// Descriptor of the resource being purchased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
}

/// HTTP 402 response body advertising payment terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version.
    pub x402_version: u8,

    /// Descriptor of the protected resource.
    pub resource: ResourceInfo,

    /// Acceptable payment methods.
    pub accepts: Vec<PaymentRequirements>,

    /// Optional error detail for malformed payment attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Build the 402 body for a single exact-scheme requirement.
    #[must_use]
    pub fn new(resource: ResourceInfo, requirement: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            resource,
            accepts: vec![requirement],
            error: None,
        }
    }
}

/// Facilitator response to a verification request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyResponse {
    /// Whether the authorization is valid against the requirement.
    pub is_valid: bool,

    /// Reason the authorization was rejected.
    pub invalid_reason: Option<String>,

    /// Payer address recovered from the signature.
    pub payer: Option<String>,
}

impl VerifyResponse {
    /// A failed verification with the given reason.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
        }
    }
}

/// Facilitator response to a settlement request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettleResponse {
    /// Whether the payment was committed on-chain.
    pub success: bool,

    /// Transaction hash of the settlement.
    pub transaction: Option<String>,

    /// Network the settlement landed on.
    pub network: Option<String>,

    /// Payer address.
    pub payer: Option<String>,

    /// Reason settlement failed.
    pub error_reason: Option<String>,
}

impl SettleResponse {
    /// A failed settlement with the given reason.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: None,
            network: None,
            payer: None,
            error_reason: Some(reason.into()),
        }
    }
}

/// Request body POSTed to the facilitator's `verify` and `settle`
/// operations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest<'a> {
    /// Protocol version.
    pub x402_version: u8,
    /// The client's signed payload.
    pub payment_payload: &'a PaymentPayload,
    /// The requirement it must satisfy.
    pub payment_requirements: &'a PaymentRequirements,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_requirement_serializes_camel_case() {
        let req = PaymentRequirements::exact(dec!(0.01), "0xAAAA", true, 300);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["scheme"], "exact");
        assert_eq!(json["network"], "eip155:84532");
        assert_eq!(json["amount"], "10000");
        assert_eq!(json["payTo"], "0xAAAA");
        assert_eq!(json["maxTimeoutSeconds"], 300);
        assert_eq!(json["extra"]["name"], "USDC");
        assert_eq!(json["extra"]["version"], "2");
    }

    #[test]
    fn test_payment_required_shape() {
        let req = PaymentRequirements::exact(dec!(0.05), "0xBBBB", false, 300);
        let body = PaymentRequired::new(ResourceInfo::json("https://t.example/a/b", "Weather"), req);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["x402Version"], 2);
        assert_eq!(json["resource"]["mimeType"], "application/json");
        assert_eq!(json["accepts"].as_array().unwrap().len(), 1);
        assert_eq!(json["accepts"][0]["network"], "eip155:8453");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_payload_roundtrip() {
        let json = serde_json::json!({
            "x402Version": 2,
            "payload": {
                "signature": "0xsig",
                "authorization": {"from": "0xF", "to": "0xT", "value": "10000"}
            },
            "accepted": {
                "scheme": "exact",
                "network": "eip155:84532",
                "amount": "10000",
                "payTo": "0xAAAA",
                "maxTimeoutSeconds": 300,
                "asset": "0x036C"
            },
            "resource": {"url": "u", "description": "d", "mimeType": "application/json"}
        });

        let payload: PaymentPayload = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(payload.x402_version, 2);
        assert_eq!(payload.payload["authorization"]["from"], "0xF");
        assert_eq!(payload.accepted.as_ref().unwrap().amount, "10000");

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["accepted"]["payTo"], "0xAAAA");
    }

    #[test]
    fn test_payload_minimal_fields() {
        let payload: PaymentPayload =
            serde_json::from_value(serde_json::json!({"x402Version": 2, "payload": {}})).unwrap();
        assert!(payload.accepted.is_none());
        assert!(payload.resource.is_none());
    }

    #[test]
    fn test_verify_response_lenient_parse() {
        let v: VerifyResponse = serde_json::from_str("{}").unwrap();
        assert!(!v.is_valid);
        assert!(v.payer.is_none());

        let v: VerifyResponse =
            serde_json::from_str(r#"{"isValid": true, "payer": "0xB"}"#).unwrap();
        assert!(v.is_valid);
        assert_eq!(v.payer.as_deref(), Some("0xB"));
    }

    #[test]
    fn test_settle_response_lenient_parse() {
        let s: SettleResponse =
            serde_json::from_str(r#"{"success": true, "transaction": "0xT"}"#).unwrap();
        assert!(s.success);
        assert_eq!(s.transaction.as_deref(), Some("0xT"));

        let s: SettleResponse = serde_json::from_str(r#"{"errorReason": "nonce reused"}"#).unwrap();
        assert!(!s.success);
        assert_eq!(s.error_reason.as_deref(), Some("nonce reused"));
    }
}
