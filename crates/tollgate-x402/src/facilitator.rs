//! HTTP client for the external x402 facilitator.
//!
//! The facilitator validates signed payment authorizations (`verify`)
//! and commits them on-chain (`settle`). The client is built once at
//! process start and shared; all methods are safe to call concurrently.
//!
//! Neither RPC ever returns an error to the caller: transport failures,
//! non-2xx statuses, and unparseable bodies all fold into the protocol
//! failure shapes with a generic reason, with the underlying cause kept
//! to the logs.

use std::time::Duration;

use tracing::warn;

use crate::error::X402Error;
use crate::types::{
    FacilitatorRequest, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse,
    X402_VERSION,
};

/// Default facilitator service base URL.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the facilitator's `verify` and `settle` operations.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: String,
    client: reqwest::Client,
}

impl FacilitatorClient {
    /// Create a client against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`X402Error::ClientBuild`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, X402Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| X402Error::ClientBuild(e.to_string()))?;

        Ok(Self::with_client(base_url, client))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// The configured base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify a payment authorization against a requirement.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirement: &PaymentRequirements,
    ) -> VerifyResponse {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirement,
        };
        let url = format!("{}/verify", self.base_url);

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Facilitator verify request failed");
                return VerifyResponse::failure("facilitator unreachable");
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "Facilitator verify returned an error status");
            return VerifyResponse::failure(format!("facilitator returned {status}"));
        }

        match response.json::<VerifyResponse>().await {
            Ok(verify) => verify,
            Err(err) => {
                warn!(error = %err, "Facilitator verify response was unparseable");
                VerifyResponse::failure("invalid facilitator response")
            }
        }
    }

    /// Settle a verified payment on-chain.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirement: &PaymentRequirements,
    ) -> SettleResponse {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirement,
        };
        let url = format!("{}/settle", self.base_url);

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Facilitator settle request failed");
                return SettleResponse::failure("facilitator unreachable");
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "Facilitator settle returned an error status");
            return SettleResponse::failure(format!("facilitator returned {status}"));
        }

        match response.json::<SettleResponse>().await {
            Ok(settle) => settle,
            Err(err) => {
                warn!(error = %err, "Facilitator settle response was unparseable");
                SettleResponse::failure("invalid facilitator response")
            }
        }
    }
}

/// Determine the payer address for a verified payment.
///
/// Prefers the address the facilitator recovered; otherwise searches the
/// signed payload at `from`, `authorization.from`, `sender`, and `payer`.
/// A payment is never rejected for a missing payer; the fallback is
/// `"unknown"`.
#[must_use]
pub fn extract_payer(verify: &VerifyResponse, payload: &PaymentPayload) -> String {
    if let Some(payer) = verify.payer.as_deref() {
        if !payer.is_empty() {
            return payer.to_string();
        }
    }

    let inner = &payload.payload;
    for candidate in [
        inner.get("from"),
        inner.get("authorization").and_then(|a| a.get("from")),
        inner.get("sender"),
        inner.get("payer"),
    ] {
        if let Some(value) = candidate.and_then(|v| v.as_str()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    "unknown".to_string()
}
