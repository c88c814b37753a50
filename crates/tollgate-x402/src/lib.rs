//! x402 payment protocol support for tollgate.
//!
//! Implements the pieces of the protocol the proxy needs: the v2 wire
//! types, the Base64 payment-header codec, USD-to-stablecoin amount
//! arithmetic, and the HTTP client for the external facilitator's
//! `verify` and `settle` operations.
//!
//! # Modules
//!
//! - [`types`]: wire format structs (camelCase JSON)
//! - [`headers`]: Base64 encoding/decoding for x402 HTTP headers
//! - [`amount`]: USD decimal to atomic stablecoin conversion
//! - [`networks`]: chain tags and stablecoin asset addresses
//! - [`facilitator`]: verify/settle RPC client

pub mod amount;
pub mod error;
pub mod facilitator;
pub mod headers;
pub mod networks;
pub mod types;

pub use amount::{format_usd, usd_to_stable, StableAmount};
pub use error::X402Error;
pub use facilitator::{extract_payer, FacilitatorClient, DEFAULT_FACILITATOR_URL};
pub use types::{
    AssetExtra, PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo,
    SettleResponse, VerifyResponse, DEFAULT_MAX_TIMEOUT_SECONDS, X402_VERSION,
};
