//! Error types for the x402 crate.

use thiserror::Error;

/// Errors from x402 encoding and client construction.
///
/// The facilitator RPCs themselves never surface errors: transport and
/// parse failures are folded into the protocol failure shapes.
#[derive(Debug, Error)]
pub enum X402Error {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build facilitator client: {0}")]
    ClientBuild(String),
}
