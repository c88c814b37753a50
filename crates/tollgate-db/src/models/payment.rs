//! Payment record model.
//!
//! A payment row is created after facilitator verification succeeds
//! (status `verified`) and is finalized exactly once to `settled` or
//! `failed` by the request that created it. Settled and failed are
//! terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

use crate::DbError;

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created but not yet verified (unused on the happy path; kept for
    /// completeness of the state space).
    Pending,
    /// Facilitator verification succeeded; settlement not yet attempted.
    Verified,
    /// Settlement succeeded; `tx_hash` and `settled_at` are set.
    Settled,
    /// Upstream or settlement failure; `error_message` explains why.
    Failed,
}

impl PaymentStatus {
    /// Whether this status permits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Settled | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Verified => write!(f, "verified"),
            PaymentStatus::Settled => write!(f, "settled"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An audit record of one x402 payment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier for the payment.
    pub id: Uuid,

    /// Endpoint the payment was made against (null after endpoint deletion).
    pub endpoint_id: Option<Uuid>,

    /// Owning tenant (null after tenant deletion).
    pub tenant_id: Option<Uuid>,

    /// Payer address extracted from verification or the signed payload.
    pub payer_address: String,

    /// USD amount, copied from the endpoint price at creation.
    pub amount_usd: Decimal,

    /// Numeric chain id (e.g., 8453).
    pub chain_id: i64,

    /// CAIP-2 network tag (e.g., `eip155:8453`).
    pub network: String,

    /// On-chain transaction hash, set on settlement.
    pub tx_hash: Option<String>,

    /// Lifecycle status.
    pub status: PaymentStatus,

    /// Verbatim payment payload as presented by the client.
    pub payload: serde_json::Value,

    /// Verbatim settlement response from the facilitator.
    pub settlement: Option<serde_json::Value>,

    /// Request path snapshot.
    pub request_path: String,

    /// Request method snapshot.
    pub request_method: String,

    /// Failure detail when status is `failed`.
    pub error_message: Option<String>,

    /// When the payment row was created.
    pub created_at: DateTime<Utc>,

    /// When settlement completed.
    pub settled_at: Option<DateTime<Utc>>,
}

/// Data required to record a new payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub endpoint_id: Uuid,
    pub tenant_id: Uuid,
    pub payer_address: String,
    pub amount_usd: Decimal,
    pub chain_id: i64,
    pub network: String,
    pub status: PaymentStatus,
    pub payload: serde_json::Value,
    pub request_path: String,
    pub request_method: String,
}

/// Fields applied when a payment is finalized.
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdate {
    pub status: Option<PaymentStatus>,
    pub tx_hash: Option<String>,
    pub settlement: Option<serde_json::Value>,
    pub settled_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Payment {
    /// Record a new payment.
    pub async fn create(pool: &PgPool, data: CreatePayment) -> Result<Self, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO payments (
                endpoint_id, tenant_id, payer_address, amount_usd,
                chain_id, network, status, payload,
                request_path, request_method
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            ",
        )
        .bind(data.endpoint_id)
        .bind(data.tenant_id)
        .bind(&data.payer_address)
        .bind(data.amount_usd)
        .bind(data.chain_id)
        .bind(&data.network)
        .bind(data.status)
        .bind(&data.payload)
        .bind(&data.request_path)
        .bind(&data.request_method)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Apply a status update to a payment the caller just created.
    ///
    /// Only non-`None` fields are written; `status` transitions out of a
    /// terminal state are not guarded here because the pipeline finalizes
    /// each payment at most once.
    pub async fn update(pool: &PgPool, id: Uuid, update: PaymentUpdate) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE payments
            SET status = COALESCE($2, status),
                tx_hash = COALESCE($3, tx_hash),
                settlement = COALESCE($4, settlement),
                settled_at = COALESCE($5, settled_at),
                error_message = COALESCE($6, error_message)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.tx_hash)
        .bind(&update.settlement)
        .bind(update.settled_at)
        .bind(&update.error_message)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(())
    }

    /// Find a payment by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM payments WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List payments stuck in `verified` older than the given cutoff.
    ///
    /// A payment left in `verified` means the request was cancelled or
    /// crashed between verification and settlement; external
    /// reconciliation consumes this list.
    pub async fn list_dangling(
        pool: &PgPool,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM payments
            WHERE status = 'verified' AND created_at < $1
            ORDER BY created_at ASC
            ",
        )
        .bind(older_than)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(PaymentStatus::Verified.to_string(), "verified");
        assert_eq!(PaymentStatus::Settled.to_string(), "settled");
        assert_eq!(PaymentStatus::Failed.to_string(), "failed");
        assert_eq!(PaymentStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn test_status_terminal() {
        assert!(PaymentStatus::Settled.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(!PaymentStatus::Verified.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Settled).unwrap(),
            "\"settled\""
        );
        let parsed: PaymentStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Failed);
    }
}
