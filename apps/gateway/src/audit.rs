//! Best-effort audit writes.
//!
//! Payment records and request logs are appended from the pipeline, but
//! an audit-write failure must never change the user-visible response:
//! every error lands in the logs and the pipeline moves on.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use tollgate_db::models::{CreatePayment, CreateRequestLog, PaymentStatus, PaymentUpdate};
use tollgate_x402::SettleResponse;

use crate::store::GatewayStore;

/// Audit writer over the gateway store.
#[derive(Clone)]
pub struct AuditWriter {
    store: Arc<dyn GatewayStore>,
}

impl AuditWriter {
    /// Create a writer over the given store.
    pub fn new(store: Arc<dyn GatewayStore>) -> Self {
        Self { store }
    }

    /// Record a payment; returns its id, or `None` if the write failed.
    pub async fn record_payment(&self, data: CreatePayment) -> Option<Uuid> {
        match self.store.insert_payment(data).await {
            Ok(payment) => Some(payment.id),
            Err(err) => {
                error!(error = %err, "Failed to record payment");
                None
            }
        }
    }

    /// Mark a payment settled with its transaction hash.
    pub async fn mark_settled(&self, payment_id: Uuid, settlement: &SettleResponse) {
        let update = PaymentUpdate {
            status: Some(PaymentStatus::Settled),
            tx_hash: settlement.transaction.clone(),
            settlement: serde_json::to_value(settlement).ok(),
            settled_at: Some(Utc::now()),
            error_message: None,
        };
        self.apply_update(payment_id, update).await;
    }

    /// Mark a payment failed, keeping any settlement response for
    /// reconciliation.
    pub async fn mark_failed(
        &self,
        payment_id: Uuid,
        settlement: Option<&SettleResponse>,
        reason: &str,
    ) {
        let update = PaymentUpdate {
            status: Some(PaymentStatus::Failed),
            tx_hash: None,
            settlement: settlement.and_then(|s| serde_json::to_value(s).ok()),
            settled_at: None,
            error_message: Some(reason.to_string()),
        };
        self.apply_update(payment_id, update).await;
    }

    async fn apply_update(&self, payment_id: Uuid, update: PaymentUpdate) {
        if let Err(err) = self.store.update_payment(payment_id, update).await {
            error!(payment_id = %payment_id, error = %err, "Failed to update payment");
        }
    }

    /// Append a request log entry.
    pub async fn record_request(&self, data: CreateRequestLog) {
        if let Err(err) = self.store.insert_request_log(data).await {
            error!(error = %err, "Failed to write request log");
        }
    }
}
