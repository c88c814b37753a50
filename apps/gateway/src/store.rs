//! Storage abstraction for the request pipeline.
//!
//! The pipeline talks to storage through [`GatewayStore`] so the proxy
//! logic is independent of the backing database; [`PgStore`] is the
//! production implementation over `tollgate-db`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tollgate_db::models::{
    CreatePayment, CreateRequestLog, Endpoint, Payment, PaymentUpdate, RequestLog, Secret, Tenant,
};
use tollgate_db::DbError;

/// Storage operations used by the proxy pipeline.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// Look up a tenant by slug.
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DbError>;

    /// Look up an endpoint by owning tenant and slug.
    async fn find_endpoint(
        &self,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Endpoint>, DbError>;

    /// Look up a tenant secret by name, returning its ciphertext and nonce.
    async fn find_secret(&self, tenant_id: Uuid, name: &str) -> Result<Option<Secret>, DbError>;

    /// Record a new payment, returning the created row.
    async fn insert_payment(&self, data: CreatePayment) -> Result<Payment, DbError>;

    /// Apply a finalizing update to a payment.
    async fn update_payment(&self, id: Uuid, update: PaymentUpdate) -> Result<(), DbError>;

    /// Append a request log entry.
    async fn insert_request_log(&self, data: CreateRequestLog) -> Result<RequestLog, DbError>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl GatewayStore for PgStore {
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DbError> {
        Tenant::find_by_slug(&self.pool, slug).await
    }

    async fn find_endpoint(
        &self,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Endpoint>, DbError> {
        Endpoint::find_by_slug(&self.pool, tenant_id, slug).await
    }

    async fn find_secret(&self, tenant_id: Uuid, name: &str) -> Result<Option<Secret>, DbError> {
        Secret::find_by_name(&self.pool, tenant_id, name).await
    }

    async fn insert_payment(&self, data: CreatePayment) -> Result<Payment, DbError> {
        Payment::create(&self.pool, data).await
    }

    async fn update_payment(&self, id: Uuid, update: PaymentUpdate) -> Result<(), DbError> {
        Payment::update(&self.pool, id, update).await
    }

    async fn insert_request_log(&self, data: CreateRequestLog) -> Result<RequestLog, DbError> {
        RequestLog::create(&self.pool, data).await
    }
}
