//! Request log model.
//!
//! One append-only row per proxied request, paid or not. Rows keep weak
//! references to endpoint, tenant, and payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::DbError;

/// An append-only log entry for one inbound request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RequestLog {
    /// Unique identifier for the log entry.
    pub id: Uuid,

    /// Endpoint that served the request (null after endpoint deletion).
    pub endpoint_id: Option<Uuid>,

    /// Owning tenant (null after tenant deletion).
    pub tenant_id: Option<Uuid>,

    /// Payment associated with this request, if any.
    pub payment_id: Option<Uuid>,

    /// Request path as received.
    pub path: String,

    /// HTTP method.
    pub method: String,

    /// Status code returned to the client.
    pub status_code: i32,

    /// Wall-clock time to response, in milliseconds.
    pub elapsed_ms: i64,

    /// Client IP (first `X-Forwarded-For` entry or the socket address).
    pub client_ip: Option<String>,

    /// Client `User-Agent`.
    pub user_agent: Option<String>,

    /// Whether the client looked like a browser.
    pub is_browser: bool,

    /// Whether a verified payment accompanied the request.
    pub paid: bool,

    /// Whether the request was rejected by the rate limiter.
    pub rate_limited: bool,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Data required to append a request log entry.
#[derive(Debug, Clone)]
pub struct CreateRequestLog {
    pub endpoint_id: Uuid,
    pub tenant_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub path: String,
    pub method: String,
    pub status_code: i32,
    pub elapsed_ms: i64,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub is_browser: bool,
    pub paid: bool,
    pub rate_limited: bool,
}

impl RequestLog {
    /// Append a request log entry.
    pub async fn create(pool: &PgPool, data: CreateRequestLog) -> Result<Self, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO request_logs (
                endpoint_id, tenant_id, payment_id, path, method,
                status_code, elapsed_ms, client_ip, user_agent,
                is_browser, paid, rate_limited
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            ",
        )
        .bind(data.endpoint_id)
        .bind(data.tenant_id)
        .bind(data.payment_id)
        .bind(&data.path)
        .bind(&data.method)
        .bind(data.status_code)
        .bind(data.elapsed_ms)
        .bind(&data.client_ip)
        .bind(&data.user_agent)
        .bind(data.is_browser)
        .bind(data.paid)
        .bind(data.rate_limited)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List recent log entries for an endpoint, newest first.
    pub async fn list_by_endpoint(
        pool: &PgPool,
        endpoint_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM request_logs
            WHERE endpoint_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(endpoint_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
