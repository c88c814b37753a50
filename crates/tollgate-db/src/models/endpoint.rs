//! Endpoint model.
//!
//! An endpoint maps a `{tenant}/{slug}` route to an upstream HTTP API,
//! together with the payment terms and upstream credentials used when
//! proxying to it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

use crate::DbError;

/// How tollgate authenticates to the endpoint's upstream.
///
/// The matching credential material lives in `auth_config` and may
/// reference tenant secrets via `{{SECRET:NAME}}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "auth_kind", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AuthKind {
    /// No upstream authentication.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// A single custom header carrying a key.
    HeaderKey,
    /// A key passed as a query-string parameter.
    QueryKey,
    /// HTTP Basic authentication.
    Basic,
    /// An arbitrary set of headers.
    CustomHeaders,
}

/// A monetized proxy endpoint owned by a tenant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique identifier for the endpoint.
    pub id: Uuid,

    /// The tenant this endpoint belongs to.
    pub tenant_id: Uuid,

    /// URL-safe slug, unique per tenant (1-64 chars).
    pub slug: String,

    /// Human-readable display name.
    pub name: String,

    /// Optional description shown on the paywall.
    pub description: Option<String>,

    /// Base URL of the upstream API this endpoint proxies to.
    pub upstream_url: String,

    /// Upstream authentication strategy.
    pub auth_kind: AuthKind,

    /// Opaque string map of auth material; values may contain
    /// `{{SECRET:NAME}}` placeholders.
    pub auth_config: serde_json::Value,

    /// Price per request in USD (NUMERIC(18,6), positive).
    pub price_usd: Decimal,

    /// Recipient address override; falls back to the tenant default.
    pub pay_to: Option<String>,

    /// Whether payments settle on the test network.
    pub testnet: bool,

    /// Paywall branding blob (theme preset, colors, WalletConnect id).
    pub paywall_config: serde_json::Value,

    /// Optional custom paywall HTML carrying `{{payment-config}}` markers.
    pub custom_template: Option<String>,

    /// Optional custom domain, globally unique when present.
    pub cname: Option<String>,

    /// Inactive endpoints resolve as 404.
    pub is_active: bool,

    /// Requests per second admitted before 429 (1-100).
    pub rate_limit_per_sec: i32,

    /// When the endpoint was created.
    pub created_at: DateTime<Utc>,

    /// When the endpoint was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new endpoint.
#[derive(Debug, Clone)]
pub struct CreateEndpoint {
    pub tenant_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub upstream_url: String,
    pub auth_kind: AuthKind,
    pub auth_config: serde_json::Value,
    pub price_usd: Decimal,
    pub pay_to: Option<String>,
    pub testnet: bool,
    pub rate_limit_per_sec: i32,
}

/// Check whether a string is a valid endpoint slug (1-64 chars,
/// lowercase letters, digits, hyphens).
#[must_use]
pub fn is_valid_endpoint_slug(slug: &str) -> bool {
    (1..=64).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl Endpoint {
    /// Finds an endpoint by tenant and slug.
    ///
    /// This is the primary lookup on the proxy hot path.
    pub async fn find_by_slug(
        pool: &PgPool,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM endpoints WHERE tenant_id = $1 AND slug = $2
            ",
        )
        .bind(tenant_id)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Finds an endpoint by its custom domain.
    pub async fn find_by_cname(pool: &PgPool, cname: &str) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM endpoints WHERE cname = $1
            ",
        )
        .bind(cname)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Create a new endpoint.
    pub async fn create(pool: &PgPool, data: CreateEndpoint) -> Result<Self, DbError> {
        if !is_valid_endpoint_slug(&data.slug) {
            return Err(DbError::ValidationFailed(format!(
                "invalid endpoint slug: '{}'",
                data.slug
            )));
        }
        if data.price_usd <= Decimal::ZERO {
            return Err(DbError::ValidationFailed(
                "price_usd must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&data.rate_limit_per_sec) {
            return Err(DbError::ValidationFailed(
                "rate_limit_per_sec must be between 1 and 100".to_string(),
            ));
        }

        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO endpoints (
                tenant_id, slug, name, description, upstream_url,
                auth_kind, auth_config, price_usd, pay_to, testnet,
                rate_limit_per_sec
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            ",
        )
        .bind(data.tenant_id)
        .bind(&data.slug)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.upstream_url)
        .bind(data.auth_kind)
        .bind(&data.auth_config)
        .bind(data.price_usd)
        .bind(&data.pay_to)
        .bind(data.testnet)
        .bind(data.rate_limit_per_sec)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
