//! Tenant model.
//!
//! Tenants own endpoints and secrets; both cascade on tenant deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::DbError;

/// A tenant account that owns monetized endpoints.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique identifier for the tenant.
    pub id: Uuid,

    /// Human-readable display name (e.g., "Acme Corp").
    pub name: String,

    /// URL-safe slug, unique across all tenants (e.g., "acme-corp").
    pub slug: String,

    /// Default recipient address for payments (20-byte hex), used when an
    /// endpoint does not override it.
    pub pay_to: Option<String>,

    /// Timestamp when the tenant was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new tenant.
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub pay_to: Option<String>,
}

/// Check whether a string is a valid tenant slug.
///
/// Slugs are 3-32 characters of lowercase ASCII letters, digits, and
/// hyphens. The reserved-name policy is enforced by the routing layer,
/// not here.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    (3..=32).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl Tenant {
    /// Finds a tenant by its ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, name, slug, pay_to, created_at
            FROM tenants
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Finds a tenant by its slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, name, slug, pay_to, created_at
            FROM tenants
            WHERE slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Create a new tenant.
    pub async fn create(pool: &PgPool, data: CreateTenant) -> Result<Self, DbError> {
        if !is_valid_slug(&data.slug) {
            return Err(DbError::ValidationFailed(format!(
                "invalid tenant slug: '{}'",
                data.slug
            )));
        }

        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO tenants (name, slug, pay_to)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, pay_to, created_at
            ",
        )
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.pay_to)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
