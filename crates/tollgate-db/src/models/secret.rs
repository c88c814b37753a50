//! Tenant secret model.
//!
//! Secrets are stored as AES-256-GCM ciphertext plus nonce; plaintext is
//! never persisted. Encryption and decryption happen in the
//! `tollgate-secrets` crate; this model only moves opaque bytes.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::DbError;

/// An encrypted tenant secret referenced from endpoint auth config as
/// `{{SECRET:NAME}}`.
#[derive(Debug, Clone, FromRow)]
pub struct Secret {
    /// Unique identifier for the secret.
    pub id: Uuid,

    /// The tenant this secret belongs to.
    pub tenant_id: Uuid,

    /// Uppercase name, unique per tenant (e.g., `UPSTREAM_KEY`).
    pub name: String,

    /// AES-256-GCM ciphertext with the auth tag appended.
    pub ciphertext: Vec<u8>,

    /// The 96-bit nonce used for this ciphertext.
    pub nonce: Vec<u8>,

    /// When the secret was created.
    pub created_at: DateTime<Utc>,

    /// When the secret value was last rotated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to store a new secret.
#[derive(Debug, Clone)]
pub struct CreateSecret {
    pub tenant_id: Uuid,
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Check whether a string is a valid secret name: uppercase letters,
/// digits and underscores, not starting with a digit, at most 64 chars.
#[must_use]
pub fn is_valid_secret_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty checked above");
    if !(first.is_ascii_uppercase() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl Secret {
    /// Finds a secret by tenant and name.
    pub async fn find_by_name(
        pool: &PgPool,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, DbError> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM secrets WHERE tenant_id = $1 AND name = $2
            ",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Store a new secret, replacing any existing value under the same name.
    pub async fn upsert(pool: &PgPool, data: CreateSecret) -> Result<Self, DbError> {
        if !is_valid_secret_name(&data.name) {
            return Err(DbError::ValidationFailed(format!(
                "invalid secret name: '{}'",
                data.name
            )));
        }

        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO secrets (tenant_id, name, ciphertext, nonce)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, name)
            DO UPDATE SET ciphertext = $3, nonce = $4, updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(data.tenant_id)
        .bind(&data.name)
        .bind(&data.ciphertext)
        .bind(&data.nonce)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
