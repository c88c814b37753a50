//! Tenant secret encryption and placeholder resolution.
//!
//! AES-256-GCM with a single process-wide key. Ciphertext (with the auth
//! tag appended) and the random 96-bit nonce are kept as separate values
//! so they can live in separate storage columns.
//!
//! Plaintext secrets exist only transiently: they are produced by
//! [`SecretCipher::decrypt`] on the way into an outbound upstream header
//! and are never persisted or surfaced in responses.

pub mod crypto;
pub mod resolve;

pub use crypto::{SecretCipher, SecretError, KEY_LENGTH, NONCE_LENGTH};
pub use resolve::{referenced_names, resolve_references};
