//! AES-256-GCM encryption for tenant secrets.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

/// Length of the AES-256 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of the GCM nonce in bytes.
pub const NONCE_LENGTH: usize = 12;

/// Length of the GCM authentication tag in bytes.
const TAG_LENGTH: usize = 16;

/// Errors returned by secret encryption operations.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The configured key is not 32 bytes of hex.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Decryption or tag verification failed.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Symmetric cipher over tenant secrets.
///
/// Holds the process-wide 32-byte key from configuration. Every
/// encryption draws a fresh random nonce from the OS CSPRNG.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_LENGTH],
}

impl SecretCipher {
    /// Create a cipher from a raw 32-byte key.
    #[must_use]
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a cipher from a hex-encoded 32-byte key.
    pub fn from_hex(hex_key: &str) -> Result<Self, SecretError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| SecretError::InvalidKey(format!("not valid hex: {e}")))?;

        if bytes.len() != KEY_LENGTH {
            return Err(SecretError::InvalidKey(format!(
                "key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Encrypt a plaintext.
    ///
    /// Returns the ciphertext with the 16-byte auth tag appended, and the
    /// freshly generated nonce. The two are stored separately.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LENGTH]), SecretError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SecretError::Encrypt(format!("failed to create cipher: {e}")))?;

        use rand::rngs::OsRng;
        use rand::RngCore;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| SecretError::Encrypt(format!("encryption failed: {e}")))?;

        Ok((ciphertext, nonce_bytes))
    }

    /// Decrypt a ciphertext produced by [`SecretCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Decrypt`] if the nonce is malformed, the
    /// ciphertext is too short, or tag verification fails.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, SecretError> {
        if nonce.len() != NONCE_LENGTH {
            return Err(SecretError::Decrypt(format!(
                "nonce must be {NONCE_LENGTH} bytes, got {}",
                nonce.len()
            )));
        }
        // Tag alone is the minimum; an empty plaintext encrypts to tag-only.
        if ciphertext.len() < TAG_LENGTH {
            return Err(SecretError::Decrypt("ciphertext too short".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SecretError::Decrypt(format!("failed to create cipher: {e}")))?;

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| SecretError::Decrypt(format!("decryption failed: {e}")))
    }

    /// Encrypt a string secret.
    pub fn encrypt_string(
        &self,
        plaintext: &str,
    ) -> Result<(Vec<u8>, [u8; NONCE_LENGTH]), SecretError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt to a string secret.
    pub fn decrypt_string(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<String, SecretError> {
        let plaintext = self.decrypt(ciphertext, nonce)?;
        String::from_utf8(plaintext)
            .map_err(|e| SecretError::Decrypt(format!("decrypted data is not valid UTF-8: {e}")))
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
