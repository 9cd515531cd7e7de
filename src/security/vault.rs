//! Credential vault
//!
//! Provider API keys are stored as `base64(nonce || ciphertext)` sealed with
//! AES-256-GCM under a process-wide master key. Plaintext only exists inside a
//! [`Credential`], whose `Debug` output is redacted.

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Vault failures
///
/// Messages never include key material or plaintext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Master key must be 32 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    #[error("Master key is not valid base64")]
    InvalidKeyEncoding,

    #[error("Stored credential could not be decrypted")]
    DecryptionFailed,

    #[error("Credential could not be encrypted")]
    EncryptionFailed,
}

/// A decrypted provider credential
///
/// Lives only for the duration of the request it authorizes.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Plaintext secret, for building the single outbound request header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// AES-256-GCM vault for stored provider credentials
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Build a vault from raw key bytes
    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength { actual: key.len() });
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| VaultError::InvalidKeyLength { actual: key.len() })?;
        Ok(Self { cipher })
    }

    /// Build a vault from the base64 master key found in configuration
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let key = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| VaultError::InvalidKeyEncoding)?;
        Self::new(&key)
    }

    /// Encrypt a plaintext credential into its stored text form
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypt a stored credential
    pub fn decrypt(&self, stored: &str) -> Result<Credential, VaultError> {
        let sealed = general_purpose::STANDARD
            .decode(stored.trim())
            .map_err(|_| VaultError::DecryptionFailed)?;

        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailed);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext)
            .map(Credential)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}
