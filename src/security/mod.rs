//! Credential handling
//!
//! - [`vault`] encrypts and decrypts stored provider API keys
//! - [`tokens`] issues and verifies management bearer tokens

pub mod tokens;
pub mod vault;

use rand::RngCore;

pub use tokens::{BearerTokens, TokenClaims, TokenError};
pub use vault::{Credential, CredentialVault, VaultError};

/// Prefix of every caller-facing API key minted by [`generate_api_key`]
pub const API_KEY_PREFIX: &str = "gap-";

/// Generate a new random caller API key
pub fn generate_api_key() -> String {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    format!("{}{}", API_KEY_PREFIX, hex::encode(secret))
}
