//! The server-held key used for direct signing.

use super::{Signing, UnsignedTransaction};
use anyhow::Result;
use ed25519_dalek::{Signature, Signer as _, SigningKey};
use secrecy::{ExposeSecret as _, SecretString};
use sha3::{Digest as _, Sha3_256};
use thiserror::Error;

/// Authentication scheme byte for single ed25519 key accounts.
const ED25519_SCHEME: u8 = 0x00;

/// A single ed25519 account key.
pub struct LocalKey {
    signing_key: SigningKey,
    public_key: [u8; 32],
    address: String,
}

impl LocalKey {
    /// Loads a key from `0x`-prefixed (or bare) hex encoded key material.
    ///
    /// The secret is only exposed for the duration of the parsing.
    pub fn from_secret(secret: &SecretString) -> Result<Self, KeyUnavailable> {
        let material = secret.expose_secret().trim();
        let material = material.strip_prefix("0x").unwrap_or(material);
        let bytes = hex::decode(material).map_err(|_| KeyUnavailable("key is not valid hex"))?;
        let seed = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| KeyUnavailable("key must be 32 bytes"))?;

        Ok(Self::new(SigningKey::from_bytes(&seed)))
    }

    /// Creates a local key from an ed25519 signing key.
    pub fn new(signing_key: SigningKey) -> Self {
        let public_key = signing_key.verifying_key().to_bytes();
        let address = derive_address(&public_key);
        Self {
            signing_key,
            public_key,
            address,
        }
    }
}

/// Computes the account address authenticated by an ed25519 public key.
pub fn derive_address(public_key: &[u8; 32]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update([ED25519_SCHEME]);
    format!("0x{}", hex::encode(hasher.finalize()))
}

impl Signing for LocalKey {
    fn account(&self) -> &str {
        &self.address
    }

    fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<Signature> {
        Ok(self.signing_key.sign(&transaction.signing_message))
    }
}

/// Configured key material could not be turned into a usable key.
#[derive(Debug, Error)]
#[error("signing key unavailable: {0}")]
pub struct KeyUnavailable(pub &'static str);
