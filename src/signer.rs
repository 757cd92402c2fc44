//! An abstraction around server-held signers.
//!
//! This allows us to compose different operations around the signing key,
//! such as validating transactions against a policy before signing them and
//! recording every signature to the logs.

pub mod key;
pub mod log_recorder;
pub mod validator;

use crate::chain::types::UnsignedTransaction;
use anyhow::Result;
use ed25519_dalek::Signature;

/// A trait abstracting transaction signing with a server-held key.
pub trait Signing {
    /// Returns the address of the account managed by the signer.
    fn account(&self) -> &str;

    /// Returns the public key of the account managed by the signer.
    fn public_key(&self) -> &[u8; 32];

    /// Signs an unsigned transaction's signing message.
    fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<Signature>;
}

/// A boxed signer that is safe to send between threads.
pub type BoxSigner = Box<dyn Signing + Send + Sync + 'static>;
