//! A signer that just logs all signing operations.

use super::{Signing, UnsignedTransaction};
use crate::serialization::Hex;
use anyhow::Result;
use ed25519_dalek::Signature;

/// Wrapping signer that logs all signing operations to the global logger.
pub struct LogRecorder<S>(pub S);

impl<S> Signing for LogRecorder<S>
where
    S: Signing,
{
    fn account(&self) -> &str {
        self.0.account()
    }

    fn public_key(&self) -> &[u8; 32] {
        self.0.public_key()
    }

    fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<Signature> {
        let signature = self.0.sign_transaction(transaction)?;
        let account = self.account();
        let signature_hex = Hex(&signature.to_bytes()).to_string();
        tracing::info!(%account, ?transaction, signature = %signature_hex, "signed transaction");
        Ok(signature)
    }
}
