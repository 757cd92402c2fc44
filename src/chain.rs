//! An abstraction around the chain SDK.
//!
//! The bridge only ever needs four things from the SDK: building an unsigned
//! transaction, submitting it with an authenticator, waiting for it to be
//! committed, and (for server-held keys) signing and submitting in one go.

pub mod method;
pub mod remote;
pub mod types;

#[cfg(test)]
pub mod fake;

use self::types::{
    Authenticator, BuildRequest, OperationKind, PendingSubmission, TransactionReceipt,
    UnsignedTransaction,
};
use crate::signer::Signing;
use async_trait::async_trait;
use thiserror::Error;

/// A trait abstracting the chain SDK operations used by the bridge.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Builds an unsigned transaction for the specified operation.
    async fn build_transaction(
        &self,
        operation: OperationKind,
        request: BuildRequest,
    ) -> Result<UnsignedTransaction, ChainError>;

    /// Submits a transaction with a reconstructed authenticator.
    async fn submit_with_authenticator(
        &self,
        transaction: &UnsignedTransaction,
        authenticator: Authenticator,
    ) -> Result<PendingSubmission, ChainError>;

    /// Waits for a submitted transaction to be committed on chain.
    async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionReceipt, ChainError>;

    /// Signs a transaction with a server-held key and submits it.
    async fn sign_and_submit(
        &self,
        transaction: &UnsignedTransaction,
        signer: &(dyn Signing + Send + Sync),
    ) -> Result<PendingSubmission, ChainError> {
        let signature = signer
            .sign_transaction(transaction)
            .map_err(ChainError::Signing)?;
        let authenticator = Authenticator::ed25519(
            signer.public_key().to_vec(),
            signature.to_bytes().to_vec(),
        );
        self.submit_with_authenticator(transaction, authenticator)
            .await
    }
}

/// An error returned by the chain SDK.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain refused the transaction (bad sequence number, insufficient
    /// balance, malformed authenticator, ...).
    #[error("{0}")]
    Rejected(String),

    /// The server-held signer refused to sign.
    #[error("signer error: {0:#}")]
    Signing(anyhow::Error),

    /// The SDK node could not be reached or returned garbage.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),
}
