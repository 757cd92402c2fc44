//! Errors reported by the custody protocol.

use crate::chain::ChainError;
use thiserror::Error;

/// A custody protocol failure.
///
/// None of these are retried by the bridge, the caller decides.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// A state-mutating request arrived while the bridge is read-only.
    #[error("{0}")]
    ReadOnlyViolation(String),

    /// The identifier is not pending: it expired, was already completed, or
    /// never existed. Re-prepare the transaction.
    #[error("transaction {0} expired or unknown")]
    TransactionExpiredOrUnknown(String),

    /// The signature packet is malformed or does not match the transaction.
    /// The pending entry is left untouched.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The chain refused the transaction. The entry has been consumed.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// No confirmation arrived in time. The transaction may still land.
    #[error("timed out waiting for confirmation of {}", .hash.as_deref().unwrap_or("unacknowledged submission"))]
    ConfirmationTimeout { hash: Option<String> },

    /// Direct signing was requested but no server key is loaded.
    #[error("server signing key unavailable")]
    KeyUnavailable,

    /// The SDK node could not be reached.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),
}

impl CustodyError {
    /// Stable tag identifying the kind of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadOnlyViolation(_) => "ReadOnlyViolation",
            Self::TransactionExpiredOrUnknown(_) => "TransactionExpiredOrUnknown",
            Self::InvalidSignature(_) => "InvalidSignature",
            Self::SubmissionRejected(_) => "SubmissionRejected",
            Self::ConfirmationTimeout { .. } => "ConfirmationTimeout",
            Self::KeyUnavailable => "KeyUnavailable",
            Self::ChainUnavailable(_) => "ChainUnavailable",
        }
    }
}

impl From<ChainError> for CustodyError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Rejected(message) => Self::SubmissionRejected(message),
            ChainError::Signing(err) => Self::SubmissionRejected(format!("{err:#}")),
            ChainError::Transport(err) => Self::ChainUnavailable(format!("{err:#}")),
        }
    }
}
