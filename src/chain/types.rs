//! Transaction types exchanged with the chain SDK.

use crate::serialization::{self, Hex};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};

/// Stream operations that mutate chain state.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Create,
    Withdraw,
    Close,
    Extend,
    Pause,
    Resume,
    BatchCreate,
    BatchWithdraw,
}

/// Parameters for building an unsigned transaction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BuildRequest {
    /// The account that will sign and send the transaction.
    pub sender: String,
    /// Operation specific arguments, already validated by the caller.
    pub arguments: Value,
}

/// An unsigned transaction produced by the SDK.
///
/// The bridge never interprets the payload, it only needs the sender for
/// matching signature packets and the signing message for verifying them.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    /// The sending account.
    pub sender: String,
    /// The operation this transaction performs.
    pub operation: OperationKind,
    /// The sender sequence number the transaction was built against.
    pub sequence_number: u64,
    /// Chain-side expiration of the transaction.
    pub expiration_timestamp_secs: u64,
    /// The SDK computed transaction hash, if available before submission.
    #[serde(default, with = "serialization::option_bytes")]
    pub hash: Option<Vec<u8>>,
    /// The exact bytes a signer has to sign.
    #[serde(with = "serialization::bytes")]
    pub signing_message: Vec<u8>,
    /// The SDK encoded raw transaction.
    #[serde(with = "serialization::bytes")]
    pub raw: Vec<u8>,
}

impl Debug for UnsignedTransaction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("UnsignedTransaction")
            .field("sender", &self.sender)
            .field("operation", &self.operation)
            .field("sequence_number", &self.sequence_number)
            .field("expiration_timestamp_secs", &self.expiration_timestamp_secs)
            .field("signing_message", &Hex(&self.signing_message).to_string())
            .finish_non_exhaustive()
    }
}

/// A proof of signature accepted by the chain in place of a live signer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", tag = "scheme")]
pub enum Authenticator {
    Ed25519 {
        #[serde(rename = "publicKey", with = "serialization::bytes")]
        public_key: Vec<u8>,
        #[serde(with = "serialization::bytes")]
        signature: Vec<u8>,
    },
}

impl Authenticator {
    /// Reconstructs an authenticator from raw public key and signature bytes.
    pub fn ed25519(public_key: Vec<u8>, signature: Vec<u8>) -> Self {
        Self::Ed25519 {
            public_key,
            signature,
        }
    }

    /// Verifies that the authenticator signs the specified message.
    pub fn verify(&self, message: &[u8]) -> Result<(), InvalidAuthenticator> {
        match self {
            Self::Ed25519 {
                public_key,
                signature,
            } => {
                let public_key = <[u8; 32]>::try_from(public_key.as_slice())
                    .map_err(|_| InvalidAuthenticator("public key must be 32 bytes"))?;
                let public_key = VerifyingKey::from_bytes(&public_key)
                    .map_err(|_| InvalidAuthenticator("malformed public key"))?;
                let signature = Signature::from_slice(signature)
                    .map_err(|_| InvalidAuthenticator("signature must be 64 bytes"))?;
                public_key
                    .verify_strict(message, &signature)
                    .map_err(|_| InvalidAuthenticator("signature does not match transaction"))
            }
        }
    }
}

/// An authenticator that failed local verification.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InvalidAuthenticator(pub &'static str);

/// Acknowledgement of an accepted submission.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PendingSubmission {
    pub hash: String,
}

/// A committed transaction as reported by the chain.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
    pub gas_used: String,
}

/// The normalized outcome of a submission.
///
/// Direct signing and client-signed completion both produce this shape.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
    pub gas_used: String,
}

impl From<TransactionReceipt> for SubmissionResult {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            hash: receipt.hash,
            success: receipt.success,
            vm_status: receipt.vm_status,
            gas_used: receipt.gas_used,
        }
    }
}
