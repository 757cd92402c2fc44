//! The transaction signing service.
//!
//! Every state-mutating request goes through three phases: an unsigned
//! transaction is prepared, it is either signed right away with the server
//! key or parked in the pending store, and it is finalized by submitting it
//! and waiting for the chain to commit it. Parked transactions are finalized
//! by `complete_with_signature` once an external signer produced a signature,
//! or evicted by the reaper if nobody ever does.

use super::{
    clock::{self, Clock},
    error::CustodyError,
    mode::{self, Disposition, SigningMode, SigningSettings},
    reaper::{Reaper, ReaperConfig},
    store::{PendingStore, TransactionId},
};
use crate::{
    chain::{
        types::{Authenticator, PendingSubmission, SubmissionResult, UnsignedTransaction},
        ChainClient, ChainError,
    },
    serialization::{self, normalize_address, Hex},
    signer::{BoxSigner, Signing},
};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time;

/// Service configuration.
#[derive(Clone, Copy, Debug)]
pub struct ServiceConfig {
    pub read_only: bool,
    pub signing_mode: SigningMode,
    pub reaper: ReaperConfig,
    /// Upper bound for submitting and confirming a transaction.
    pub confirmation_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            signing_mode: SigningMode::default(),
            reaper: ReaperConfig::default(),
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

/// Externally produced signature for a pending transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePacket {
    #[serde(with = "serialization::bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serialization::bytes")]
    pub public_key: Vec<u8>,
    pub sender_address: String,
    #[serde(default, with = "serialization::option_bytes")]
    pub transaction_hash: Option<Vec<u8>>,
}

/// A transaction parked until an external signer provides a signature.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prepared {
    pub transaction_id: TransactionId,
    pub client_signing_required: bool,
    /// Echoed so that the signer can sign its signing message.
    pub transaction: UnsignedTransaction,
}

/// Result of `prepare_or_execute`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Prepared(Prepared),
    Submitted(SubmissionResult),
}

/// Polling view of a transaction identifier.
#[derive(Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_ms: Option<u64>,
}

/// How a request that asked to execute gets signed.
enum Strategy<'a> {
    /// Sign now with the server key.
    Direct(&'a (dyn Signing + Send + Sync)),
    /// No signer available in-process, park the transaction.
    Client,
}

/// Orchestrates preparation, signing handoff and submission.
pub struct SigningService {
    store: Arc<PendingStore>,
    chain: Arc<dyn ChainClient>,
    signer: Option<BoxSigner>,
    settings: SigningSettings,
    confirmation_timeout: Duration,
    reaper: Mutex<Option<Reaper>>,
}

impl SigningService {
    /// Creates the service and starts its reaper on the current runtime.
    pub fn start(
        config: ServiceConfig,
        chain: Arc<dyn ChainClient>,
        signer: Option<BoxSigner>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let settings = SigningSettings {
            read_only: config.read_only,
            preference: config.signing_mode,
            has_resolvable_key: signer.is_some(),
        };
        let disposition = mode::resolve(&settings);
        if config.signing_mode == SigningMode::Direct && disposition == Disposition::ClientSign {
            tracing::warn!("direct signing configured without a usable key, falling back to client signing");
        }
        tracing::info!(?disposition, "signing service started");

        let store = Arc::new(PendingStore::new(clock));
        let reaper = Reaper::spawn(store.clone(), config.reaper);

        Self {
            store,
            chain,
            signer,
            settings,
            confirmation_timeout: config.confirmation_timeout,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// Resolves the signing disposition for a request.
    pub fn disposition(&self) -> Disposition {
        mode::resolve(&self.settings)
    }

    /// The server account, if a server key is loaded.
    pub fn account(&self) -> Option<&str> {
        self.signer.as_ref().map(|signer| signer.account())
    }

    /// Signs and submits the transaction, or parks it for external signing.
    ///
    /// A request that does not ask to execute is only ever prepared, whatever
    /// the disposition. Under client signing, executing means preparing too.
    pub async fn prepare_or_execute(
        &self,
        transaction: UnsignedTransaction,
        execute: bool,
        disposition: Disposition,
    ) -> Result<Outcome, CustodyError> {
        mode::can_execute(execute, disposition)?;
        if !execute {
            return Ok(Outcome::Prepared(self.defer(transaction)));
        }

        match self.strategy(disposition)? {
            Strategy::Direct(signer) => {
                let submission = self.chain.sign_and_submit(&transaction, signer);
                let result = self.finalize(submission).await?;
                Ok(Outcome::Submitted(result))
            }
            Strategy::Client => Ok(Outcome::Prepared(self.defer(transaction))),
        }
    }

    /// Submits a parked transaction with an externally produced signature.
    ///
    /// Malformed packets leave the transaction pending. Once the transaction
    /// has been claimed for submission it is gone from the store, whatever
    /// the submission outcome.
    pub async fn complete_with_signature(
        &self,
        id: &TransactionId,
        packet: SignaturePacket,
    ) -> Result<SubmissionResult, CustodyError> {
        validate_packet(&packet)?;

        let pending = self
            .store
            .peek(id)
            .ok_or_else(|| CustodyError::TransactionExpiredOrUnknown(id.to_string()))?;
        let authenticator = Authenticator::ed25519(packet.public_key, packet.signature);
        check_packet_matches(
            &pending.transaction,
            &authenticator,
            &packet.sender_address,
            packet.transaction_hash.as_deref(),
        )?;

        let transaction = self
            .store
            .take(id)
            .ok_or_else(|| CustodyError::TransactionExpiredOrUnknown(id.to_string()))?;
        tracing::info!(transaction_id = %id, operation = ?transaction.operation, "claimed transaction for submission");

        let submission = self
            .chain
            .submit_with_authenticator(&transaction, authenticator);
        self.finalize(submission).await
    }

    /// Reports whether a transaction is still pending, and for how long.
    pub fn status(&self, id: &TransactionId) -> TransactionStatus {
        let status = match self.store.peek(id) {
            Some(pending) => TransactionStatus {
                found: true,
                age_ms: Some(pending.age_ms),
            },
            None => TransactionStatus {
                found: false,
                age_ms: None,
            },
        };
        tracing::debug!(transaction_id = %id, found = status.found, "status polled");
        status
    }

    /// Stops the reaper. Pending transactions stay in memory until the
    /// service is dropped.
    pub async fn shutdown(&self) {
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
            tracing::info!(pending = self.store.len(), "signing service stopped");
        }
    }

    fn strategy(&self, disposition: Disposition) -> Result<Strategy<'_>, CustodyError> {
        match disposition {
            Disposition::ReadOnly => Err(CustodyError::ReadOnlyViolation(
                "bridge is in read-only mode, refusing to sign".to_owned(),
            )),
            Disposition::DirectSign => self
                .signer
                .as_deref()
                .map(Strategy::Direct)
                .ok_or(CustodyError::KeyUnavailable),
            Disposition::ClientSign => Ok(Strategy::Client),
        }
    }

    fn defer(&self, transaction: UnsignedTransaction) -> Prepared {
        let transaction_id = self.store.put(transaction.clone());
        tracing::info!(
            %transaction_id,
            operation = ?transaction.operation,
            sender = %transaction.sender,
            "transaction deferred for client signing"
        );

        Prepared {
            transaction_id,
            client_signing_required: true,
            transaction,
        }
    }

    /// Waits for a submission to be acknowledged and committed, bounded by
    /// the confirmation timeout.
    async fn finalize<F>(&self, submission: F) -> Result<SubmissionResult, CustodyError>
    where
        F: Future<Output = Result<PendingSubmission, ChainError>>,
    {
        let deadline = clock::deadline(self.confirmation_timeout);

        let pending = time::timeout_at(deadline, submission)
            .await
            .map_err(|_| CustodyError::ConfirmationTimeout { hash: None })?
            .map_err(CustodyError::from)?;
        tracing::info!(hash = %pending.hash, "transaction submitted");

        let receipt = time::timeout_at(deadline, self.chain.wait_for_transaction(&pending.hash))
            .await
            .map_err(|_| CustodyError::ConfirmationTimeout {
                hash: Some(pending.hash.clone()),
            })?
            .map_err(CustodyError::from)?;
        if !receipt.success {
            tracing::warn!(hash = %receipt.hash, vm_status = %receipt.vm_status, "transaction failed on chain");
        }

        Ok(receipt.into())
    }
}

fn validate_packet(packet: &SignaturePacket) -> Result<(), CustodyError> {
    let missing = if packet.signature.is_empty() {
        "signature"
    } else if packet.public_key.is_empty() {
        "public key"
    } else if packet.sender_address.trim().is_empty() {
        "sender address"
    } else {
        return Ok(());
    };
    Err(CustodyError::InvalidSignature(format!("missing {missing}")))
}

fn check_packet_matches(
    transaction: &UnsignedTransaction,
    authenticator: &Authenticator,
    sender_address: &str,
    transaction_hash: Option<&[u8]>,
) -> Result<(), CustodyError> {
    if normalize_address(sender_address) != normalize_address(&transaction.sender) {
        return Err(CustodyError::InvalidSignature(format!(
            "sender {sender_address} does not match transaction sender {}",
            transaction.sender
        )));
    }
    if let (Some(expected), Some(actual)) = (transaction.hash.as_deref(), transaction_hash) {
        if expected != actual {
            return Err(CustodyError::InvalidSignature(format!(
                "transaction hash {} does not match {}",
                Hex(actual),
                Hex(expected)
            )));
        }
    }
    authenticator
        .verify(&transaction.signing_message)
        .map_err(|err| CustodyError::InvalidSignature(err.to_string()))
}
