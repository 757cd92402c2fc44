//! In-process chain client for tests.

use super::{
    types::{
        Authenticator, BuildRequest, OperationKind, PendingSubmission, TransactionReceipt,
        UnsignedTransaction,
    },
    ChainClient, ChainError,
};
use async_trait::async_trait;
use sha3::{Digest as _, Sha3_256};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

/// A fake SDK that accepts every correctly signed transaction.
#[derive(Default)]
pub struct FakeChain {
    builds: AtomicUsize,
    submissions: AtomicUsize,
    reject_with: Mutex<Option<String>>,
    execution_failure: Mutex<Option<String>>,
    confirmation_delay: Mutex<Duration>,
    submission_delay: Mutex<Duration>,
    build_rejection: Mutex<Option<String>>,
    offline: AtomicBool,
}

impl FakeChain {
    /// Rejects every following submission with the specified message.
    pub fn reject_submissions(&self, message: &str) {
        *self.reject_with.lock().unwrap() = Some(message.to_owned());
    }

    /// Commits following transactions with a failed VM status.
    pub fn fail_execution(&self, vm_status: &str) {
        *self.execution_failure.lock().unwrap() = Some(vm_status.to_owned());
    }

    /// Delays confirmations by the specified duration.
    pub fn delay_confirmations(&self, delay: Duration) {
        *self.confirmation_delay.lock().unwrap() = delay;
    }

    /// Delays submission acknowledgements by the specified duration.
    pub fn stall_submissions(&self, delay: Duration) {
        *self.submission_delay.lock().unwrap() = delay;
    }

    /// Refuses to build following transactions with the specified message.
    pub fn reject_builds(&self, message: &str) {
        *self.build_rejection.lock().unwrap() = Some(message.to_owned());
    }

    /// Makes every following call fail as if the node was unreachable.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn reachable(&self) -> Result<(), ChainError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChainError::Transport(anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }

    /// Number of transactions built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of submissions attempted so far, including rejected ones.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

/// Creates an unsigned transaction the way the SDK would.
pub fn transaction(sender: &str, operation: OperationKind) -> UnsignedTransaction {
    let raw = format!("{sender}:{operation:?}").into_bytes();
    let mut signing_message = b"APTOS::RawTransaction".to_vec();
    signing_message.extend_from_slice(&raw);

    UnsignedTransaction {
        sender: sender.to_owned(),
        operation,
        sequence_number: 0,
        expiration_timestamp_secs: 1_700_000_000,
        hash: Some(Sha3_256::digest(&signing_message).to_vec()),
        signing_message,
        raw,
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn build_transaction(
        &self,
        operation: OperationKind,
        request: BuildRequest,
    ) -> Result<UnsignedTransaction, ChainError> {
        self.reachable()?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.build_rejection.lock().unwrap().clone() {
            return Err(ChainError::Rejected(message));
        }
        Ok(transaction(&request.sender, operation))
    }

    async fn submit_with_authenticator(
        &self,
        transaction: &UnsignedTransaction,
        authenticator: Authenticator,
    ) -> Result<PendingSubmission, ChainError> {
        self.reachable()?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submission_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(ChainError::Rejected(message));
        }
        authenticator
            .verify(&transaction.signing_message)
            .map_err(|err| ChainError::Rejected(format!("INVALID_SIGNATURE: {err}")))?;

        Ok(PendingSubmission {
            hash: format!("0x{}", hex::encode(Sha3_256::digest(&transaction.raw))),
        })
    }

    async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionReceipt, ChainError> {
        self.reachable()?;
        let delay = *self.confirmation_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.execution_failure.lock().unwrap().clone();
        Ok(TransactionReceipt {
            hash: hash.to_owned(),
            success: failure.is_none(),
            vm_status: failure.unwrap_or_else(|| "Executed successfully".to_owned()),
            gas_used: "12".to_owned(),
        })
    }
}
