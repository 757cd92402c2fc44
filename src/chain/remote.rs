//! A module implementing a JSON RPC client for a remote SDK node.

use super::{
    method::{sdk, Method},
    types::{
        Authenticator, BuildRequest, OperationKind, PendingSubmission, TransactionReceipt,
        UnsignedTransaction,
    },
    ChainClient, ChainError,
};
use crate::jsonrpc::{self, Client, ClientError, Id, InvalidScheme, JsonRpc, Params, Request};
use async_trait::async_trait;
use reqwest::Url;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// JSON RPC error code the SDK node uses for transactions refused by the
/// chain, as opposed to node failures.
const REJECTED_CODE: i64 = -32010;

/// A remote SDK node.
pub struct Remote {
    client: Client,
    ids: AtomicU64,
}

impl Remote {
    /// Create a new remote SDK node client.
    pub fn new(url: Url) -> Result<Self, InvalidScheme> {
        let client = Client::new(url)?;
        Ok(Self {
            client,
            ids: Default::default(),
        })
    }

    /// Returns the URL of the remote node.
    pub fn url(&self) -> &Url {
        self.client.url()
    }

    /// Executes a typed method call.
    pub async fn execute<M>(&self, method: M, params: M::Params) -> Result<M::Result, RemoteError>
    where
        M: Method,
        M::Params: Serialize,
        M::Result: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Array(array) => Params::Array(array),
            // Automatically promote single values to arrays with one entry,
            // the SDK node only accepts positional parameters.
            value => Params::Array(vec![value]),
        };

        let id = self.ids.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            jsonrpc: JsonRpc::V2,
            method: method.into_name(),
            params: Some(params),
            id: Id::Number(id.into()),
        };

        let response = self.client.execute(request).await?;
        let result = serde_json::from_value(response.result?)?;

        Ok(result)
    }
}

#[async_trait]
impl ChainClient for Remote {
    async fn build_transaction(
        &self,
        operation: OperationKind,
        request: BuildRequest,
    ) -> Result<UnsignedTransaction, ChainError> {
        Ok(self
            .execute(sdk::BuildTransaction, (operation, request))
            .await?)
    }

    async fn submit_with_authenticator(
        &self,
        transaction: &UnsignedTransaction,
        authenticator: Authenticator,
    ) -> Result<PendingSubmission, ChainError> {
        Ok(self
            .execute(sdk::SubmitTransaction, (transaction.clone(), authenticator))
            .await?)
    }

    async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionReceipt, ChainError> {
        Ok(self
            .execute(sdk::WaitForTransaction, (hash.to_owned(),))
            .await?)
    }
}

/// An error executing a JSON RPC request with a remote node.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An error occured during JSON serialization of method parameters or
    /// result.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error occured in the underlying JSON RPC client.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// A JSON RPC error occured while processing the request.
    #[error("SDK RPC error: {0}")]
    Rpc(#[from] jsonrpc::Error),
}

impl From<RemoteError> for ChainError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rpc(err) if err.code == REJECTED_CODE => Self::Rejected(err.message),
            err => Self::Transport(err.into()),
        }
    }
}
