//! Module implementing the bridge JSON RPC handler.

use crate::{
    chain::{
        types::{BuildRequest, OperationKind},
        ChainClient,
    },
    custody::{mode, service::SignaturePacket, CustodyError, SigningService, TransactionId},
    jsonrpc::{self, Id, Request, Response},
};
use rocket::{serde::json::Json, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Names of the supported JSON RPC methods.
const METHODS: &[&str] = &[
    "bridge_prepareOrExecute",
    "bridge_completeWithSignature",
    "bridge_status",
    "bridge_signingMode",
];

/// Transaction bridge node.
pub struct Node {
    service: SigningService,
    chain: Arc<dyn ChainClient>,
}

/// Supported JSON RPC methods and parameters.
#[derive(Debug, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Method {
    #[serde(rename = "bridge_prepareOrExecute")]
    PrepareOrExecute(PrepareParams),
    #[serde(rename = "bridge_completeWithSignature")]
    CompleteWithSignature(CompleteParams),
    #[serde(rename = "bridge_status")]
    Status(StatusParams),
    #[serde(rename = "bridge_signingMode")]
    SigningMode(NoParams),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrepareParams {
    operation: OperationKind,
    /// Defaults to the server account when a server key is loaded.
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    execute: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteParams {
    transaction_id: TransactionId,
    #[serde(flatten)]
    packet: SignaturePacket,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    transaction_id: TransactionId,
}

#[derive(Debug, Deserialize)]
pub struct NoParams {}

/// Result of `bridge_signingMode`.
#[derive(Debug, Serialize)]
struct SigningModeResult<'a> {
    disposition: mode::Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<&'a str>,
}

impl Node {
    /// Creates a new node.
    pub fn new(service: SigningService, chain: Arc<dyn ChainClient>) -> Self {
        Self { service, chain }
    }

    /// Handles a raw JSON RPC request body.
    pub async fn handle(&self, body: &str) -> Response {
        let request = match serde_json::from_str::<Request>(body) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(?err, "malformed JSON RPC request");
                return Response::new(Id::Null, Err(jsonrpc::Error::invalid_request()));
            }
        };

        let id = request.id.clone();
        tracing::debug!(method = %request.method, "handling request");
        let result = match parse(request) {
            Ok(method) => self.execute(method).await,
            Err(err) => Err(err),
        };

        Response::new(id, result)
    }

    /// Stops background work.
    pub async fn shutdown(&self) {
        self.service.shutdown().await;
    }

    async fn execute(&self, method: Method) -> Result<Value, jsonrpc::Error> {
        match method {
            Method::PrepareOrExecute(params) => {
                let disposition = self.service.disposition();
                mode::can_execute(params.execute, disposition)?;

                let sender = params
                    .sender
                    .or_else(|| self.service.account().map(str::to_owned))
                    .ok_or_else(|| jsonrpc::Error::invalid_params("missing sender"))?;
                let transaction = self
                    .chain
                    .build_transaction(
                        params.operation,
                        BuildRequest {
                            sender,
                            arguments: params.arguments,
                        },
                    )
                    .await
                    .map_err(CustodyError::from)?;

                let outcome = self
                    .service
                    .prepare_or_execute(transaction, params.execute, disposition)
                    .await?;
                to_result(&outcome)
            }
            Method::CompleteWithSignature(params) => {
                let result = self
                    .service
                    .complete_with_signature(&params.transaction_id, params.packet)
                    .await?;
                to_result(&result)
            }
            Method::Status(params) => to_result(&self.service.status(&params.transaction_id)),
            Method::SigningMode(NoParams {}) => to_result(&SigningModeResult {
                disposition: self.service.disposition(),
                account: self.service.account(),
            }),
        }
    }
}

/// Converts a generic JSON RPC request into a typed method call.
fn parse(request: Request) -> Result<Method, jsonrpc::Error> {
    if !METHODS.contains(&request.method.as_str()) {
        return Err(jsonrpc::Error::method_not_found(&request.method));
    }

    let params = match request.params.map(Value::from) {
        None => json!({}),
        Some(Value::Array(_)) => {
            return Err(jsonrpc::Error::invalid_params(
                "bridge methods take parameters by name",
            ))
        }
        Some(params) => params,
    };
    serde_json::from_value(json!({ "method": request.method, "params": params }))
        .map_err(jsonrpc::Error::invalid_params)
}

fn to_result<T>(value: &T) -> Result<Value, jsonrpc::Error>
where
    T: Serialize,
{
    serde_json::to_value(value).map_err(|err| {
        tracing::error!(?err, "failed to serialize result");
        jsonrpc::Error::internal_error()
    })
}

impl From<CustodyError> for jsonrpc::Error {
    fn from(err: CustodyError) -> Self {
        let code = match &err {
            CustodyError::ReadOnlyViolation(_) => -32001,
            CustodyError::TransactionExpiredOrUnknown(_) => -32002,
            CustodyError::InvalidSignature(_) => -32003,
            CustodyError::SubmissionRejected(_) => -32004,
            CustodyError::ConfirmationTimeout { .. } => -32005,
            CustodyError::KeyUnavailable => -32006,
            CustodyError::ChainUnavailable(_) => -32007,
        };
        tracing::debug!(kind = err.kind(), %err, "request failed");

        Self {
            code,
            message: err.to_string(),
            data: Some(json!({ "kind": err.kind() })),
        }
    }
}

#[rocket::post("/", data = "<body>")]
pub async fn handler(node: &State<Node>, body: String) -> Json<Response> {
    Json(node.handle(&body).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::fake::FakeChain,
        custody::{clock::ManualClock, ServiceConfig, SigningMode},
        signer::{
            key::{derive_address, LocalKey},
            BoxSigner,
        },
    };
    use ed25519_dalek::{Signer as _, SigningKey};
    use std::time::Duration;

    fn node(config: ServiceConfig, server_key: bool) -> (Arc<FakeChain>, Node) {
        let chain = Arc::new(FakeChain::default());
        let signer = server_key
            .then(|| Box::new(LocalKey::new(SigningKey::from_bytes(&[1; 32]))) as BoxSigner);
        let service = SigningService::start(
            config,
            chain.clone(),
            signer,
            Arc::new(ManualClock::default()),
        );
        (chain.clone(), Node::new(service, chain))
    }

    async fn call(node: &Node, method: &str, params: Value) -> Value {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        serde_json::to_value(node.handle(&body.to_string()).await).unwrap()
    }

    fn hex(bytes: &[u8]) -> String {
        format!("0x{}", hex::encode(bytes))
    }

    #[tokio::test]
    async fn client_signing_flow() {
        let (chain, node) = node(ServiceConfig::default(), false);
        let client = SigningKey::from_bytes(&[3; 32]);
        let sender = derive_address(&client.verifying_key().to_bytes());

        let prepared = call(
            &node,
            "bridge_prepareOrExecute",
            json!({
                "operation": "create",
                "sender": sender,
                "arguments": { "name": "payroll", "amount": "100" },
                "execute": true,
            }),
        )
        .await;
        let result = &prepared["result"];
        assert_eq!(result["clientSigningRequired"], json!(true));
        let id = result["transactionId"].as_str().unwrap().to_owned();

        let message = result["transaction"]["signingMessage"].as_str().unwrap();
        let message = hex::decode(message.trim_start_matches("0x")).unwrap();
        let signature = client.sign(&message).to_bytes();

        let status = call(&node, "bridge_status", json!({ "transactionId": id })).await;
        assert_eq!(status["result"]["found"], json!(true));
        assert_eq!(status["result"]["ageMs"], json!(0));

        let completed = call(
            &node,
            "bridge_completeWithSignature",
            json!({
                "transactionId": id,
                "signature": hex(&signature),
                "publicKey": hex(&client.verifying_key().to_bytes()),
                "senderAddress": sender,
            }),
        )
        .await;
        assert_eq!(completed["result"]["success"], json!(true));
        assert_eq!(chain.submissions(), 1);

        let status = call(&node, "bridge_status", json!({ "transactionId": id })).await;
        assert_eq!(status["result"], json!({ "found": false }));
    }

    #[tokio::test]
    async fn direct_signing_defaults_sender() {
        let (chain, node) = node(
            ServiceConfig {
                signing_mode: SigningMode::Direct,
                ..Default::default()
            },
            true,
        );

        let mode = call(&node, "bridge_signingMode", json!({})).await;
        assert_eq!(mode["result"]["disposition"], json!("directSign"));
        assert!(mode["result"]["account"].is_string());

        let submitted = call(
            &node,
            "bridge_prepareOrExecute",
            json!({ "operation": "withdraw", "execute": true }),
        )
        .await;
        assert_eq!(submitted["result"]["success"], json!(true));
        assert_eq!(submitted["result"]["gasUsed"], json!("12"));
        assert_eq!(chain.submissions(), 1);
    }

    #[tokio::test]
    async fn read_only_never_reaches_sdk() {
        let (chain, node) = node(
            ServiceConfig {
                read_only: true,
                ..Default::default()
            },
            false,
        );

        for execute in [true, false] {
            let response = call(
                &node,
                "bridge_prepareOrExecute",
                json!({ "operation": "close", "sender": "0xa", "execute": execute }),
            )
            .await;
            assert_eq!(response["error"]["code"], json!(-32001));
            assert_eq!(response["error"]["data"]["kind"], json!("ReadOnlyViolation"));
        }
        assert_eq!(chain.builds(), 0);
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn unknown_transaction() {
        let (_, node) = node(ServiceConfig::default(), false);
        let response = call(
            &node,
            "bridge_completeWithSignature",
            json!({
                "transactionId": "nope",
                "signature": "0x01",
                "publicKey": "0x02",
                "senderAddress": "0xa",
            }),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32002));
        assert_eq!(
            response["error"]["data"]["kind"],
            json!("TransactionExpiredOrUnknown"),
        );
    }

    #[tokio::test]
    async fn request_errors() {
        let (_, node) = node(ServiceConfig::default(), false);

        let response = call(&node, "eth_sendTransaction", json!([])).await;
        assert_eq!(response["error"]["code"], json!(-32601));

        let response = call(&node, "bridge_status", json!(["abc"])).await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = call(
            &node,
            "bridge_prepareOrExecute",
            json!({ "operation": "create" }),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = call(
            &node,
            "bridge_prepareOrExecute",
            json!({ "operation": "rugpull", "sender": "0xa" }),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = serde_json::to_value(node.handle("{ not json").await).unwrap();
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn build_failures() {
        let (chain, node) = node(ServiceConfig::default(), false);
        let params = json!({ "operation": "extend", "sender": "0xa", "execute": true });

        chain.reject_builds("STREAM_NOT_FOUND");
        let response = call(&node, "bridge_prepareOrExecute", params.clone()).await;
        assert_eq!(response["error"]["code"], json!(-32004));
        assert_eq!(response["error"]["data"]["kind"], json!("SubmissionRejected"));

        chain.go_offline();
        let response = call(&node, "bridge_prepareOrExecute", params).await;
        assert_eq!(response["error"]["code"], json!(-32007));
        assert_eq!(response["error"]["data"]["kind"], json!("ChainUnavailable"));
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_submission() {
        let (chain, node) = node(
            ServiceConfig {
                signing_mode: SigningMode::Direct,
                ..Default::default()
            },
            true,
        );
        chain.stall_submissions(Duration::from_secs(120));

        let response = call(
            &node,
            "bridge_prepareOrExecute",
            json!({ "operation": "batchCreate", "execute": true }),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32005));
        assert_eq!(response["error"]["data"]["kind"], json!("ConfirmationTimeout"));
        assert_eq!(
            response["error"]["message"],
            json!("timed out waiting for confirmation of unacknowledged submission"),
        );
    }
}
