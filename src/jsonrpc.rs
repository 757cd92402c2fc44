//! Module for JSON RPC types.

use reqwest::Url;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};
use thiserror::Error;

/// JSON RPC client.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    /// Creates a new client for the given URL.
    pub fn new(url: Url) -> Result<Self, InvalidScheme> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidScheme(other.to_owned())),
        }

        Ok(Self {
            inner: reqwest::Client::new(),
            url,
        })
    }

    /// Returns the URL of the remote JSON RPC server.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Executes a JSON RPC request.
    ///
    /// JSON RPC errors are returned as responses whatever the HTTP status
    /// they were sent with. Only unparsable bodies on error statuses are
    /// reported as HTTP failures.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        let response = self.inner.post(self.url.clone()).json(&request).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<Response>(&bytes) {
            Ok(response) => Ok(response),
            Err(_) if !status.is_success() => Err(ClientError::Status(status)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Invalid URL scheme.
#[derive(Debug, Error)]
#[error("invalid scheme {0}")]
pub struct InvalidScheme(pub String);

/// JSON RPC client error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An error occured while performing an HTTP request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status and no JSON RPC response.
    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    /// An error occured serializing or deserializing JSON RPC data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON RPC version.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum JsonRpc {
    #[serde(rename = "2.0")]
    V2,
}

/// JSON RPC message identifier.
///
/// From the JSON RPC 2.0 specification:
/// > An identifier established by the Client that MUST contain a String,
/// > Number, or NULL value if included. If it is not included it is assumed to
/// > be a notification. The value SHOULD normally not be Null and Numbers
/// > SHOULD NOT contain fractional parts
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(Number),
    Null,
}

/// JSON RPC params.
///
/// From the JSON RPC 2.0 specification:
/// > If present, parameters for the rpc call MUST be provided as a structured
/// > value. Either by-position through an Array or by-name through an Object.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Params {
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl From<Params> for Value {
    fn from(val: Params) -> Self {
        match val {
            Params::Array(a) => Value::Array(a),
            Params::Object(o) => Value::Object(o),
        }
    }
}

/// JSON RPC request.
#[derive(Debug, Deserialize, Serialize)]
pub struct Request {
    pub jsonrpc: JsonRpc,
    pub method: String,
    pub params: Option<Params>,
    pub id: Id,
}

/// JSON RPC response.
#[derive(Debug)]
pub struct Response {
    pub jsonrpc: JsonRpc,
    pub result: Result<Value, Error>,
    pub id: Id,
}

impl Response {
    /// Creates a new JSON RPC 2.0 response for the specified request ID.
    pub fn new(id: Id, result: Result<Value, Error>) -> Self {
        Self {
            jsonrpc: JsonRpc::V2,
            result,
            id,
        }
    }
}

/// Helper type for generating serialization implemtation for `Response`.
#[derive(Deserialize, Serialize)]
struct Res<'a> {
    jsonrpc: JsonRpc,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Cow<'a, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Cow<'a, Error>>,
    id: Cow<'a, Id>,
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (result, error) = match &self.result {
            Ok(result) => (Some(Cow::Borrowed(result)), None),
            Err(error) => (None, Some(Cow::Borrowed(error))),
        };
        let res = Res {
            jsonrpc: self.jsonrpc,
            result,
            error,
            id: Cow::Borrowed(&self.id),
        };
        res.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let res = Res::deserialize(deserializer)?;
        let result = match (res.result, res.error) {
            (Some(result), None) => Ok(result.into_owned()),
            (None, Some(error)) => Err(error.into_owned()),
            (Some(_), Some(_)) => return Err(de::Error::custom("both result and error specified")),
            (None, None) => return Err(de::Error::custom("missing result or error")),
        };
        Ok(Response {
            jsonrpc: res.jsonrpc,
            result,
            id: res.id.into_owned(),
        })
    }
}

/// JSON RPC error.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Error {
    /// Creates an error indicating the request object was invalid.
    pub fn invalid_request() -> Error {
        Self {
            code: -32600,
            message: "Invalid request".to_owned(),
            data: None,
        }
    }

    /// Creates an error indicating the method does not exist.
    pub fn method_not_found(method: &str) -> Error {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    /// Creates an error indicating parameters were invalid.
    pub fn invalid_params(detail: impl Display) -> Error {
        Self {
            code: -32602,
            message: format!("Invalid params: {detail}"),
            data: None,
        }
    }

    /// Creates an error indicating an internal server error was encountered.
    pub fn internal_error() -> Error {
        Self {
            code: -32603,
            message: "Internal error".to_owned(),
            data: None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}
