mod chain;
mod custody;
mod jsonrpc;
mod node;
mod serialization;
mod signer;

use crate::{
    chain::remote::Remote,
    custody::{
        clock::SystemClock, reaper::ReaperConfig, ServiceConfig, SigningMode, SigningService,
    },
    node::Node,
    signer::{key::LocalKey, log_recorder::LogRecorder, validator::Validator, BoxSigner},
};
use anyhow::{Context as _, Result};
use reqwest::Url;
use rocket::{fairing::AdHoc, serde::Deserialize};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
struct Config {
    /// Refuse every state-mutating request.
    #[serde(default)]
    read_only: bool,

    /// Preferred signing mode, `client` or `direct`.
    #[serde(default)]
    signing_mode: SigningMode,

    /// Hex encoded ed25519 key for direct signing.
    #[serde(default, deserialize_with = "serialization::secret::deserialize")]
    signer_key: Option<SecretString>,

    /// Lua module with a `validate_transaction` policy for the server key.
    #[serde(default)]
    validator_module: Option<PathBuf>,

    /// The SDK node building and submitting transactions.
    remote_node_url: String,

    #[serde(default = "defaults::sweep_interval_secs")]
    sweep_interval_secs: u64,

    #[serde(default = "defaults::max_pending_age_secs")]
    max_pending_age_secs: u64,

    #[serde(default = "defaults::confirmation_timeout_secs")]
    confirmation_timeout_secs: u64,
}

mod defaults {
    pub fn sweep_interval_secs() -> u64 {
        60
    }

    pub fn max_pending_age_secs() -> u64 {
        600
    }

    pub fn confirmation_timeout_secs() -> u64 {
        30
    }
}

impl Config {
    fn service(&self) -> ServiceConfig {
        ServiceConfig {
            read_only: self.read_only,
            signing_mode: self.signing_mode,
            reaper: ReaperConfig {
                sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
                max_age: Duration::from_secs(self.max_pending_age_secs),
            },
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}

#[rocket::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let result = rocket::build()
        .attach(AdHoc::config::<Config>())
        .attach(AdHoc::try_on_ignite("txbridge::Node", |rocket| async {
            let Some(config) = rocket.state::<Config>() else {
                return Err(rocket);
            };
            match init(config) {
                Ok(node) => Ok(rocket.manage(node)),
                Err(err) => {
                    tracing::error!(?err, "failed to initialize node");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::on_shutdown("txbridge::Node", |rocket| {
            Box::pin(async move {
                if let Some(node) = rocket.state::<Node>() {
                    node.shutdown().await;
                }
            })
        }))
        .mount("/", rocket::routes![node::handler])
        .launch()
        .await;

    if let Err(err) = result {
        tracing::error!(?err, "server error");
        std::process::exit(1);
    }
}

fn init(config: &Config) -> Result<Node> {
    let signer = match load_signer(config) {
        Ok(signer) => signer,
        Err(err) => {
            tracing::warn!(?err, "server key unavailable");
            None
        }
    };
    if let Some(signer) = &signer {
        tracing::debug!(account = %signer.account(), "loaded server key");
    }

    let url = Url::parse(&config.remote_node_url).context("invalid remote node URL")?;
    let remote = Arc::new(Remote::new(url)?);
    tracing::debug!(url = %remote.url(), "connected to remote SDK node");

    let service = SigningService::start(
        config.service(),
        remote.clone(),
        signer,
        Arc::new(SystemClock),
    );
    Ok(Node::new(service, remote))
}

/// Loads the server key, wrapped with logging and an optional policy.
fn load_signer(config: &Config) -> Result<Option<BoxSigner>> {
    let Some(secret) = &config.signer_key else {
        return Ok(None);
    };
    let key = LogRecorder(LocalKey::from_secret(secret)?);

    let signer: BoxSigner = match &config.validator_module {
        Some(module) => Box::new(Validator::new(key, module)?),
        None => Box::new(key),
    };
    Ok(Some(signer))
}
