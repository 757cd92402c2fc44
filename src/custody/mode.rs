//! Resolution of the signing disposition for a request.

use super::error::CustodyError;
use serde::{Deserialize, Serialize};

/// The configured signing mode preference.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// The server signs with its own key.
    Direct,
    /// An external signer provides signatures.
    #[default]
    Client,
}

/// What the bridge may do with a request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Disposition {
    ReadOnly,
    DirectSign,
    ClientSign,
}

/// Process-wide inputs to disposition resolution.
#[derive(Clone, Copy, Debug)]
pub struct SigningSettings {
    pub read_only: bool,
    pub preference: SigningMode,
    pub has_resolvable_key: bool,
}

/// Resolves the disposition for the specified settings.
///
/// A direct preference without a usable key degrades to client signing
/// instead of failing.
pub fn resolve(settings: &SigningSettings) -> Disposition {
    match settings {
        SigningSettings {
            read_only: true, ..
        } => Disposition::ReadOnly,
        SigningSettings {
            preference: SigningMode::Direct,
            has_resolvable_key: true,
            ..
        } => Disposition::DirectSign,
        _ => Disposition::ClientSign,
    }
}

/// Rejects state-mutating requests under a read-only disposition.
///
/// Preparing is the first half of a state mutation, so it is refused as well.
pub fn can_execute(execute: bool, disposition: Disposition) -> Result<(), CustodyError> {
    if disposition != Disposition::ReadOnly {
        return Ok(());
    }

    let action = if execute { "execute" } else { "prepare" };
    Err(CustodyError::ReadOnlyViolation(format!(
        "bridge is in read-only mode, refusing to {action} state-mutating transactions"
    )))
}
