//! Module containing serialization helpers.

use std::fmt::{self, Display, Formatter};

/// Dynamic byte array serialization methods.
///
/// Bytes are encoded as `0x`-prefixed hex strings.
pub mod bytes {
    use serde::{
        de::{self, Deserializer},
        ser::Serializer,
        Deserialize as _,
    };
    use std::borrow::Cow;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::Hex(bytes).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        let s = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("hex bytes missing '0x' prefix"))?;
        hex::decode(s).map_err(de::Error::custom)
    }
}

/// Optional byte array serialization, `null` or missing maps to `None`.
pub mod option_bytes {
    use serde::{de::Deserializer, ser::Serializer, Deserialize};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => super::bytes::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::bytes")] Vec<u8>);

        let wrapper = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(wrapper.map(|Wrapper(bytes)| bytes))
    }
}

/// Secret configuration values.
///
/// Reads a plain string and immediately moves it into a `SecretString` so
/// that it never shows up in `Debug` output of configuration structs.
pub mod secret {
    use secrecy::SecretString;
    use serde::{de::Deserializer, Deserialize as _};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.is_empty()).map(SecretString::from))
    }
}

/// Displays a byte slice as `0x`-prefixed hex.
pub struct Hex<'a>(pub &'a [u8]);

impl Display for Hex<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Normalizes an account address for comparison.
///
/// Addresses are case-insensitive hex, and leading zeros may be elided by
/// some clients, so `0x01` and `0x0000...01` refer to the same account.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
        .trim_start_matches('0')
        .to_ascii_lowercase();
    format!("0x{digits}")
}
