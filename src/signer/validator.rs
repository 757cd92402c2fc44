//! Transaction policy validation for server-side signing.

use super::{Signing, UnsignedTransaction};
use anyhow::{ensure, Context as _, Result};
use ed25519_dalek::Signature;
use mlua::{Function, Lua, LuaSerdeExt as _, StdLib, Value, Variadic};
use std::{fs, path::Path, sync::Mutex};

/// A validating signer whose logic is defined by a Lua module.
///
/// The module must define a global `validate_transaction(account, tx)`
/// function returning `true` to allow the server key to sign `tx`.
pub struct Validator<S> {
    lua: Mutex<Lua>,
    inner: S,
}

impl<S> Validator<S> {
    /// Creates a new validator wrapping the specified signer and using the
    /// specified path as a Lua module for validation logic.
    pub fn new(inner: S, module: &Path) -> Result<Self> {
        let src = fs::read_to_string(module)
            .with_context(|| format!("failed to read validator module {}", module.display()))?;
        Self::from_source(inner, &src)
    }

    /// Creates a new validator from Lua source code.
    pub fn from_source(inner: S, src: &str) -> Result<Self> {
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH,
            Default::default(),
        )?;

        // Override `print` function and forward it to logs.
        let print = lua.create_function(|lua, values: Variadic<Value>| {
            let mut buffer = String::new();
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    buffer.push('\t');
                }
                if let Some(string) = lua.coerce_string(value.clone())? {
                    buffer.push_str(&string.to_string_lossy());
                }
            }
            tracing::debug!("{buffer}");
            Ok(())
        })?;
        lua.globals().set("print", print)?;

        lua.load(src).set_name("validator")?.exec()?;

        Ok(Self {
            lua: Mutex::new(lua),
            inner,
        })
    }

    fn validate_transaction(&self, account: &str, transaction: &UnsignedTransaction) -> Result<()> {
        let lua = self
            .lua
            .lock()
            .map_err(|_| anyhow::anyhow!("validator state poisoned"))?;
        let handler = lua
            .globals()
            .get::<_, Function>("validate_transaction")
            .context("missing 'validate_transaction' handler in module")?;
        let input = (account.to_owned(), lua.to_value(transaction)?);
        let ok = handler.call::<_, bool>(input)?;
        ensure!(ok, "policy denied signing {:?} transaction", transaction.operation);

        Ok(())
    }
}

impl<S> Signing for Validator<S>
where
    S: Signing,
{
    fn account(&self) -> &str {
        self.inner.account()
    }

    fn public_key(&self) -> &[u8; 32] {
        self.inner.public_key()
    }

    fn sign_transaction(&self, transaction: &UnsignedTransaction) -> Result<Signature> {
        self.validate_transaction(self.inner.account(), transaction)?;
        self.inner.sign_transaction(transaction)
    }
}
