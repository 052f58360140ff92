//! Caller-supplied collaborators: confirmation, missing-value prompts and the
//! recipient address book.
//!
//! The engine never talks to a terminal directly; the binary wires in the console
//! implementations and tests wire in scripted ones.

use crate::registry::parse_address;
use crate::Result;
use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Decides whether a previewed transaction goes ahead.
///
/// Blocking by contract: there is no timeout that defaults to "yes".
pub trait ConfirmationGate: Send + Sync {
    fn confirm(&self, preview: &str) -> bool;
}

/// Values that can be filled in interactively: missing intent fields and the
/// answers to `new chain` / `new token`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptField {
    Chain,
    Token,
    UsingToken,
    Amount,
    Recipient,
    ChainName,
    ChainId,
    RpcUrl,
    NativeSymbol,
    ExplorerUrl,
    DexName,
    RouterAddress,
    FactoryAddress,
    TokenName,
    TokenAddress,
}

impl fmt::Display for PromptField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptField::Chain => "chain",
            PromptField::Token => "token",
            PromptField::UsingToken => "using token",
            PromptField::Amount => "amount",
            PromptField::Recipient => "recipient",
            PromptField::ChainName => "chain name",
            PromptField::ChainId => "chain id",
            PromptField::RpcUrl => "RPC URL",
            PromptField::NativeSymbol => "native token symbol",
            PromptField::ExplorerUrl => "block explorer URL",
            PromptField::DexName => "DEX name (blank for none)",
            PromptField::RouterAddress => "router address",
            PromptField::FactoryAddress => "factory address (blank to skip)",
            PromptField::TokenName => "token name",
            PromptField::TokenAddress => "token contract address",
        };
        f.write_str(name)
    }
}

/// Supplies a missing value. `None` abandons the request.
pub trait ValuePrompt: Send + Sync {
    fn prompt(&self, field: PromptField, options: &[String]) -> Option<String>;
}

/// Prompt used where interaction is impossible: every request is abandoned.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl ValuePrompt for NoPrompt {
    fn prompt(&self, _field: PromptField, _options: &[String]) -> Option<String> {
        None
    }
}

/// Name -> address lookup for transfers
pub trait RecipientDirectory: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Address>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipientEntry {
    pub full_name: String,
    #[serde(default)]
    pub call_name: Option<String>,
    #[serde(alias = "public0x")]
    pub address: String,
}

/// Address book loaded from a JSON array of [`RecipientEntry`]
#[derive(Debug, Clone, Default)]
pub struct JsonRecipientDirectory {
    by_name: HashMap<String, Address>,
}

impl JsonRecipientDirectory {
    pub fn from_entries(entries: Vec<RecipientEntry>) -> Result<Self> {
        let mut by_name = HashMap::new();
        for entry in entries {
            let address = parse_address(&entry.address)?;
            by_name.insert(entry.full_name.trim().to_lowercase(), address);
            if let Some(call_name) = entry.call_name {
                by_name.insert(call_name.trim().to_lowercase(), address);
            }
        }
        Ok(Self { by_name })
    }

    /// Load from disk; a missing file yields an empty directory.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let entries: Vec<RecipientEntry> = serde_json::from_str(&content)?;
                let directory = Self::from_entries(entries)?;
                tracing::debug!(
                    path = %path.display(),
                    names = directory.by_name.len(),
                    "Loaded recipients"
                );
                Ok(directory)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Recipients file not found");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl RecipientDirectory for JsonRecipientDirectory {
    fn resolve(&self, name: &str) -> Option<Address> {
        self.by_name.get(&name.trim().to_lowercase()).copied()
    }
}

impl RecipientDirectory for HashMap<String, Address> {
    fn resolve(&self, name: &str) -> Option<Address> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name.trim()))
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn resolves_full_and_call_names() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"full_name": "Ross Peili", "call_name": "Ross",
                 "public0x": "0x89a7f83db9c1919b89370182002ffe5dfffc03e2"}}]"#
        )
        .unwrap();

        let directory = JsonRecipientDirectory::load(file.path()).unwrap();
        let expected = parse_address("0x89a7f83db9c1919b89370182002ffe5dfffc03e2").unwrap();
        assert_eq!(directory.resolve("ross"), Some(expected));
        assert_eq!(directory.resolve("ROSS PEILI"), Some(expected));
        assert_eq!(directory.resolve("Alice"), None);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let directory = JsonRecipientDirectory::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(directory.resolve("anyone"), None);
    }

    #[test]
    fn bad_address_is_rejected() {
        let entries = vec![RecipientEntry {
            full_name: "Bob".to_string(),
            call_name: None,
            address: "0x1234".to_string(),
        }];
        assert!(JsonRecipientDirectory::from_entries(entries).is_err());
    }
}
