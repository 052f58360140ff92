//! Durable JSON storage for the registry
//!
//! Both files are staged as sibling temp files before either is renamed into place.
//! If the second rename fails the first file is put back, so the pair on disk always
//! belongs to the same registry state.

use super::chains::ChainConfig;
use super::tokens::TokenConfig;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

const CHAINS_FILE: &str = "chains.json";
const TOKENS_FILE: &str = "tokens.json";

/// Location of `chains.json` / `tokens.json`
#[derive(Debug, Clone)]
pub struct RegistryStore {
    dir: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn chains_path(&self) -> PathBuf {
        self.dir.join(CHAINS_FILE)
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.dir.join(TOKENS_FILE)
    }

    /// Load both files. `None` when neither exists yet.
    pub async fn load(&self) -> Result<Option<(Vec<ChainConfig>, Vec<TokenConfig>)>> {
        let chains = read_json::<Vec<ChainConfig>>(&self.chains_path()).await?;
        let tokens = read_json::<Vec<TokenConfig>>(&self.tokens_path()).await?;
        match (chains, tokens) {
            (None, None) => Ok(None),
            (chains, tokens) => Ok(Some((
                chains.unwrap_or_default(),
                tokens.unwrap_or_default(),
            ))),
        }
    }

    /// Persist the full registry.
    pub async fn save(&self, chains: &[ChainConfig], tokens: &[TokenConfig]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let chains_path = self.chains_path();
        let tokens_path = self.tokens_path();

        let chains_tmp = stage(&chains_path, chains).await?;
        let tokens_tmp = match stage(&tokens_path, tokens).await {
            Ok(tmp) => tmp,
            Err(e) => {
                discard(&chains_tmp).await;
                return Err(e);
            }
        };

        let previous_chains = match tokio::fs::read(&chains_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                discard(&chains_tmp).await;
                discard(&tokens_tmp).await;
                return Err(e.into());
            }
        };

        if let Err(e) = tokio::fs::rename(&chains_tmp, &chains_path).await {
            discard(&chains_tmp).await;
            discard(&tokens_tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tokens_tmp, &tokens_path).await {
            discard(&tokens_tmp).await;
            restore(&chains_path, previous_chains).await;
            return Err(e.into());
        }

        tracing::debug!(dir = %self.dir.display(), "Registry persisted");
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write `value` next to `path` and return the temp file.
async fn stage<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&tmp, content).await {
        discard(&tmp).await;
        return Err(e.into());
    }
    Ok(tmp)
}

async fn discard(tmp: &Path) {
    let _ = tokio::fs::remove_file(tmp).await;
}

/// Put back the content `path` had before a failed save.
async fn restore(path: &Path, previous: Option<Vec<u8>>) {
    let result = match previous {
        Some(bytes) => tokio::fs::write(path, bytes).await,
        None => tokio::fs::remove_file(path).await,
    };
    if let Err(e) = result {
        tracing::error!(path = %path.display(), error = %e, "Failed to restore registry file");
    }
}
