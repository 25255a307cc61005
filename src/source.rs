//! Where ledger text comes from

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use ledgerlens_config::Config;

/// Supplies the raw ledger text and the optional account declarations
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn ledger_text(&self) -> Result<String>;

    async fn accounts_text(&self) -> Result<Option<String>>;
}

/// Reads ledger files from disk
#[derive(Debug, Clone)]
pub struct FsLedgerSource {
    ledger_path: PathBuf,
    accounts_path: Option<PathBuf>,
}

impl FsLedgerSource {
    pub fn new(ledger_path: PathBuf, accounts_path: Option<PathBuf>) -> Self {
        Self { ledger_path, accounts_path }
    }

    /// Files configured under `data`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ledger_path(), config.accounts_path())
    }
}

#[async_trait]
impl LedgerSource for FsLedgerSource {
    async fn ledger_text(&self) -> Result<String> {
        log::debug!(target: "ledgerlens::source", "Reading ledger {}", self.ledger_path.display());
        tokio::fs::read_to_string(&self.ledger_path)
            .await
            .with_context(|| format!("Failed to read ledger file {}", self.ledger_path.display()))
    }

    async fn accounts_text(&self) -> Result<Option<String>> {
        let Some(path) = &self.accounts_path else {
            return Ok(None);
        };
        log::debug!(target: "ledgerlens::source", "Reading account declarations {}", path.display());
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read accounts file {}", path.display()))?;
        Ok(Some(text))
    }
}
