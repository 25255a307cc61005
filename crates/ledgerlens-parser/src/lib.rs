//! Ledger parser implementation
//!
//! A lightweight ledger-cli file parser using regex.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod error;
pub mod types;
pub mod directives;
pub mod parser;
pub mod stage;

pub use error::ParseError;
pub use parser::{parse_amount, LedgerParser, ParseOutput};
pub use stage::Stage;

// Re-export commonly used types
pub use types::{
    account_prefix, account_root, account_segments, account_separator, Amount, Meta, Price, RootCategory,
    RootNames, SpanInfo,
};
pub use directives::{AccountDetails, Directive, MetadataBlock, Posting, SpannedDirective, Transaction};

/// Everything extracted from one ledger text, stage by stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedLedger {
    pub transactions: Stage<Vec<Transaction>>,
    /// Declared account paths plus every account used in a posting (sorted, unique)
    pub accounts: Stage<Vec<String>>,
    pub accounts_advance: Stage<Vec<AccountDetails>>,
    /// Merged YAML of the `---` fenced blocks; an empty mapping when there are none
    pub metadata: Stage<serde_yaml::Value>,
    pub parents_detected: Stage<RootNames>,
    /// Entries skipped while parsing
    pub issues: Vec<ParseError>,
    /// Paths that were explicitly declared
    pub declared_accounts: Vec<String>,
}

/// Parse ledger text.
///
/// `accounts_text` holds the account declarations when they live in a
/// separate file; otherwise they are read from `ledger_text`. `roots` are the
/// configured root names used for parent detection.
pub fn parse(ledger_text: &str, accounts_text: Option<&str>, roots: &RootNames) -> Result<ParsedLedger, ParseError> {
    if ledger_text.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let output = LedgerParser::parse(ledger_text);
    for issue in &output.issues {
        log::warn!(target: "ledgerlens::parser", "{}", issue);
    }

    let declarations: Vec<AccountDetails> = match accounts_text {
        Some(text) => {
            let accounts_output = LedgerParser::parse(text);
            for issue in &accounts_output.issues {
                log::warn!(target: "ledgerlens::parser", "Accounts file: {}", issue);
            }
            accounts_output.accounts().cloned().collect()
        }
        None => output.accounts().cloned().collect(),
    };

    let transactions: Vec<Transaction> = output.transactions().cloned().collect();
    let declared_accounts: Vec<String> = declarations
        .iter()
        .map(|d| d.path.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let accounts: Vec<String> = declared_accounts
        .iter()
        .cloned()
        .chain(transactions.iter().flat_map(|t| t.postings.iter().map(|p| p.account.clone())))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let metadata = Stage::from_result(merge_metadata(&output));
    if let Some(reason) = metadata.reason() {
        log::warn!(target: "ledgerlens::parser", "Metadata unavailable: {}", reason);
    }

    let parents = detect_parents(&accounts, roots);

    log::debug!(
        target: "ledgerlens::parser",
        "Parsed {} transactions, {} accounts, {} issues",
        transactions.len(),
        accounts.len(),
        output.issues.len()
    );

    Ok(ParsedLedger {
        transactions: Stage::ready(transactions),
        accounts: Stage::ready(accounts),
        accounts_advance: Stage::ready(declarations),
        metadata,
        parents_detected: Stage::ready(parents),
        issues: output.issues,
        declared_accounts,
    })
}

/// Merge every metadata block into one mapping; later keys win
fn merge_metadata(output: &ParseOutput) -> Result<serde_yaml::Value, ParseError> {
    let mut merged = serde_yaml::Mapping::new();

    for (block, span) in output.metadata_blocks() {
        if !block.terminated {
            return Err(ParseError::MetadataError {
                message: format!("metadata block opened at line {} is not closed", span.start),
            });
        }
        if block.yaml.trim().is_empty() {
            continue;
        }

        let value: serde_yaml::Value = serde_yaml::from_str(&block.yaml).map_err(|e| ParseError::MetadataError {
            message: format!("line {}: {}", span.start, e),
        })?;
        match value {
            serde_yaml::Value::Mapping(mapping) => merged.extend(mapping),
            serde_yaml::Value::Null => {}
            _ => {
                return Err(ParseError::MetadataError {
                    message: format!("metadata block at line {} is not a mapping", span.start),
                })
            }
        }
    }

    Ok(serde_yaml::Value::Mapping(merged))
}

/// Root name actually used in the text for each category.
///
/// The configured name wins when it appears; otherwise a localized name is
/// matched case-insensitively. Categories never seen keep the configured name.
pub fn detect_parents(accounts: &[String], configured: &RootNames) -> RootNames {
    let roots: BTreeSet<&str> = accounts.iter().map(|a| account_root(a)).collect();
    let mut detected = configured.clone();

    for category in RootCategory::ALL {
        let configured_name = configured.get(category);
        if roots.contains(configured_name) {
            continue;
        }
        let localized = roots.iter().find(|root| {
            category
                .localized_names()
                .iter()
                .any(|name| name.eq_ignore_ascii_case(root))
        });
        if let Some(root) = localized {
            log::debug!(target: "ledgerlens::parser", "Detected {} root as '{}'", category, root);
            detected.set(category, root.to_string());
        }
    }

    detected
}
