//! Ledger directive types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, Meta, Price, SpanInfo};

/// Spanned directive with position info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpannedDirective {
    pub data: Directive,
    pub span: SpanInfo,
}

/// Main directive enum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Directive {
    Transaction(Transaction),
    Account(AccountDetails),
    /// Raw YAML from a `---` fenced metadata block
    Metadata(MetadataBlock),
}

/// Transaction with its postings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub aux_date: Option<NaiveDate>,
    pub flag: Option<String>,
    pub code: Option<String>,
    pub description: String,
    pub postings: Vec<Posting>,
    pub tags: Vec<String>,
    pub meta: Meta,
    /// Header line in the source text (1-indexed)
    pub line: usize,
}

impl Transaction {
    /// Postings without an explicit amount
    pub fn elided_count(&self) -> usize {
        self.postings.iter().filter(|p| p.amount.is_none()).count()
    }

    pub fn involves_account(&self, account: &str) -> bool {
        self.postings.iter().any(|p| p.account == account)
    }
}

/// Posting within a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub flag: Option<String>,
    pub account: String,
    pub amount: Option<Amount>,
    pub price: Option<Price>,
    pub tags: Vec<String>,
    pub meta: Meta,
}

impl Posting {
    /// Tax short-names attached through `tax:`/`taxes:` metadata or tags
    pub fn tax_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["tax", "taxes"]
            .iter()
            .filter_map(|key| self.meta.get(key))
            .flat_map(|value| value.split(|c: char| c == ',' || c.is_whitespace()))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        for tag in &self.tags {
            if !names.contains(tag) {
                names.push(tag.clone());
            }
        }
        names
    }

    /// Amount that counts towards the transaction balance.
    ///
    /// Priced postings weigh in the price commodity. `None` without an
    /// amount or when the priced weight does not fit a decimal.
    pub fn weight(&self) -> Option<Amount> {
        let amount = self.amount.as_ref()?;
        match &self.price {
            None => Some(amount.clone()),
            Some(Price::Single(unit)) => amount
                .quantity
                .checked_mul(unit.quantity)
                .map(|quantity| Amount::new(quantity, unit.commodity.clone())),
            Some(Price::Total(total)) => {
                let quantity = if amount.quantity.is_sign_negative() {
                    -total.quantity.abs()
                } else {
                    total.quantity.abs()
                };
                Some(Amount::new(quantity, total.commodity.clone()))
            }
        }
    }
}

/// Account declaration with its sub-directives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub path: String,
    pub alias: Option<String>,
    pub note: Option<String>,
    pub currency: Option<String>,
    pub opening_balance: Option<Amount>,
    pub meta: Meta,
    pub line: usize,
}

impl AccountDetails {
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self {
            path: path.into(),
            alias: None,
            note: None,
            currency: None,
            opening_balance: None,
            meta: Meta::default(),
            line,
        }
    }
}

/// Raw contents of a metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataBlock {
    pub yaml: String,
    /// False when the closing fence is missing
    pub terminated: bool,
}
