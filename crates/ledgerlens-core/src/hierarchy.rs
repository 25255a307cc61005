//! Account hierarchy: maps account paths to their root category

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ledgerlens_parser::{account_root, RootCategory, RootNames};

use crate::error::ClassificationWarning;

/// Bucket name for accounts outside every root
pub const UNCLASSIFIED: &str = "Unclassified";

/// Root name found in the ledger paired with its canonical category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSpec {
    pub detected: String,
    pub canonical: RootCategory,
}

impl ParentSpec {
    pub fn new(detected: impl Into<String>, canonical: RootCategory) -> Self {
        Self { detected: detected.into(), canonical }
    }

    /// One spec per root category, in `RootCategory::ALL` order
    pub fn from_roots(roots: &RootNames) -> [ParentSpec; 5] {
        RootCategory::ALL.map(|category| ParentSpec::new(roots.get(category), category))
    }

    fn matches(&self, root: &str) -> bool {
        root == self.detected || root.eq_ignore_ascii_case(self.canonical.as_str())
    }
}

/// Where an account path belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Root(RootCategory),
    Unclassified,
}

impl Classification {
    pub fn category(&self) -> Option<RootCategory> {
        match self {
            Classification::Root(category) => Some(*category),
            Classification::Unclassified => None,
        }
    }
}

/// Path to root-category index over the known accounts
#[derive(Debug, Clone)]
pub struct AccountHierarchy {
    parents: [ParentSpec; 5],
    accounts: BTreeMap<String, Classification>,
}

impl AccountHierarchy {
    pub fn new(accounts: &[String], parents: [ParentSpec; 5]) -> Self {
        let mut hierarchy = Self {
            parents,
            accounts: BTreeMap::new(),
        };
        for account in accounts {
            let classification = hierarchy.classify(account);
            if classification == Classification::Unclassified {
                log::debug!(target: "ledgerlens::hierarchy", "Account '{}' is unclassified", account);
            }
            hierarchy.accounts.insert(account.clone(), classification);
        }
        hierarchy
    }

    /// Classify a path by its first segment: the detected root name first,
    /// then the canonical English name.
    pub fn classify(&self, path: &str) -> Classification {
        let root = account_root(path);
        self.parents
            .iter()
            .find(|spec| root == spec.detected)
            .or_else(|| self.parents.iter().find(|spec| spec.matches(root)))
            .map(|spec| Classification::Root(spec.canonical))
            .unwrap_or(Classification::Unclassified)
    }

    pub fn category_of(&self, path: &str) -> Option<RootCategory> {
        self.classify(path).category()
    }

    /// Root name used in the ledger for `category`
    pub fn parent_name(&self, category: RootCategory) -> &str {
        self.parents
            .iter()
            .find(|spec| spec.canonical == category)
            .map(|spec| spec.detected.as_str())
            .unwrap_or(category.as_str())
    }

    /// Bucket label of a classification: detected root name or `Unclassified`
    pub fn label(&self, classification: Classification) -> &str {
        match classification {
            Classification::Root(category) => self.parent_name(category),
            Classification::Unclassified => UNCLASSIFIED,
        }
    }

    pub fn parents(&self) -> &[ParentSpec; 5] {
        &self.parents
    }

    /// Known accounts with their classification
    pub fn accounts(&self) -> &BTreeMap<String, Classification> {
        &self.accounts
    }

    /// One warning per known account outside every root
    pub fn warnings(&self) -> Vec<ClassificationWarning> {
        self.accounts
            .iter()
            .filter(|(_, classification)| **classification == Classification::Unclassified)
            .map(|(account, _)| ClassificationWarning { account: account.clone() })
            .collect()
    }
}
