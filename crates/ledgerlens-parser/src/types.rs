//! Common types for the ledger parser

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line span of an entry in the source text (1-indexed, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanInfo {
    pub start: usize,
    pub end: usize,
}

/// Quantity of a commodity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub quantity: Decimal,
    /// Commodity symbol or code ("$", "MXN"); empty for bare numbers
    pub commodity: String,
}

impl Amount {
    pub fn new(quantity: Decimal, commodity: impl Into<String>) -> Self {
        Self { quantity, commodity: commodity.into() }
    }

    pub fn zero(commodity: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, commodity)
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.quantity, self.commodity.clone())
    }

    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.commodity.is_empty() {
            write!(f, "{}", self.quantity)
        } else {
            write!(f, "{} {}", self.quantity, self.commodity)
        }
    }
}

/// Price annotation on a posting (`@` per unit, `@@` total)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Price {
    Single(Amount),
    Total(Amount),
}

/// Metadata key-value store from `; key: value` comments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta(BTreeMap<String, String>);

impl Meta {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get inner map reference for iteration
    pub fn inner(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<Vec<(String, String)>> for Meta {
    fn from(v: Vec<(String, String)>) -> Self {
        Meta(v.into_iter().collect())
    }
}

/// The five root categories every account path hangs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RootCategory {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
}

impl RootCategory {
    pub const ALL: [RootCategory; 5] = [
        RootCategory::Assets,
        RootCategory::Liabilities,
        RootCategory::Equity,
        RootCategory::Income,
        RootCategory::Expenses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootCategory::Assets => "Assets",
            RootCategory::Liabilities => "Liabilities",
            RootCategory::Equity => "Equity",
            RootCategory::Income => "Income",
            RootCategory::Expenses => "Expenses",
        }
    }

    /// Localized root names recognised when detecting parents
    pub fn localized_names(&self) -> &'static [&'static str] {
        match self {
            RootCategory::Assets => &["Assets", "Asset", "Activos", "Activo", "Actifs", "Actif", "Aktiva"],
            RootCategory::Liabilities => &["Liabilities", "Liability", "Pasivos", "Pasivo", "Passifs", "Passif", "Passiva"],
            RootCategory::Equity => &["Equity", "Capital", "Patrimonio", "Capitaux", "Eigenkapital"],
            RootCategory::Income => &["Income", "Revenue", "Revenues", "Ingresos", "Ingreso", "Revenus", "Ertrag"],
            RootCategory::Expenses => &["Expenses", "Expense", "Gastos", "Gasto", "Egresos", "Charges", "Aufwand"],
        }
    }
}

impl std::fmt::Display for RootCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RootCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "assets" | "asset" => Ok(RootCategory::Assets),
            "liabilities" | "liability" => Ok(RootCategory::Liabilities),
            "equity" => Ok(RootCategory::Equity),
            "income" => Ok(RootCategory::Income),
            "expenses" | "expense" => Ok(RootCategory::Expenses),
            _ => Err(format!("Invalid root category: {}", s)),
        }
    }
}

/// Root account name used in the text for each category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootNames {
    pub assets: String,
    pub liabilities: String,
    pub equity: String,
    pub income: String,
    pub expenses: String,
}

impl Default for RootNames {
    fn default() -> Self {
        Self {
            assets: RootCategory::Assets.as_str().to_string(),
            liabilities: RootCategory::Liabilities.as_str().to_string(),
            equity: RootCategory::Equity.as_str().to_string(),
            income: RootCategory::Income.as_str().to_string(),
            expenses: RootCategory::Expenses.as_str().to_string(),
        }
    }
}

impl RootNames {
    pub fn get(&self, category: RootCategory) -> &str {
        match category {
            RootCategory::Assets => &self.assets,
            RootCategory::Liabilities => &self.liabilities,
            RootCategory::Equity => &self.equity,
            RootCategory::Income => &self.income,
            RootCategory::Expenses => &self.expenses,
        }
    }

    pub fn set(&mut self, category: RootCategory, name: String) {
        match category {
            RootCategory::Assets => self.assets = name,
            RootCategory::Liabilities => self.liabilities = name,
            RootCategory::Equity => self.equity = name,
            RootCategory::Income => self.income = name,
            RootCategory::Expenses => self.expenses = name,
        }
    }
}

// ==================== Account Paths ====================

/// Segment separator of an account path.
///
/// Ledger paths use `:`; dotted paths (`Expenses.Food`) are accepted when no
/// colon is present.
pub fn account_separator(path: &str) -> char {
    if path.contains(':') || !path.contains('.') {
        ':'
    } else {
        '.'
    }
}

/// Split an account path into its segments
pub fn account_segments(path: &str) -> Vec<&str> {
    path.split(account_separator(path)).collect()
}

/// First segment of an account path
pub fn account_root(path: &str) -> &str {
    path.split(account_separator(path)).next().unwrap_or(path)
}

/// Path truncated to its first `depth` segments
pub fn account_prefix(path: &str, depth: usize) -> String {
    let separator = account_separator(path);
    path.split(separator)
        .take(depth.max(1))
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}
