//! Configuration management for ledgerlens
//!
//! This module handles loading, validation, and management of
//! ledgerlens configuration from YAML files.

pub mod error;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use error::{ConfigError, ConfigErrorCode, ConfigErrorDetails, ConfigErrorSeverity, ConfigResult};

// ==================== Taxes ====================

/// A percentage tax, stored as a fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDefinition {
    pub percentage: Decimal,
}

impl TaxDefinition {
    pub fn new(name: &str, percentage: Decimal) -> ConfigResult<Self> {
        if percentage < Decimal::ZERO || percentage > Decimal::ONE {
            return Err(ConfigError::InvalidTax {
                name: name.to_string(),
                reason: format!("percentage {} is outside [0, 1]", percentage),
            });
        }
        Ok(Self { percentage })
    }
}

/// Tax name to definition
pub type TaxDefinitionMap = BTreeMap<String, TaxDefinition>;

/// One tax entry as written by users: `IVA: {percentage: 0.16}` or `IVA: 0.16`.
///
/// Percentages must be numbers; a quoted `"0.16"` is not a tax entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaxEntry {
    Detailed {
        #[serde(deserialize_with = "numeric_percentage")]
        percentage: Decimal,
    },
    Bare(#[serde(deserialize_with = "numeric_percentage")] Decimal),
}

struct NumericVisitor;

impl<'de> de::Visitor<'de> for NumericVisitor {
    type Value = Decimal;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a numeric percentage")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Decimal, E> {
        Ok(Decimal::from(value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Decimal, E> {
        // Display prints the shortest form that reads back as `value`, so 0.16 stays 0.16
        Decimal::from_str(&value.to_string()).map_err(|_| E::invalid_value(de::Unexpected::Float(value), &self))
    }
}

fn numeric_percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    deserializer.deserialize_any(NumericVisitor)
}

impl TaxEntry {
    pub fn percentage(&self) -> Decimal {
        match self {
            TaxEntry::Detailed { percentage } | TaxEntry::Bare(percentage) => *percentage,
        }
    }
}

/// Normalize tax entries into definitions; one invalid entry invalidates the map
pub fn normalize_tax_entries(entries: &BTreeMap<String, TaxEntry>) -> ConfigResult<TaxDefinitionMap> {
    entries
        .iter()
        .map(|(name, entry)| Ok((name.clone(), TaxDefinition::new(name, entry.percentage())?)))
        .collect()
}

// ==================== Configuration Types ====================

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path to ledger directory
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
    /// Main ledger file name
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
    /// Separate account declarations file (relative to data path)
    #[serde(default)]
    pub accounts_file: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            ledger_file: default_ledger_file(),
            accounts_file: None,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_ledger_file() -> String {
    "main.ledger".to_string()
}

/// Root account names as written in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentsConfig {
    #[serde(default = "default_assets")]
    pub assets: String,
    #[serde(default = "default_liabilities")]
    pub liabilities: String,
    #[serde(default = "default_equity")]
    pub equity: String,
    #[serde(default = "default_income")]
    pub income: String,
    #[serde(default = "default_expenses")]
    pub expenses: String,
}

impl Default for ParentsConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            liabilities: default_liabilities(),
            equity: default_equity(),
            income: default_income(),
            expenses: default_expenses(),
        }
    }
}

impl ParentsConfig {
    fn names(&self) -> [(&'static str, &str); 5] {
        [
            ("assets", &self.assets),
            ("liabilities", &self.liabilities),
            ("equity", &self.equity),
            ("income", &self.income),
            ("expenses", &self.expenses),
        ]
    }
}

fn default_assets() -> String {
    "Assets".to_string()
}

fn default_liabilities() -> String {
    "Liabilities".to_string()
}

fn default_equity() -> String {
    "Equity".to_string()
}

fn default_income() -> String {
    "Income".to_string()
}

fn default_expenses() -> String {
    "Expenses".to_string()
}

/// Account handling settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsConfig {
    #[serde(default)]
    pub parents: ParentsConfig,
    /// Reject transactions posting to undeclared accounts
    #[serde(default)]
    pub strict: bool,
    /// Only aggregate postings in this commodity
    #[serde(default)]
    pub base_commodity: Option<String>,
}

/// Tax settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxesConfig {
    /// Used when neither the caller nor the ledger metadata supply taxes
    #[serde(default = "default_taxes")]
    pub defaults: BTreeMap<String, TaxEntry>,
    /// Account receiving tax postings; defaults to `<Liabilities root>:Taxes`
    #[serde(default)]
    pub account_prefix: Option<String>,
}

impl Default for TaxesConfig {
    fn default() -> Self {
        Self {
            defaults: default_taxes(),
            account_prefix: None,
        }
    }
}

fn default_taxes() -> BTreeMap<String, TaxEntry> {
    BTreeMap::from([
        ("IVA".to_string(), TaxEntry::Detailed { percentage: Decimal::new(16, 2) }),
        ("RET_ISR".to_string(), TaxEntry::Detailed { percentage: Decimal::new(10, 2) }),
    ])
}

/// Analytics parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Multiple of the historical average that flags an expense
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: Decimal,
    /// Window (months) of the moving average
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
    /// Number of months to forecast
    #[serde(default = "default_forecast_months")]
    pub forecast_months: usize,
    /// A month breaks even when |net| <= margin * income
    #[serde(default = "default_break_even_margin")]
    pub break_even_margin: Decimal,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alert_threshold: default_alert_threshold(),
            moving_average_window: default_moving_average_window(),
            forecast_months: default_forecast_months(),
            break_even_margin: default_break_even_margin(),
        }
    }
}

fn default_alert_threshold() -> Decimal {
    Decimal::new(15, 1)
}

fn default_moving_average_window() -> usize {
    3
}

fn default_forecast_months() -> usize {
    3
}

fn default_break_even_margin() -> Decimal {
    Decimal::new(5, 2)
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub taxes: TaxesConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound { path: path.display().to_string() },
            _ => ConfigError::IoError { message: e.to_string() },
        })?;

        let config = Self::from_yaml(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from YAML text without validating it
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml { message: e.to_string() })
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        let names = self.accounts.parents.names();
        for (i, (field, name)) in names.iter().enumerate() {
            if name.trim().is_empty() || name.contains(':') {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts.parents.{}", field),
                    reason: "Root names must be non-empty single segments".to_string(),
                });
            }
            if names[..i].iter().any(|(_, other)| other == name) {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts.parents.{}", field),
                    reason: format!("Root name '{}' is used twice", name),
                });
            }
        }

        self.default_taxes()?;

        if self.analysis.alert_threshold <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "analysis.alert_threshold".to_string(),
                reason: "Alert threshold must be greater than 0".to_string(),
            });
        }

        if self.analysis.moving_average_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.moving_average_window".to_string(),
                reason: "Moving average window must be at least 1".to_string(),
            });
        }

        if self.analysis.break_even_margin < Decimal::ZERO || self.analysis.break_even_margin > Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                field: "analysis.break_even_margin".to_string(),
                reason: "Break-even margin must be between 0 and 1".to_string(),
            });
        }

        if !matches!(self.logging.level.as_str(), "trace" | "debug" | "info" | "warn" | "error" | "off") {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: "Log level must be one of trace, debug, info, warn, error, off".to_string(),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }

    /// Normalized default tax table
    pub fn default_taxes(&self) -> ConfigResult<TaxDefinitionMap> {
        normalize_tax_entries(&self.taxes.defaults)
    }

    /// Get the full path to the main ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.data.path.join(&self.data.ledger_file)
    }

    /// Get the full path to the account declarations file, if one is configured
    pub fn accounts_path(&self) -> Option<PathBuf> {
        self.data.accounts_file.as_ref().map(|file| self.data.path.join(file))
    }
}
