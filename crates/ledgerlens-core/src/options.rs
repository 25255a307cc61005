//! Per-run options threaded through every pipeline stage

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerlens_config::{Config, TaxDefinitionMap};
use ledgerlens_parser::RootNames;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Configured root names, used when detecting parents
    pub roots: RootNames,
    /// Reject transactions that post to undeclared accounts
    pub strict_accounts: bool,
    /// Only aggregate postings in this commodity
    pub base_commodity: Option<String>,
    /// Caller override; wins over metadata and defaults
    pub taxes: Option<TaxDefinitionMap>,
    /// Used when neither the caller nor the metadata supply taxes
    pub default_taxes: TaxDefinitionMap,
    /// Tax postings go to `<prefix>:<NAME>`; defaults to `<Liabilities root>:Taxes`
    pub tax_account_prefix: Option<String>,
    pub alert_threshold: Decimal,
    pub moving_average_window: usize,
    pub forecast_months: usize,
    pub break_even_margin: Decimal,
}

impl AnalysisOptions {
    /// Build options from configuration.
    ///
    /// An invalid default tax table degrades to an empty one.
    pub fn from_config(config: &Config) -> Self {
        let parents = &config.accounts.parents;
        let default_taxes = config.default_taxes().unwrap_or_else(|e| {
            log::warn!(target: "ledgerlens::config", "Ignoring default taxes: {}", e);
            TaxDefinitionMap::new()
        });

        Self {
            roots: RootNames {
                assets: parents.assets.clone(),
                liabilities: parents.liabilities.clone(),
                equity: parents.equity.clone(),
                income: parents.income.clone(),
                expenses: parents.expenses.clone(),
            },
            strict_accounts: config.accounts.strict,
            base_commodity: config.accounts.base_commodity.clone(),
            taxes: None,
            default_taxes,
            tax_account_prefix: config.taxes.account_prefix.clone(),
            alert_threshold: config.analysis.alert_threshold,
            moving_average_window: config.analysis.moving_average_window,
            forecast_months: config.analysis.forecast_months,
            break_even_margin: config.analysis.break_even_margin,
        }
    }

    pub fn with_taxes(mut self, taxes: TaxDefinitionMap) -> Self {
        self.taxes = Some(taxes);
        self
    }

    pub fn without_default_taxes(mut self) -> Self {
        self.default_taxes.clear();
        self
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
