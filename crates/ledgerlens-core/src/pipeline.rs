//! Best-effort ledger pipelines
//!
//! Each entry point runs parse, resolve, balance and analyze as far as its
//! inputs allow. A failing stage becomes `Stage::Unavailable` with its
//! reason while independent stages still run. Only empty input stops a run,
//! and then every stage reports the same reason.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ledgerlens_parser::{AccountDetails, ParseError, RootNames, Stage, Transaction};

use crate::analyst::{
    AccountUsage, AccountsSummary, CategoryTrend, CumulativePoint, DailyBalance, DailyFlow, ExpenseAlert,
    ExpenseRatio, ExtremeMonths, Forecast, GrowthRate, IncomeDependency, LedgerAnalyst, MonthClassification,
    MonthComparison, MonthlyFlow, MovingAveragePoint, PieSlice,
};
use crate::balances::{date_range, AccountBalances, BalanceCalculator, StatusResults};
use crate::error::{AnalysisResult, ClassificationWarning, CoreError, DefaultErrorLogger, ErrorContext, ErrorLogger};
use crate::hierarchy::{AccountHierarchy, ParentSpec};
use crate::options::AnalysisOptions;
use crate::period::{Period, YearMonth};
use crate::taxes::{
    balance_only, normalize_taxes, resolve, RejectedTransaction, ResolveSettings, ResolvedTransaction,
    TaxNormalization, TaxResolution,
};

/// Parsed and resolved ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerParse {
    pub transactions: Stage<Vec<Transaction>>,
    pub accounts: Stage<Vec<String>>,
    pub accounts_advance: Stage<Vec<AccountDetails>>,
    pub metadata: Stage<serde_yaml::Value>,
    pub parents: Stage<RootNames>,
    pub taxes: Stage<TaxNormalization>,
    /// Balanced transactions, with tax postings unless resolution was skipped
    pub transactions_resolved: Stage<Vec<ResolvedTransaction>>,
    /// Why tax resolution was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_skipped: Option<String>,
    pub rejected: Vec<RejectedTransaction>,
    pub issues: Vec<ParseError>,
    pub declared_accounts: Vec<String>,
}

impl LedgerParse {
    fn unavailable(reason: &str) -> Self {
        Self {
            transactions: Stage::unavailable(reason),
            accounts: Stage::unavailable(reason),
            accounts_advance: Stage::unavailable(reason),
            metadata: Stage::unavailable(reason),
            parents: Stage::unavailable(reason),
            taxes: Stage::unavailable(reason),
            transactions_resolved: Stage::unavailable(reason),
            resolution_skipped: None,
            rejected: Vec::new(),
            issues: Vec::new(),
            declared_accounts: Vec::new(),
        }
    }

    /// Resolved transactions, or why they are unavailable
    fn resolved_or_reason(&self) -> Result<&[ResolvedTransaction], String> {
        match &self.transactions_resolved {
            Stage::Ready { value } => Ok(value),
            Stage::Unavailable { reason } => Err(reason.clone()),
        }
    }

    fn parent_specs(&self, options: &AnalysisOptions) -> [ParentSpec; 5] {
        ParentSpec::from_roots(self.parents.value().unwrap_or(&options.roots))
    }

    fn account_list(&self) -> &[String] {
        self.accounts.value().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Analyst over the resolved transactions
    pub fn analyst<'a>(&'a self, options: &'a AnalysisOptions) -> Result<LedgerAnalyst<'a>, String> {
        let transactions = self.resolved_or_reason()?;
        Ok(LedgerAnalyst::new(transactions, self.account_list(), self.parent_specs(options), options))
    }

    pub fn calculate(&self, options: &AnalysisOptions) -> LedgerCalculation {
        let transactions = match self.resolved_or_reason() {
            Ok(transactions) => transactions,
            Err(reason) => return LedgerCalculation::unavailable(&reason),
        };

        let hierarchy = AccountHierarchy::new(self.account_list(), self.parent_specs(options));
        let warnings = hierarchy.warnings();
        let logger = DefaultErrorLogger;
        let context = ErrorContext::new("calculate_ledger").with_stage("classify");
        for warning in &warnings {
            logger.log_error(&CoreError::Classification(warning.clone()), &context);
        }

        let calculator = BalanceCalculator::new(&hierarchy, options.base_commodity.as_deref());
        let balances = calculator.calculate_balances(transactions, &self.declared_accounts);
        let status_results = match &balances {
            Ok(balances) => calculator.calculate_status_results(balances),
            Err(error) => Err(error.clone()),
        };

        LedgerCalculation {
            balances_by_parents: aggregation(
                "balances_by_parents",
                calculator.calculate_balances_by_parent_accounts(transactions),
            ),
            balances_by_details: aggregation(
                "balances_by_details",
                calculator.calculate_balances_by_detail_accounts(transactions),
            ),
            status_results: aggregation("status_results", status_results),
            balances: aggregation("balances", balances),
            period: match date_range(transactions) {
                Some(period) => Stage::ready(period),
                None => Stage::unavailable("no transactions"),
            },
            warnings,
        }
    }

    pub fn analyze(&self, options: &AnalysisOptions) -> LedgerAnalysis {
        let analyst = match self.analyst(options) {
            Ok(analyst) => analyst,
            Err(reason) => return LedgerAnalysis::unavailable(&reason),
        };

        let cashflow_by_month = metric("cashflow_by_month", analyst.cashflow_by_month());
        let months = cashflow_by_month
            .value()
            .map(|flows| flows.iter().map(|flow| flow.month).collect())
            .unwrap_or_default();

        LedgerAnalysis {
            daily: metric("daily_incomes_expenses", analyst.daily_incomes_expenses()),
            expenses_pie: metric("expenses_pie", analyst.expenses_pie()),
            incomes_pie: metric("incomes_pie", analyst.incomes_pie()),
            assets_summary: metric("assets_summary", analyst.assets_summary()),
            liabilities_summary: metric("liabilities_summary", analyst.liabilities_summary()),
            balance_by_day: metric("balance_by_day", analyst.balance_by_day()),
            accounts_used: metric("accounts_used", analyst.accounts_used()),
            alerts: metric("detect_unusual_expenses", analyst.detect_unusual_expenses(options.alert_threshold)),
            cashflow_by_month,
            expense_trends: metric("expense_trends_by_category", analyst.expense_trends_by_category()),
            monthly_growth_rates: metric("monthly_growth_rates", analyst.monthly_growth_rates()),
            monthly_expense_ratio: metric("monthly_expense_ratio", analyst.monthly_expense_ratio()),
            moving_average: metric("moving_average", analyst.moving_average(options.moving_average_window)),
            trend_slope: metric("trend_slope", analyst.trend_slope()),
            predicted_months: metric("predict_future_months", analyst.predict_future_months(options.forecast_months)),
            extreme_months: metric("extreme_months", analyst.extreme_months()),
            classified_months: metric("classify_months_by_balance", analyst.classify_months_by_balance()),
            income_dependency: metric("income_dependency_ratio", analyst.income_dependency_ratio()),
            cumulative_net_income: metric("cumulative_net_income", analyst.cumulative_net_income()),
            months,
        }
    }
}

/// Balance aggregations of one ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCalculation {
    pub balances: Stage<AccountBalances>,
    pub balances_by_parents: Stage<BTreeMap<String, Decimal>>,
    pub status_results: Stage<StatusResults>,
    pub balances_by_details: Stage<BTreeMap<String, Decimal>>,
    pub period: Stage<Period>,
    pub warnings: Vec<ClassificationWarning>,
}

impl LedgerCalculation {
    fn unavailable(reason: &str) -> Self {
        Self {
            balances: Stage::unavailable(reason),
            balances_by_parents: Stage::unavailable(reason),
            status_results: Stage::unavailable(reason),
            balances_by_details: Stage::unavailable(reason),
            period: Stage::unavailable(reason),
            warnings: Vec::new(),
        }
    }
}

/// Every analytics metric of one ledger, each available on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAnalysis {
    pub daily: Stage<Vec<DailyFlow>>,
    pub expenses_pie: Stage<Vec<PieSlice>>,
    pub incomes_pie: Stage<Vec<PieSlice>>,
    pub assets_summary: Stage<AccountsSummary>,
    pub liabilities_summary: Stage<AccountsSummary>,
    pub balance_by_day: Stage<Vec<DailyBalance>>,
    pub accounts_used: Stage<Vec<AccountUsage>>,
    pub alerts: Stage<Vec<ExpenseAlert>>,
    pub cashflow_by_month: Stage<Vec<MonthlyFlow>>,
    pub expense_trends: Stage<Vec<CategoryTrend>>,
    pub monthly_growth_rates: Stage<Vec<GrowthRate>>,
    pub monthly_expense_ratio: Stage<Vec<ExpenseRatio>>,
    pub moving_average: Stage<Vec<MovingAveragePoint>>,
    pub trend_slope: Stage<Decimal>,
    pub predicted_months: Stage<Vec<Forecast>>,
    pub extreme_months: Stage<ExtremeMonths>,
    pub classified_months: Stage<Vec<MonthClassification>>,
    pub income_dependency: Stage<IncomeDependency>,
    pub cumulative_net_income: Stage<Vec<CumulativePoint>>,
    /// Months covered by the monthly cashflow
    pub months: Vec<YearMonth>,
}

impl LedgerAnalysis {
    fn unavailable(reason: &str) -> Self {
        Self {
            daily: Stage::unavailable(reason),
            expenses_pie: Stage::unavailable(reason),
            incomes_pie: Stage::unavailable(reason),
            assets_summary: Stage::unavailable(reason),
            liabilities_summary: Stage::unavailable(reason),
            balance_by_day: Stage::unavailable(reason),
            accounts_used: Stage::unavailable(reason),
            alerts: Stage::unavailable(reason),
            cashflow_by_month: Stage::unavailable(reason),
            expense_trends: Stage::unavailable(reason),
            monthly_growth_rates: Stage::unavailable(reason),
            monthly_expense_ratio: Stage::unavailable(reason),
            moving_average: Stage::unavailable(reason),
            trend_slope: Stage::unavailable(reason),
            predicted_months: Stage::unavailable(reason),
            extreme_months: Stage::unavailable(reason),
            classified_months: Stage::unavailable(reason),
            income_dependency: Stage::unavailable(reason),
            cumulative_net_income: Stage::unavailable(reason),
            months: Vec::new(),
        }
    }

    /// Names of the metrics that could not be computed
    pub fn unavailable_metrics(&self) -> Vec<&'static str> {
        let checks = [
            ("daily", self.daily.is_ready()),
            ("expenses_pie", self.expenses_pie.is_ready()),
            ("incomes_pie", self.incomes_pie.is_ready()),
            ("assets_summary", self.assets_summary.is_ready()),
            ("liabilities_summary", self.liabilities_summary.is_ready()),
            ("balance_by_day", self.balance_by_day.is_ready()),
            ("accounts_used", self.accounts_used.is_ready()),
            ("alerts", self.alerts.is_ready()),
            ("cashflow_by_month", self.cashflow_by_month.is_ready()),
            ("expense_trends", self.expense_trends.is_ready()),
            ("monthly_growth_rates", self.monthly_growth_rates.is_ready()),
            ("monthly_expense_ratio", self.monthly_expense_ratio.is_ready()),
            ("moving_average", self.moving_average.is_ready()),
            ("trend_slope", self.trend_slope.is_ready()),
            ("predicted_months", self.predicted_months.is_ready()),
            ("extreme_months", self.extreme_months.is_ready()),
            ("classified_months", self.classified_months.is_ready()),
            ("income_dependency", self.income_dependency.is_ready()),
            ("cumulative_net_income", self.cumulative_net_income.is_ready()),
        ];
        checks.into_iter().filter(|(_, ready)| !ready).map(|(name, _)| name).collect()
    }
}

/// Unusual spending and the threshold it was measured against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAlerts {
    pub alerts: Stage<Vec<ExpenseAlert>>,
    pub threshold_used: Decimal,
}

fn stage_of<T>(operation: &str, name: &str, result: AnalysisResult<T>) -> Stage<T> {
    match result {
        Ok(value) => Stage::ready(value),
        Err(error) => {
            let reason = error.to_string();
            DefaultErrorLogger.log_error(&CoreError::Analysis(error), &ErrorContext::new(operation).with_stage(name));
            Stage::unavailable(reason)
        }
    }
}

fn metric<T>(name: &str, result: AnalysisResult<T>) -> Stage<T> {
    stage_of("analyze_ledger", name, result)
}

fn aggregation<T>(name: &str, result: AnalysisResult<T>) -> Stage<T> {
    stage_of("calculate_ledger", name, result)
}

/// Parse a ledger, choose its tax map and resolve its transactions.
///
/// When no tax map is usable the transactions are only balanced and
/// `resolution_skipped` says why.
pub fn parse_ledger(ledger_text: &str, accounts_text: Option<&str>, options: &AnalysisOptions) -> LedgerParse {
    let logger = DefaultErrorLogger;
    let context = ErrorContext::new("parse_ledger");

    let parsed = match ledgerlens_parser::parse(ledger_text, accounts_text, &options.roots) {
        Ok(parsed) => parsed,
        Err(error) => {
            let error = CoreError::from(error);
            logger.log_error(&error, &context.with_stage("parse"));
            return LedgerParse::unavailable(&error.to_string());
        }
    };

    let normalization = normalize_taxes(parsed.metadata.value(), options);
    if let Some(error) = &normalization.error {
        logger.log_error(&CoreError::TaxConfig(error.clone()), &context.clone().with_stage("taxes"));
    }

    let parents = parsed.parents_detected.value().cloned().unwrap_or_else(|| options.roots.clone());
    let settings = ResolveSettings::new(options, &parents, &parsed.declared_accounts);

    let mut rejected = Vec::new();
    let mut resolution_skipped = None;
    let transactions_resolved = match parsed.transactions.value() {
        Some(transactions) => {
            let set = match resolve(transactions, &normalization.taxes, &settings) {
                TaxResolution::Resolved(set) => set,
                TaxResolution::Skipped { reason, .. } => {
                    logger.log_debug(&reason, &context.clone().with_stage("resolve"));
                    resolution_skipped = Some(reason);
                    balance_only(transactions, &settings)
                }
            };
            rejected = set.rejected;
            Stage::ready(set.transactions)
        }
        None => Stage::unavailable("transactions unavailable"),
    };

    LedgerParse {
        transactions: parsed.transactions,
        accounts: parsed.accounts,
        accounts_advance: parsed.accounts_advance,
        metadata: parsed.metadata,
        parents: parsed.parents_detected,
        taxes: Stage::ready(normalization),
        transactions_resolved,
        resolution_skipped,
        rejected,
        issues: parsed.issues,
        declared_accounts: parsed.declared_accounts,
    }
}

/// Leaf, parent and detail balances plus the status results of a ledger
pub fn calculate_ledger(ledger_text: &str, accounts_text: Option<&str>, options: &AnalysisOptions) -> LedgerCalculation {
    parse_ledger(ledger_text, accounts_text, options).calculate(options)
}

/// Every analytics metric of a ledger
pub fn analyze_ledger(ledger_text: &str, accounts_text: Option<&str>, options: &AnalysisOptions) -> LedgerAnalysis {
    parse_ledger(ledger_text, accounts_text, options).analyze(options)
}

pub fn compare_ledger_months(
    ledger_text: &str,
    accounts_text: Option<&str>,
    month1: &str,
    month2: &str,
    options: &AnalysisOptions,
) -> Stage<MonthComparison> {
    let parsed = parse_ledger(ledger_text, accounts_text, options);
    match parsed.analyst(options) {
        Ok(analyst) => metric("compare_months", analyst.compare_months(month1, month2)),
        Err(reason) => Stage::unavailable(reason),
    }
}

/// Unusual expenses; `threshold` overrides the configured alert threshold
pub fn ledger_alerts(
    ledger_text: &str,
    accounts_text: Option<&str>,
    threshold: Option<Decimal>,
    options: &AnalysisOptions,
) -> LedgerAlerts {
    let threshold_used = threshold.unwrap_or(options.alert_threshold);
    let parsed = parse_ledger(ledger_text, accounts_text, options);
    let alerts = match parsed.analyst(options) {
        Ok(analyst) => metric("detect_unusual_expenses", analyst.detect_unusual_expenses(threshold_used)),
        Err(reason) => Stage::unavailable(reason),
    };
    LedgerAlerts { alerts, threshold_used }
}
