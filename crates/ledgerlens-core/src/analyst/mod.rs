//! Financial analytics over resolved transactions
//!
//! A `LedgerAnalyst` is built once per run. Every metric is computed on
//! demand and fails on its own, so one failing metric never hides the rest.

mod compare;
mod series;
mod trends;

pub use compare::{CategoryDelta, MonthComparison, MonthSnapshot};
pub use series::{AccountAmount, AccountUsage, AccountsSummary, DailyBalance, DailyFlow, MonthlyFlow, PieSlice};
pub use trends::{
    CategoryTrend, CumulativePoint, ExpenseAlert, ExpenseRatio, ExtremeMonths, Forecast, GrowthRate,
    IncomeDependency, MonthAmount, MonthClassification, MonthStatus, MovingAveragePoint,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use ledgerlens_parser::{account_prefix, RootCategory};

use crate::balances::{checked_add, counted_quantity, date_range, DETAIL_DEPTH};
use crate::error::AnalysisResult;
use crate::hierarchy::{AccountHierarchy, ParentSpec};
use crate::options::AnalysisOptions;
use crate::period::YearMonth;
use crate::taxes::ResolvedTransaction;

/// One counted posting with its classification
#[derive(Debug, Clone)]
struct Flow<'t> {
    date: NaiveDate,
    account: &'t str,
    category: Option<RootCategory>,
    quantity: Decimal,
}

impl Flow<'_> {
    /// Income is credited, so it is negated to read positive
    fn income(&self) -> Decimal {
        if self.category == Some(RootCategory::Income) {
            -self.quantity
        } else {
            Decimal::ZERO
        }
    }

    fn expense(&self) -> Decimal {
        if self.category == Some(RootCategory::Expenses) {
            self.quantity
        } else {
            Decimal::ZERO
        }
    }
}

pub struct LedgerAnalyst<'a> {
    transactions: &'a [ResolvedTransaction],
    hierarchy: AccountHierarchy,
    options: &'a AnalysisOptions,
}

impl<'a> LedgerAnalyst<'a> {
    pub fn new(
        transactions: &'a [ResolvedTransaction],
        accounts: &[String],
        parents: [ParentSpec; 5],
        options: &'a AnalysisOptions,
    ) -> Self {
        Self {
            transactions,
            hierarchy: AccountHierarchy::new(accounts, parents),
            options,
        }
    }

    pub fn hierarchy(&self) -> &AccountHierarchy {
        &self.hierarchy
    }

    /// Counted postings in ledger order.
    ///
    /// Fails when the income statement or the balance sheet moves more than
    /// a decimal holds, so any sum or difference of flows stays in range.
    fn flows(&self) -> AnalysisResult<Vec<Flow<'a>>> {
        let base = self.options.base_commodity.as_deref();
        let mut flows = Vec::new();
        let mut income_statement = Decimal::ZERO;
        let mut balance_sheet = Decimal::ZERO;
        for txn in self.transactions {
            for posting in &txn.postings {
                let Some(quantity) = counted_quantity(posting, base)? else {
                    continue;
                };
                let category = self.hierarchy.category_of(&posting.account);
                match category {
                    Some(RootCategory::Income | RootCategory::Expenses) => {
                        income_statement = checked_add(income_statement, quantity.abs())?
                    }
                    Some(RootCategory::Assets | RootCategory::Liabilities) => {
                        balance_sheet = checked_add(balance_sheet, quantity.abs())?
                    }
                    _ => {}
                }
                flows.push(Flow { date: txn.date, account: &posting.account, category, quantity });
            }
        }
        Ok(flows)
    }

    /// Every month from the first to the last transaction
    fn months(&self) -> Vec<YearMonth> {
        date_range(self.transactions).map(|period| period.months()).unwrap_or_default()
    }

    /// Category key of an account: its first two segments
    fn category_name(account: &str) -> String {
        account_prefix(account, DETAIL_DEPTH)
    }

    /// Spending per expense category per month
    fn expenses_by_category_month(&self) -> AnalysisResult<BTreeMap<String, BTreeMap<YearMonth, Decimal>>> {
        let mut totals: BTreeMap<String, BTreeMap<YearMonth, Decimal>> = BTreeMap::new();
        for flow in self.flows()? {
            if flow.category == Some(RootCategory::Expenses) {
                *totals
                    .entry(Self::category_name(flow.account))
                    .or_default()
                    .entry(YearMonth::from_date(flow.date))
                    .or_insert(Decimal::ZERO) += flow.expense();
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::taxes::{balance_only, ResolveSettings};
    use ledgerlens_parser::{LedgerParser, RootNames};

    /// Three months of income and spending
    pub const LEDGER: &str = "\
2024-01-01 Opening
    Assets:Bank  1000
    Equity:Opening

2024-01-05 Salary
    Assets:Bank  2000
    Income:Salary

2024-01-10 Groceries
    Expenses:Food  100
    Assets:Bank

2024-01-15 Rent
    Expenses:Housing  800
    Liabilities:Card

2024-02-05 Salary
    Assets:Bank  2000
    Income:Salary

2024-02-07 Freelance
    Assets:Bank  500
    Income:Freelance

2024-02-10 Groceries
    Expenses:Food  100
    Assets:Bank

2024-02-15 Rent
    Expenses:Housing  800
    Liabilities:Card

2024-03-05 Salary
    Assets:Bank  2000
    Income:Salary

2024-03-10 Groceries
    Expenses:Food  200
    Assets:Bank

2024-03-15 Rent
    Expenses:Housing  800
    Liabilities:Card
";

    pub fn resolve(text: &str) -> (Vec<ResolvedTransaction>, Vec<String>) {
        let output = LedgerParser::parse(text);
        let txns: Vec<_> = output.transactions().cloned().collect();
        let set = balance_only(&txns, &ResolveSettings::default());
        let accounts = set
            .transactions
            .iter()
            .flat_map(|t| t.postings.iter().map(|p| p.account.clone()))
            .collect();
        (set.transactions, accounts)
    }

    pub fn parents() -> [ParentSpec; 5] {
        ParentSpec::from_roots(&RootNames::default())
    }
}
