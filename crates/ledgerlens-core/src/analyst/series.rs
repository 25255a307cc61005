//! Time series, breakdowns and inventories

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ledgerlens_parser::RootCategory;
use ledgerlens_utils::percentage;

use super::LedgerAnalyst;
use crate::error::AnalysisResult;
use crate::period::YearMonth;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFlow {
    pub date: NaiveDate,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFlow {
    pub month: YearMonth,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub category: String,
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub assets: Decimal,
    /// Amount owed, positive
    pub liabilities: Decimal,
    pub net_worth: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountsSummary {
    pub accounts: Vec<AccountAmount>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUsage {
    pub account: String,
    pub postings: usize,
    pub first_used: NaiveDate,
    pub last_used: NaiveDate,
}

impl<'a> LedgerAnalyst<'a> {
    /// Income and expenses per day with movement
    pub fn daily_incomes_expenses(&self) -> AnalysisResult<Vec<DailyFlow>> {
        let mut days: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
        for flow in self.flows()? {
            if matches!(flow.category, Some(RootCategory::Income | RootCategory::Expenses)) {
                let day = days.entry(flow.date).or_default();
                day.0 += flow.income();
                day.1 += flow.expense();
            }
        }
        Ok(days
            .into_iter()
            .map(|(date, (income, expenses))| DailyFlow { date, income, expenses, net: income - expenses })
            .collect())
    }

    /// Income and expenses for every month of the ledger, gaps included
    pub fn cashflow_by_month(&self) -> AnalysisResult<Vec<MonthlyFlow>> {
        self.monthly_flows()
    }

    pub(super) fn monthly_flows(&self) -> AnalysisResult<Vec<MonthlyFlow>> {
        let mut months: BTreeMap<YearMonth, (Decimal, Decimal)> =
            self.months().into_iter().map(|month| (month, Default::default())).collect();
        for flow in self.flows()? {
            let entry = months.entry(YearMonth::from_date(flow.date)).or_default();
            entry.0 += flow.income();
            entry.1 += flow.expense();
        }
        Ok(months
            .into_iter()
            .map(|(month, (income, expenses))| MonthlyFlow { month, income, expenses, net: income - expenses })
            .collect())
    }

    /// Share of total expenses per category
    pub fn expenses_pie(&self) -> AnalysisResult<Vec<PieSlice>> {
        self.pie(RootCategory::Expenses)
    }

    /// Share of total income per category
    pub fn incomes_pie(&self) -> AnalysisResult<Vec<PieSlice>> {
        self.pie(RootCategory::Income)
    }

    /// Slices for positive categories, largest first; empty when nothing was spent or earned
    fn pie(&self, root: RootCategory) -> AnalysisResult<Vec<PieSlice>> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for flow in self.flows()?.iter().filter(|flow| flow.category == Some(root)) {
            let amount = if root == RootCategory::Income { flow.income() } else { flow.expense() };
            *totals.entry(Self::category_name(flow.account)).or_insert(Decimal::ZERO) += amount;
        }

        totals.retain(|_, amount| *amount > Decimal::ZERO);
        let total: Decimal = totals.values().sum();

        let mut slices: Vec<PieSlice> = totals
            .into_iter()
            .filter_map(|(category, amount)| {
                percentage(amount, total).map(|percentage| PieSlice { category, amount, percentage })
            })
            .collect();
        slices.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
        Ok(slices)
    }

    /// Running assets, liabilities and net worth after each day with movement
    pub fn balance_by_day(&self) -> AnalysisResult<Vec<DailyBalance>> {
        let mut days: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
        for flow in self.flows()? {
            let day = days.entry(flow.date).or_default();
            match flow.category {
                Some(RootCategory::Assets) => day.0 += flow.quantity,
                Some(RootCategory::Liabilities) => day.1 -= flow.quantity,
                _ => {}
            }
        }

        let mut assets = Decimal::ZERO;
        let mut liabilities = Decimal::ZERO;
        Ok(days
            .into_iter()
            .map(|(date, (asset_change, liability_change))| {
                assets += asset_change;
                liabilities += liability_change;
                DailyBalance { date, assets, liabilities, net_worth: assets - liabilities }
            })
            .collect())
    }

    pub fn assets_summary(&self) -> AnalysisResult<AccountsSummary> {
        self.summary(RootCategory::Assets, Decimal::ONE)
    }

    /// Liabilities reported as positive amounts owed
    pub fn liabilities_summary(&self) -> AnalysisResult<AccountsSummary> {
        self.summary(RootCategory::Liabilities, Decimal::NEGATIVE_ONE)
    }

    fn summary(&self, root: RootCategory, sign: Decimal) -> AnalysisResult<AccountsSummary> {
        let mut balances: BTreeMap<&str, Decimal> = BTreeMap::new();
        for flow in self.flows()?.iter().filter(|flow| flow.category == Some(root)) {
            *balances.entry(flow.account).or_insert(Decimal::ZERO) += flow.quantity * sign;
        }
        let total = balances.values().sum();
        Ok(AccountsSummary {
            accounts: balances
                .into_iter()
                .map(|(account, amount)| AccountAmount { account: account.to_string(), amount })
                .collect(),
            total,
        })
    }

    /// Accounts with postings, how often and when they were used
    pub fn accounts_used(&self) -> AnalysisResult<Vec<AccountUsage>> {
        let mut usage: BTreeMap<&str, AccountUsage> = BTreeMap::new();
        for txn in self.transactions {
            for posting in &txn.postings {
                usage
                    .entry(posting.account.as_str())
                    .and_modify(|u| {
                        u.postings += 1;
                        u.first_used = u.first_used.min(txn.date);
                        u.last_used = u.last_used.max(txn.date);
                    })
                    .or_insert_with(|| AccountUsage {
                        account: posting.account.clone(),
                        postings: 1,
                        first_used: txn.date,
                        last_used: txn.date,
                    });
            }
        }
        Ok(usage.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{parents, resolve, LEDGER};
    use super::*;
    use crate::error::AnalysisError;
    use crate::options::AnalysisOptions;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_cashflow_by_month() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let months = analyst.cashflow_by_month().unwrap();

        assert_eq!(months.len(), 3);
        assert_eq!(months[0].month.to_string(), "2024-01");
        assert_eq!(months[0].income, dec("2000"));
        assert_eq!(months[0].expenses, dec("900"));
        assert_eq!(months[1].net, dec("1600"));
        assert_eq!(months[2].expenses, dec("1000"));
    }

    #[test]
    fn test_cashflow_fills_empty_months() {
        let (txns, accounts) = resolve(
            "2024-01-05 Salary\n    Assets:Bank  100\n    Income:Salary\n\n2024-03-05 Salary\n    Assets:Bank  100\n    Income:Salary\n",
        );
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let months = analyst.cashflow_by_month().unwrap();
        assert_eq!(months.len(), 3);
        assert_eq!(months[1].income, Decimal::ZERO);
    }

    #[test]
    fn test_daily_incomes_expenses() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let days = analyst.daily_incomes_expenses().unwrap();

        // The opening entry touches neither income nor expenses
        assert_eq!(days.len(), 10);
        assert_eq!(days[0].date.to_string(), "2024-01-05");
        assert_eq!(days[0].income, dec("2000"));
        assert_eq!(days[1].expenses, dec("100"));
        assert_eq!(days[1].net, dec("-100"));
    }

    #[test]
    fn test_expenses_pie_sums_to_100() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let pie = analyst.expenses_pie().unwrap();

        assert_eq!(pie.len(), 2);
        assert_eq!(pie[0].category, "Expenses:Housing");
        assert_eq!(pie[0].amount, dec("2400"));
        let sum: Decimal = pie.iter().map(|slice| slice.percentage).sum();
        assert!((sum - Decimal::ONE_HUNDRED).abs() <= dec("0.01"));
    }

    #[test]
    fn test_pie_with_many_equal_slices() {
        let ledger: String = ["Food", "Rent", "Fuel", "Books", "Gym", "Phone", "Travel"]
            .iter()
            .map(|category| format!("2024-01-10 {}\n    Expenses:{}  100\n    Assets:Bank\n\n", category, category))
            .collect();
        let (txns, accounts) = resolve(&ledger);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let pie = analyst.expenses_pie().unwrap();

        assert_eq!(pie.len(), 7);
        // Equal amounts fall back to category order
        assert_eq!(pie[0].category, "Expenses:Books");
        assert!(pie.iter().all(|slice| slice.percentage == pie[0].percentage));
        assert!((pie[0].percentage - dec("14.2857")).abs() < dec("0.0001"));
        let sum: Decimal = pie.iter().map(|slice| slice.percentage).sum();
        assert!((sum - Decimal::ONE_HUNDRED).abs() <= dec("0.01"));
    }

    #[test]
    fn test_pie_empty_without_totals() {
        let (txns, accounts) = resolve("2024-01-01 Transfer\n    Assets:Savings  100\n    Assets:Bank\n");
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert!(analyst.expenses_pie().unwrap().is_empty());
        assert!(analyst.incomes_pie().unwrap().is_empty());
    }

    #[test]
    fn test_incomes_pie() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let pie = analyst.incomes_pie().unwrap();
        assert_eq!(pie[0].category, "Income:Salary");
        assert_eq!(pie[0].amount, dec("6000"));
        assert_eq!(pie[1].amount, dec("500"));
    }

    #[test]
    fn test_balance_by_day_and_summaries() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);

        let days = analyst.balance_by_day().unwrap();
        let last = days.last().unwrap();
        assert_eq!(last.assets, dec("7100"));
        assert_eq!(last.liabilities, dec("2400"));
        assert_eq!(last.net_worth, dec("4700"));

        let assets = analyst.assets_summary().unwrap();
        assert_eq!(assets.total, dec("7100"));
        assert_eq!(assets.accounts.len(), 1);

        let liabilities = analyst.liabilities_summary().unwrap();
        assert_eq!(liabilities.accounts[0].account, "Liabilities:Card");
        assert_eq!(liabilities.total, dec("2400"));
    }

    #[test]
    fn test_balance_sheet_beyond_decimal_range() {
        let (txns, accounts) = resolve(
            "2024-01-01 Opening\n    Assets:Bank  50000000000000000000000000000\n    Equity:Opening\n\n\
             2024-01-02 Gift\n    Assets:Savings  50000000000000000000000000000\n    Equity:Gifts\n",
        );
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);

        assert_eq!(analyst.assets_summary(), Err(AnalysisError::Overflow));
        assert_eq!(analyst.balance_by_day(), Err(AnalysisError::Overflow));
        assert_eq!(analyst.accounts_used().unwrap().len(), 4);
    }

    #[test]
    fn test_accounts_used() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let used = analyst.accounts_used().unwrap();

        let food = used.iter().find(|u| u.account == "Expenses:Food").unwrap();
        assert_eq!(food.postings, 3);
        assert_eq!(food.first_used.to_string(), "2024-01-10");
        assert_eq!(food.last_used.to_string(), "2024-03-10");
        assert_eq!(used.len(), 7);
    }
}
