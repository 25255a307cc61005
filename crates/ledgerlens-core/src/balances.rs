//! Balance aggregations over resolved transactions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use ledgerlens_parser::{account_prefix, RootCategory};

use crate::error::{AnalysisError, AnalysisResult};
use crate::hierarchy::{AccountHierarchy, Classification};
use crate::period::Period;
use crate::taxes::{ResolvedPosting, ResolvedTransaction};

/// Depth of the detail granularity (`Expenses:Food`)
pub const DETAIL_DEPTH: usize = 2;

/// Quantity a posting contributes to aggregations.
///
/// With a base commodity only postings weighing in it count.
pub fn counted_quantity(posting: &ResolvedPosting, base_commodity: Option<&str>) -> AnalysisResult<Option<Decimal>> {
    let weight = posting.weight().map_err(|_| AnalysisError::Overflow)?;
    Ok(match base_commodity {
        Some(base) if weight.commodity != base => None,
        _ => Some(weight.quantity),
    })
}

/// `a + b`, or `AnalysisError::Overflow` when the sum does not fit
pub fn checked_add(a: Decimal, b: Decimal) -> AnalysisResult<Decimal> {
    a.checked_add(b).ok_or(AnalysisError::Overflow)
}

/// `a - b`, or `AnalysisError::Overflow` when the difference does not fit
pub fn checked_sub(a: Decimal, b: Decimal) -> AnalysisResult<Decimal> {
    a.checked_sub(b).ok_or(AnalysisError::Overflow)
}

/// Leaf account totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub balances: BTreeMap<String, Decimal>,
    /// Accounts with postings that are missing from the declarations
    pub undeclared: Vec<String>,
    /// Accounts outside every root category
    pub unclassified: Vec<String>,
}

/// Income statement and balance sheet summary.
///
/// Credit-side categories are reported positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResults {
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
    /// Equity after closing the period's net income into it
    pub closing_equity: Decimal,
    pub total_unclassified: Decimal,
    /// assets - (liabilities + closing equity)
    pub difference: Decimal,
    /// Whether assets = liabilities + closing equity
    pub balanced: bool,
}

pub struct BalanceCalculator<'a> {
    hierarchy: &'a AccountHierarchy,
    base_commodity: Option<&'a str>,
}

impl<'a> BalanceCalculator<'a> {
    pub fn new(hierarchy: &'a AccountHierarchy, base_commodity: Option<&'a str>) -> Self {
        Self { hierarchy, base_commodity }
    }

    fn totals_by<F>(&self, transactions: &[ResolvedTransaction], mut key: F) -> AnalysisResult<BTreeMap<String, Decimal>>
    where
        F: FnMut(&str) -> String,
    {
        let mut totals = BTreeMap::new();
        for txn in transactions {
            for posting in &txn.postings {
                if let Some(quantity) = counted_quantity(posting, self.base_commodity)? {
                    let total = totals.entry(key(&posting.account)).or_insert(Decimal::ZERO);
                    *total = checked_add(*total, quantity)?;
                }
            }
        }
        Ok(totals)
    }

    /// Leaf totals. Declared accounts without movement appear with zero;
    /// used accounts missing from a non-empty `reference` are flagged.
    pub fn calculate_balances(
        &self,
        transactions: &[ResolvedTransaction],
        reference: &[String],
    ) -> AnalysisResult<AccountBalances> {
        let mut balances = self.totals_by(transactions, str::to_string)?;
        for account in reference {
            balances.entry(account.clone()).or_insert(Decimal::ZERO);
        }

        let declared: BTreeSet<&str> = reference.iter().map(String::as_str).collect();
        let undeclared: Vec<String> = if declared.is_empty() {
            Vec::new()
        } else {
            balances
                .keys()
                .filter(|account| !declared.contains(account.as_str()))
                .cloned()
                .collect()
        };
        for account in &undeclared {
            log::warn!(target: "ledgerlens::balances", "Account '{}' is used but not declared", account);
        }

        let unclassified = balances
            .keys()
            .filter(|account| self.hierarchy.classify(account) == Classification::Unclassified)
            .cloned()
            .collect();

        Ok(AccountBalances { balances, undeclared, unclassified })
    }

    /// Totals per root category keyed by the root name used in the ledger.
    ///
    /// All five roots are always present; `Unclassified` only when needed.
    pub fn calculate_balances_by_parent_accounts(
        &self,
        transactions: &[ResolvedTransaction],
    ) -> AnalysisResult<BTreeMap<String, Decimal>> {
        let mut totals = self.totals_by(transactions, |account| {
            self.hierarchy.label(self.hierarchy.classify(account)).to_string()
        })?;
        for category in RootCategory::ALL {
            totals
                .entry(self.hierarchy.parent_name(category).to_string())
                .or_insert(Decimal::ZERO);
        }
        Ok(totals)
    }

    /// Totals per detail account (first two path segments)
    pub fn calculate_balances_by_detail_accounts(
        &self,
        transactions: &[ResolvedTransaction],
    ) -> AnalysisResult<BTreeMap<String, Decimal>> {
        self.totals_by(transactions, |account| account_prefix(account, DETAIL_DEPTH))
    }

    pub fn calculate_status_results(&self, balances: &AccountBalances) -> AnalysisResult<StatusResults> {
        let mut sums: BTreeMap<Classification, Decimal> = BTreeMap::new();
        for (account, balance) in &balances.balances {
            let sum = sums.entry(self.hierarchy.classify(account)).or_insert(Decimal::ZERO);
            *sum = checked_add(*sum, *balance)?;
        }
        let sum = |category: RootCategory| sums.get(&Classification::Root(category)).copied().unwrap_or_default();

        let total_assets = sum(RootCategory::Assets);
        let total_liabilities = -sum(RootCategory::Liabilities);
        let total_equity = -sum(RootCategory::Equity);
        let total_income = -sum(RootCategory::Income);
        let total_expenses = sum(RootCategory::Expenses);
        let net_income = checked_sub(total_income, total_expenses)?;
        let closing_equity = checked_add(total_equity, net_income)?;
        let difference = checked_sub(total_assets, checked_add(total_liabilities, closing_equity)?)?;

        Ok(StatusResults {
            total_assets,
            total_liabilities,
            total_equity,
            total_income,
            total_expenses,
            net_income,
            closing_equity,
            total_unclassified: sums.get(&Classification::Unclassified).copied().unwrap_or_default(),
            difference,
            balanced: difference.is_zero(),
        })
    }
}

/// First and last transaction dates
pub fn date_range(transactions: &[ResolvedTransaction]) -> Option<Period> {
    Period::spanning(transactions.iter().map(|txn| txn.date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{ParentSpec, UNCLASSIFIED};
    use crate::taxes::{balance_only, ResolveSettings};
    use ledgerlens_parser::{LedgerParser, RootNames};
    use std::str::FromStr;

    const LEDGER: &str = "\
2024-01-01 Opening
    Assets:Bank  1000 MXN
    Equity:Opening

2024-01-05 Salary
    Assets:Bank  3000 MXN
    Income:Salary

2024-01-10 Groceries
    Expenses:Food:Groceries  400 MXN
    Liabilities:Card

2024-02-01 Mystery
    Unknown.Foo  50 MXN
    Assets:Bank
";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn fixture() -> (Vec<ResolvedTransaction>, AccountHierarchy) {
        let output = LedgerParser::parse(LEDGER);
        let txns: Vec<_> = output.transactions().cloned().collect();
        let set = balance_only(&txns, &ResolveSettings::default());
        let accounts: Vec<String> = set
            .transactions
            .iter()
            .flat_map(|t| t.postings.iter().map(|p| p.account.clone()))
            .collect();
        let hierarchy = AccountHierarchy::new(&accounts, ParentSpec::from_roots(&RootNames::default()));
        (set.transactions, hierarchy)
    }

    #[test]
    fn test_leaf_balances_with_reference() {
        let (txns, hierarchy) = fixture();
        let calculator = BalanceCalculator::new(&hierarchy, None);
        let reference = vec!["Assets:Bank".to_string(), "Assets:Savings".to_string()];
        let balances = calculator.calculate_balances(&txns, &reference).unwrap();

        assert_eq!(balances.balances["Assets:Bank"], dec("3950"));
        assert_eq!(balances.balances["Assets:Savings"], Decimal::ZERO);
        assert!(balances.undeclared.contains(&"Income:Salary".to_string()));
        assert!(!balances.undeclared.contains(&"Assets:Bank".to_string()));
        assert_eq!(balances.unclassified, vec!["Unknown.Foo"]);
    }

    #[test]
    fn test_unknown_root_kept_as_unclassified() {
        let (txns, hierarchy) = fixture();
        let calculator = BalanceCalculator::new(&hierarchy, None);
        let parents = calculator.calculate_balances_by_parent_accounts(&txns).unwrap();

        assert_eq!(parents[UNCLASSIFIED], dec("50"));
        assert_eq!(parents["Assets"], dec("3950"));
        assert_eq!(parents["Liabilities"], dec("-400"));
        assert_eq!(parents.len(), 6);
    }

    #[test]
    fn test_parent_totals_match_grouped_leaves() {
        let (txns, hierarchy) = fixture();
        let calculator = BalanceCalculator::new(&hierarchy, None);
        let leaves = calculator.calculate_balances(&txns, &[]).unwrap();
        let parents = calculator.calculate_balances_by_parent_accounts(&txns).unwrap();

        let mut grouped: BTreeMap<String, Decimal> = BTreeMap::new();
        for (account, balance) in &leaves.balances {
            let label = hierarchy.label(hierarchy.classify(account)).to_string();
            *grouped.entry(label).or_insert(Decimal::ZERO) += *balance;
        }
        for (label, total) in &grouped {
            assert_eq!(&parents[label], total);
        }
    }

    #[test]
    fn test_all_roots_present_when_unused() {
        let hierarchy = AccountHierarchy::new(&[], ParentSpec::from_roots(&RootNames::default()));
        let parents = BalanceCalculator::new(&hierarchy, None).calculate_balances_by_parent_accounts(&[]).unwrap();
        assert_eq!(parents.len(), 5);
        assert!(parents.values().all(Decimal::is_zero));
    }

    #[test]
    fn test_detail_balances() {
        let (txns, hierarchy) = fixture();
        let details = BalanceCalculator::new(&hierarchy, None).calculate_balances_by_detail_accounts(&txns).unwrap();
        assert_eq!(details["Expenses:Food"], dec("400"));
        assert_eq!(details["Unknown.Foo"], dec("50"));
    }

    #[test]
    fn test_status_results() {
        let (txns, hierarchy) = fixture();
        let calculator = BalanceCalculator::new(&hierarchy, None);
        let status = calculator.calculate_status_results(&calculator.calculate_balances(&txns, &[]).unwrap()).unwrap();

        assert_eq!(status.total_assets, dec("3950"));
        assert_eq!(status.total_liabilities, dec("400"));
        assert_eq!(status.total_equity, dec("1000"));
        assert_eq!(status.total_income, dec("3000"));
        assert_eq!(status.total_expenses, dec("400"));
        assert_eq!(status.net_income, dec("2600"));
        assert_eq!(status.closing_equity, dec("3600"));
        assert_eq!(status.total_unclassified, dec("50"));
        // The unclassified 50 is what keeps the identity from holding
        assert_eq!(status.difference, dec("-50"));
        assert!(!status.balanced);
    }

    #[test]
    fn test_base_commodity_filter() {
        let output = LedgerParser::parse("2024-01-01 Mixed\n    Assets:USD  10 USD\n    Assets:MXN  170 MXN\n    Equity:Opening\n");
        let txns: Vec<_> = output.transactions().cloned().collect();
        let set = balance_only(&txns, &ResolveSettings::default());
        let hierarchy = AccountHierarchy::new(&[], ParentSpec::from_roots(&RootNames::default()));
        let balances = BalanceCalculator::new(&hierarchy, Some("MXN")).calculate_balances(&set.transactions, &[]).unwrap();
        assert_eq!(balances.balances.len(), 2);
        assert_eq!(balances.balances["Equity:Opening"], dec("-170"));
    }

    #[test]
    fn test_totals_beyond_decimal_range() {
        let opening = |account: &str, equity: &str| {
            format!("2024-01-01 Opening\n    {}  50000000000000000000000000000\n    {}\n\n", account, equity)
        };
        let hierarchy = AccountHierarchy::new(&[], ParentSpec::from_roots(&RootNames::default()));
        let calculator = BalanceCalculator::new(&hierarchy, None);

        let same_account = format!("{}{}", opening("Assets:Bank", "Equity:Opening"), opening("Assets:Bank", "Equity:Gifts"));
        let txns: Vec<_> = LedgerParser::parse(&same_account).transactions().cloned().collect();
        let set = balance_only(&txns, &ResolveSettings::default());
        assert_eq!(set.transactions.len(), 2);
        assert_eq!(calculator.calculate_balances(&set.transactions, &[]), Err(AnalysisError::Overflow));
        assert_eq!(calculator.calculate_balances_by_parent_accounts(&set.transactions), Err(AnalysisError::Overflow));

        // Each leaf fits, their category total does not
        let two_accounts = format!("{}{}", opening("Assets:Bank", "Equity:Opening"), opening("Assets:Savings", "Equity:Gifts"));
        let txns: Vec<_> = LedgerParser::parse(&two_accounts).transactions().cloned().collect();
        let set = balance_only(&txns, &ResolveSettings::default());
        let details = calculator.calculate_balances_by_detail_accounts(&set.transactions).unwrap();
        assert_eq!(details.len(), 4);
        let leaves = calculator.calculate_balances(&set.transactions, &[]).unwrap();
        assert_eq!(calculator.calculate_status_results(&leaves), Err(AnalysisError::Overflow));
    }

    #[test]
    fn test_date_range() {
        let (txns, _) = fixture();
        let period = date_range(&txns).unwrap();
        assert_eq!(period.start.to_string(), "2024-01-01");
        assert_eq!(period.end.to_string(), "2024-02-01");
        assert!(date_range(&[]).is_none());
    }
}
