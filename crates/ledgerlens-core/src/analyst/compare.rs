//! Side-by-side comparison of two calendar months

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use ledgerlens_parser::RootCategory;

use super::LedgerAnalyst;
use crate::error::AnalysisResult;
use crate::period::YearMonth;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub month: YearMonth,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
    pub expenses_by_category: BTreeMap<String, Decimal>,
    /// Transactions dated within the month
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDelta {
    pub category: String,
    pub month1: Decimal,
    pub month2: Decimal,
    /// `month2 - month1`
    pub delta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthComparison {
    pub month1: MonthSnapshot,
    pub month2: MonthSnapshot,
    pub income_delta: Decimal,
    pub expenses_delta: Decimal,
    pub net_delta: Decimal,
    pub categories: Vec<CategoryDelta>,
}

impl<'a> LedgerAnalyst<'a> {
    /// Compare two `YYYY-MM` months. A month without transactions reads as zeros.
    pub fn compare_months(&self, month1: &str, month2: &str) -> AnalysisResult<MonthComparison> {
        let first = self.snapshot(month1.parse()?)?;
        let second = self.snapshot(month2.parse()?)?;

        let names: BTreeSet<&String> = first
            .expenses_by_category
            .keys()
            .chain(second.expenses_by_category.keys())
            .collect();
        let categories = names
            .into_iter()
            .map(|category| {
                let a = first.expenses_by_category.get(category).copied().unwrap_or_default();
                let b = second.expenses_by_category.get(category).copied().unwrap_or_default();
                CategoryDelta { category: category.clone(), month1: a, month2: b, delta: b - a }
            })
            .collect();

        Ok(MonthComparison {
            income_delta: second.income - first.income,
            expenses_delta: second.expenses - first.expenses,
            net_delta: second.net - first.net,
            categories,
            month1: first,
            month2: second,
        })
    }

    fn snapshot(&self, month: YearMonth) -> AnalysisResult<MonthSnapshot> {
        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;
        let mut expenses_by_category = BTreeMap::new();
        for flow in self.flows()?.iter().filter(|flow| month.contains(&flow.date)) {
            income += flow.income();
            expenses += flow.expense();
            if flow.category == Some(RootCategory::Expenses) {
                *expenses_by_category
                    .entry(Self::category_name(flow.account))
                    .or_insert(Decimal::ZERO) += flow.expense();
            }
        }

        Ok(MonthSnapshot {
            month,
            income,
            expenses,
            net: income - expenses,
            expenses_by_category,
            transactions: self.transactions.iter().filter(|txn| month.contains(&txn.date)).count(),
        })
    }
}
