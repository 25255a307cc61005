//! Alerts, trend statistics and forecasts over monthly figures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ledgerlens_parser::RootCategory;
use ledgerlens_utils::{mean, percentage, ratio};

use super::series::MonthlyFlow;
use super::LedgerAnalyst;
use crate::balances::{checked_add, checked_sub};
use crate::error::{AnalysisError, AnalysisResult};
use crate::period::YearMonth;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseAlert {
    pub category: String,
    pub month: YearMonth,
    pub current: Decimal,
    /// Average over earlier months with spending
    pub average: Decimal,
    /// `current / average`
    pub ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthAmount {
    pub month: YearMonth,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub category: String,
    pub months: Vec<MonthAmount>,
}

/// Month-over-month change in percent; `None` when the previous month was zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRate {
    pub month: YearMonth,
    pub income_growth: Option<Decimal>,
    pub expense_growth: Option<Decimal>,
    pub net_growth: Option<Decimal>,
}

/// Expenses as a percentage of income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRatio {
    pub month: YearMonth,
    pub ratio: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub month: YearMonth,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub month: YearMonth,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthStatus {
    Surplus,
    Deficit,
    BreakEven,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthClassification {
    pub month: YearMonth,
    pub net: Decimal,
    pub status: MonthStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeMonths {
    pub best: MonthlyFlow,
    pub worst: MonthlyFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeDependency {
    pub top_source: String,
    pub top_amount: Decimal,
    pub total_income: Decimal,
    /// Share of the largest source, between 0 and 1
    pub ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub month: YearMonth,
    pub net: Decimal,
    pub cumulative: Decimal,
}

/// Least squares slope of `values` against their index; `None` for fewer than two values
fn slope(values: &[Decimal]) -> AnalysisResult<Option<Decimal>> {
    if values.len() < 2 {
        return Ok(None);
    }
    let x_mean = Decimal::from(values.len() - 1) / Decimal::TWO;
    let mut numerator = Decimal::ZERO;
    let mut denominator = Decimal::ZERO;
    for (x, y) in values.iter().enumerate() {
        let dx = Decimal::from(x) - x_mean;
        numerator = checked_add(numerator, dx.checked_mul(*y).ok_or(AnalysisError::Overflow)?)?;
        denominator += dx * dx;
    }
    numerator.checked_div(denominator).map(Some).ok_or(AnalysisError::Overflow)
}

fn growth(previous: Decimal, current: Decimal) -> Option<Decimal> {
    percentage(current - previous, previous.abs())
}

impl<'a> LedgerAnalyst<'a> {
    /// Expense categories whose latest-month spending exceeds `threshold`
    /// times their average over earlier months with spending.
    pub fn detect_unusual_expenses(&self, threshold: Decimal) -> AnalysisResult<Vec<ExpenseAlert>> {
        if threshold <= Decimal::ZERO {
            return Err(AnalysisError::InvalidParameter {
                name: "threshold".to_string(),
                reason: format!("must be positive, got {}", threshold),
            });
        }
        let Some(current_month) = self.months().last().copied() else {
            return Ok(Vec::new());
        };

        let mut alerts = Vec::new();
        for (category, months) in self.expenses_by_category_month()? {
            let current = months.get(&current_month).copied().unwrap_or_default();
            let history: Vec<Decimal> = months
                .range(..current_month)
                .map(|(_, amount)| *amount)
                .filter(|amount| *amount > Decimal::ZERO)
                .collect();
            let Some(average) = mean(&history) else {
                continue;
            };

            // A limit past the decimal range is never exceeded
            if threshold.checked_mul(average).is_some_and(|limit| current > limit) {
                log::debug!(
                    target: "ledgerlens::analyst",
                    "Unusual spending in {}: {} against average {}",
                    category,
                    current,
                    average
                );
                alerts.push(ExpenseAlert {
                    ratio: ratio(current, average).unwrap_or_default(),
                    category,
                    month: current_month,
                    current,
                    average,
                });
            }
        }
        alerts.sort_by(|a, b| b.ratio.cmp(&a.ratio).then_with(|| a.category.cmp(&b.category)));
        Ok(alerts)
    }

    /// Monthly spending per expense category, with zero for quiet months
    pub fn expense_trends_by_category(&self) -> AnalysisResult<Vec<CategoryTrend>> {
        let months = self.months();
        Ok(self
            .expenses_by_category_month()?
            .into_iter()
            .map(|(category, amounts)| CategoryTrend {
                category,
                months: months
                    .iter()
                    .map(|month| MonthAmount {
                        month: *month,
                        amount: amounts.get(month).copied().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect())
    }

    pub fn monthly_growth_rates(&self) -> AnalysisResult<Vec<GrowthRate>> {
        Ok(self
            .monthly_flows()?
            .windows(2)
            .map(|pair| GrowthRate {
                month: pair[1].month,
                income_growth: growth(pair[0].income, pair[1].income),
                expense_growth: growth(pair[0].expenses, pair[1].expenses),
                net_growth: growth(pair[0].net, pair[1].net),
            })
            .collect())
    }

    pub fn monthly_expense_ratio(&self) -> AnalysisResult<Vec<ExpenseRatio>> {
        Ok(self
            .monthly_flows()?
            .into_iter()
            .map(|flow| ExpenseRatio { month: flow.month, ratio: percentage(flow.expenses, flow.income) })
            .collect())
    }

    /// Trailing average over `window` months, one point per full window
    pub fn moving_average(&self, window: usize) -> AnalysisResult<Vec<MovingAveragePoint>> {
        if window == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "window".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let flows = self.monthly_flows()?;
        if flows.len() < window {
            return Err(AnalysisError::InsufficientData {
                metric: "moving_average".to_string(),
                needed: window,
                available: flows.len(),
            });
        }

        Ok(flows
            .windows(window)
            .map(|chunk| {
                let average = |f: fn(&MonthlyFlow) -> Decimal| {
                    mean(&chunk.iter().map(f).collect::<Vec<_>>()).unwrap_or_default()
                };
                MovingAveragePoint {
                    month: chunk[chunk.len() - 1].month,
                    income: average(|flow| flow.income),
                    expenses: average(|flow| flow.expenses),
                    net: average(|flow| flow.net),
                }
            })
            .collect())
    }

    /// Least squares slope of monthly net income per month
    pub fn trend_slope(&self) -> AnalysisResult<Decimal> {
        let nets: Vec<Decimal> = self.monthly_flows()?.iter().map(|flow| flow.net).collect();
        slope(&nets)?.ok_or(AnalysisError::InsufficientData {
            metric: "trend_slope".to_string(),
            needed: 2,
            available: nets.len(),
        })
    }

    /// Project `count` months past the last data month.
    ///
    /// Each series starts from its latest moving average (window capped at
    /// the months available) and moves by its own slope per month.
    pub fn predict_future_months(&self, count: usize) -> AnalysisResult<Vec<Forecast>> {
        let flows = self.monthly_flows()?;
        if flows.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                metric: "predict_future_months".to_string(),
                needed: 2,
                available: flows.len(),
            });
        }
        let window = self.options.moving_average_window.clamp(1, flows.len());
        let recent = &flows[flows.len() - window..];
        let last_month = flows[flows.len() - 1].month;

        let series = |f: fn(&MonthlyFlow) -> Decimal| -> AnalysisResult<(Decimal, Decimal)> {
            let all: Vec<Decimal> = flows.iter().map(f).collect();
            let base = mean(&recent.iter().map(f).collect::<Vec<_>>()).unwrap_or_default();
            Ok((base, slope(&all)?.unwrap_or_default()))
        };
        let (income_base, income_slope) = series(|flow| flow.income)?;
        let (expenses_base, expenses_slope) = series(|flow| flow.expenses)?;
        let project = |base: Decimal, slope: Decimal, step: Decimal| {
            slope
                .checked_mul(step)
                .and_then(|change| base.checked_add(change))
                .ok_or(AnalysisError::Overflow)
        };

        (1..=count)
            .map(|k| {
                let step = Decimal::from(k);
                let income = project(income_base, income_slope, step)?;
                let expenses = project(expenses_base, expenses_slope, step)?;
                let net = checked_sub(income, expenses)?;
                Ok(Forecast { month: last_month.plus(k), income, expenses, net })
            })
            .collect()
    }

    /// Break-even when |net| is within the configured margin of income
    pub fn classify_months_by_balance(&self) -> AnalysisResult<Vec<MonthClassification>> {
        let margin = self.options.break_even_margin;
        Ok(self
            .monthly_flows()?
            .into_iter()
            .map(|flow| {
                let within_margin = margin
                    .checked_mul(flow.income.abs())
                    .map_or(true, |limit| flow.net.abs() <= limit);
                let status = if within_margin {
                    MonthStatus::BreakEven
                } else if flow.net > Decimal::ZERO {
                    MonthStatus::Surplus
                } else {
                    MonthStatus::Deficit
                };
                MonthClassification { month: flow.month, net: flow.net, status }
            })
            .collect())
    }

    /// Best and worst months by net income; the earliest wins ties
    pub fn extreme_months(&self) -> AnalysisResult<ExtremeMonths> {
        let flows = self.monthly_flows()?;
        let mut iter = flows.iter();
        let first = iter.next().ok_or(AnalysisError::NoData { metric: "extreme_months".to_string() })?;

        let (mut best, mut worst) = (first, first);
        for flow in iter {
            if flow.net > best.net {
                best = flow;
            }
            if flow.net < worst.net {
                worst = flow;
            }
        }
        Ok(ExtremeMonths { best: best.clone(), worst: worst.clone() })
    }

    /// Share of total income coming from the largest income category
    pub fn income_dependency_ratio(&self) -> AnalysisResult<IncomeDependency> {
        let mut sources: BTreeMap<String, Decimal> = BTreeMap::new();
        for flow in self.flows()?.iter().filter(|flow| flow.category == Some(RootCategory::Income)) {
            *sources.entry(Self::category_name(flow.account)).or_insert(Decimal::ZERO) += flow.income();
        }

        let total_income: Decimal = sources.values().sum();
        let no_data = || AnalysisError::NoData { metric: "income_dependency_ratio".to_string() };
        if total_income <= Decimal::ZERO {
            return Err(no_data());
        }
        let (top_source, top_amount) = sources
            .into_iter()
            .fold(None::<(String, Decimal)>, |top, (source, amount)| match top {
                Some((_, top_amount)) if amount <= top_amount => top,
                _ => Some((source, amount)),
            })
            .ok_or_else(no_data)?;

        Ok(IncomeDependency {
            ratio: ratio(top_amount, total_income).unwrap_or_default(),
            top_source,
            top_amount,
            total_income,
        })
    }

    pub fn cumulative_net_income(&self) -> AnalysisResult<Vec<CumulativePoint>> {
        let mut cumulative = Decimal::ZERO;
        Ok(self
            .monthly_flows()?
            .into_iter()
            .map(|flow| {
                cumulative += flow.net;
                CumulativePoint { month: flow.month, net: flow.net, cumulative }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{parents, resolve, LEDGER};
    use super::*;
    use crate::options::AnalysisOptions;
    use ledgerlens_utils::round_display;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn with_march_food(amount: &str) -> String {
        LEDGER.replace("Expenses:Food  200", &format!("Expenses:Food  {}", amount))
    }

    #[test]
    fn test_unusual_expense_flagged() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let alerts = analyst.detect_unusual_expenses(dec("1.5")).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, "Expenses:Food");
        assert_eq!(alerts[0].month.to_string(), "2024-03");
        assert_eq!(alerts[0].average, dec("100"));
        assert_eq!(alerts[0].ratio, dec("2"));
    }

    #[test]
    fn test_moderate_expense_not_flagged() {
        let (txns, accounts) = resolve(&with_march_food("140"));
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert!(analyst.detect_unusual_expenses(dec("1.5")).unwrap().is_empty());
        // A lower threshold catches it
        assert_eq!(analyst.detect_unusual_expenses(dec("1.2")).unwrap().len(), 1);
        assert!(analyst.detect_unusual_expenses(Decimal::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_threshold() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert!(matches!(
            analyst.detect_unusual_expenses(Decimal::ZERO),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_expense_trends_by_category() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let trends = analyst.expense_trends_by_category().unwrap();

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].category, "Expenses:Food");
        let amounts: Vec<Decimal> = trends[0].months.iter().map(|m| m.amount).collect();
        assert_eq!(amounts, vec![dec("100"), dec("100"), dec("200")]);
    }

    #[test]
    fn test_growth_and_expense_ratio() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);

        let growth = analyst.monthly_growth_rates().unwrap();
        assert_eq!(growth.len(), 2);
        assert_eq!(growth[0].month.to_string(), "2024-02");
        assert_eq!(growth[0].income_growth, Some(dec("25")));
        assert_eq!(growth[0].expense_growth, Some(Decimal::ZERO));
        assert_eq!(growth[1].income_growth, Some(dec("-20")));

        let ratios = analyst.monthly_expense_ratio().unwrap();
        assert_eq!(ratios[0].ratio, Some(dec("45")));
        assert_eq!(ratios[2].ratio, Some(dec("50")));
    }

    #[test]
    fn test_growth_from_zero_is_none() {
        let (txns, accounts) = resolve(
            "2024-01-05 Groceries\n    Expenses:Food  50\n    Assets:Bank\n\n2024-02-05 Salary\n    Assets:Bank  100\n    Income:Salary\n",
        );
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let growth = analyst.monthly_growth_rates().unwrap();
        assert_eq!(growth[0].income_growth, None);
        assert_eq!(analyst.monthly_expense_ratio().unwrap()[0].ratio, None);
    }

    #[test]
    fn test_moving_average() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);

        let points = analyst.moving_average(2).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].month.to_string(), "2024-02");
        assert_eq!(points[0].income, dec("2250"));
        assert_eq!(points[1].net, dec("1300"));

        assert!(matches!(analyst.moving_average(4), Err(AnalysisError::InsufficientData { needed: 4, available: 3, .. })));
        assert!(matches!(analyst.moving_average(0), Err(AnalysisError::InvalidParameter { .. })));
    }

    #[test]
    fn test_trend_slope() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert_eq!(analyst.trend_slope().unwrap(), dec("-50"));
    }

    #[test]
    fn test_trend_slope_needs_two_months() {
        let (txns, accounts) = resolve("2024-01-05 Salary\n    Assets:Bank  100\n    Income:Salary\n");
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert!(matches!(analyst.trend_slope(), Err(AnalysisError::InsufficientData { available: 1, .. })));
        assert!(analyst.predict_future_months(3).is_err());
    }

    #[test]
    fn test_predict_future_months() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let forecast = analyst.predict_future_months(2).unwrap();

        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast[0].month.to_string(), "2024-04");
        assert_eq!(forecast[1].month.to_string(), "2024-05");
        assert_eq!(round_display(forecast[0].income), dec("2166.67"));
        assert_eq!(round_display(forecast[0].expenses), dec("983.33"));
        assert_eq!(round_display(forecast[1].expenses), dec("1033.33"));
        assert_eq!(forecast[0].net, forecast[0].income - forecast[0].expenses);
    }

    #[test]
    fn test_forecast_beyond_decimal_range() {
        let ledger = "\
2024-01-05 Salary
    Assets:Bank  1
    Income:Salary

2024-03-05 Bonus
    Assets:Bank  70000000000000000000000000000
    Income:Salary
";
        let (txns, accounts) = resolve(ledger);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);

        assert!(analyst.trend_slope().unwrap() > dec("34999999999999999999999999990"));
        assert_eq!(analyst.predict_future_months(1).unwrap().len(), 1);
        assert_eq!(analyst.predict_future_months(2), Err(AnalysisError::Overflow));
        assert!(analyst.cumulative_net_income().is_ok());
    }

    #[test]
    fn test_classify_months_by_balance() {
        let ledger = "\
2024-01-05 Salary
    Assets:Bank  1000
    Income:Salary

2024-01-20 Rent
    Expenses:Housing  980
    Assets:Bank

2024-02-05 Salary
    Assets:Bank  1000
    Income:Salary

2024-02-20 Trip
    Expenses:Travel  1500
    Assets:Bank

2024-03-05 Salary
    Assets:Bank  1000
    Income:Salary
";
        let (txns, accounts) = resolve(ledger);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let statuses: Vec<MonthStatus> =
            analyst.classify_months_by_balance().unwrap().into_iter().map(|m| m.status).collect();
        assert_eq!(statuses, vec![MonthStatus::BreakEven, MonthStatus::Deficit, MonthStatus::Surplus]);
    }

    #[test]
    fn test_extreme_months() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let extremes = analyst.extreme_months().unwrap();
        assert_eq!(extremes.best.month.to_string(), "2024-02");
        assert_eq!(extremes.worst.month.to_string(), "2024-03");

        let empty = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&[], &[], parents(), &empty);
        assert!(matches!(analyst.extreme_months(), Err(AnalysisError::NoData { .. })));
    }

    #[test]
    fn test_income_dependency_ratio() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let dependency = analyst.income_dependency_ratio().unwrap();

        assert_eq!(dependency.top_source, "Income:Salary");
        assert_eq!(dependency.top_amount, dec("6000"));
        assert_eq!(dependency.total_income, dec("6500"));
        assert_eq!(round_display(dependency.ratio), dec("0.92"));
    }

    #[test]
    fn test_income_dependency_without_income() {
        let (txns, accounts) = resolve("2024-01-05 Groceries\n    Expenses:Food  50\n    Assets:Bank\n");
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        assert!(matches!(analyst.income_dependency_ratio(), Err(AnalysisError::NoData { .. })));
    }

    #[test]
    fn test_cumulative_net_income() {
        let (txns, accounts) = resolve(LEDGER);
        let options = AnalysisOptions::default();
        let analyst = LedgerAnalyst::new(&txns, &accounts, parents(), &options);
        let cumulative: Vec<Decimal> =
            analyst.cumulative_net_income().unwrap().into_iter().map(|p| p.cumulative).collect();
        assert_eq!(cumulative, vec![dec("1100"), dec("2700"), dec("3700")]);
    }
}
