//! Calendar periods used by balances and analytics

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AnalysisError;

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Smallest period holding every date, or `None` when there are none
    pub fn spanning(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        dates.into_iter().fold(None, |period, date| match period {
            None => Some(Period { start: date, end: date }),
            Some(Period { start, end }) => Some(Period { start: start.min(date), end: end.max(date) }),
        })
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.start && *date <= self.end
    }

    /// Every calendar month the period touches, in order
    pub fn months(&self) -> Vec<YearMonth> {
        let last = YearMonth::from_date(self.end);
        let mut months = Vec::new();
        let mut current = YearMonth::from_date(self.start);
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

/// A calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// The month `n` months after this one
    pub fn plus(&self, n: usize) -> Self {
        (0..n).fold(*self, |month, _| month.next())
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for YearMonth {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalysisError::InvalidMonth { value: s.to_string() };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_spanning() {
        let period = Period::spanning(vec![date(2024, 3, 1), date(2023, 12, 5), date(2024, 1, 9)]).unwrap();
        assert_eq!(period.start, date(2023, 12, 5));
        assert_eq!(period.end, date(2024, 3, 1));
        assert!(period.contains(&date(2024, 2, 29)));
        assert!(Period::spanning(Vec::new()).is_none());
    }

    #[test]
    fn test_period_months_cross_year() {
        let period = Period { start: date(2023, 11, 20), end: date(2024, 2, 1) };
        let months: Vec<String> = period.months().iter().map(ToString::to_string).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_year_month_parse() {
        assert_eq!("2024-01".parse::<YearMonth>().unwrap(), YearMonth { year: 2024, month: 1 });
        assert_eq!("2024-1".parse::<YearMonth>().unwrap().to_string(), "2024-01");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("January".parse::<YearMonth>().is_err());
        assert!(matches!("24-01".parse::<YearMonth>(), Err(AnalysisError::InvalidMonth { .. })));
    }

    #[test]
    fn test_year_month_plus_and_serde() {
        let month = YearMonth { year: 2024, month: 11 };
        assert_eq!(month.plus(3).to_string(), "2025-02");
        assert_eq!(serde_json::to_value(month).unwrap(), "2024-11");
        let back: YearMonth = serde_json::from_str("\"2024-11\"").unwrap();
        assert_eq!(back, month);
    }
}
