//! Spend insights: savings cards and the spend-over-time report.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Insight, Transaction};
use crate::types::{AppError, TransactionStatus};

pub const SAVINGS_LABEL: &str = "Potential Savings";

/// Cashback credited on spend: 1.5 %.
pub fn cashback_rate() -> Decimal {
    Decimal::new(15, 3)
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Sums the numeric part of every "Potential Savings" metric, e.g.
/// `"$1,200.50/yr"` counts as 1200.50. Only the leading number counts, so
/// `"1.2.3"` is 1.2; values with no number count as zero.
pub fn total_savings(insights: &[Insight]) -> Decimal {
    insights
        .iter()
        .filter(|i| i.metric_label.as_deref() == Some(SAVINGS_LABEL))
        .filter_map(|i| i.metric_value.as_deref())
        .filter_map(parse_metric_value)
        .sum()
}

fn parse_metric_value(raw: &str) -> Option<Decimal> {
    let mut seen_dot = false;
    let number: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .take_while(|c| {
            if *c != '.' {
                return true;
            }
            !std::mem::replace(&mut seen_dot, true)
        })
        .collect();
    Decimal::from_str(number.trim_end_matches('.')).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    #[default]
    Daily,
    /// Weeks start on Sunday.
    Weekly,
    Monthly,
}

impl FromStr for Grouping {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(AppError::InvalidRequest(format!("unknown grouping '{}'", other))),
        }
    }
}

impl Grouping {
    fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Grouping::Daily => date,
            Grouping::Weekly => date - Duration::days(date.weekday().num_days_from_sunday() as i64),
            Grouping::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    fn label(&self, start: NaiveDate) -> String {
        match self {
            Grouping::Daily | Grouping::Weekly => start.format("%b %-d").to_string(),
            Grouping::Monthly => start.format("%b %Y").to_string(),
        }
    }
}

/// Month filter by name, matching that month in any year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthFilter(Option<u32>);

impl MonthFilter {
    pub const ALL: MonthFilter = MonthFilter(None);

    pub fn month(number: u32) -> Self {
        MonthFilter(Some(number))
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.0.map_or(true, |m| date.month() == m)
    }
}

impl FromStr for MonthFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() || s == "all" {
            return Ok(Self::ALL);
        }
        MONTHS
            .iter()
            .position(|m| *m == s || (s.len() >= 3 && m.starts_with(&s)))
            .map(|idx| MonthFilter::month(idx as u32 + 1))
            .ok_or_else(|| AppError::InvalidRequest(format!("unknown month '{}'", s)))
    }
}

#[derive(Debug, Clone)]
pub struct SpendQuery {
    pub search: Option<String>,
    pub month: MonthFilter,
    pub grouping: Grouping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendReport {
    pub spend: Decimal,
    pub cashback: Decimal,
    pub transaction_count: usize,
    pub chart: Vec<ChartPoint>,
}

/// Aggregates completed spend matching the query into chronological chart
/// buckets.
pub fn spend_report(transactions: &[Transaction], query: &SpendQuery) -> SpendReport {
    let term = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let selected: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .filter(|t| query.month.matches(t.created_at.date_naive()))
        .filter(|t| match &term {
            None => true,
            Some(term) => [
                t.description.as_deref(),
                Some(t.to_company_name.as_str()),
                Some(t.from_company_name.as_str()),
            ]
            .iter()
            .flatten()
            .any(|f| f.to_lowercase().contains(term)),
        })
        .collect();

    let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for t in &selected {
        let start = query.grouping.bucket_start(t.created_at.date_naive());
        *buckets.entry(start).or_default() += t.amount;
    }

    let spend: Decimal = selected.iter().map(|t| t.amount).sum();

    SpendReport {
        spend,
        cashback: (spend * cashback_rate()).round_dp(6),
        transaction_count: selected.len(),
        chart: buckets
            .into_iter()
            .map(|(start, value)| ChartPoint {
                name: query.grouping.label(start),
                value,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::tx;
    use crate::types::InsightStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn insight(label: &str, value: &str) -> Insight {
        Insight {
            id: Uuid::new_v4(),
            title: "Consolidate vendors".to_string(),
            description: "Two suppliers overlap".to_string(),
            metric_label: Some(label.to_string()),
            metric_value: Some(value.to_string()),
            logo_url: None,
            is_new: true,
            status: InsightStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_savings_parses_formatted_values() {
        let list = vec![
            insight(SAVINGS_LABEL, "$1,200.50/yr"),
            insight(SAVINGS_LABEL, "$300"),
            insight("Spend Increase", "$9,999"),
            insight(SAVINGS_LABEL, "n/a"),
        ];
        assert_eq!(total_savings(&list), Decimal::new(150_050, 2));
    }

    #[test]
    fn test_metric_value_uses_leading_number() {
        assert_eq!(parse_metric_value("1.2.3"), Some(Decimal::new(12, 1)));
        assert_eq!(parse_metric_value("$2,500.75.00"), Some(Decimal::new(250_075, 2)));
        assert_eq!(parse_metric_value("$40."), Some(Decimal::from(40)));
        assert_eq!(parse_metric_value("n/a"), None);
    }

    #[test]
    fn test_month_filter_parse() {
        assert_eq!("November".parse::<MonthFilter>().unwrap(), MonthFilter::month(11));
        assert_eq!("nov".parse::<MonthFilter>().unwrap(), MonthFilter::month(11));
        assert_eq!("all".parse::<MonthFilter>().unwrap(), MonthFilter::ALL);
        assert!("ju".parse::<MonthFilter>().is_err());
        assert!("smarch".parse::<MonthFilter>().is_err());
    }

    #[test]
    fn test_spend_report_daily_and_cashback() {
        let d = |day, hour| Utc.with_ymd_and_hms(2025, 11, day, hour, 0, 0).unwrap();
        let list = vec![
            tx("Acme", "Globex", 100, TransactionStatus::Completed, d(3, 9)),
            tx("Acme", "Globex", 50, TransactionStatus::Completed, d(3, 17)),
            tx("Acme", "Initech", 200, TransactionStatus::Completed, d(1, 12)),
            tx("Acme", "Initech", 999, TransactionStatus::Pending, d(2, 12)),
        ];
        let report = spend_report(
            &list,
            &SpendQuery {
                search: None,
                month: "november".parse().unwrap(),
                grouping: Grouping::Daily,
            },
        );
        assert_eq!(report.spend, Decimal::from(350));
        assert_eq!(report.cashback, Decimal::new(525, 2));
        assert_eq!(report.transaction_count, 3);
        assert_eq!(
            report.chart,
            vec![
                ChartPoint { name: "Nov 1".into(), value: Decimal::from(200) },
                ChartPoint { name: "Nov 3".into(), value: Decimal::from(150) },
            ]
        );
    }

    #[test]
    fn test_spend_report_weekly_starts_sunday_and_search() {
        // 2025-11-05 is a Wednesday, its week starts Sunday 2025-11-02
        let wed = Utc.with_ymd_and_hms(2025, 11, 5, 10, 0, 0).unwrap();
        let sat = Utc.with_ymd_and_hms(2025, 11, 8, 10, 0, 0).unwrap();
        let list = vec![
            tx("Acme", "Globex", 10, TransactionStatus::Completed, wed),
            tx("Acme", "Initech", 20, TransactionStatus::Completed, sat),
        ];
        let report = spend_report(
            &list,
            &SpendQuery {
                search: None,
                month: MonthFilter::ALL,
                grouping: Grouping::Weekly,
            },
        );
        assert_eq!(report.chart.len(), 1);
        assert_eq!(report.chart[0].name, "Nov 2");
        assert_eq!(report.chart[0].value, Decimal::from(30));

        let searched = spend_report(
            &list,
            &SpendQuery {
                search: Some("initech".into()),
                month: MonthFilter::ALL,
                grouping: Grouping::Monthly,
            },
        );
        assert_eq!(searched.spend, Decimal::from(20));
        assert_eq!(searched.chart[0].name, "Nov 2025");
    }

    #[test]
    fn test_spend_report_empty() {
        let report = spend_report(
            &[],
            &SpendQuery {
                search: None,
                month: MonthFilter::ALL,
                grouping: Grouping::Daily,
            },
        );
        assert_eq!(report.spend, Decimal::ZERO);
        assert!(report.chart.is_empty());
    }
}
