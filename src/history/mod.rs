//! Transaction history: filtering, summaries and CSV export.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::{Sort, SortField};
use crate::models::Transaction;
use crate::types::{AppError, AppResult, TransactionStatus};

/// Average amounts are reported at USDC precision.
const AVERAGE_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSortField {
    CreatedAt,
    Amount,
}

impl SortField for TransactionSortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "created_date" | "created_at" => Some(Self::CreatedAt),
            "amount" => Some(Self::Amount),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Amount => "amount",
        }
    }
}

pub type TransactionSort = Sort<TransactionSortField>;

pub const DEFAULT_TRANSACTION_SORT: TransactionSort = Sort {
    field: TransactionSortField::CreatedAt,
    descending: true,
};

/// Named date windows offered by the history screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    All,
    /// Since midnight UTC.
    Today,
    /// The last seven days.
    Week,
    /// Since the first of the current month.
    Month,
}

impl FromStr for DateRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(AppError::InvalidRequest(format!("unknown date range '{}'", other))),
        }
    }
}

impl DateRange {
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::All => None,
            DateRange::Today => Some(start_of_day(now.date_naive())),
            DateRange::Week => Some(now - Duration::days(7)),
            DateRange::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1).map(start_of_day),
        }
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[derive(Debug, Clone)]
pub struct TransactionQuery {
    /// Visibility scope: only transactions this company is party to.
    pub scope_company_id: Option<Uuid>,
    /// User-selected company filter, also party-based.
    pub company_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    /// Case-insensitive substring over both names, description and hash.
    pub search: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
    pub sort: TransactionSort,
    pub limit: Option<i64>,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            scope_company_id: None,
            company_id: None,
            status: None,
            search: None,
            min_amount: None,
            max_amount: None,
            from: None,
            to: None,
            sort: DEFAULT_TRANSACTION_SORT,
            limit: None,
        }
    }
}

impl TransactionQuery {
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.scope_company_id.is_some_and(|id| !tx.involves(id)) {
            return false;
        }
        if self.company_id.is_some_and(|id| !tx.involves(id)) {
            return false;
        }
        if self.status.is_some_and(|s| tx.status != s) {
            return false;
        }
        if self.min_amount.is_some_and(|min| tx.amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| tx.amount > max) {
            return false;
        }
        if self.from.is_some_and(|from| tx.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.created_at >= to) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let fields = [
                Some(tx.from_company_name.as_str()),
                Some(tx.to_company_name.as_str()),
                tx.description.as_deref(),
                Some(tx.transaction_hash.as_str()),
            ];
            return fields
                .iter()
                .flatten()
                .any(|f| f.to_lowercase().contains(&term));
        }
        true
    }
}

/// Sorts in place the way the SQL `ORDER BY` of [`TransactionQuery::sort`]
/// would.
pub fn sort_transactions(transactions: &mut [Transaction], sort: &TransactionSort) {
    transactions.sort_by(|a, b| {
        let ord = match sort.field {
            TransactionSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            TransactionSortField::Amount => a.amount.cmp(&b.amount),
        };
        if sort.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Figures shown above the history table, computed over the filtered rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub total_volume: Decimal,
    pub total_transactions: usize,
    pub average_amount: Decimal,
    pub completed_transactions: usize,
}

impl TransactionSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let total_volume: Decimal = transactions.iter().map(|t| t.amount).sum();
        Self {
            total_volume,
            total_transactions: transactions.len(),
            average_amount: average(total_volume, transactions.len()),
            completed_transactions: transactions
                .iter()
                .filter(|t| t.status == TransactionStatus::Completed)
                .count(),
        }
    }
}

/// Status breakdown for a company or the whole platform. Volume and average
/// count completed transactions only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    pub total_volume: Decimal,
    pub average_amount: Decimal,
}

impl TransactionStats {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let count = |status| transactions.iter().filter(|t| t.status == status).count();
        let completed = count(TransactionStatus::Completed);
        let total_volume = completed_volume(transactions.iter());
        Self {
            total: transactions.len(),
            completed,
            pending: count(TransactionStatus::Pending),
            failed: count(TransactionStatus::Failed),
            total_volume,
            average_amount: average(total_volume, completed),
        }
    }
}

pub fn completed_volume<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> Decimal {
    transactions
        .filter(|t| t.status == TransactionStatus::Completed)
        .map(|t| t.amount)
        .sum()
}

/// Completed volume within the calendar month containing `now`.
pub fn monthly_volume(transactions: &[Transaction], now: DateTime<Utc>) -> Decimal {
    let start = DateRange::Month.start(now);
    completed_volume(
        transactions
            .iter()
            .filter(|t| start.map_or(true, |s| t.created_at >= s)),
    )
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count as u64)).round_dp(AVERAGE_SCALE)
    }
}

pub const CSV_HEADERS: [&str; 9] = [
    "Transaction ID",
    "Date",
    "From Company",
    "To Company",
    "Amount (USDC)",
    "Status",
    "Description",
    "Transaction Hash",
    "Fee (USDC)",
];

/// Renders transactions as CSV. An empty slice yields the header row only.
pub fn export_csv(transactions: &[Transaction]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let internal = |e: csv::Error| AppError::Internal(format!("CSV export failed: {}", e));

    wtr.write_record(CSV_HEADERS).map_err(internal)?;
    for tx in transactions {
        let id = tx.id.to_string();
        let date = tx.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let amount = tx.amount.normalize().to_string();
        let fee = tx.fee.normalize().to_string();
        wtr.write_record([
            id.as_str(),
            date.as_str(),
            tx.from_company_name.as_str(),
            tx.to_company_name.as_str(),
            amount.as_str(),
            tx.status.as_str(),
            tx.description.as_deref().unwrap_or(""),
            tx.transaction_hash.as_str(),
            fee.as_str(),
        ])
        .map_err(internal)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;
    String::from_utf8(data).map_err(|e| AppError::Internal(e.to_string()))
}
