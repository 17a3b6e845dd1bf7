use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::companies::{CompanyFilter, CompanyQuery};
use crate::history::TransactionQuery;
use crate::ledger::{TransferOutcome, TransferRequest};
use crate::models::{
    Company, CompanyBasicInfo, CreateInsightRequest, Insight, LedgerEntry, NewCompany,
    Transaction, UpdateCompanyRequest, User,
};
use crate::types::{AppError, AppResult, InsightStatus, Role};

pub use memory::MemoryStore;
pub use pool::*;
pub use postgres::PgStore;

pub mod memory;
pub mod pool;
pub mod postgres;

/// Identity facts taken from a verified sign-in.
#[derive(Debug, Clone)]
pub struct LoginProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub picture_url: Option<String>,
    /// Forces the role on every login (configured admins); `None` keeps the
    /// stored role and defaults new users to `company_user`.
    pub role_override: Option<Role>,
}

/// Persistence boundary for the service. Every method is a single atomic unit
/// of work; implementations must give identical observable behaviour.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    // Users
    async fn upsert_user(&self, login: &LoginProfile) -> AppResult<User>;
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Links a user that has no company yet. Returns `false`, leaving the
    /// existing link alone, when the user is already linked.
    async fn link_user_company(&self, user_id: Uuid, company_id: Uuid) -> AppResult<bool>;

    // Companies
    /// Inserts the company together with its funding ledger entry.
    async fn create_company(&self, company: NewCompany) -> AppResult<Company>;
    async fn get_company(&self, id: Uuid) -> AppResult<Option<Company>>;
    async fn list_companies(&self, query: &CompanyQuery) -> AppResult<Vec<Company>>;
    async fn company_directory(&self, filter: &CompanyFilter) -> AppResult<Vec<CompanyBasicInfo>>;
    async fn update_company(
        &self,
        id: Uuid,
        changes: &UpdateCompanyRequest,
    ) -> AppResult<Option<Company>>;
    /// Fails with `Conflict` when the company is party to any transaction.
    async fn delete_company(&self, id: Uuid) -> AppResult<bool>;
    /// Assigns an address and funds a company that has no wallet.
    async fn provision_wallet(
        &self,
        id: Uuid,
        address: String,
        initial_balance: Decimal,
    ) -> AppResult<Company>;

    // Ledger
    async fn execute_transfer(&self, request: &TransferRequest) -> AppResult<TransferOutcome>;
    async fn ledger_entries(&self, company_id: Uuid) -> AppResult<Vec<LedgerEntry>>;

    // Transactions
    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>>;
    async fn list_transactions(&self, query: &TransactionQuery) -> AppResult<Vec<Transaction>>;

    // Insights
    async fn list_insights(&self, status: InsightStatus) -> AppResult<Vec<Insight>>;
    async fn create_insight(&self, request: &CreateInsightRequest) -> AppResult<Insight>;
    async fn set_insight_status(&self, id: Uuid, status: InsightStatus) -> AppResult<bool>;
}

/// A column a listing can be ordered by.
pub trait SortField: Sized + Copy {
    fn parse(name: &str) -> Option<Self>;
    fn column(&self) -> &'static str;
}

/// Ordering in `field` / `-field` syntax (leading `-` means descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub descending: bool,
}

impl<F: SortField> FromStr for Sort<F> {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        F::parse(name)
            .map(|field| Sort { field, descending })
            .ok_or_else(|| AppError::InvalidRequest(format!("cannot sort by '{}'", name)))
    }
}

impl<F: SortField> Sort<F> {
    pub fn sql(&self) -> String {
        format!(
            "{} {}",
            self.field.column(),
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}
