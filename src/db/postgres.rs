//! Postgres-backed store.
//!
//! Transfers run in a single database transaction that locks both company
//! rows with `SELECT ... FOR UPDATE` in ascending id order before checking the
//! idempotency key and balance. Serialisation failures, deadlocks and racing
//! duplicate keys are replayed under the configured retry policy.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use super::{LoginProfile, Store};
use crate::companies::{self, CompanyFilter, CompanyQuery};
use crate::history::TransactionQuery;
use crate::ledger::{self, TransferOutcome, TransferRequest};
use crate::models::{
    Company, CompanyBasicInfo, CreateInsightRequest, Insight, LedgerEntry, NewCompany,
    Transaction, UpdateCompanyRequest, User,
};
use crate::types::{AppError, AppResult, InsightStatus};
use crate::utils::{with_retry, RetryPolicy};

const DIRECTORY_COLUMNS: &str = "id, company_name, business_email, contact_person, industry, \
     registration_status, kyc_status, wallet_address";

pub struct PgStore {
    pool: PgPool,
    transfer_retry: RetryPolicy,
}

impl PgStore {
    pub fn new(pool: PgPool, max_transfer_attempts: u32) -> Self {
        Self {
            pool,
            transfer_retry: RetryPolicy::with_attempts(max_transfer_attempts),
        }
    }

    async fn try_transfer(&self, request: &TransferRequest) -> AppResult<TransferOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Vec<Company> = sqlx::query_as(
            "SELECT * FROM companies WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(vec![request.from_company_id, request.to_company_id])
        .fetch_all(&mut *tx)
        .await?;

        let sender = locked
            .iter()
            .find(|c| c.id == request.from_company_id)
            .ok_or_else(|| AppError::NotFound("Sending company not found".to_string()))?;
        let recipient = locked
            .iter()
            .find(|c| c.id == request.to_company_id)
            .ok_or_else(|| AppError::NotFound("Recipient company not found".to_string()))?;

        // The sender row lock serialises requests sharing a key.
        let existing: Option<Transaction> = sqlx::query_as(
            "SELECT * FROM transactions WHERE from_company_id = $1 AND idempotency_key = $2",
        )
        .bind(request.from_company_id)
        .bind(&request.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = existing {
            return ledger::resolve_replay(existing, request);
        }

        let plan = ledger::plan_transfer(request, sender, recipient, Utc::now())?;
        let t = &plan.transaction;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, from_company_id, to_company_id, from_company_name,
                to_company_name, amount, fee, description, status, transaction_hash,
                idempotency_key, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(t.id)
        .bind(t.from_company_id)
        .bind(t.to_company_id)
        .bind(&t.from_company_name)
        .bind(&t.to_company_name)
        .bind(t.amount)
        .bind(t.fee)
        .bind(&t.description)
        .bind(t.status)
        .bind(&t.transaction_hash)
        .bind(&t.idempotency_key)
        .bind(t.created_by)
        .bind(t.created_at)
        .execute(&mut *tx)
        .await?;

        for entry in &plan.entries {
            insert_entry(&mut tx, entry).await?;
        }

        for (id, balance) in [
            (t.from_company_id, plan.sender_balance),
            (t.to_company_id, plan.recipient_balance),
        ] {
            sqlx::query("UPDATE companies SET wallet_balance = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(balance)
                .bind(t.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(transaction_id = %t.id, "Transfer committed");
        Ok(TransferOutcome::Created(plan.transaction))
    }
}

async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, company_id, transaction_id, kind, amount, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.id)
    .bind(entry.company_id)
    .bind(entry.transaction_id)
    .bind(entry.kind)
    .bind(entry.amount)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// `%term%` for ILIKE with the pattern metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_company_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CompanyFilter) {
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(&term);
        qb.push(" AND (company_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR business_email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR contact_person ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(industry) = filter.industry {
        qb.push(" AND industry = ").push_bind(industry);
    }
    if let Some(status) = filter.registration_status {
        qb.push(" AND registration_status = ").push_bind(status);
    }
    if let Some(kyc) = filter.kyc_status {
        qb.push(" AND kyc_status = ").push_bind(kyc);
    }
}

fn unique_conflict(error: sqlx::Error, message: &str) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(error),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_user(&self, login: &LoginProfile) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, picture_url, user_role)
            VALUES ($1, $2, $3, $4, COALESCE($5::user_role, 'company_user'))
            ON CONFLICT (email) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                picture_url = EXCLUDED.picture_url,
                user_role = COALESCE($5::user_role, users.user_role)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(login.email.to_lowercase())
        .bind(&login.full_name)
        .bind(&login.picture_url)
        .bind(login.role_override)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn link_user_company(&self, user_id: Uuid, company_id: Uuid) -> AppResult<bool> {
        let linked = sqlx::query(
            r#"
            UPDATE users SET company_id = c.id
            FROM companies c
            WHERE users.id = $1 AND c.id = $2 AND users.company_id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if linked > 0 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1) \
             AND EXISTS (SELECT 1 FROM companies WHERE id = $2)",
        )
        .bind(user_id)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        if exists {
            Ok(false)
        } else {
            Err(AppError::NotFound(format!("User {} or company {}", user_id, company_id)))
        }
    }

    async fn create_company(&self, new: NewCompany) -> AppResult<Company> {
        let c = companies::company_from_registration(new);
        let mut tx = self.pool.begin().await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, company_name, business_email, contact_person, phone_number,
                business_address, tax_id, industry, kyc_status, registration_status,
                wallet_address, wallet_balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(&c.company_name)
        .bind(&c.business_email)
        .bind(&c.contact_person)
        .bind(&c.phone_number)
        .bind(&c.business_address)
        .bind(&c.tax_id)
        .bind(c.industry)
        .bind(c.kyc_status)
        .bind(c.registration_status)
        .bind(&c.wallet_address)
        .bind(c.wallet_balance)
        .bind(c.created_at)
        .bind(c.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "Wallet address already assigned"))?;

        if company.wallet_balance > Decimal::ZERO {
            let entry = ledger::funding_entry(company.id, company.wallet_balance, company.created_at);
            insert_entry(&mut tx, &entry).await?;
        }

        tx.commit().await?;
        info!(company_id = %company.id, name = %company.company_name, "Company registered");
        Ok(company)
    }

    async fn get_company(&self, id: Uuid) -> AppResult<Option<Company>> {
        let company = sqlx::query_as("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    async fn list_companies(&self, query: &CompanyQuery) -> AppResult<Vec<Company>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM companies WHERE TRUE");
        push_company_filter(&mut qb, &query.filter);
        if let Some(id) = query.only_id {
            qb.push(" AND id = ").push_bind(id);
        }
        qb.push(" ORDER BY ").push(query.sort.sql());
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows = qb.build_query_as::<Company>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn company_directory(&self, filter: &CompanyFilter) -> AppResult<Vec<CompanyBasicInfo>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(DIRECTORY_COLUMNS).push(" FROM companies WHERE TRUE");
        push_company_filter(&mut qb, filter);
        qb.push(" ORDER BY company_name ASC");

        let rows = qb
            .build_query_as::<CompanyBasicInfo>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_company(
        &self,
        id: Uuid,
        changes: &UpdateCompanyRequest,
    ) -> AppResult<Option<Company>> {
        let mut tx = self.pool.begin().await?;
        let current: Option<Company> =
            sqlx::query_as("SELECT * FROM companies WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(mut company) = current else {
            return Ok(None);
        };
        companies::apply_update(&mut company, changes);

        let updated = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies SET
                company_name = $2, business_email = $3, contact_person = $4, phone_number = $5,
                business_address = $6, tax_id = $7, industry = $8, kyc_status = $9,
                registration_status = $10, updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(company.id)
        .bind(&company.company_name)
        .bind(&company.business_email)
        .bind(&company.contact_person)
        .bind(&company.phone_number)
        .bind(&company.business_address)
        .bind(&company.tax_id)
        .bind(company.industry)
        .bind(company.kyc_status)
        .bind(company.registration_status)
        .bind(company.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_company(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM companies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Ok(false);
        }

        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE from_company_id = $1 OR to_company_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_history {
            return Err(AppError::Conflict(
                "Company has transactions and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM ledger_entries WHERE company_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(company_id = %id, "Company deleted");
        Ok(true)
    }

    async fn provision_wallet(
        &self,
        id: Uuid,
        address: String,
        initial_balance: Decimal,
    ) -> AppResult<Company> {
        let mut tx = self.pool.begin().await?;
        let current: Company = sqlx::query_as("SELECT * FROM companies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Company {}", id)))?;
        if current.wallet_address.is_some() {
            return Err(AppError::Conflict(format!(
                "{} already has a wallet",
                current.company_name
            )));
        }

        let now = Utc::now();
        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET wallet_address = $2, wallet_balance = wallet_balance + $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&address)
        .bind(initial_balance)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "Wallet address already assigned"))?;

        if initial_balance > Decimal::ZERO {
            insert_entry(&mut tx, &ledger::funding_entry(id, initial_balance, now)).await?;
        }

        tx.commit().await?;
        Ok(company)
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> AppResult<TransferOutcome> {
        with_retry(&self.transfer_retry, AppError::is_transient, || {
            self.try_transfer(request)
        })
        .await
    }

    async fn ledger_entries(&self, company_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as(
            "SELECT * FROM ledger_entries WHERE company_id = $1 ORDER BY created_at DESC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        let row = sqlx::query_as("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> AppResult<Vec<Transaction>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM transactions WHERE TRUE");
        for party in [query.scope_company_id, query.company_id].into_iter().flatten() {
            qb.push(" AND (from_company_id = ")
                .push_bind(party)
                .push(" OR to_company_id = ")
                .push_bind(party)
                .push(")");
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(min) = query.min_amount {
            qb.push(" AND amount >= ").push_bind(min);
        }
        if let Some(max) = query.max_amount {
            qb.push(" AND amount <= ").push_bind(max);
        }
        if let Some(from) = query.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
        if let Some(term) = query.search_term() {
            let pattern = like_pattern(&term);
            qb.push(" AND (from_company_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR to_company_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR transaction_hash ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY ").push(query.sort.sql());
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows = qb.build_query_as::<Transaction>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn list_insights(&self, status: InsightStatus) -> AppResult<Vec<Insight>> {
        let rows = sqlx::query_as("SELECT * FROM insights WHERE status = $1 ORDER BY created_at DESC")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_insight(&self, request: &CreateInsightRequest) -> AppResult<Insight> {
        let insight = sqlx::query_as::<_, Insight>(
            r#"
            INSERT INTO insights (id, title, description, metric_label, metric_value, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.metric_label)
        .bind(&request.metric_value)
        .bind(&request.logo_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(insight)
    }

    async fn set_insight_status(&self, id: Uuid, status: InsightStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE insights SET status = $2, is_new = FALSE WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
