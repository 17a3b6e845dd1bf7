//! In-process store used when no database is configured and by tests.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{LoginProfile, Store};
use crate::companies::{self, CompanyFilter, CompanyQuery};
use crate::history::{self, TransactionQuery};
use crate::ledger::{self, TransferOutcome, TransferRequest};
use crate::models::{
    Company, CompanyBasicInfo, CreateInsightRequest, Insight, LedgerEntry, NewCompany,
    Transaction, UpdateCompanyRequest, User,
};
use crate::types::{AppError, AppResult, InsightStatus, Role};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    companies: HashMap<Uuid, Company>,
    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
    insights: Vec<Insight>,
}

/// Holds everything behind one lock; a write guard is the unit of atomicity.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn limit<T>(mut rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(n) = limit {
        rows.truncate(n.max(0) as usize);
    }
    rows
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn upsert_user(&self, login: &LoginProfile) -> AppResult<User> {
        let mut state = self.state.write().await;
        let existing = state
            .users
            .values_mut()
            .find(|u| u.email.eq_ignore_ascii_case(&login.email));

        if let Some(user) = existing {
            user.full_name = login.full_name.clone();
            user.picture_url = login.picture_url.clone();
            if let Some(role) = login.role_override {
                user.user_role = role;
            }
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            email: login.email.to_lowercase(),
            full_name: login.full_name.clone(),
            picture_url: login.picture_url.clone(),
            user_role: login.role_override.unwrap_or(Role::CompanyUser),
            company_id: None,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        info!(email = %user.email, role = %user.user_role, "Created user");
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn link_user_company(&self, user_id: Uuid, company_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state.companies.contains_key(&company_id) {
            return Err(AppError::NotFound(format!("Company {}", company_id)));
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        if user.company_id.is_some() {
            return Ok(false);
        }
        user.company_id = Some(company_id);
        Ok(true)
    }

    async fn create_company(&self, new: NewCompany) -> AppResult<Company> {
        let mut state = self.state.write().await;
        if state
            .companies
            .values()
            .any(|c| c.wallet_address.as_deref() == Some(new.wallet_address.as_str()))
        {
            return Err(AppError::Conflict("Wallet address already assigned".to_string()));
        }

        let company = companies::company_from_registration(new);
        if company.wallet_balance > Decimal::ZERO {
            state.entries.push(ledger::funding_entry(
                company.id,
                company.wallet_balance,
                company.created_at,
            ));
        }
        state.companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn get_company(&self, id: Uuid) -> AppResult<Option<Company>> {
        Ok(self.state.read().await.companies.get(&id).cloned())
    }

    async fn list_companies(&self, query: &CompanyQuery) -> AppResult<Vec<Company>> {
        let state = self.state.read().await;
        let mut rows: Vec<Company> = state
            .companies
            .values()
            .filter(|c| query.only_id.map_or(true, |id| c.id == id))
            .filter(|c| query.filter.matches(c))
            .cloned()
            .collect();
        companies::sort_companies(&mut rows, &query.sort);
        Ok(limit(rows, query.limit))
    }

    async fn company_directory(&self, filter: &CompanyFilter) -> AppResult<Vec<CompanyBasicInfo>> {
        let state = self.state.read().await;
        let mut rows: Vec<CompanyBasicInfo> = state
            .companies
            .values()
            .map(CompanyBasicInfo::from)
            .filter(|c| filter.matches_basic(c))
            .collect();
        rows.sort_by(|a, b| a.company_name.cmp(&b.company_name));
        Ok(rows)
    }

    async fn update_company(
        &self,
        id: Uuid,
        changes: &UpdateCompanyRequest,
    ) -> AppResult<Option<Company>> {
        let mut state = self.state.write().await;
        Ok(state.companies.get_mut(&id).map(|company| {
            companies::apply_update(company, changes);
            company.clone()
        }))
    }

    async fn delete_company(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state.companies.contains_key(&id) {
            return Ok(false);
        }
        if state.transactions.iter().any(|t| t.involves(id)) {
            return Err(AppError::Conflict(
                "Company has transactions and cannot be deleted".to_string(),
            ));
        }
        state.entries.retain(|e| e.company_id != id);
        for user in state.users.values_mut() {
            if user.company_id == Some(id) {
                user.company_id = None;
            }
        }
        state.companies.remove(&id);
        Ok(true)
    }

    async fn provision_wallet(
        &self,
        id: Uuid,
        address: String,
        initial_balance: Decimal,
    ) -> AppResult<Company> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let company = state
            .companies
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Company {}", id)))?;
        if company.wallet_address.is_some() {
            return Err(AppError::Conflict(format!(
                "{} already has a wallet",
                company.company_name
            )));
        }
        company.wallet_address = Some(address);
        company.wallet_balance += initial_balance;
        company.updated_at = now;
        let company = company.clone();

        if initial_balance > Decimal::ZERO {
            state
                .entries
                .push(ledger::funding_entry(id, initial_balance, now));
        }
        Ok(company)
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> AppResult<TransferOutcome> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.transactions.iter().find(|t| {
            t.from_company_id == request.from_company_id
                && t.idempotency_key == request.idempotency_key
        }) {
            return ledger::resolve_replay(existing.clone(), request);
        }

        let sender = state
            .companies
            .get(&request.from_company_id)
            .ok_or_else(|| AppError::NotFound("Sending company not found".to_string()))?;
        let recipient = state
            .companies
            .get(&request.to_company_id)
            .ok_or_else(|| AppError::NotFound("Recipient company not found".to_string()))?;

        let now = Utc::now();
        let plan = ledger::plan_transfer(request, sender, recipient, now)?;

        if let Some(sender) = state.companies.get_mut(&request.from_company_id) {
            sender.wallet_balance = plan.sender_balance;
            sender.updated_at = now;
        }
        if let Some(recipient) = state.companies.get_mut(&request.to_company_id) {
            recipient.wallet_balance = plan.recipient_balance;
            recipient.updated_at = now;
        }
        state.entries.extend(plan.entries);
        state.transactions.push(plan.transaction.clone());

        Ok(TransferOutcome::Created(plan.transaction))
    }

    async fn ledger_entries(&self, company_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut rows: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> AppResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        history::sort_transactions(&mut rows, &query.sort);
        Ok(limit(rows, query.limit))
    }

    async fn list_insights(&self, status: InsightStatus) -> AppResult<Vec<Insight>> {
        let state = self.state.read().await;
        let mut rows: Vec<Insight> = state
            .insights
            .iter()
            .filter(|i| i.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create_insight(&self, request: &CreateInsightRequest) -> AppResult<Insight> {
        let insight = Insight {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            description: request.description.clone(),
            metric_label: request.metric_label.clone(),
            metric_value: request.metric_value.clone(),
            logo_url: request.logo_url.clone(),
            is_new: true,
            status: InsightStatus::Active,
            created_at: Utc::now(),
        };
        self.state.write().await.insights.push(insight.clone());
        Ok(insight)
    }

    async fn set_insight_status(&self, id: Uuid, status: InsightStatus) -> AppResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.insights.iter_mut().find(|i| i.id == id) {
            Some(insight) => {
                insight.status = status;
                insight.is_new = false;
                true
            }
            None => false,
        })
    }
}
