use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{IdentityVerifier, SessionKeys};
use crate::config::Config;
use crate::db::Store;
use crate::middleware::PaymentRateLimiter;
use crate::types::{
    EntryKind, Industry, InsightStatus, KycStatus, RegistrationStatus, Role, TransactionStatus,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub identity: Arc<dyn IdentityVerifier>,
    pub sessions: SessionKeys,
    pub payment_limiter: PaymentRateLimiter,
}

// Core records
// Note: FromRow is used with runtime query_as so builds don't need DATABASE_URL

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub picture_url: Option<String>,
    pub user_role: Role,
    pub company_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,
    pub company_name: String,
    pub business_email: String,
    pub contact_person: String,
    pub phone_number: String,
    pub business_address: String,
    pub tax_id: Option<String>,
    pub industry: Industry,
    pub kyc_status: KycStatus,
    pub registration_status: RegistrationStatus,
    pub wallet_address: Option<String>,
    pub wallet_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Directory view of a company: what another company may see when picking a
/// payment recipient.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyBasicInfo {
    pub id: Uuid,
    pub company_name: String,
    pub business_email: String,
    pub contact_person: String,
    pub industry: Industry,
    pub registration_status: RegistrationStatus,
    pub kyc_status: KycStatus,
    pub wallet_address: Option<String>,
}

impl From<&Company> for CompanyBasicInfo {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            company_name: company.company_name.clone(),
            business_email: company.business_email.clone(),
            contact_person: company.contact_person.clone(),
            industry: company.industry,
            registration_status: company.registration_status,
            kyc_status: company.kyc_status,
            wallet_address: company.wallet_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub from_company_id: Uuid,
    pub to_company_id: Uuid,
    pub from_company_name: String,
    pub to_company_name: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub transaction_hash: String,
    pub idempotency_key: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn involves(&self, company_id: Uuid) -> bool {
        self.from_company_id == company_id || self.to_company_id == company_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub kind: EntryKind,
    /// Signed: debits are negative.
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Insight {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub metric_label: Option<String>,
    pub metric_value: Option<String>,
    pub logo_url: Option<String>,
    pub is_new: bool,
    pub status: InsightStatus,
    pub created_at: DateTime<Utc>,
}

// API Request/Response types

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySummary {
    pub id: Uuid,
    pub company_name: String,
    pub wallet_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub picture_url: Option<String>,
    pub user_role: Role,
    pub company: Option<CompanySummary>,
}

impl UserProfile {
    pub fn new(user: &User, company: Option<&Company>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            picture_url: user.picture_url.clone(),
            user_role: user.user_role,
            company: company.map(|c| CompanySummary {
                id: c.id,
                company_name: c.company_name.clone(),
                wallet_balance: c.wallet_balance,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterCompanyRequest {
    #[validate(length(min = 1, max = 200, message = "Company name is required"))]
    pub company_name: String,
    #[validate(
        length(min = 1, message = "Business email is required"),
        contains(pattern = "@", message = "Please enter a valid email address")
    )]
    pub business_email: String,
    pub industry: Option<Industry>,
    #[validate(length(min = 1, max = 200, message = "Contact person name is required"))]
    pub contact_person: String,
    #[validate(length(min = 1, max = 50, message = "Phone number is required"))]
    pub phone_number: String,
    #[validate(length(min = 1, max = 500, message = "Business address is required"))]
    pub business_address: String,
    #[validate(length(max = 100, message = "Tax ID is too long"))]
    pub tax_id: Option<String>,
}

/// A validated registration, ready to persist.
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub company_name: String,
    pub business_email: String,
    pub contact_person: String,
    pub phone_number: String,
    pub business_address: String,
    pub tax_id: Option<String>,
    pub industry: Industry,
    pub wallet_address: String,
    pub initial_balance: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 200, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    #[validate(contains(pattern = "@", message = "Please enter a valid email address"))]
    pub business_email: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Contact person cannot be empty"))]
    pub contact_person: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Phone number cannot be empty"))]
    pub phone_number: Option<String>,
    #[validate(length(min = 1, max = 500, message = "Business address cannot be empty"))]
    pub business_address: Option<String>,
    pub tax_id: Option<String>,
    pub industry: Option<Industry>,
    pub kyc_status: Option<KycStatus>,
    pub registration_status: Option<RegistrationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub to_company_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferReceipt {
    pub id: Uuid,
    pub transaction_hash: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: TransactionStatus,
    pub from_company_name: String,
    pub to_company_name: String,
    pub description: Option<String>,
    pub idempotency_key: String,
    pub replayed: bool,
    pub created_at: DateTime<Utc>,
}

impl TransferReceipt {
    pub fn new(tx: Transaction, replayed: bool) -> Self {
        Self {
            id: tx.id,
            transaction_hash: tx.transaction_hash,
            amount: tx.amount,
            fee: tx.fee,
            status: tx.status,
            from_company_name: tx.from_company_name,
            to_company_name: tx.to_company_name,
            description: tx.description,
            idempotency_key: tx.idempotency_key,
            replayed,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInsightRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub metric_label: Option<String>,
    pub metric_value: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}
