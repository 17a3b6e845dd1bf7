//! Wallet Ledger
//!
//! Double-entry bookkeeping for the simulated USDC wallets. Every movement of
//! money is a set of signed [`LedgerEntry`] rows; a company's `wallet_balance`
//! is the running sum of its entries and is only ever changed together with
//! them inside one storage transaction.
//!
//! This module holds the storage-independent rules: request validation,
//! transfer planning against locked balances, hash and address derivation, and
//! reconciliation. The [`crate::db::Store`] implementations apply a plan
//! atomically.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Company, LedgerEntry, Transaction};
use crate::types::{AppError, AppResult, EntryKind, RegistrationStatus, TransactionStatus};

/// USDC carries six decimal places.
pub const USDC_SCALE: u32 = 6;

pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct LedgerLimits {
    pub max_amount: Decimal,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_amount: Decimal::from(50_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_company_id: Uuid,
    pub to_company_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub idempotency_key: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Created(Transaction),
    /// The idempotency key was already used for this exact transfer.
    Replayed(Transaction),
}

impl TransferOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            TransferOutcome::Created(tx) | TransferOutcome::Replayed(tx) => tx,
        }
    }

    pub fn into_parts(self) -> (Transaction, bool) {
        match self {
            TransferOutcome::Created(tx) => (tx, false),
            TransferOutcome::Replayed(tx) => (tx, true),
        }
    }
}

/// Everything a store must write for one transfer.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub transaction: Transaction,
    pub entries: [LedgerEntry; 2],
    pub sender_balance: Decimal,
    pub recipient_balance: Decimal,
}

pub fn validate_transfer(request: &TransferRequest, limits: &LedgerLimits) -> AppResult<()> {
    if request.from_company_id == request.to_company_id {
        return Err(AppError::Validation(
            "Cannot send payment to the same company".to_string(),
        ));
    }
    if request.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Please enter a valid payment amount".to_string(),
        ));
    }
    if request.amount.normalize().scale() > USDC_SCALE {
        return Err(AppError::Validation(format!(
            "Amount supports at most {} decimal places",
            USDC_SCALE
        )));
    }
    if request.amount > limits.max_amount {
        return Err(AppError::Validation(format!(
            "Maximum payment amount is ${} USDC",
            format_thousands(limits.max_amount)
        )));
    }
    if request.idempotency_key.trim().is_empty() {
        return Err(AppError::InvalidRequest("Idempotency key is required".to_string()));
    }
    if request.idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Idempotency key exceeds {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    if request
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
    {
        return Err(AppError::Validation(format!(
            "Description exceeds {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

/// Decides whether an earlier transaction with the same idempotency key
/// answers this request.
pub fn resolve_replay(existing: Transaction, request: &TransferRequest) -> AppResult<TransferOutcome> {
    if existing.to_company_id == request.to_company_id && existing.amount == request.amount {
        Ok(TransferOutcome::Replayed(existing))
    } else {
        Err(AppError::Conflict(format!(
            "Idempotency key '{}' was already used for a different payment",
            request.idempotency_key
        )))
    }
}

/// Checks a transfer against the locked sender and recipient rows and
/// produces the rows to write.
pub fn plan_transfer(
    request: &TransferRequest,
    sender: &Company,
    recipient: &Company,
    now: DateTime<Utc>,
) -> AppResult<TransferPlan> {
    if sender.registration_status != RegistrationStatus::Active {
        return Err(AppError::Forbidden(format!(
            "{} is {} and cannot send payments",
            sender.company_name, sender.registration_status
        )));
    }
    if recipient.registration_status != RegistrationStatus::Active {
        return Err(AppError::Forbidden(format!(
            "{} is {} and cannot receive payments",
            recipient.company_name, recipient.registration_status
        )));
    }
    if recipient.wallet_address.is_none() {
        return Err(AppError::Validation(format!(
            "{} has no wallet yet",
            recipient.company_name
        )));
    }

    let fee = Decimal::ZERO;
    let required = request.amount + fee;
    if sender.wallet_balance < required {
        return Err(AppError::InsufficientFunds {
            available: sender.wallet_balance,
            required,
        });
    }

    let id = Uuid::new_v4();
    let transaction = Transaction {
        id,
        from_company_id: sender.id,
        to_company_id: recipient.id,
        from_company_name: sender.company_name.clone(),
        to_company_name: recipient.company_name.clone(),
        amount: request.amount,
        fee,
        description: request.description.clone(),
        status: TransactionStatus::Completed,
        transaction_hash: transaction_hash(id, sender.id, recipient.id, request.amount, now),
        idempotency_key: request.idempotency_key.clone(),
        created_by: request.created_by,
        created_at: now,
    };

    let entries = [
        LedgerEntry {
            id: Uuid::new_v4(),
            company_id: sender.id,
            transaction_id: Some(id),
            kind: EntryKind::Debit,
            amount: -required,
            created_at: now,
        },
        LedgerEntry {
            id: Uuid::new_v4(),
            company_id: recipient.id,
            transaction_id: Some(id),
            kind: EntryKind::Credit,
            amount: request.amount,
            created_at: now,
        },
    ];

    Ok(TransferPlan {
        transaction,
        entries,
        sender_balance: sender.wallet_balance - required,
        recipient_balance: recipient.wallet_balance + request.amount,
    })
}

/// Initial wallet funding for a newly provisioned company.
pub fn funding_entry(company_id: Uuid, amount: Decimal, now: DateTime<Utc>) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        company_id,
        transaction_id: None,
        kind: EntryKind::Funding,
        amount,
        created_at: now,
    }
}

/// `0x` followed by the hex SHA-256 of the transfer's identifying fields.
pub fn transaction_hash(
    id: Uuid,
    from: Uuid,
    to: Uuid,
    amount: Decimal,
    at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(from.as_bytes());
    hasher.update(to.as_bytes());
    hasher.update(amount.normalize().to_string().as_bytes());
    hasher.update(at.timestamp_micros().to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// A fresh simulated wallet address: `0x` and 40 hex characters.
pub fn wallet_address() -> String {
    let mut bytes = [0u8; 20];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub company_id: Uuid,
    pub company_name: String,
    pub wallet_balance: Decimal,
    pub ledger_balance: Decimal,
}

pub fn ledger_balance(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().map(|e| e.amount).sum()
}

/// Compares a company's stored balance with the sum of its entries.
pub fn reconcile(company: &Company, entries: &[LedgerEntry]) -> Option<Discrepancy> {
    let ledger = ledger_balance(entries);
    (ledger != company.wallet_balance).then(|| Discrepancy {
        company_id: company.id,
        company_name: company.company_name.clone(),
        wallet_balance: company.wallet_balance,
        ledger_balance: ledger,
    })
}

fn format_thousands(value: Decimal) -> String {
    let whole = value.trunc().to_string();
    let digits: Vec<char> = whole.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}
