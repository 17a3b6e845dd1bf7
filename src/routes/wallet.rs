use axum::{extract::State, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use super::{caller, caller_with_role, scoped_companies, scoped_transactions};
use crate::auth::{AuthUser, Scope};
use crate::history::TransactionStats;
use crate::ledger::{self, Discrepancy};
use crate::models::{AppState, LedgerEntry, Transaction};
use crate::types::{AppResult, Role, TransactionStatus};

const RECENT_TRANSACTIONS: usize = 5;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/wallet", get(wallet))
        .route("/api/ledger/reconcile", get(reconcile))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct WalletStats {
    #[serde(flatten)]
    pub totals: TransactionStats,
    pub pending_volume: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AssetShare {
    pub asset: &'static str,
    pub value: Decimal,
    pub percent: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub total_balance: Decimal,
    pub stats: WalletStats,
    pub recent_transactions: Vec<Transaction>,
    pub assets: Vec<AssetShare>,
    pub ledger: Vec<LedgerEntry>,
}

/// Every holding is USDC; the share is all or nothing.
fn asset_breakdown(total_balance: Decimal) -> Vec<AssetShare> {
    vec![AssetShare {
        asset: "USDC",
        value: total_balance,
        percent: if total_balance > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        },
    }]
}

async fn wallet(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<WalletResponse>> {
    let (_, scope) = caller(&state, &auth).await?;
    let companies = scoped_companies(&state, scope).await?;
    let mut transactions = scoped_transactions(&state, scope).await?;

    let total_balance: Decimal = companies.iter().map(|c| c.wallet_balance).sum();
    let stats = WalletStats {
        totals: TransactionStats::from_transactions(&transactions),
        pending_volume: transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .map(|t| t.amount)
            .sum(),
    };
    let ledger = match scope {
        Scope::Company(id) => state.store.ledger_entries(id).await?,
        Scope::Everything | Scope::Nothing => Vec::new(),
    };
    transactions.truncate(RECENT_TRANSACTIONS);

    Ok(Json(WalletResponse {
        total_balance,
        stats,
        recent_transactions: transactions,
        assets: asset_breakdown(total_balance),
        ledger,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

async fn reconcile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ReconcileReport>> {
    caller_with_role(&state, &auth, &[Role::BackOfficeAdmin]).await?;
    let companies = scoped_companies(&state, Scope::Everything).await?;

    let mut discrepancies = Vec::new();
    for company in &companies {
        let entries = state.store.ledger_entries(company.id).await?;
        if let Some(d) = ledger::reconcile(company, &entries) {
            warn!(
                company_id = %d.company_id,
                wallet = %d.wallet_balance,
                ledger = %d.ledger_balance,
                "Ledger discrepancy"
            );
            discrepancies.push(d);
        }
    }

    Ok(Json(ReconcileReport {
        checked: companies.len(),
        discrepancies,
    }))
}
