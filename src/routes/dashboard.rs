use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{caller, scoped_companies, scoped_transactions};
use crate::auth::AuthUser;
use crate::history;
use crate::models::{AppState, Transaction};
use crate::types::AppResult;

const RECENT_TRANSACTIONS: usize = 10;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_balance: Decimal,
    pub total_companies: usize,
    pub total_transactions: usize,
    pub monthly_volume: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub recent_transactions: Vec<Transaction>,
}

async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DashboardResponse>> {
    let (_, scope) = caller(&state, &auth).await?;
    let companies = scoped_companies(&state, scope).await?;
    let mut transactions = scoped_transactions(&state, scope).await?;

    let stats = DashboardStats {
        total_balance: companies.iter().map(|c| c.wallet_balance).sum(),
        total_companies: companies.len(),
        total_transactions: transactions.len(),
        monthly_volume: history::monthly_volume(&transactions, Utc::now()),
    };
    transactions.truncate(RECENT_TRANSACTIONS);

    Ok(Json(DashboardResponse {
        stats,
        recent_transactions: transactions,
    }))
}
