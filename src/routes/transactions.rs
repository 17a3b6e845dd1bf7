use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::caller;
use crate::auth::{AuthUser, Scope};
use crate::history::{
    self, start_of_day, DateRange, TransactionQuery, TransactionStats, TransactionSummary,
    DEFAULT_TRANSACTION_SORT,
};
use crate::models::{AppState, Transaction};
use crate::types::{parse_filter, AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/transactions", get(list_transactions))
        .route("/api/transactions/stats", get(stats))
        .route("/api/transactions/export", get(export))
        .route("/api/transactions/{id}", get(get_transaction))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub range: Option<String>,
    /// Inclusive start date.
    pub from: Option<NaiveDate>,
    /// Inclusive end date.
    pub to: Option<NaiveDate>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

fn parse_company(raw: Option<&str>) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => Uuid::parse_str(v)
            .map(Some)
            .map_err(|_| AppError::InvalidRequest(format!("invalid company id '{}'", v))),
    }
}

/// Builds the store query for a caller. `None` means the caller can see no
/// transactions at all.
pub fn build_query(params: &TransactionParams, scope: Scope) -> AppResult<Option<TransactionQuery>> {
    let scope_company_id = match scope {
        Scope::Everything => None,
        Scope::Company(id) => Some(id),
        Scope::Nothing => return Ok(None),
    };

    let range: DateRange = params.range.as_deref().unwrap_or("all").parse()?;
    let from = params
        .from
        .map(start_of_day)
        .or_else(|| range.start(Utc::now()));
    let to = params.to.map(|d| start_of_day(d) + Duration::days(1));

    if let (Some(min), Some(max)) = (params.min_amount, params.max_amount) {
        if min > max {
            return Err(AppError::InvalidRequest(
                "min_amount cannot exceed max_amount".to_string(),
            ));
        }
    }

    Ok(Some(TransactionQuery {
        scope_company_id,
        company_id: parse_company(params.company.as_deref())?,
        status: parse_filter(params.status.as_deref())?,
        search: params.search.clone(),
        min_amount: params.min_amount,
        max_amount: params.max_amount,
        from,
        to,
        sort: match params.sort.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_TRANSACTION_SORT,
            Some(raw) => raw.parse()?,
        },
        limit: params.limit,
    }))
}

async fn visible_transactions(
    state: &AppState,
    auth: &AuthUser,
    params: &TransactionParams,
) -> AppResult<Vec<Transaction>> {
    let (_, scope) = caller(state, auth).await?;
    match build_query(params, scope)? {
        Some(query) => state.store.list_transactions(&query).await,
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Serialize)]
struct TransactionList {
    transactions: Vec<Transaction>,
    summary: TransactionSummary,
}

async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<TransactionParams>,
) -> AppResult<Json<TransactionList>> {
    let transactions = visible_transactions(&state, &auth, &params).await?;
    debug!(count = transactions.len(), "Listed transactions");
    Ok(Json(TransactionList {
        summary: TransactionSummary::from_transactions(&transactions),
        transactions,
    }))
}

async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Transaction>> {
    let (_, scope) = caller(&state, &auth).await?;
    let tx = state
        .store
        .get_transaction(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))?;

    let visible = match scope {
        Scope::Everything => true,
        Scope::Company(own) => tx.involves(own),
        Scope::Nothing => false,
    };
    if !visible {
        return Err(AppError::Forbidden(
            "You can only view your company's transactions".to_string(),
        ));
    }
    Ok(Json(tx))
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    company_id: Option<Uuid>,
}

async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<StatsParams>,
) -> AppResult<Json<TransactionStats>> {
    let (_, scope) = caller(&state, &auth).await?;
    if let Some(id) = params.company_id {
        if !scope.allows(id) {
            return Err(AppError::Forbidden(
                "You can only view your company's statistics".to_string(),
            ));
        }
    }

    let transactions = match scope {
        Scope::Nothing => Vec::new(),
        Scope::Everything | Scope::Company(_) => {
            let query = TransactionQuery {
                scope_company_id: match scope {
                    Scope::Company(own) => Some(own),
                    _ => None,
                },
                company_id: params.company_id,
                ..Default::default()
            };
            state.store.list_transactions(&query).await?
        }
    };

    Ok(Json(TransactionStats::from_transactions(&transactions)))
}

async fn export(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<TransactionParams>,
) -> AppResult<Response> {
    let transactions = visible_transactions(&state, &auth, &params).await?;
    let body = history::export_csv(&transactions)?;
    let filename = format!(
        "attachment; filename=\"transactions-{}.csv\"",
        Utc::now().format("%Y-%m-%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_query_dates_and_scope() {
        let acme = Uuid::new_v4();
        let params = TransactionParams {
            from: NaiveDate::from_ymd_opt(2025, 11, 1),
            to: NaiveDate::from_ymd_opt(2025, 11, 30),
            status: Some("all".into()),
            sort: Some("-amount".into()),
            ..Default::default()
        };

        let query = build_query(&params, Scope::Company(acme)).unwrap().unwrap();
        assert_eq!(query.scope_company_id, Some(acme));
        assert_eq!(query.status, None);
        assert_eq!(query.from, Some(Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap()));
        assert_eq!(query.to, Some(Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()));
        assert!(query.sort.descending);

        assert!(build_query(&params, Scope::Nothing).unwrap().is_none());
    }

    #[test]
    fn test_build_query_rejects_bad_input() {
        let bad_range = TransactionParams {
            range: Some("fortnight".into()),
            ..Default::default()
        };
        assert!(build_query(&bad_range, Scope::Everything).is_err());

        let inverted = TransactionParams {
            min_amount: Some(Decimal::from(10)),
            max_amount: Some(Decimal::from(5)),
            ..Default::default()
        };
        assert!(build_query(&inverted, Scope::Everything).is_err());

        let bad_company = TransactionParams {
            company: Some("acme".into()),
            ..Default::default()
        };
        assert!(build_query(&bad_company, Scope::Everything).is_err());
    }
}
