use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{caller, caller_with_role, scoped_transactions};
use crate::auth::{AuthUser, Scope};
use crate::insights::{self, Grouping, MonthFilter, SpendQuery, SpendReport};
use crate::models::{AppState, CreateInsightRequest, Insight};
use crate::types::{AppError, AppResult, InsightStatus, Role};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/insights", get(list_insights).post(create_insight))
        .route("/api/insights/spend", get(spend))
        .route("/api/insights/{id}/dismiss", post(dismiss))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct InsightList {
    insights: Vec<Insight>,
    total_savings: Decimal,
}

async fn list_insights(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<InsightList>> {
    let insights = state.store.list_insights(InsightStatus::Active).await?;
    Ok(Json(InsightList {
        total_savings: insights::total_savings(&insights),
        insights,
    }))
}

async fn create_insight(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateInsightRequest>,
) -> AppResult<(StatusCode, Json<Insight>)> {
    caller_with_role(&state, &auth, &[Role::BackOfficeAdmin]).await?;
    request.validate()?;
    let insight = state.store.create_insight(&request).await?;
    info!(insight_id = %insight.id, title = %insight.title, "Insight published");
    Ok((StatusCode::CREATED, Json(insight)))
}

async fn dismiss(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state
        .store
        .set_insight_status(id, InsightStatus::Dismissed)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Insight {}", id)))
    }
}

#[derive(Debug, Deserialize)]
struct SpendParams {
    search: Option<String>,
    month: Option<String>,
    grouping: Option<String>,
}

/// A company's spend is what it sent; admins see platform-wide volume.
async fn spend(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SpendParams>,
) -> AppResult<Json<SpendReport>> {
    let query = SpendQuery {
        search: params.search,
        month: params.month.as_deref().unwrap_or("all").parse::<MonthFilter>()?,
        grouping: params.grouping.as_deref().unwrap_or("daily").parse::<Grouping>()?,
    };

    let (_, scope) = caller(&state, &auth).await?;
    let mut transactions = scoped_transactions(&state, scope).await?;
    if let Scope::Company(own) = scope {
        transactions.retain(|t| t.from_company_id == own);
    }

    Ok(Json(insights::spend_report(&transactions, &query)))
}
