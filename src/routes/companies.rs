use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{caller, caller_with_role};
use crate::auth::{AuthUser, Scope};
use crate::companies::{self, CompanyFilter, CompanyQuery, CompanySort, DEFAULT_COMPANY_SORT};
use crate::ledger;
use crate::models::{
    AppState, Company, CompanyBasicInfo, RegisterCompanyRequest, UpdateCompanyRequest,
};
use crate::types::{parse_filter, AppError, AppResult, Role};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/companies", post(register_company).get(list_companies))
        .route("/api/companies/directory", get(directory))
        .route(
            "/api/companies/{id}",
            get(get_company).patch(update_company).delete(delete_company),
        )
        .route("/api/companies/{id}/wallet", post(provision_wallet))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyParams {
    pub search: Option<String>,
    pub industry: Option<String>,
    pub status: Option<String>,
    pub kyc_status: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

impl CompanyParams {
    fn filter(&self) -> AppResult<CompanyFilter> {
        Ok(CompanyFilter {
            search: self.search.clone(),
            industry: parse_filter(self.industry.as_deref())?,
            registration_status: parse_filter(self.status.as_deref())?,
            kyc_status: parse_filter(self.kyc_status.as_deref())?,
        })
    }

    fn sort(&self) -> AppResult<CompanySort> {
        match self.sort.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_COMPANY_SORT),
            Some(raw) => raw.parse(),
        }
    }
}

async fn register_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RegisterCompanyRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    let (user, _) = caller(&state, &auth).await?;
    let new = companies::prepare_registration(request, state.config.wallet.initial_balance)?;
    let company = state.store.create_company(new).await?;

    let linked = user.user_role == Role::CompanyUser
        && user.company_id.is_none()
        && state.store.link_user_company(user.id, company.id).await?;

    info!(
        company_id = %company.id,
        registered_by = %user.id,
        linked,
        industry = %company.industry,
        "Company registered"
    );
    Ok((StatusCode::CREATED, Json(company)))
}

async fn list_companies(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<CompanyParams>,
) -> AppResult<Json<Vec<Company>>> {
    let (_, scope) = caller(&state, &auth).await?;
    let only_id = match scope {
        Scope::Everything => None,
        Scope::Company(id) => Some(id),
        Scope::Nothing => return Ok(Json(Vec::new())),
    };

    let query = CompanyQuery {
        filter: params.filter()?,
        only_id,
        sort: params.sort()?,
        limit: params.limit,
    };
    Ok(Json(state.store.list_companies(&query).await?))
}

async fn directory(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<CompanyParams>,
) -> AppResult<Json<Vec<CompanyBasicInfo>>> {
    Ok(Json(state.store.company_directory(&params.filter()?).await?))
}

async fn get_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let (_, scope) = caller(&state, &auth).await?;
    if !scope.allows(id) {
        return Err(AppError::Forbidden("You can only view your own company".to_string()));
    }
    state
        .store
        .get_company(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Company {}", id)))
}

async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<UpdateCompanyRequest>,
) -> AppResult<Json<Company>> {
    caller_with_role(&state, &auth, &[Role::BackOfficeAdmin]).await?;
    let changes = companies::prepare_update(changes)?;

    let company = state
        .store
        .update_company(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {}", id)))?;

    info!(company_id = %id, kyc = %company.kyc_status, status = %company.registration_status, "Company updated");
    Ok(Json(company))
}

async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    caller_with_role(&state, &auth, &[Role::BackOfficeAdmin]).await?;
    if state.store.delete_company(id).await? {
        info!(company_id = %id, "Company deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Company {}", id)))
    }
}

async fn provision_wallet(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let (_, scope) = caller(&state, &auth).await?;
    if !scope.allows(id) {
        return Err(AppError::Forbidden(
            "You can only manage your own company's wallet".to_string(),
        ));
    }

    let company = state
        .store
        .provision_wallet(id, ledger::wallet_address(), state.config.wallet.initial_balance)
        .await?;
    info!(company_id = %id, balance = %company.wallet_balance, "Wallet provisioned");
    Ok(Json(company))
}
