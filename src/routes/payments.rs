use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use super::caller_with_role;
use crate::auth::AuthUser;
use crate::ledger::{self, LedgerLimits, TransferRequest};
use crate::models::{AppState, PaymentRequest, TransferReceipt};
use crate::types::{AppError, AppResult, Role};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/payments", post(send_payment))
        .with_state(state)
}

/// Header wins over the body; a missing key gets a fresh one.
fn idempotency_key(headers: &HeaderMap, body: Option<&str>) -> String {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(body)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn send_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> AppResult<(StatusCode, Json<TransferReceipt>)> {
    let (user, _) = caller_with_role(&state, &auth, &[Role::CompanyUser]).await?;
    state.payment_limiter.check(user.id)?;

    let from_company_id = user.company_id.ok_or_else(|| {
        AppError::Forbidden("Register your company before sending payments".to_string())
    })?;

    let transfer = TransferRequest {
        from_company_id,
        to_company_id: request.to_company_id,
        amount: request.amount,
        description: request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        idempotency_key: idempotency_key(&headers, request.idempotency_key.as_deref()),
        created_by: Some(user.id),
    };

    ledger::validate_transfer(
        &transfer,
        &LedgerLimits {
            max_amount: state.config.payments.max_amount,
        },
    )?;

    let (tx, replayed) = state.store.execute_transfer(&transfer).await?.into_parts();

    info!(
        transaction_id = %tx.id,
        from = %tx.from_company_id,
        to = %tx.to_company_id,
        amount = %tx.amount,
        replayed,
        "Payment processed"
    );

    let status = if replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(TransferReceipt::new(tx, replayed))))
}
