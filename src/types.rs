// Type definitions, enums and the application error

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Declares a string-backed enum shared by the API, the Postgres enum type and
/// query-string filters.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $pg:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(type_name = $pg, rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::InvalidRequest(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// Who a signed-in user is to the platform.
    Role as "user_role" {
        BackOfficeAdmin => "back_office_admin",
        CompanyUser => "company_user",
    }
}

text_enum! {
    /// Know-your-customer state. Recorded, not enforced on transfers.
    KycStatus as "kyc_status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Whether a company may send or receive payments.
    RegistrationStatus as "registration_status" {
        Active => "active",
        Pending => "pending",
        Suspended => "suspended",
    }
}

text_enum! {
    TransactionStatus as "transaction_status" {
        Completed => "completed",
        Pending => "pending",
        Failed => "failed",
    }
}

text_enum! {
    Industry as "industry" {
        Technology => "technology",
        Finance => "finance",
        Healthcare => "healthcare",
        Retail => "retail",
        Manufacturing => "manufacturing",
        Consulting => "consulting",
        Media => "media",
        RealEstate => "real_estate",
        Other => "other",
    }
}

text_enum! {
    /// Why a ledger entry moved money.
    EntryKind as "entry_kind" {
        Funding => "funding",
        Debit => "debit",
        Credit => "credit",
    }
}

text_enum! {
    InsightStatus as "insight_status" {
        Active => "active",
        Dismissed => "dismissed",
    }
}

/// Parses an optional query-string filter where `all` and the empty string
/// mean "no filter".
pub fn parse_filter<T: FromStr<Err = AppError>>(raw: Option<&str>) -> AppResult<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds: balance {available} USDC, required {required} USDC")]
    InsufficientFunds {
        available: rust_decimal::Decimal,
        required: rust_decimal::Decimal,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) | AppError::InsufficientFunds { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Storage errors worth replaying the whole unit of work for.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                // serialization_failure, deadlock_detected, unique_violation
                Some("40001") | Some("40P01") | Some("23505")
            ),
            AppError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Never leak driver messages to clients.
        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                serde_json::json!({ "error": "Database error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                serde_json::json!({ "error": "Internal error" })
            }
            AppError::InsufficientFunds { available, required } => serde_json::json!({
                "error": "Insufficient funds in your wallet",
                "details": {
                    "available": available.to_string(),
                    "required": required.to_string(),
                }
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
