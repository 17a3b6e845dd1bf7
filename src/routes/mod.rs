//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/health` - Health checks (public)
//! - `/api/auth` - Google sign-in (public), profile and logout
//! - `/api/navigation` - Role-based navigation items
//! - `/api/companies` - Registration, directory and administration
//! - `/api/payments` - USDC transfers between companies
//! - `/api/transactions` - History, statistics and CSV export
//! - `/api/dashboard`, `/api/wallet`, `/api/ledger` - Balances and reconciliation
//! - `/api/insights` - Savings insights and spend analytics
//! - `/` - Static file serving (frontend)

pub mod auth;
pub mod companies;
pub mod dashboard;
pub mod health;
pub mod insights;
pub mod navigation;
pub mod payments;
pub mod static_files;
pub mod transactions;
pub mod wallet;

use axum::{middleware, Router};
use tracing::info;

use crate::auth::{AuthUser, Scope};
use crate::companies::CompanyQuery;
use crate::history::TransactionQuery;
use crate::middleware::require_auth;
use crate::models::{AppState, Company, Transaction, User};
use crate::types::{AppError, AppResult, Role};

/// Create the main application router
///
/// Routes are organized as follows:
/// - Public API routes: health and sign-in
/// - Every other `/api/` route requires a bearer session
/// - Static files are served from root `/` with an SPA fallback
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let public = Router::new()
        .merge(health::router(state.clone()))
        .merge(auth::public_router(state.clone()));

    let protected = Router::new()
        .merge(auth::router(state.clone()))
        .merge(navigation::router())
        .merge(companies::router(state.clone()))
        .merge(payments::router(state.clone()))
        .merge(transactions::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(wallet::router(state.clone()))
        .merge(insights::router(state.clone()))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(static_files::router())
}

/// Loads the signed-in user's current record; company links can change after
/// the session was issued.
pub(crate) async fn caller(state: &AppState, auth: &AuthUser) -> AppResult<(User, Scope)> {
    let user = state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists".to_string()))?;
    let scope = Scope::for_user(&user);
    Ok((user, scope))
}

/// Like [`caller`], but checks the stored role instead of the one signed into
/// the session, so a demotion takes effect immediately.
pub(crate) async fn caller_with_role(
    state: &AppState,
    auth: &AuthUser,
    allowed: &[Role],
) -> AppResult<(User, Scope)> {
    let (user, scope) = caller(state, auth).await?;
    AuthUser::from(&user).require_role(allowed)?;
    Ok((user, scope))
}

pub(crate) async fn scoped_companies(state: &AppState, scope: Scope) -> AppResult<Vec<Company>> {
    let only_id = match scope {
        Scope::Everything => None,
        Scope::Company(id) => Some(id),
        Scope::Nothing => return Ok(Vec::new()),
    };
    state
        .store
        .list_companies(&CompanyQuery {
            only_id,
            ..Default::default()
        })
        .await
}

/// Newest first.
pub(crate) async fn scoped_transactions(
    state: &AppState,
    scope: Scope,
) -> AppResult<Vec<Transaction>> {
    let scope_company_id = match scope {
        Scope::Everything => None,
        Scope::Company(id) => Some(id),
        Scope::Nothing => return Ok(Vec::new()),
    };
    state
        .store
        .list_transactions(&TransactionQuery {
            scope_company_id,
            ..Default::default()
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{IdentityVerifier, SessionKeys, VerifiedIdentity};
    use crate::config::{
        AuthConfig, Config, DatabaseConfig, LoggingConfig, PaymentsConfig, ServerConfig,
        WalletConfig,
    };
    use crate::db::{LoginProfile, MemoryStore, Store};
    use crate::middleware::PaymentRateLimiter;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::str::FromStr;
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADMIN: &str = "admin@payrail.test";

    /// Treats the credential itself as the verified email.
    struct StubVerifier;

    #[async_trait]
    impl IdentityVerifier for StubVerifier {
        async fn verify(&self, credential: &str) -> AppResult<VerifiedIdentity> {
            if !credential.contains('@') {
                return Err(AppError::Auth("Google rejected the credential".to_string()));
            }
            Ok(VerifiedIdentity {
                email: credential.to_lowercase(),
                full_name: Some("Test User".to_string()),
                picture_url: None,
            })
        }
    }

    fn test_config(rate_per_minute: u32) -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec![],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 0,
            },
            auth: AuthConfig {
                session_secret: "test-secret".to_string(),
                google_client_id: "client".to_string(),
                google_tokeninfo_url: "http://127.0.0.1:9/tokeninfo".to_string(),
                max_jwt_expiration: 600,
                admin_emails: vec![ADMIN.to_string()],
            },
            wallet: WalletConfig {
                initial_balance: Decimal::from(1000),
            },
            payments: PaymentsConfig {
                max_amount: Decimal::from(50_000),
                rate_per_minute,
                max_retries: 3,
            },
            logging: LoggingConfig { log_dir: None },
        }
    }

    fn test_app_with_store(rate_per_minute: u32, store: Arc<MemoryStore>) -> Router {
        let config = test_config(rate_per_minute);
        let state = AppState {
            store,
            identity: Arc::new(StubVerifier),
            sessions: SessionKeys::new(
                &config.auth.session_secret,
                config.auth.max_jwt_expiration,
            ),
            payment_limiter: PaymentRateLimiter::per_minute(config.payments.rate_per_minute),
            config,
        };
        create_router(state)
    }

    fn test_app_with_rate(rate_per_minute: u32) -> Router {
        test_app_with_store(rate_per_minute, Arc::new(MemoryStore::new()))
    }

    fn test_app() -> Router {
        test_app_with_rate(100)
    }

    async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra: &[(&str, &str)],
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send_raw(app, method, uri, token, body, &[]).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn login(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/google",
            None,
            Some(json!({ "credential": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn register(app: &Router, token: &str, name: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/companies",
            Some(token),
            Some(json!({
                "company_name": name,
                "business_email": format!("billing@{}.com", name.to_lowercase()),
                "industry": "technology",
                "contact_person": "Pat Doe",
                "phone_number": "555-0100",
                "business_address": "1 Main St"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    fn dec(value: &Value) -> Decimal {
        match value {
            Value::String(s) => Decimal::from_str(s).unwrap(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
            other => panic!("not a decimal: {}", other),
        }
    }

    /// Two company users with registered companies.
    async fn two_companies(app: &Router) -> (String, Value, String, Value) {
        let alice = login(app, "alice@acme.com").await;
        let acme = register(app, &alice, "Acme").await;
        let bob = login(app, "bob@globex.com").await;
        let globex = register(app, &bob, "Globex").await;
        (alice, acme, bob, globex)
    }

    #[tokio::test]
    async fn health_is_public_and_api_requires_session() {
        let app = test_app();

        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "connected");

        let (status, _) = send(&app, Method::GET, "/api/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/dashboard", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_assigns_roles_and_navigation() {
        let app = test_app();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/google",
            None,
            Some(json!({ "credential": "not-a-token" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let admin = login(&app, ADMIN).await;
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
        assert_eq!(me["user_role"], "back_office_admin");

        let (_, nav) = send(&app, Method::GET, "/api/navigation", Some(&admin), None).await;
        let titles: Vec<&str> = nav["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["title"].as_str().unwrap())
            .collect();
        assert!(!titles.contains(&"Send Payment"));

        let user = login(&app, "carol@initech.com").await;
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&user), None).await;
        assert_eq!(me["user_role"], "company_user");
        assert!(me["company"].is_null());

        let (_, nav) = send(&app, Method::GET, "/api/navigation", Some(&user), None).await;
        assert_eq!(nav["items"].as_array().unwrap().len(), 7);

        let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&user), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn registration_links_user_and_funds_wallet() {
        let app = test_app();
        let alice = login(&app, "alice@acme.com").await;
        let acme = register(&app, &alice, "Acme").await;

        assert_eq!(dec(&acme["wallet_balance"]), Decimal::from(1000));
        assert_eq!(acme["kyc_status"], "pending");
        assert_eq!(acme["registration_status"], "active");
        assert_eq!(acme["wallet_address"].as_str().unwrap().len(), 42);

        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&alice), None).await;
        assert_eq!(me["company"]["id"], acme["id"]);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/companies",
            Some(&alice),
            Some(json!({
                "company_name": "Broken",
                "business_email": "nope",
                "industry": "retail",
                "contact_person": "X",
                "phone_number": "1",
                "business_address": "Y"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("valid email"));
    }

    #[tokio::test]
    async fn payment_flow_with_idempotent_replay() {
        let app = test_app();
        let (alice, acme, bob, globex) = two_companies(&app).await;

        let payment = json!({
            "to_company_id": globex["id"],
            "amount": "250.50",
            "description": "Invoice #42"
        });
        let (status, bytes) = send_raw(
            &app,
            Method::POST,
            "/api/payments",
            Some(&alice),
            Some(payment.clone()),
            &[("Idempotency-Key", "inv-42")],
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let receipt: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(receipt["replayed"], false);
        assert_eq!(receipt["to_company_name"], "Globex");

        let (status, bytes) = send_raw(
            &app,
            Method::POST,
            "/api/payments",
            Some(&alice),
            Some(payment),
            &[("Idempotency-Key", "inv-42")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let replay: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(replay["replayed"], true);
        assert_eq!(replay["id"], receipt["id"]);

        let acme_id = acme["id"].as_str().unwrap();
        let (_, acme_now) =
            send(&app, Method::GET, &format!("/api/companies/{}", acme_id), Some(&alice), None).await;
        assert_eq!(dec(&acme_now["wallet_balance"]), Decimal::new(74950, 2));

        let (_, history) = send(&app, Method::GET, "/api/transactions", Some(&bob), None).await;
        assert_eq!(history["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(history["summary"]["total_transactions"], 1);
        assert_eq!(dec(&history["summary"]["total_volume"]), Decimal::new(25050, 2));

        let (status, _) =
            send(&app, Method::GET, &format!("/api/companies/{}", acme_id), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, wallet) = send(&app, Method::GET, "/api/wallet", Some(&bob), None).await;
        assert_eq!(dec(&wallet["total_balance"]), Decimal::new(125050, 2));
        assert_eq!(wallet["ledger"].as_array().unwrap().len(), 2);
        assert_eq!(wallet["stats"]["completed"], 1);

        let (_, spend) = send(&app, Method::GET, "/api/insights/spend", Some(&alice), None).await;
        assert_eq!(dec(&spend["spend"]), Decimal::new(25050, 2));
        let (_, spend) = send(&app, Method::GET, "/api/insights/spend", Some(&bob), None).await;
        assert_eq!(dec(&spend["spend"]), Decimal::ZERO);
    }

    #[tokio::test]
    async fn payment_rules_are_enforced() {
        let app = test_app();
        let (alice, acme, _bob, globex) = two_companies(&app).await;
        let admin = login(&app, ADMIN).await;

        let pay = |to: &Value, amount: &str| json!({ "to_company_id": to, "amount": amount });

        let (status, _) =
            send(&app, Method::POST, "/api/payments", Some(&admin), Some(pay(&globex["id"], "1"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app, Method::POST, "/api/payments", Some(&alice), Some(pay(&globex["id"], "1000.01"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Insufficient funds in your wallet");

        let (status, body) =
            send(&app, Method::POST, "/api/payments", Some(&alice), Some(pay(&globex["id"], "50001"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("Maximum payment amount is $50,000 USDC"));

        let (status, _) =
            send(&app, Method::POST, "/api/payments", Some(&alice), Some(pay(&acme["id"], "5"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) =
            send(&app, Method::POST, "/api/payments", Some(&alice), Some(pay(&globex["id"], "-5"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let newcomer = login(&app, "dana@nowhere.com").await;
        let (status, _) =
            send(&app, Method::POST, "/api/payments", Some(&newcomer), Some(pay(&globex["id"], "5"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn payments_are_rate_limited_per_user() {
        let app = test_app_with_rate(1);
        let (alice, _acme, _bob, globex) = two_companies(&app).await;
        let body = json!({ "to_company_id": globex["id"], "amount": "1" });

        let (status, _) = send(&app, Method::POST, "/api/payments", Some(&alice), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, Method::POST, "/api/payments", Some(&alice), Some(body)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn admin_manages_companies_and_reconciles() {
        let app = test_app();
        let (alice, acme, _bob, globex) = two_companies(&app).await;
        let admin = login(&app, ADMIN).await;
        let acme_uri = format!("/api/companies/{}", acme["id"].as_str().unwrap());

        let (status, _) = send(
            &app,
            Method::PATCH,
            &acme_uri,
            Some(&alice),
            Some(json!({ "kyc_status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, updated) = send(
            &app,
            Method::PATCH,
            &acme_uri,
            Some(&admin),
            Some(json!({ "kyc_status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["kyc_status"], "approved");

        let (_, list) = send(&app, Method::GET, "/api/companies?sort=company_name", Some(&admin), None).await;
        let names: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["company_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Acme", "Globex"]);

        let (_, list) = send(&app, Method::GET, "/api/companies?kyc_status=approved", Some(&admin), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (_, own) = send(&app, Method::GET, "/api/companies", Some(&alice), None).await;
        assert_eq!(own.as_array().unwrap().len(), 1);

        let (_, directory) = send(&app, Method::GET, "/api/companies/directory", Some(&alice), None).await;
        assert_eq!(directory.as_array().unwrap().len(), 2);
        assert!(directory[0].get("wallet_balance").is_none());

        send(
            &app,
            Method::POST,
            "/api/payments",
            Some(&alice),
            Some(json!({ "to_company_id": globex["id"], "amount": "10" })),
        )
        .await;

        let (status, _) = send(&app, Method::DELETE, &acme_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, report) = send(&app, Method::GET, "/api/ledger/reconcile", Some(&admin), None).await;
        assert_eq!(report["checked"], 2);
        assert!(report["discrepancies"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, Method::GET, "/api/ledger/reconcile", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&admin), None).await;
        assert_eq!(dashboard["stats"]["total_companies"], 2);
        assert_eq!(dec(&dashboard["stats"]["total_balance"]), Decimal::from(2000));
        assert_eq!(dec(&dashboard["stats"]["monthly_volume"]), Decimal::from(10));
    }

    #[tokio::test]
    async fn export_returns_csv() {
        let app = test_app();
        let (alice, _acme, _bob, globex) = two_companies(&app).await;

        let (status, bytes) =
            send_raw(&app, Method::GET, "/api/transactions/export", Some(&alice), None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        let csv = String::from_utf8(bytes).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Transaction ID,Date,From Company"));

        send(
            &app,
            Method::POST,
            "/api/payments",
            Some(&alice),
            Some(json!({ "to_company_id": globex["id"], "amount": "12.5", "description": "Hosting" })),
        )
        .await;

        let (_, bytes) = send_raw(
            &app,
            Method::GET,
            "/api/transactions/export?status=completed&search=host",
            Some(&alice),
            None,
            &[],
        )
        .await;
        let csv = String::from_utf8(bytes).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Acme,Globex,12.5,completed,Hosting"));
    }

    #[tokio::test]
    async fn insights_lifecycle() {
        let app = test_app();
        let admin = login(&app, ADMIN).await;
        let user = login(&app, "erin@acme.com").await;

        let insight = json!({
            "title": "Consolidate SaaS vendors",
            "description": "Three tools overlap",
            "metric_label": "Potential Savings",
            "metric_value": "$1,250/yr"
        });
        let (status, _) = send(&app, Method::POST, "/api/insights", Some(&user), Some(insight.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = send(&app, Method::POST, "/api/insights", Some(&admin), Some(insight)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, list) = send(&app, Method::GET, "/api/insights", Some(&user), None).await;
        assert_eq!(list["insights"].as_array().unwrap().len(), 1);
        assert_eq!(dec(&list["total_savings"]), Decimal::from(1250));

        let dismiss = format!("/api/insights/{}/dismiss", created["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::POST, &dismiss, Some(&user), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = send(&app, Method::GET, "/api/insights", Some(&user), None).await;
        assert!(list["insights"].as_array().unwrap().is_empty());

        let (status, _) =
            send(&app, Method::GET, "/api/insights/spend?grouping=hourly", Some(&user), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_registration_keeps_first_link() {
        let app = test_app();
        let alice = login(&app, "alice@acme.com").await;
        let acme = register(&app, &alice, "Acme").await;
        let spinoff = register(&app, &alice, "Spinoff").await;
        assert_eq!(dec(&spinoff["wallet_balance"]), Decimal::from(1000));

        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&alice), None).await;
        assert_eq!(me["company"]["id"], acme["id"]);
    }

    #[tokio::test]
    async fn company_update_rejects_blank_fields() {
        let app = test_app();
        let (_alice, acme, _bob, _globex) = two_companies(&app).await;
        let admin = login(&app, ADMIN).await;
        let acme_uri = format!("/api/companies/{}", acme["id"].as_str().unwrap());

        for body in [
            json!({ "company_name": "   " }),
            json!({ "contact_person": " " }),
        ] {
            let (status, _) = send(&app, Method::PATCH, &acme_uri, Some(&admin), Some(body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }

        let (status, updated) = send(
            &app,
            Method::PATCH,
            &acme_uri,
            Some(&admin),
            Some(json!({ "company_name": "  Acme Labs " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["company_name"], "Acme Labs");
        assert_eq!(updated["contact_person"], "Pat Doe");
    }

    #[tokio::test]
    async fn demoted_admin_loses_access_with_old_session() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app_with_store(100, store.clone());
        let admin = login(&app, ADMIN).await;

        let (status, _) = send(&app, Method::GET, "/api/ledger/reconcile", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        store
            .upsert_user(&LoginProfile {
                email: ADMIN.to_string(),
                full_name: None,
                picture_url: None,
                role_override: Some(Role::CompanyUser),
            })
            .await
            .unwrap();

        let (status, _) = send(&app, Method::GET, "/api/ledger/reconcile", Some(&admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/insights",
            Some(&admin),
            Some(json!({ "title": "t", "description": "d" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_api_paths_answer_json_not_found() {
        let app = test_app();
        let alice = login(&app, "alice@acme.com").await;

        let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("/api/nope"));

        let (status, body) =
            send(&app, Method::GET, "/api/companies/a/b/c", Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send_raw(&app, Method::GET, "/dashboard", None, None, &[]).await;
        assert_eq!(status, StatusCode::OK);
    }
}
