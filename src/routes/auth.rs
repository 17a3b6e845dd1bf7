use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::caller;
use crate::auth::AuthUser;
use crate::db::LoginProfile;
use crate::models::{AppState, GoogleLoginRequest, LoginResponse, UserProfile};
use crate::types::{AppResult, Role};

/// Sign-in; reachable without a session.
pub fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/google", post(google_login))
        .with_state(state)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

async fn google_login(
    State(state): State<AppState>,
    Json(request): Json<GoogleLoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let identity = state.identity.verify(&request.credential).await?;

    let role_override = state
        .config
        .auth
        .is_admin_email(&identity.email)
        .then_some(Role::BackOfficeAdmin);

    let user = state
        .store
        .upsert_user(&LoginProfile {
            email: identity.email,
            full_name: identity.full_name,
            picture_url: identity.picture_url,
            role_override,
        })
        .await?;

    let (token, expires_at) = state.sessions.issue(&user)?;
    let company = match user.company_id {
        Some(id) => state.store.get_company(id).await?,
        None => None,
    };

    info!(user_id = %user.id, role = %user.user_role, "User signed in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        user: UserProfile::new(&user, company.as_ref()),
    }))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserProfile>> {
    let (user, _) = caller(&state, &auth).await?;
    let company = match user.company_id {
        Some(id) => state.store.get_company(id).await?,
        None => None,
    };
    Ok(Json(UserProfile::new(&user, company.as_ref())))
}

// Sessions are stateless; the client discards its token.
async fn logout(auth: AuthUser) -> StatusCode {
    info!(user_id = %auth.user_id, "User signed out");
    StatusCode::NO_CONTENT
}
