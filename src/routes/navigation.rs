use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::types::Role;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct NavItem {
    pub title: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const fn item(title: &'static str, path: &'static str, description: &'static str) -> NavItem {
    NavItem {
        title,
        path,
        description,
    }
}

const SEND_PAYMENT: &str = "/payments";

const ITEMS: [NavItem; 7] = [
    item("Dashboard", "/dashboard", "Overview & Analytics"),
    item("Companies", "/companies", "Business Directory"),
    item("Send Payment", SEND_PAYMENT, "Transfer USDC"),
    item("Transaction History", "/history", "Payment Records"),
    item("Register Company", "/register", "Onboard Business"),
    item("Wallet", "/wallet", "Balances & Ledger"),
    item("Insights", "/insights", "Spend Analytics"),
];

/// Back-office admins cannot move funds, so they never see Send Payment.
pub fn items_for(role: Role) -> Vec<NavItem> {
    ITEMS
        .iter()
        .filter(|item| role != Role::BackOfficeAdmin || item.path != SEND_PAYMENT)
        .copied()
        .collect()
}

#[derive(Debug, Serialize)]
struct NavigationResponse {
    role: Role,
    items: Vec<NavItem>,
}

pub fn router() -> Router {
    Router::new().route("/api/navigation", get(navigation))
}

async fn navigation(auth: AuthUser) -> Json<NavigationResponse> {
    Json(NavigationResponse {
        role: auth.role,
        items: items_for(auth.role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_by_role() {
        let admin: Vec<_> = items_for(Role::BackOfficeAdmin).iter().map(|i| i.title).collect();
        assert!(!admin.contains(&"Send Payment"));
        assert_eq!(admin.len(), 6);

        let user = items_for(Role::CompanyUser);
        assert_eq!(user.len(), 7);
        assert_eq!(user[2].title, "Send Payment");
    }
}
