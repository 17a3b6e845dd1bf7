// Payrail - B2B USDC payment service with an atomic wallet ledger

pub mod config;
pub mod db;
pub mod models;
pub mod types;
pub mod auth;
pub mod ledger;     // Double-entry wallet ledger and transfer rules
pub mod companies;
pub mod history;    // Transaction filtering, summaries and CSV export
pub mod insights;
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
