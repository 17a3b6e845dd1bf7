use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const USDC_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub wallet: WalletConfig,
    pub payments: PaymentsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `None` runs the service on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub session_secret: String,
    pub google_client_id: String,
    pub google_tokeninfo_url: String,
    pub max_jwt_expiration: i64,
    pub admin_emails: Vec<String>,
}

// Keep the session secret out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"<redacted>")
            .field("google_client_id", &self.google_client_id)
            .field("google_tokeninfo_url", &self.google_tokeninfo_url)
            .field("max_jwt_expiration", &self.max_jwt_expiration)
            .field("admin_emails", &self.admin_emails)
            .finish()
    }
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub initial_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub max_amount: Decimal,
    pub rate_per_minute: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig {
                port: parse_var("PORT", "3000")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: split_list(
                    &env::var("ALLOWED_ORIGINS")
                        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string()),
                ),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
                max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", "1")?,
            },
            auth: AuthConfig {
                session_secret: env::var("SESSION_SECRET")
                    .context("SESSION_SECRET must be set")?,
                google_client_id: env::var("GOOGLE_CLIENT_ID")
                    .context("GOOGLE_CLIENT_ID must be set")?,
                google_tokeninfo_url: env::var("GOOGLE_TOKENINFO_URL")
                    .unwrap_or_else(|_| GOOGLE_TOKENINFO_URL.to_string()),
                max_jwt_expiration: parse_var("MAX_JWT_EXPIRATION", "3600")?,
                admin_emails: split_list(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            },
            wallet: WalletConfig {
                initial_balance: parse_var("INITIAL_WALLET_BALANCE", "1000")?,
            },
            payments: PaymentsConfig {
                max_amount: parse_var("MAX_PAYMENT_AMOUNT", "50000")?,
                rate_per_minute: parse_var("PAYMENT_RATE_PER_MINUTE", "30")?,
                max_retries: parse_var("TRANSFER_MAX_RETRIES", "3")?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects money settings the ledger cannot hold: USDC has 6 decimals and
    /// balances never go negative.
    pub fn validate(&self) -> Result<()> {
        let initial = self.wallet.initial_balance;
        if initial < Decimal::ZERO {
            bail!("INITIAL_WALLET_BALANCE must not be negative, got {}", initial);
        }
        if initial.normalize().scale() > USDC_DECIMALS {
            bail!("INITIAL_WALLET_BALANCE has more than {} decimals", USDC_DECIMALS);
        }

        let max = self.payments.max_amount;
        if max <= Decimal::ZERO {
            bail!("MAX_PAYMENT_AMOUNT must be positive, got {}", max);
        }
        if max.normalize().scale() > USDC_DECIMALS {
            bail!("MAX_PAYMENT_AMOUNT has more than {} decimals", USDC_DECIMALS);
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value '{}'", name, raw))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
