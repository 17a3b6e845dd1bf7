//! Google ID token verification through the tokeninfo endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

use super::{IdentityVerifier, VerifiedIdentity};
use crate::config::AuthConfig;
use crate::types::{AppError, AppResult};
use crate::utils::{with_retry, RetryPolicy};

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    iss: String,
    email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
    #[serde(default, deserialize_with = "i64_or_string")]
    exp: i64,
    name: Option<String>,
    picture: Option<String>,
}

// tokeninfo returns JSON booleans and numbers as strings.
fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

fn i64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub struct GoogleVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
    retry: RetryPolicy,
}

impl GoogleVerifier {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            tokeninfo_url: config.google_tokeninfo_url.clone(),
            client_id: config.google_client_id.clone(),
            retry: RetryPolicy::default(),
        })
    }

    async fn fetch(&self, credential: &str) -> AppResult<TokenInfo> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google tokeninfo unreachable: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::Upstream(format!("Google tokeninfo returned {}", status)));
        }
        if !status.is_success() {
            return Err(AppError::Auth("Google rejected the credential".to_string()));
        }

        response
            .json::<TokenInfo>()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed tokeninfo response: {}", e)))
    }

    fn check(&self, info: TokenInfo) -> AppResult<VerifiedIdentity> {
        if info.aud != self.client_id {
            warn!(aud = %info.aud, "Google credential issued for another client");
            return Err(AppError::Auth("Credential was issued for another application".to_string()));
        }
        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            return Err(AppError::Auth(format!("Unexpected token issuer '{}'", info.iss)));
        }
        if info.exp <= chrono::Utc::now().timestamp() {
            return Err(AppError::Auth("Credential has expired".to_string()));
        }
        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Auth("Credential carries no email".to_string()))?;
        if !info.email_verified {
            return Err(AppError::Auth("Google email is not verified".to_string()));
        }

        Ok(VerifiedIdentity {
            email: email.to_lowercase(),
            full_name: info.name,
            picture_url: info.picture,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> AppResult<VerifiedIdentity> {
        if credential.trim().is_empty() {
            return Err(AppError::InvalidRequest("credential is required".to_string()));
        }

        let info = with_retry(
            &self.retry,
            |e: &AppError| matches!(e, AppError::Upstream(_)),
            || self.fetch(credential),
        )
        .await?;

        let identity = self.check(info)?;
        debug!(email = %identity.email, "Google credential verified");
        Ok(identity)
    }
}
