//! Sign-in, sessions and role checks.

use async_trait::async_trait;
use uuid::Uuid;

pub mod google;
pub mod session;

pub use google::GoogleVerifier;
pub use session::{Claims, SessionKeys};

use crate::models::User;
use crate::types::{AppError, AppResult, Role};

/// Identity asserted by an external provider after checking its credential.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub full_name: Option<String>,
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> AppResult<VerifiedIdentity>;
}

/// The caller behind a verified session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.user_role,
        }
    }
}

impl AuthUser {
    /// An empty list admits every role.
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.is_empty() || allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} may not access this resource",
                self.role
            )))
        }
    }
}

/// Which companies' data a user may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Everything,
    Company(Uuid),
    /// A company user who has not registered a company yet.
    Nothing,
}

impl Scope {
    pub fn for_user(user: &User) -> Self {
        match (user.user_role, user.company_id) {
            (Role::BackOfficeAdmin, _) => Scope::Everything,
            (Role::CompanyUser, Some(id)) => Scope::Company(id),
            (Role::CompanyUser, None) => Scope::Nothing,
        }
    }

    pub fn allows(&self, company_id: Uuid) -> bool {
        match self {
            Scope::Everything => true,
            Scope::Company(own) => *own == company_id,
            Scope::Nothing => false,
        }
    }
}
