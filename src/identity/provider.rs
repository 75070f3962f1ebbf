//! Identity-provider boundary: the hosted auth + database backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// Authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Onboarding is complete once a non-empty `full_name` is stored.
    pub fn is_onboarded(&self) -> bool {
        self.full_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// Row of the `organizations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial profile update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Tokens issued after a successful passcode check.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Operations the portal needs from the identity/database backend.
///
/// Every call is a fresh round-trip; nothing is cached between requests.
/// Row access is scoped by the caller's access token.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind `access_token`. An expired or unknown token is
    /// `Ok(None)`, not an error.
    async fn get_current_user(&self, access_token: &str) -> Result<Option<User>, IdentityError>;

    async fn get_profile_by_id(
        &self,
        access_token: &str,
        id: Uuid,
    ) -> Result<Option<Profile>, IdentityError>;

    /// Send a one-time passcode to `email`, creating the account if needed.
    async fn sign_in_with_otp(&self, email: &str) -> Result<(), IdentityError>;

    async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, IdentityError>;

    async fn update_profile(
        &self,
        access_token: &str,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Profile, IdentityError>;

    async fn create_organization(
        &self,
        access_token: &str,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Organization, IdentityError>;
}
