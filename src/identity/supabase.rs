//! REST client for the hosted auth + database backend.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::provider::{IdentityProvider, Organization, Profile, ProfileUpdate, Session, User};
use crate::config::IdentityConfig;
use crate::error::IdentityError;

const USER_PATH: &str = "/auth/v1/user";
const OTP_PATH: &str = "/auth/v1/otp";
const VERIFY_PATH: &str = "/auth/v1/verify";
const USERS_TABLE: &str = "/rest/v1/users";
const ORGANIZATIONS_TABLE: &str = "/rest/v1/organizations";

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    user: User,
}

/// [`IdentityProvider`] backed by the hosted backend's HTTP API.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    config: IdentityConfig,
}

impl SupabaseClient {
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IdentityError::RequestFailed {
                endpoint: config.url.clone(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            config,
        })
    }

    fn request(&self, method: Method, path: &str, access_token: Option<&str>) -> RequestBuilder {
        let key = self.anon_key.expose_secret();
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", key)
            .bearer_auth(access_token.unwrap_or(key))
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, IdentityError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                IdentityError::Timeout {
                    endpoint: path.to_string(),
                    timeout: self.config.request_timeout,
                }
            } else {
                IdentityError::RequestFailed {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    async fn ensure_success(path: &str, resp: Response) -> Result<Response, IdentityError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IdentityError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, IdentityError> {
        let resp = Self::ensure_success(path, resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| IdentityError::InvalidResponse {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn get_current_user(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        let resp = self
            .send(
                USER_PATH,
                self.request(Method::GET, USER_PATH, Some(access_token)),
            )
            .await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!("Access token rejected; treating as signed out");
            return Ok(None);
        }
        Self::json::<User>(USER_PATH, resp).await.map(Some)
    }

    async fn get_profile_by_id(
        &self,
        access_token: &str,
        id: Uuid,
    ) -> Result<Option<Profile>, IdentityError> {
        let builder = self
            .request(Method::GET, USERS_TABLE, Some(access_token))
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
        let resp = self.send(USERS_TABLE, builder).await?;
        let rows: Vec<Profile> = Self::json(USERS_TABLE, resp).await?;
        Ok(rows.into_iter().next())
    }

    async fn sign_in_with_otp(&self, email: &str) -> Result<(), IdentityError> {
        let builder = self
            .request(Method::POST, OTP_PATH, None)
            .json(&serde_json::json!({ "email": email, "create_user": true }));
        let resp = self.send(OTP_PATH, builder).await?;
        Self::ensure_success(OTP_PATH, resp).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, IdentityError> {
        let builder = self.request(Method::POST, VERIFY_PATH, None).json(&serde_json::json!({
            "type": "email",
            "email": email,
            "token": token,
        }));
        let resp = self.send(VERIFY_PATH, builder).await?;
        let body: VerifyResponse = Self::json(VERIFY_PATH, resp).await?;
        Ok(Session {
            access_token: SecretString::from(body.access_token),
            refresh_token: body.refresh_token.map(SecretString::from),
            expires_in: body.expires_in,
            user: body.user,
        })
    }

    async fn update_profile(
        &self,
        access_token: &str,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Profile, IdentityError> {
        let builder = self
            .request(Method::PATCH, USERS_TABLE, Some(access_token))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(update);
        let resp = self.send(USERS_TABLE, builder).await?;
        let rows: Vec<Profile> = Self::json(USERS_TABLE, resp).await?;
        rows.into_iter().next().ok_or_else(|| IdentityError::NotFound {
            entity: "Profile".to_string(),
            id: id.to_string(),
        })
    }

    async fn create_organization(
        &self,
        access_token: &str,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Organization, IdentityError> {
        let builder = self
            .request(Method::POST, ORGANIZATIONS_TABLE, Some(access_token))
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "name": name, "owner_id": owner_id }));
        let resp = self.send(ORGANIZATIONS_TABLE, builder).await?;
        let rows: Vec<Organization> = Self::json(ORGANIZATIONS_TABLE, resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| IdentityError::InvalidResponse {
                endpoint: ORGANIZATIONS_TABLE.to_string(),
                reason: "insert returned no rows".to_string(),
            })
    }
}
