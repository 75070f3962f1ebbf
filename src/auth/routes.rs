//! JSON endpoints for passcode sign-in and onboarding submission.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::schema::{OnboardingForm, OtpForm};
use crate::error::{FormErrors, IdentityError};
use crate::identity::{IdentityProvider, ProfileUpdate, SessionToken, SetCookie, cookie_value};

/// Cookie carrying the earliest time (epoch ms) another passcode may be sent.
pub const OTP_COOLDOWN_COOKIE: &str = "otp_next_allowed_at";

/// Shared state for auth routes.
#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityProvider>,
    pub session_cookie: String,
    pub otp_cooldown: Duration,
}

/// Error body: `{ "error": true, "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    fields: Option<FormErrors>,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            message,
            fields: None,
        }
    }

    fn invalid(message: &'static str, fields: FormErrors) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message,
            fields: Some(fields),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": true, "message": self.message });
        if let Some(fields) = self.fields {
            body["fields"] = json!(fields);
        }
        (self.status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, turning a malformed one into the API's error shape.
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::new(rejection.status(), "Invalid request body")
    })
}

#[derive(Debug, Deserialize)]
struct RequestOtpBody {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct VerifyOtpBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    token: String,
}

/// POST /api/auth/request-otp
///
/// Emails a passcode and starts the resend cooldown.
async fn request_otp(
    State(state): State<AuthState>,
    payload: Result<Json<RequestOtpBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = parse_body(payload)?;
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Email is required"));
    }

    if let Err(e) = state.identity.sign_in_with_otp(email).await {
        warn!(error = %e, "Passcode request failed");
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Failed to send OTP"));
    }

    let cooldown_ms = i64::try_from(state.otp_cooldown.as_millis()).unwrap_or(i64::MAX);
    let next_allowed_at = Utc::now().timestamp_millis().saturating_add(cooldown_ms);
    let cookie = SetCookie::new(OTP_COOLDOWN_COOKIE, next_allowed_at.to_string())
        .max_age(state.otp_cooldown);

    info!("Passcode sent");
    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Json(json!({ "error": false, "nextAllowedAt": next_allowed_at })),
    )
        .into_response())
}

/// GET /api/auth/otp-next-allowed
async fn otp_next_allowed(headers: HeaderMap) -> Json<serde_json::Value> {
    let next_allowed_at =
        cookie_value(&headers, OTP_COOLDOWN_COOKIE).and_then(|v| v.parse::<i64>().ok());
    Json(json!({ "nextAllowedAt": next_allowed_at }))
}

/// POST /api/auth/verify-otp
///
/// Exchanges email + passcode for a session cookie.
async fn verify_otp(
    State(state): State<AuthState>,
    payload: Result<Json<VerifyOtpBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = parse_body(payload)?;
    let form = OtpForm {
        otp: body.token.trim().to_string(),
    };
    if let Err(fields) = form.validate() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            ..ApiError::invalid("Failed to verify OTP", fields)
        });
    }

    let session = state
        .identity
        .verify_otp(body.email.trim(), &form.otp)
        .await
        .map_err(|e| {
            warn!(error = %e, "Passcode verification failed");
            ApiError::new(StatusCode::BAD_REQUEST, "Failed to verify OTP")
        })?;

    let mut cookie = SetCookie::new(&state.session_cookie, session.access_token.expose_secret());
    if let Some(secs) = session.expires_in {
        cookie = cookie.max_age(Duration::from_secs(secs));
    }

    info!(user_id = %session.user.id, "Signed in");
    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Json(json!({ "error": false, "message": "OTP verified successfully" })),
    )
        .into_response())
}

/// POST /api/onboarding
///
/// Stores the display name, then creates the user's first organization.
async fn submit_onboarding(
    State(state): State<AuthState>,
    headers: HeaderMap,
    payload: Result<Json<OnboardingForm>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let unauthenticated = || ApiError::new(StatusCode::UNAUTHORIZED, "User not authenticated");

    let token = SessionToken::from_headers(&headers, &state.session_cookie)
        .ok_or_else(unauthenticated)?;
    let user = match state.identity.get_current_user(token.expose()).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(unauthenticated()),
        Err(e) => {
            warn!(error = %e, "Session lookup failed");
            return Err(unauthenticated());
        }
    };

    let form = parse_body(payload)?;
    form.validate()
        .map_err(|fields| ApiError::invalid("Invalid onboarding data", fields))?;

    let update = ProfileUpdate {
        full_name: Some(form.full_name()),
        ..Default::default()
    };
    let profile = state
        .identity
        .update_profile(token.expose(), user.id, &update)
        .await
        .map_err(|e| {
            warn!(user_id = %user.id, error = %e, "Profile update failed");
            match e {
                IdentityError::NotFound { .. } => {
                    ApiError::new(StatusCode::NOT_FOUND, "Profile not found")
                }
                _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile"),
            }
        })?;

    let organization = state
        .identity
        .create_organization(token.expose(), form.organization_name.trim(), user.id)
        .await
        .map_err(|e| {
            warn!(user_id = %user.id, error = %e, "Organization creation failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create organization")
        })?;

    info!(user_id = %user.id, organization_id = %organization.id, "Onboarding complete");
    Ok(Json(json!({
        "error": false,
        "profile": profile,
        "organization": organization,
    })))
}

/// Build the auth and onboarding API routes.
pub fn auth_routes(state: AuthState) -> Router {
    Router::new()
        .route("/api/auth/request-otp", post(request_otp))
        .route("/api/auth/otp-next-allowed", get(otp_next_allowed))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/onboarding", post(submit_onboarding))
        .with_state(state)
}
