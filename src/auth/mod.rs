//! Passcode sign-in and onboarding: form schemas and the JSON API.

pub mod routes;
pub mod schema;

pub use routes::{AuthState, OTP_COOLDOWN_COOKIE, auth_routes};
pub use schema::{MIN_NAME_LENGTH, OTP_LENGTH, OnboardingForm, OtpForm, SignInForm};
