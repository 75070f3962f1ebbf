//! Form schemas for sign-in, OTP entry and onboarding.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FormErrors};

/// Number of characters in a one-time passcode.
pub const OTP_LENGTH: usize = 6;

/// Minimum length of name-like onboarding fields.
pub const MIN_NAME_LENGTH: usize = 2;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Collects violations while a form is checked.
#[derive(Default)]
struct Checker(Vec<FieldError>);

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required_min(&mut self, field: &'static str, label: &str, value: &str, min: usize) {
        let len = value.chars().count();
        if len == 0 {
            self.fail(field, format!("{label} is required"));
        } else if len < min {
            self.fail(field, format!("{label} must be at least {min} characters"));
        }
    }

    fn finish(self) -> Result<(), FormErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(self.0))
        }
    }
}

/// Email step of the sign-in flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut check = Checker::default();
        if self.email.is_empty() {
            check.fail("email", "Email is required");
        } else if !EMAIL_RE.is_match(&self.email) {
            check.fail("email", "Enter a valid email address");
        }
        check.finish()
    }
}

/// Passcode step of the sign-in flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpForm {
    #[serde(default)]
    pub otp: String,
}

impl OtpForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut check = Checker::default();
        if self.otp.chars().count() != OTP_LENGTH {
            check.fail("otp", format!("OTP must be exactly {OTP_LENGTH} digits"));
        }
        check.finish()
    }
}

/// Onboarding submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub organization_name: String,
}

impl OnboardingForm {
    /// Checks the name fields only.
    pub fn validate_names(&self) -> Result<(), FormErrors> {
        let mut check = Checker::default();
        check.required_min("first_name", "First name", &self.first_name, MIN_NAME_LENGTH);
        check.finish()
    }

    /// Checks the organization field only.
    pub fn validate_organization(&self) -> Result<(), FormErrors> {
        let mut check = Checker::default();
        check.required_min(
            "organization_name",
            "Organization name",
            &self.organization_name,
            MIN_NAME_LENGTH,
        );
        check.finish()
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = Vec::new();
        if let Err(FormErrors(e)) = self.validate_names() {
            errors.extend(e);
        }
        if let Err(FormErrors(e)) = self.validate_organization() {
            errors.extend(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(errors))
        }
    }

    /// Display name stored on the profile. The last name is optional.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last)
                .trim()
                .to_string(),
            _ => self.first_name.clone(),
        }
    }
}
