//! The sign-in (email → OTP) and onboarding wizards.
//!
//! Each wizard keeps a draft of what the user has typed and gives every step
//! a validator that checks the draft against the matching form schema. The
//! last navigation error is kept so a view can show it inline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::controller::{FlowCallbacks, FlowController, FlowOptions};
use super::multistep::{Multistep, MultistepOptions, Progress};
use super::step::StepConfig;
use crate::auth::schema::{OnboardingForm, OtpForm, SignInForm};
use crate::error::{FlowError, FormErrors};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn reason(errors: FormErrors) -> String {
    errors
        .0
        .into_iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ")
}

type ErrorSlot = Arc<Mutex<Option<FlowError>>>;

/// Build a flow whose errors land in `slot`. Validation on change is off in
/// the wrapper: the controller's own gate runs each validator and reports
/// the field message, which is what a view wants to show.
fn build(steps: Vec<StepConfig>, options: FlowOptions, slot: &ErrorSlot) -> Result<Multistep, FlowError> {
    let controller_slot = Arc::clone(slot);
    let wrapper_slot = Arc::clone(slot);
    let controller = FlowController::new(
        steps,
        options,
        FlowCallbacks::new().on_error(move |e| *lock(&controller_slot) = Some(e.clone())),
    )?;
    Ok(Multistep::new(
        Arc::new(controller),
        MultistepOptions::default()
            .validate_on_change(false)
            .on_error(move |e| *lock(&wrapper_slot) = Some(e.clone())),
    ))
}

// ── Sign-in ─────────────────────────────────────────────────────────

pub const EMAIL_STEP: usize = 0;
pub const OTP_STEP: usize = 1;

/// What the user has entered so far in the sign-in flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInDraft {
    pub email: String,
    pub otp: String,
    /// Address the passcode was sent to; set once the email step is passed.
    pub target_email: Option<String>,
}

/// Credentials ready for passcode verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSubmission {
    pub email: String,
    pub token: String,
}

/// Two-step email → passcode wizard.
pub struct SignInFlow {
    draft: Arc<Mutex<SignInDraft>>,
    last_error: ErrorSlot,
    flow: Multistep,
}

impl SignInFlow {
    pub fn new(options: FlowOptions) -> Result<Self, FlowError> {
        let draft = Arc::new(Mutex::new(SignInDraft::default()));
        let last_error = Arc::new(Mutex::new(None));

        let email_draft = Arc::clone(&draft);
        let otp_draft = Arc::clone(&draft);
        let steps = vec![
            StepConfig::new("email", "Sign in")
                .with_description("Enter the email address to send a passcode to")
                .with_validation_fn(move || {
                    let form = SignInForm {
                        email: lock(&email_draft).email.clone(),
                    };
                    async move { form.validate().map(|_| true).map_err(reason) }
                }),
            StepConfig::new("otp", "Check your inbox")
                .with_description("Enter the passcode we sent you")
                .with_validation_fn(move || {
                    let form = OtpForm {
                        otp: lock(&otp_draft).otp.trim().to_string(),
                    };
                    async move { form.validate().map(|_| true).map_err(reason) }
                }),
        ];

        let flow = build(steps, options, &last_error)?;
        Ok(Self {
            draft,
            last_error,
            flow,
        })
    }

    pub fn set_email(&self, email: &str) {
        lock(&self.draft).email = email.trim().to_string();
    }

    pub fn set_otp(&self, otp: &str) {
        lock(&self.draft).otp = otp.to_string();
    }

    pub fn draft(&self) -> SignInDraft {
        lock(&self.draft).clone()
    }

    pub fn last_error(&self) -> Option<FlowError> {
        lock(&self.last_error).clone()
    }

    pub fn multistep(&self) -> &Multistep {
        &self.flow
    }

    pub fn current_step(&self) -> usize {
        self.flow.current_step()
    }

    /// Leave the email step. Records the target email on success.
    pub async fn submit_email(&self) -> bool {
        *lock(&self.last_error) = None;
        if self.flow.current_step() != EMAIL_STEP || !self.flow.next_step().await {
            return false;
        }
        let mut draft = lock(&self.draft);
        draft.target_email = Some(draft.email.clone());
        debug!("Sign-in flow moved to passcode step");
        true
    }

    /// Restart at the email step, forgetting the target email and passcode.
    ///
    /// Uses a reset rather than a backward move: the passcode step's gate
    /// would otherwise refuse to let a half-typed code go.
    pub fn change_email(&self) -> bool {
        if self.flow.current_step() != OTP_STEP {
            return false;
        }
        self.flow.reset_steps();
        *lock(&self.last_error) = None;
        let mut draft = lock(&self.draft);
        draft.target_email = None;
        draft.otp.clear();
        true
    }

    /// Finish the flow if the passcode is well-formed.
    pub async fn submit_otp(&self) -> Option<OtpSubmission> {
        *lock(&self.last_error) = None;
        if self.flow.current_step() != OTP_STEP {
            return None;
        }
        let (email, token) = {
            let draft = lock(&self.draft);
            (draft.target_email.clone()?, draft.otp.trim().to_string())
        };
        if let Err(e) = (OtpForm { otp: token.clone() }).validate() {
            *lock(&self.last_error) = Some(FlowError::ValidationRejected {
                step: OTP_STEP,
                reason: reason(e),
            });
            return None;
        }
        self.flow.next_step().await;
        Some(OtpSubmission { email, token })
    }
}

// ── Onboarding ──────────────────────────────────────────────────────

pub const NAMES_STEP: usize = 0;
pub const ORGANIZATION_STEP: usize = 1;

/// Two-step onboarding wizard: who you are, then your organization.
pub struct OnboardingFlow {
    draft: Arc<Mutex<OnboardingForm>>,
    last_error: ErrorSlot,
    flow: Multistep,
}

impl OnboardingFlow {
    pub fn new(options: FlowOptions) -> Result<Self, FlowError> {
        let draft = Arc::new(Mutex::new(OnboardingForm::default()));
        let last_error = Arc::new(Mutex::new(None));

        let names_draft = Arc::clone(&draft);
        let org_draft = Arc::clone(&draft);
        let steps = vec![
            StepConfig::new("about-you", "About you").with_validation_fn(move || {
                let result = lock(&names_draft).validate_names();
                async move { result.map(|_| true).map_err(reason) }
            }),
            StepConfig::new("organization", "Your organization").with_validation_fn(move || {
                let result = lock(&org_draft).validate_organization();
                async move { result.map(|_| true).map_err(reason) }
            }),
        ];

        let flow = build(steps, options, &last_error)?;
        Ok(Self {
            draft,
            last_error,
            flow,
        })
    }

    pub fn set_names(&self, first_name: &str, last_name: Option<&str>) {
        let mut draft = lock(&self.draft);
        draft.first_name = first_name.trim().to_string();
        draft.last_name = last_name.map(|s| s.trim().to_string());
    }

    pub fn set_organization(&self, name: &str) {
        lock(&self.draft).organization_name = name.trim().to_string();
    }

    pub fn draft(&self) -> OnboardingForm {
        lock(&self.draft).clone()
    }

    pub fn last_error(&self) -> Option<FlowError> {
        lock(&self.last_error).clone()
    }

    pub fn current_step(&self) -> usize {
        self.flow.current_step()
    }

    pub fn progress(&self) -> Progress {
        self.flow.progress()
    }

    pub async fn submit_names(&self) -> bool {
        *lock(&self.last_error) = None;
        self.flow.current_step() == NAMES_STEP && self.flow.next_step().await
    }

    pub async fn back(&self) -> bool {
        self.flow.previous_step().await
    }

    /// Finish the flow, yielding the form to submit.
    pub async fn submit_organization(&self) -> Option<OnboardingForm> {
        *lock(&self.last_error) = None;
        if self.flow.current_step() != ORGANIZATION_STEP {
            return None;
        }
        let form = self.draft();
        if let Err(e) = form.validate() {
            *lock(&self.last_error) = Some(FlowError::ValidationRejected {
                step: ORGANIZATION_STEP,
                reason: reason(e),
            });
            return None;
        }
        self.flow.mark_step_completed(ORGANIZATION_STEP);
        self.flow.next_step().await;
        Some(form)
    }
}
