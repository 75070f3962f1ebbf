//! Error types for the tenant portal.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Form error: {0}")]
    Form(#[from] FormErrors),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the hosted identity/database backend.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Request to {endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

/// Flow navigation failures. Reported through the flow's error callback,
/// never returned from navigation calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("A flow needs at least one step")]
    NoSteps,

    #[error("Invalid step: {step}. Must be between 0 and {}", .total.saturating_sub(1))]
    InvalidStep { step: usize, total: usize },

    #[error("Step {step} rejected navigation: {reason}")]
    ValidationRejected { step: usize, reason: String },

    #[error("Step {step} is not valid")]
    StepNotValid { step: usize },

    #[error("Cannot navigate to step {target}: a transition is already in progress")]
    TransitionInFlight { target: usize },
}

/// A single schema violation on a form field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All schema violations found on a form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[error("{} invalid field(s): {}", .0.len(), .0.iter().map(|e| e.field).collect::<Vec<_>>().join(", "))]
#[serde(transparent)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    /// First message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result type alias for the portal.
pub type Result<T> = std::result::Result<T, Error>;
