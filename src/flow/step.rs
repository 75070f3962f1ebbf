//! Step configuration and validation gates.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Gate a step declares before the flow may leave it.
///
/// `Ok(false)` and `Err(_)` both deny navigation; the error text is surfaced
/// through the flow's error callback.
#[async_trait]
pub trait StepValidator: Send + Sync {
    async fn validate(&self) -> Result<bool, String>;
}

/// Adapts an async closure into a [`StepValidator`].
pub struct FnValidator<F>(F);

impl<F> FnValidator<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> StepValidator for FnValidator<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, String>> + Send + 'static,
{
    async fn validate(&self) -> Result<bool, String> {
        (self.0)().await
    }
}

/// Static description of one step of a flow.
#[derive(Clone)]
pub struct StepConfig {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Seeds the completed set when the flow is created.
    pub is_completed: bool,
    pub is_optional: bool,
    pub validator: Option<Arc<dyn StepValidator>>,
}

impl StepConfig {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            is_completed: false,
            is_optional: false,
            validator: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn StepValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Attach an async closure as this step's validator.
    pub fn with_validation_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, String>> + Send + 'static,
    {
        self.with_validator(Arc::new(FnValidator::new(f)))
    }
}

impl fmt::Debug for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepConfig")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("is_completed", &self.is_completed)
            .field("is_optional", &self.is_optional)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}
