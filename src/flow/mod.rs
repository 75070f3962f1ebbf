//! Multi-step flows (wizards).
//!
//! A [`FlowController`] owns the position of one flow and is its only
//! mutator. [`Multistep`] layers a validation guard and derived progress on
//! top. The sign-in and onboarding wizards are built from both.

pub mod controller;
pub mod multistep;
pub mod step;
pub mod wizards;

pub use controller::{Direction, FlowCallbacks, FlowController, FlowOptions, FlowState};
pub use multistep::{Multistep, MultistepOptions, Progress, StepInfo};
pub use step::{FnValidator, StepConfig, StepValidator};
pub use wizards::{OnboardingFlow, OtpSubmission, SignInDraft, SignInFlow};
