//! Consumer-facing wrapper over a [`FlowController`].
//!
//! Adds a re-validation guard on the current step, a loading flag spanning
//! validation plus transition, and derived progress / step info. Holds no
//! flow state of its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use super::controller::FlowController;
use super::step::StepConfig;
use crate::error::FlowError;

type FinishFn = Box<dyn Fn() + Send + Sync>;
type ErrorFn = Box<dyn Fn(&FlowError) + Send + Sync>;

/// Wrapper behavior and hooks.
pub struct MultistepOptions {
    /// Re-run the current step's validator before `next_step` / `go_to_step`.
    pub validate_on_change: bool,
    on_finish: Option<FinishFn>,
    on_error: Option<ErrorFn>,
}

impl Default for MultistepOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            on_finish: None,
            on_error: None,
        }
    }
}

impl MultistepOptions {
    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.validate_on_change = enabled;
        self
    }

    /// Called when `next_step` is invoked on a valid last step.
    pub fn on_finish(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&FlowError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// Completion summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Completed share of all steps, rounded to the nearest integer.
    pub percentage: u32,
    pub completed_count: usize,
    pub remaining_count: usize,
}

impl Progress {
    pub fn from_counts(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            percentage,
            completed_count: completed,
            remaining_count: total.saturating_sub(completed),
        }
    }
}

/// Where the flow currently stands.
#[derive(Debug, Clone)]
pub struct StepInfo<'a> {
    pub index: usize,
    pub is_first: bool,
    pub is_last: bool,
    pub is_completed: bool,
    pub config: Option<&'a StepConfig>,
}

/// Counts a navigation call as pending until dropped.
struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn start(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::AcqRel);
        Self(pending)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Guarded, read/derive view of a flow.
pub struct Multistep {
    controller: Arc<FlowController>,
    options: MultistepOptions,
    loading: AtomicUsize,
}

impl Multistep {
    pub fn new(controller: Arc<FlowController>, options: MultistepOptions) -> Self {
        Self {
            controller,
            options,
            loading: AtomicUsize::new(0),
        }
    }

    pub fn controller(&self) -> &Arc<FlowController> {
        &self.controller
    }

    fn report(&self, error: FlowError) {
        if let Some(ref on_error) = self.options.on_error {
            on_error(&error);
        }
    }

    /// Re-validate the current step, then advance.
    ///
    /// On the last step a valid flow fires `on_finish` (and the controller's
    /// completion hook) and returns `false`, since there is nowhere to go.
    pub async fn next_step(&self) -> bool {
        let _loading = Loading::start(&self.loading);
        let current = self.controller.current_step();

        if self.options.validate_on_change && !self.controller.is_step_valid(current).await {
            self.report(FlowError::StepNotValid { step: current });
            return false;
        }

        let on_last = current + 1 >= self.controller.total_steps();
        let moved = self.controller.next_step().await;
        if on_last {
            if let Some(ref on_finish) = self.options.on_finish {
                on_finish();
            }
        }
        moved
    }

    pub async fn previous_step(&self) -> bool {
        self.controller.previous_step().await
    }

    /// Re-validate the current step (when moving away from it), then jump.
    pub async fn go_to_step(&self, step: usize) -> bool {
        let _loading = Loading::start(&self.loading);
        let current = self.controller.current_step();

        if self.options.validate_on_change
            && step != current
            && !self.controller.is_step_valid(current).await
        {
            self.report(FlowError::StepNotValid { step: current });
            return false;
        }

        self.controller.go_to_step(step).await
    }

    pub async fn go_to_first_step(&self) -> bool {
        self.go_to_step(0).await
    }

    pub async fn go_to_last_step(&self) -> bool {
        self.go_to_step(self.controller.total_steps() - 1).await
    }

    pub fn mark_step_completed(&self, step: usize) {
        self.controller.mark_step_completed(step);
    }

    pub fn mark_step_incomplete(&self, step: usize) {
        self.controller.mark_step_incomplete(step);
    }

    pub fn reset_steps(&self) {
        self.controller.reset_steps();
    }

    pub async fn is_current_step_valid(&self) -> bool {
        self.controller
            .is_step_valid(self.controller.current_step())
            .await
    }

    pub fn current_step(&self) -> usize {
        self.controller.current_step()
    }

    pub fn total_steps(&self) -> usize {
        self.controller.total_steps()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire) > 0
    }

    pub fn is_transitioning(&self) -> bool {
        self.controller.is_transitioning() || self.is_loading()
    }

    pub fn can_go_next(&self) -> bool {
        self.controller.can_go_next()
    }

    pub fn can_go_previous(&self) -> bool {
        self.controller.can_go_previous()
    }

    pub fn progress(&self) -> Progress {
        Progress::from_counts(
            self.controller.completed_steps().len(),
            self.controller.total_steps(),
        )
    }

    pub fn step_info(&self) -> StepInfo<'_> {
        let state = self.controller.snapshot();
        let index = state.current_step;
        StepInfo {
            index,
            is_first: index == 0,
            is_last: index + 1 == state.total_steps,
            is_completed: state.completed_steps.contains(&index),
            config: self.controller.step_config(index),
        }
    }
}
