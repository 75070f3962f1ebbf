//! Flow controller: owns the position of one multi-step flow and is the only
//! thing allowed to move it.
//!
//! Navigation calls never fail loudly. A denied move returns `false`; invalid
//! targets and rejected validations are also handed to the `on_error`
//! callback. A forward jump over incomplete steps is denied silently.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::step::StepConfig;
use crate::error::FlowError;

/// Behavior switches for a flow.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// When off, every in-range move is allowed.
    pub enable_validation: bool,
    /// When off, a forward move needs every earlier step completed.
    pub allow_skipping: bool,
    /// Pause between announcing a transition and committing it.
    pub transition_delay: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            enable_validation: true,
            allow_skipping: false,
            transition_delay: Duration::ZERO,
        }
    }
}

type StepChangeFn = Box<dyn Fn(usize, usize) + Send + Sync>;
type CompleteFn = Box<dyn Fn() + Send + Sync>;
type ErrorFn = Box<dyn Fn(&FlowError) + Send + Sync>;

/// Hooks fired by the controller.
#[derive(Default)]
pub struct FlowCallbacks {
    on_step_change: Option<StepChangeFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl FlowCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(new_step, previous_step)` after every committed move.
    pub fn on_step_change(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_step_change = Some(Box::new(f));
        self
    }

    /// Called when `next_step` is invoked on the last step.
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&FlowError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// Direction of an in-progress transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Position and history of one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    pub current_step: usize,
    pub total_steps: usize,
    pub completed_steps: BTreeSet<usize>,
    /// Set between the start of a move and its commit.
    pub transition: Option<Direction>,
}

impl FlowState {
    fn new(total_steps: usize) -> Self {
        Self {
            current_step: 0,
            total_steps,
            completed_steps: BTreeSet::new(),
            transition: None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn is_next_transitioning(&self) -> bool {
        self.transition == Some(Direction::Forward)
    }

    pub fn is_back_transitioning(&self) -> bool {
        self.transition == Some(Direction::Backward)
    }

    /// Move to `target` and mark the steps it leaves behind.
    ///
    /// After landing on step K > 0, step K-1 is always completed; a forward
    /// move additionally completes the step it came from.
    fn commit(&mut self, target: usize) {
        let previous = self.current_step;
        self.current_step = target;
        self.transition = None;
        if target == previous {
            return;
        }
        if target > previous {
            self.completed_steps.insert(previous);
        }
        if target > 0 {
            self.completed_steps.insert(target - 1);
        }
    }

    fn reset(&mut self) {
        self.current_step = 0;
        self.completed_steps.clear();
        self.transition = None;
    }
}

/// Clears the in-flight flag when a navigation call ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State machine sequencing an ordered list of steps.
///
/// One controller per mounted flow. Shared with consumers behind an `Arc`;
/// a second navigation call made while one is in flight is rejected.
pub struct FlowController {
    steps: Vec<StepConfig>,
    options: FlowOptions,
    callbacks: FlowCallbacks,
    state: Mutex<FlowState>,
    in_flight: AtomicBool,
}

impl FlowController {
    /// Create a flow positioned on step 0.
    pub fn new(
        steps: Vec<StepConfig>,
        options: FlowOptions,
        callbacks: FlowCallbacks,
    ) -> Result<Self, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::NoSteps);
        }
        let mut state = FlowState::new(steps.len());
        state.completed_steps = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_completed)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            steps,
            options,
            callbacks,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, error: FlowError) {
        debug!(error = %error, "Flow navigation error");
        if let Some(ref on_error) = self.callbacks.on_error {
            on_error(&error);
        }
    }

    fn is_valid_step(&self, step: usize) -> bool {
        step < self.steps.len()
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Copy of the current state.
    pub fn snapshot(&self) -> FlowState {
        self.state().clone()
    }

    pub fn current_step(&self) -> usize {
        self.state().current_step
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn completed_steps(&self) -> BTreeSet<usize> {
        self.state().completed_steps.clone()
    }

    pub fn is_transitioning(&self) -> bool {
        self.state().is_transitioning()
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn step_config(&self, step: usize) -> Option<&StepConfig> {
        self.steps.get(step)
    }

    pub fn options(&self) -> &FlowOptions {
        &self.options
    }

    pub fn can_go_next(&self) -> bool {
        self.current_step() < self.steps.len() - 1
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_step() > 0
    }

    pub fn is_step_completed(&self, step: usize) -> bool {
        self.state().completed_steps.contains(&step)
    }

    /// Run `step`'s validator. Steps without one are valid; a validator
    /// error counts as invalid.
    pub async fn is_step_valid(&self, step: usize) -> bool {
        let Some(config) = self.steps.get(step) else {
            return false;
        };
        match config.validator {
            None => true,
            Some(ref validator) => validator.validate().await.unwrap_or(false),
        }
    }

    /// Whether a move to `target` would currently be allowed.
    ///
    /// May run the current step's validator.
    pub async fn can_navigate_to(&self, target: usize) -> bool {
        if !self.is_valid_step(target) {
            return false;
        }
        if !self.options.enable_validation {
            return true;
        }

        let (current, completed) = {
            let state = self.state();
            (state.current_step, state.completed_steps.clone())
        };

        if !self.options.allow_skipping && target > current {
            let skipped = (0..target).find(|i| *i != current && !completed.contains(i));
            if let Some(step) = skipped {
                debug!(
                    target_step = target,
                    incomplete = step,
                    "Forward navigation skips an incomplete step"
                );
                return false;
            }
        }

        if target != current {
            if let Some(ref validator) = self.steps[current].validator {
                match validator.validate().await {
                    Ok(true) => {}
                    Ok(false) => {
                        self.report(FlowError::ValidationRejected {
                            step: current,
                            reason: "validation returned false".to_string(),
                        });
                        return false;
                    }
                    Err(reason) => {
                        self.report(FlowError::ValidationRejected {
                            step: current,
                            reason,
                        });
                        return false;
                    }
                }
            }
        }

        true
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Navigate to `target`. Returns whether the move was committed.
    pub async fn go_to_step(&self, target: usize) -> bool {
        if !self.is_valid_step(target) {
            self.report(FlowError::InvalidStep {
                step: target,
                total: self.steps.len(),
            });
            return false;
        }

        let Some(guard) = InFlight::acquire(&self.in_flight) else {
            self.report(FlowError::TransitionInFlight { target });
            return false;
        };

        if !self.can_navigate_to(target).await {
            return false;
        }

        let previous = {
            let mut state = self.state();
            let previous = state.current_step;
            state.transition = match target.cmp(&previous) {
                std::cmp::Ordering::Greater => Some(Direction::Forward),
                std::cmp::Ordering::Less => Some(Direction::Backward),
                std::cmp::Ordering::Equal => None,
            };
            previous
        };

        if !self.options.transition_delay.is_zero() {
            tokio::time::sleep(self.options.transition_delay).await;
        }

        self.state().commit(target);
        drop(guard);

        debug!(step = target, previous, "Flow step changed");
        if let Some(ref on_step_change) = self.callbacks.on_step_change {
            on_step_change(target, previous);
        }
        true
    }

    /// Advance one step. On the last step this signals completion instead
    /// and returns `false`.
    pub async fn next_step(&self) -> bool {
        let current = self.current_step();
        if current >= self.steps.len() - 1 {
            debug!(step = current, "Flow complete");
            if let Some(ref on_complete) = self.callbacks.on_complete {
                on_complete();
            }
            return false;
        }
        self.go_to_step(current + 1).await
    }

    pub async fn previous_step(&self) -> bool {
        let current = self.current_step();
        if current == 0 {
            return false;
        }
        self.go_to_step(current - 1).await
    }

    pub async fn go_to_first_step(&self) -> bool {
        self.go_to_step(0).await
    }

    pub async fn go_to_last_step(&self) -> bool {
        self.go_to_step(self.steps.len() - 1).await
    }

    // ── Direct mutation ─────────────────────────────────────────────

    pub fn mark_step_completed(&self, step: usize) {
        if self.is_valid_step(step) {
            self.state().completed_steps.insert(step);
        }
    }

    pub fn mark_step_incomplete(&self, step: usize) {
        if self.is_valid_step(step) {
            self.state().completed_steps.remove(&step);
        }
    }

    /// Back to step 0 with nothing completed.
    pub fn reset_steps(&self) {
        self.state().reset();
    }
}
