//! Stop conditions and the per-run evaluator that checks them.
//!
//! [`StopConditions`] is an immutable, reusable description of when a run
//! must end. Each run creates its own [`StopConditionEvaluator`] holding the
//! mutable progress state (start time, last improvement, best fitness).

use crate::error::{OptimizationError, Result};
use crate::problem::{ObjectiveValue, OptimizationType};
use std::time::{Duration, Instant};

/// Terminal state of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminalState {
    /// A solution at least as good as the satisfying fitness value was found.
    Converged,
    /// The time limit or the iteration budget was exhausted.
    TimedOut,
    /// No strict improvement within the configured iterations or time.
    Stalled,
}

/// Conditions under which an optimization run stops.
///
/// At least one condition must be set; a run with none would never end.
///
/// ```
/// use std::time::Duration;
/// use u_evolution::StopConditions;
///
/// let stop = StopConditions::builder()
///     .time_limit(Duration::from_secs(5))
///     .max_iterations_without_progress(50)
///     .build()
///     .unwrap();
/// assert_eq!(stop.max_iterations_without_progress(), Some(50));
/// assert!(StopConditions::builder().build().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopConditions {
    time_limit: Option<Duration>,
    satisfying_fitness_value: Option<f64>,
    max_iterations_without_progress: Option<usize>,
    max_time_without_progress: Option<Duration>,
    max_iterations: Option<usize>,
}

impl StopConditions {
    pub fn builder() -> StopConditionsBuilder {
        StopConditionsBuilder::default()
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn satisfying_fitness_value(&self) -> Option<f64> {
        self.satisfying_fitness_value
    }

    pub fn max_iterations_without_progress(&self) -> Option<usize> {
        self.max_iterations_without_progress
    }

    pub fn max_time_without_progress(&self) -> Option<Duration> {
        self.max_time_without_progress
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// Checks the invariants enforced by the builder.
    pub fn validate(&self) -> Result<()> {
        if self.time_limit.is_none()
            && self.satisfying_fitness_value.is_none()
            && self.max_iterations_without_progress.is_none()
            && self.max_time_without_progress.is_none()
            && self.max_iterations.is_none()
        {
            return Err(OptimizationError::config(
                "at least one stop condition must be set",
            ));
        }
        if self.time_limit == Some(Duration::ZERO) {
            return Err(OptimizationError::config("time_limit must be positive"));
        }
        if self.max_time_without_progress == Some(Duration::ZERO) {
            return Err(OptimizationError::config(
                "max_time_without_progress must be positive",
            ));
        }
        if self.max_iterations_without_progress == Some(0) {
            return Err(OptimizationError::config(
                "max_iterations_without_progress must be at least 1",
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(OptimizationError::config("max_iterations must be at least 1"));
        }
        if let Some(v) = self.satisfying_fitness_value {
            if v.is_nan() {
                return Err(OptimizationError::config(
                    "satisfying_fitness_value must not be NaN",
                ));
            }
        }
        Ok(())
    }

    /// Starts tracking progress for one run.
    pub fn start(&self, direction: OptimizationType, start: Instant) -> StopConditionEvaluator {
        StopConditionEvaluator {
            conditions: self.clone(),
            direction,
            start,
            best: None,
            last_improvement_iteration: 0,
            last_improvement_time: start,
        }
    }
}

/// Builder for [`StopConditions`].
#[derive(Debug, Clone, Default)]
pub struct StopConditionsBuilder {
    inner: StopConditions,
}

impl StopConditionsBuilder {
    /// Stop once the run has lasted at least `limit`.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.inner.time_limit = Some(limit);
        self
    }

    /// Stop once an iteration's best fitness is at least as good as `value`.
    pub fn satisfying_fitness_value(mut self, value: f64) -> Self {
        self.inner.satisfying_fitness_value = Some(value);
        self
    }

    /// Stop after `n` iterations without strict improvement.
    pub fn max_iterations_without_progress(mut self, n: usize) -> Self {
        self.inner.max_iterations_without_progress = Some(n);
        self
    }

    /// Stop after `limit` of wall-clock time without strict improvement.
    pub fn max_time_without_progress(mut self, limit: Duration) -> Self {
        self.inner.max_time_without_progress = Some(limit);
        self
    }

    /// Stop after `n` iterations in total.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.inner.max_iterations = Some(n);
        self
    }

    pub fn build(self) -> Result<StopConditions> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

/// Mutable progress state of one run.
///
/// Call [`observe`](Self::observe) once per iteration with that
/// iteration's best fitness. Conditions are evaluated independently; when
/// several hold at once the reported state is the first of
/// `Converged`, `TimedOut`, `Stalled`.
#[derive(Debug, Clone)]
pub struct StopConditionEvaluator {
    conditions: StopConditions,
    direction: OptimizationType,
    start: Instant,
    best: Option<ObjectiveValue>,
    last_improvement_iteration: usize,
    last_improvement_time: Instant,
}

impl StopConditionEvaluator {
    /// Records progress for `iteration` and reports whether the run must stop.
    pub fn observe(
        &mut self,
        iteration: usize,
        iteration_best: &ObjectiveValue,
        now: Instant,
    ) -> Option<TerminalState> {
        let improved = match &self.best {
            None => true,
            Some(best) => self.direction.is_better(iteration_best, best),
        };
        if improved {
            self.best = Some(iteration_best.clone());
            self.last_improvement_iteration = iteration;
            self.last_improvement_time = now;
        }
        self.check(iteration, iteration_best, now)
    }

    fn check(
        &self,
        iteration: usize,
        iteration_best: &ObjectiveValue,
        now: Instant,
    ) -> Option<TerminalState> {
        let c = &self.conditions;

        if let Some(threshold) = c.satisfying_fitness_value {
            let primary = iteration_best.primary();
            if !primary.is_nan()
                && self.direction.compare_scalar(primary, threshold) != std::cmp::Ordering::Greater
            {
                return Some(TerminalState::Converged);
            }
        }

        let elapsed = now.saturating_duration_since(self.start);
        if c.time_limit.is_some_and(|limit| elapsed >= limit) {
            return Some(TerminalState::TimedOut);
        }
        if c.max_iterations.is_some_and(|n| iteration + 1 >= n) {
            return Some(TerminalState::TimedOut);
        }

        let stalled_iterations = iteration.saturating_sub(self.last_improvement_iteration);
        if c
            .max_iterations_without_progress
            .is_some_and(|n| stalled_iterations >= n)
        {
            return Some(TerminalState::Stalled);
        }
        let stalled_time = now.saturating_duration_since(self.last_improvement_time);
        if c
            .max_time_without_progress
            .is_some_and(|limit| stalled_time >= limit)
        {
            return Some(TerminalState::Stalled);
        }
        None
    }

    /// Best fitness observed so far.
    pub fn best(&self) -> Option<&ObjectiveValue> {
        self.best.as_ref()
    }

    /// Iteration of the last strict improvement.
    pub fn last_improvement_iteration(&self) -> usize {
        self.last_improvement_iteration
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    pub fn conditions(&self) -> &StopConditions {
        &self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(v: f64) -> ObjectiveValue {
        ObjectiveValue::Single(v)
    }

    #[test]
    fn test_no_conditions_rejected() {
        let err = StopConditions::builder().build().unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(StopConditions::builder().time_limit(Duration::ZERO).build().is_err());
        assert!(StopConditions::builder()
            .max_iterations_without_progress(0)
            .build()
            .is_err());
        assert!(StopConditions::builder().max_iterations(0).build().is_err());
        assert!(StopConditions::builder()
            .satisfying_fitness_value(f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn test_stalls_five_iterations_after_last_improvement() {
        let stop = StopConditions::builder()
            .max_iterations_without_progress(5)
            .build()
            .unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Minimize, t0);
        // Improves through iteration 3, flat afterwards.
        let sequence = [10.0, 9.0, 8.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0];
        let mut halted = None;
        for (i, f) in sequence.iter().enumerate() {
            if let Some(state) = eval.observe(i, &single(*f), t0) {
                halted = Some((i, state));
                break;
            }
        }
        assert_eq!(halted, Some((8, TerminalState::Stalled)));
        assert_eq!(eval.last_improvement_iteration(), 3);
    }

    #[test]
    fn test_equal_fitness_is_not_progress() {
        let stop = StopConditions::builder()
            .max_iterations_without_progress(2)
            .build()
            .unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Maximize, t0);
        assert_eq!(eval.observe(0, &single(1.0), t0), None);
        assert_eq!(eval.observe(1, &single(1.0), t0), None);
        assert_eq!(eval.observe(2, &single(1.0), t0), Some(TerminalState::Stalled));
    }

    #[test]
    fn test_satisfying_value_respects_direction() {
        let stop = StopConditions::builder()
            .satisfying_fitness_value(0.0)
            .build()
            .unwrap();
        let t0 = Instant::now();

        let mut min = stop.start(OptimizationType::Minimize, t0);
        assert_eq!(min.observe(0, &single(1.0), t0), None);
        assert_eq!(min.observe(1, &single(0.0), t0), Some(TerminalState::Converged));

        let mut max = stop.start(OptimizationType::Maximize, t0);
        assert_eq!(max.observe(0, &single(-1.0), t0), None);
        assert_eq!(max.observe(1, &single(0.5), t0), Some(TerminalState::Converged));
    }

    #[test]
    fn test_time_limit() {
        let stop = StopConditions::builder()
            .time_limit(Duration::from_secs(10))
            .build()
            .unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Minimize, t0);
        assert_eq!(eval.observe(0, &single(5.0), t0 + Duration::from_secs(9)), None);
        assert_eq!(
            eval.observe(1, &single(4.0), t0 + Duration::from_secs(10)),
            Some(TerminalState::TimedOut)
        );
    }

    #[test]
    fn test_time_without_progress() {
        let stop = StopConditions::builder()
            .max_time_without_progress(Duration::from_secs(3))
            .build()
            .unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Minimize, t0);
        assert_eq!(eval.observe(0, &single(5.0), t0), None);
        assert_eq!(eval.observe(1, &single(4.0), t0 + Duration::from_secs(2)), None);
        // Improvement at t=2s resets the clock.
        assert_eq!(eval.observe(2, &single(4.0), t0 + Duration::from_secs(4)), None);
        assert_eq!(
            eval.observe(3, &single(4.0), t0 + Duration::from_secs(5)),
            Some(TerminalState::Stalled)
        );
    }

    #[test]
    fn test_max_iterations_budget() {
        let stop = StopConditions::builder().max_iterations(3).build().unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Minimize, t0);
        assert_eq!(eval.observe(0, &single(3.0), t0), None);
        assert_eq!(eval.observe(1, &single(2.0), t0), None);
        assert_eq!(eval.observe(2, &single(1.0), t0), Some(TerminalState::TimedOut));
    }

    #[test]
    fn test_nan_never_satisfies() {
        let stop = StopConditions::builder()
            .satisfying_fitness_value(100.0)
            .build()
            .unwrap();
        let t0 = Instant::now();
        let mut eval = stop.start(OptimizationType::Minimize, t0);
        assert_eq!(eval.observe(0, &single(f64::NAN), t0), None);
    }
}
