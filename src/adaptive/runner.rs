//! Adaptive two-level optimization loop.
//!
//! An outer [`EvolutionaryAlgorithm`] searches the [`AdaptationProblem`];
//! every outer fitness evaluation is a full inner run on the original
//! problem. Each outer generation therefore costs `population_size` inner
//! runs.

use super::problem::{AdaptationProblem, TrialOutcome, TrialSpec};
use crate::ea::{AlgorithmState, EaConfig, EvolutionaryAlgorithm, GenerationEvaluator};
use crate::error::{OptimizationError, Result};
use crate::logging::{IterationLogger, RunScope};
use crate::problem::{Evaluation, ObjectiveValue, OptimizationType, Solution};
use crate::random::{derive_seed, resolve_seed};
use crate::stop_conditions::{StopConditions, TerminalState};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of an adaptive optimization run.
#[derive(Debug, Clone)]
pub struct AdaptiveResult {
    /// Best solution to the original problem found by any inner run.
    pub best: Solution,

    /// Configuration (seed included) of the inner run that found `best`.
    pub best_config: EaConfig,

    /// Best hyperparameter genotype of the outer search, scored.
    pub adaptation_best: Solution,

    /// Why the outer run stopped.
    pub terminal_state: TerminalState,

    /// Outer iterations executed.
    pub iterations: usize,

    /// Inner runs executed, the baseline included.
    pub trials: usize,

    /// Best adaptation score at the end of each outer iteration.
    pub score_history: Vec<f64>,

    /// Failed logger calls across the outer run and every inner run.
    pub logging_failures: usize,

    pub elapsed: Duration,

    /// Outer seed; inner seeds are derived from it.
    pub seed: u64,
}

/// Evolutionary algorithm that tunes its own hyperparameters.
///
/// The run starts with a baseline trial of [`EaConfig::default()`] on the
/// outer seed, so the result is never worse than that plain run.
///
/// # Usage
///
/// ```
/// use std::sync::Arc;
/// use u_evolution::adaptive::{
///     AdaptationBounds, AdaptationProblem, AdaptationType, AdaptiveEvolutionaryAlgorithm,
/// };
/// use u_evolution::ea::EaConfig;
/// use u_evolution::problem::{DecisionVariable, OptimizationProblem};
/// use u_evolution::StopConditions;
///
/// let original = OptimizationProblem::builder()
///     .variable("x", DecisionVariable::float(-4.0, 4.0).unwrap())
///     .variable("y", DecisionVariable::float(-4.0, 4.0).unwrap())
///     .objective(|v| {
///         let (x, y) = (v[0].as_f64().unwrap_or(0.0), v[1].as_f64().unwrap_or(0.0));
///         Ok(x * x + y * y)
///     })
///     .build()
///     .unwrap();
/// let adaptation = AdaptationProblem::new(
///     Arc::new(original),
///     AdaptationBounds::default().with_population_size(4, 12),
///     AdaptationType::BestSolution,
///     StopConditions::builder().max_iterations(10).build().unwrap(),
/// )
/// .unwrap();
/// let stop = StopConditions::builder().max_iterations(2).build().unwrap();
/// let config = EaConfig::default().with_population_size(4).with_seed(7);
///
/// let mut adaptive = AdaptiveEvolutionaryAlgorithm::new(adaptation, stop, config).unwrap();
/// let result = adaptive.run().unwrap();
/// assert!(result.best.fitness_f64() < 32.0);
/// assert_eq!(result.best_config.population_size % 2, 0);
/// ```
pub struct AdaptiveEvolutionaryAlgorithm {
    adaptation: AdaptationProblem,
    stop: StopConditions,
    config: EaConfig,
    logger: Option<Arc<dyn IterationLogger>>,
    state: AlgorithmState,
}

impl AdaptiveEvolutionaryAlgorithm {
    /// Creates the adaptive algorithm.
    ///
    /// `stop` governs the outer run and `config` configures the outer
    /// search over hyperparameters; trials use the adaptation problem's
    /// trial stop conditions.
    ///
    /// # Errors
    /// `InvalidConfiguration` for invalid outer stop conditions or an outer
    /// configuration that does not fit the adaptation problem.
    pub fn new(
        adaptation: AdaptationProblem,
        stop: StopConditions,
        config: EaConfig,
    ) -> Result<Self> {
        stop.validate()?;
        config.validate_for(adaptation.problem().dimension())?;
        Ok(Self {
            adaptation,
            stop,
            config,
            logger: None,
            state: AlgorithmState::Initialized,
        })
    }

    /// Attaches a logger receiving both outer and inner iterations.
    pub fn with_logger(mut self, logger: Arc<dyn IterationLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn state(&self) -> AlgorithmState {
        self.state
    }

    pub fn adaptation(&self) -> &AdaptationProblem {
        &self.adaptation
    }

    pub fn config(&self) -> &EaConfig {
        &self.config
    }

    /// Runs the outer search until its stop conditions fire.
    ///
    /// # Errors
    /// - `InvalidState` when the instance has already been run
    /// - `Evaluation` when the original objective or penalty fails in any
    ///   inner run; the whole run is aborted
    pub fn run(&mut self) -> Result<AdaptiveResult> {
        if self.state != AlgorithmState::Initialized {
            return Err(OptimizationError::state(format!(
                "adaptive algorithm can only be run once, current state is {:?}",
                self.state
            )));
        }
        self.state = AlgorithmState::Running;
        let result = self.search()?;
        self.state = AlgorithmState::Finished(result.terminal_state);
        Ok(result)
    }

    fn search(&self) -> Result<AdaptiveResult> {
        let started = Instant::now();
        let seed = resolve_seed(self.config.seed);
        let spec: &TrialSpec = self.adaptation.spec();
        let direction = spec.original().direction();

        let baseline = spec.run_config(
            EaConfig::default(),
            seed,
            RunScope::Baseline,
            self.logger.as_ref(),
        )?;
        tracing::info!(
            seed,
            baseline_score = baseline.score,
            outer_population_size = self.config.population_size,
            "adaptive run started"
        );

        let initial = match self.adaptation.encode(&baseline.config) {
            Some(genotype) => vec![Solution::evaluated(
                genotype,
                score_evaluation(&baseline, direction),
            )],
            None => {
                tracing::debug!("default configuration lies outside the adaptation bounds");
                Vec::new()
            }
        };

        let mut evaluator = TrialEvaluator {
            spec,
            seed,
            parallel: self.config.parallel,
            logger: self.logger.as_ref(),
            trials: 1,
            logging_failures: baseline.result.logging_failures,
            best: BestTrial {
                solution: baseline.result.best,
                config: baseline.config,
            },
        };

        let mut outer = EvolutionaryAlgorithm::new(
            self.adaptation.problem(),
            self.stop.clone(),
            self.config.clone().with_seed(seed),
        )?
        .with_initial_population(initial)?;
        if let Some(logger) = &self.logger {
            outer = outer.with_logger(Arc::clone(logger));
        }
        let outer_result = outer.run_with(&mut evaluator)?;

        let elapsed = started.elapsed();
        tracing::info!(
            terminal_state = ?outer_result.terminal_state,
            iterations = outer_result.iterations,
            trials = evaluator.trials,
            best_fitness = evaluator.best.solution.fitness_f64(),
            elapsed_ms = elapsed.as_millis() as u64,
            "adaptive run finished"
        );

        Ok(AdaptiveResult {
            best: evaluator.best.solution,
            best_config: evaluator.best.config,
            adaptation_best: outer_result.best,
            terminal_state: outer_result.terminal_state,
            iterations: outer_result.iterations,
            trials: evaluator.trials,
            score_history: outer_result.fitness_history,
            logging_failures: evaluator.logging_failures + outer_result.logging_failures,
            elapsed,
            seed,
        })
    }
}

fn score_evaluation(trial: &TrialOutcome, direction: OptimizationType) -> Evaluation {
    Evaluation::new(ObjectiveValue::Single(trial.score), 0.0, direction)
}

struct BestTrial {
    solution: Solution,
    config: EaConfig,
}

/// Scores outer members by running one inner trial each.
struct TrialEvaluator<'s> {
    spec: &'s TrialSpec,
    seed: u64,
    parallel: bool,
    logger: Option<&'s Arc<dyn IterationLogger>>,
    trials: usize,
    logging_failures: usize,
    best: BestTrial,
}

impl TrialEvaluator<'_> {
    fn run_trial(
        &self,
        iteration: usize,
        index: usize,
        solution: &Solution,
    ) -> Result<TrialOutcome> {
        self.spec.run_genotype(
            solution.genotype(),
            derive_seed(self.seed, iteration as u64, index as u64),
            RunScope::Trial {
                upper_iteration: iteration,
                index,
            },
            self.logger,
        )
    }
}

impl GenerationEvaluator for TrialEvaluator<'_> {
    fn evaluate(&mut self, iteration: usize, members: &mut [Solution]) -> Result<()> {
        let pending: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_evaluated())
            .map(|(i, _)| i)
            .collect();
        let outcomes = {
            let this = &*self;
            let shared: &[Solution] = members;
            collect_trials(&pending, this.parallel, |&index: &usize| {
                this.run_trial(iteration, index, &shared[index])
            })?
        };

        // Folded in index order so ties resolve the same way in parallel.
        let direction = self.spec.original().direction();
        for (index, outcome) in pending.into_iter().zip(outcomes) {
            self.trials += 1;
            self.logging_failures += outcome.result.logging_failures;
            tracing::debug!(
                upper_iteration = iteration,
                index,
                score = outcome.score,
                "trial finished"
            );
            let evaluation = score_evaluation(&outcome, direction);
            if outcome.result.best.is_better_than(&self.best.solution, direction) {
                self.best = BestTrial {
                    solution: outcome.result.best,
                    config: outcome.config,
                };
            }
            let genotype = members[index].genotype().to_vec();
            members[index] = Solution::evaluated(genotype, evaluation);
        }
        Ok(())
    }

    // Every trial draws its own seed, so a parent's score says nothing
    // definite about an identical child.
    fn reuses_parent_evaluation(&self) -> bool {
        false
    }
}

#[cfg(feature = "parallel")]
fn collect_trials<F>(pending: &[usize], parallel: bool, run: F) -> Result<Vec<TrialOutcome>>
where
    F: Fn(&usize) -> Result<TrialOutcome> + Send + Sync,
{
    use rayon::prelude::*;
    if parallel {
        pending.par_iter().map(run).collect()
    } else {
        pending.iter().map(run).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn collect_trials<F>(pending: &[usize], _parallel: bool, run: F) -> Result<Vec<TrialOutcome>>
where
    F: Fn(&usize) -> Result<TrialOutcome>,
{
    pending.iter().map(run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::{AdaptationBounds, AdaptationType};
    use crate::error::BoxError;
    use crate::logging::IterationRecord;
    use crate::problem::{DecisionVariable, OptimizationProblem, Value};
    use std::sync::Mutex;

    fn sphere(direction: OptimizationType) -> Arc<OptimizationProblem> {
        let sign = match direction {
            OptimizationType::Minimize => 1.0,
            OptimizationType::Maximize => -1.0,
        };
        let mut builder = OptimizationProblem::builder().direction(direction);
        for i in 0..4 {
            let x = DecisionVariable::float(-5.0, 5.0).unwrap();
            builder = builder.variable(format!("x{i}"), x);
        }
        Arc::new(
            builder
                .objective(move |v| {
                    Ok(sign * v.iter().map(|g| g.as_f64().unwrap().powi(2)).sum::<f64>())
                })
                .build()
                .unwrap(),
        )
    }

    fn trial_stop() -> StopConditions {
        StopConditions::builder().max_iterations(8).build().unwrap()
    }

    fn outer_stop(iterations: usize) -> StopConditions {
        StopConditions::builder().max_iterations(iterations).build().unwrap()
    }

    fn adaptive(
        original: Arc<OptimizationProblem>,
        bounds: AdaptationBounds,
        seed: u64,
    ) -> AdaptiveEvolutionaryAlgorithm {
        let scoring = AdaptationType::BestSolution;
        let adaptation = AdaptationProblem::new(original, bounds, scoring, trial_stop()).unwrap();
        let config = EaConfig::default().with_population_size(4).with_seed(seed);
        AdaptiveEvolutionaryAlgorithm::new(adaptation, outer_stop(2), config).unwrap()
    }

    #[test]
    fn test_never_worse_than_default_run() {
        for direction in [OptimizationType::Minimize, OptimizationType::Maximize] {
            let original = sphere(direction);
            for seed in 0..3 {
                let plain = EvolutionaryAlgorithm::new(
                    &original,
                    trial_stop(),
                    EaConfig::default().with_seed(seed),
                )
                .unwrap()
                .run()
                .unwrap();
                let result = adaptive(Arc::clone(&original), AdaptationBounds::default(), seed)
                    .run()
                    .unwrap();
                assert!(
                    !plain.best.is_better_than(&result.best, direction),
                    "seed {seed}: adaptive {} vs plain {}",
                    result.best.fitness_f64(),
                    plain.best.fitness_f64()
                );
            }
        }
    }

    #[test]
    fn test_best_config_reproduces_best() {
        let original = sphere(OptimizationType::Minimize);
        let bounds = AdaptationBounds::default().with_population_size(4, 16);
        let result = adaptive(Arc::clone(&original), bounds, 11).run().unwrap();
        let replay = EvolutionaryAlgorithm::new(&original, trial_stop(), result.best_config.clone())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(replay.best, result.best);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let original = sphere(OptimizationType::Minimize);
        let bounds = AdaptationBounds::default().with_population_size(4, 16);
        let a = adaptive(Arc::clone(&original), bounds.clone(), 5).run().unwrap();
        let b = adaptive(original, bounds, 5).run().unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.best_config, b.best_config);
        assert_eq!(a.trials, b.trials);
        assert_eq!(a.score_history, b.score_history);
    }

    #[test]
    fn test_trial_count_and_terminal_state() {
        let bounds = AdaptationBounds::default().with_population_size(4, 16);
        let result = adaptive(sphere(OptimizationType::Minimize), bounds, 3)
            .run()
            .unwrap();
        assert_eq!(result.terminal_state, TerminalState::TimedOut);
        assert_eq!(result.iterations, 2);
        // Baseline plus one trial per member per outer iteration.
        assert_eq!(result.trials, 9);
        assert_eq!(result.score_history.len(), 2);
        assert_eq!(result.seed, 3);
    }

    #[test]
    fn test_identical_children_still_run_trials() {
        let adaptation = AdaptationProblem::new(
            sphere(OptimizationType::Minimize),
            AdaptationBounds::default().with_population_size(4, 16),
            AdaptationType::BestSolution,
            trial_stop(),
        )
        .unwrap();
        // Without mutation most children copy a parent's genotype.
        let config = EaConfig::default()
            .with_population_size(8)
            .with_elitism(false)
            .with_mutation_chance(0.0)
            .with_seed(11);
        let result = AdaptiveEvolutionaryAlgorithm::new(adaptation, outer_stop(4), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(result.iterations, 4);
        assert_eq!(result.trials, 1 + 8 * 4);
    }

    #[test]
    fn test_run_twice_is_invalid_state() {
        let bounds = AdaptationBounds::default().with_population_size(4, 8);
        let mut algorithm = adaptive(sphere(OptimizationType::Minimize), bounds, 1);
        let result = algorithm.run().unwrap();
        assert_eq!(algorithm.state(), AlgorithmState::Finished(result.terminal_state));
        assert!(algorithm.run().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_outer_config_is_validated() {
        let adaptation = AdaptationProblem::new(
            sphere(OptimizationType::Minimize),
            AdaptationBounds::default(),
            AdaptationType::BestSolution,
            trial_stop(),
        )
        .unwrap();
        let err = AdaptiveEvolutionaryAlgorithm::new(
            adaptation,
            outer_stop(2),
            EaConfig::default().with_population_size(5),
        )
        .err()
        .unwrap();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_inner_failure_aborts_run() {
        let original = Arc::new(
            OptimizationProblem::builder()
                .variable("x", DecisionVariable::integer(0, 3).unwrap())
                .objective(|v: &[Value]| -> std::result::Result<f64, BoxError> {
                    if v[0] == Value::Int(3) {
                        Err("objective exploded".into())
                    } else {
                        Ok(0.5)
                    }
                })
                .build()
                .unwrap(),
        );
        let bounds = AdaptationBounds::default().with_population_size(4, 8);
        let mut algorithm = adaptive(original, bounds, 2);
        let err = algorithm.run().unwrap_err();
        assert!(matches!(err, OptimizationError::Evaluation(_)));
        assert_eq!(err.to_string(), "objective exploded");
        assert_eq!(algorithm.state(), AlgorithmState::Running);
    }

    struct ScopeRecorder {
        scopes: Mutex<Vec<RunScope>>,
    }

    impl IterationLogger for ScopeRecorder {
        fn log_iteration(&self, record: &IterationRecord<'_>) -> std::result::Result<(), BoxError> {
            self.scopes.lock().unwrap().push(record.scope);
            Ok(())
        }
    }

    #[test]
    fn test_logger_sees_every_run() {
        let recorder = Arc::new(ScopeRecorder {
            scopes: Mutex::new(Vec::new()),
        });
        let bounds = AdaptationBounds::default().with_population_size(4, 8);
        let result = adaptive(sphere(OptimizationType::Minimize), bounds, 9)
            .with_logger(recorder.clone())
            .run()
            .unwrap();
        assert_eq!(result.logging_failures, 0);

        let scopes = recorder.scopes.lock().unwrap();
        assert_eq!(scopes.iter().filter(|s| **s == RunScope::Main).count(), 2);
        assert!(scopes.contains(&RunScope::Baseline));
        assert!(scopes.iter().any(|s| matches!(
            s,
            RunScope::Trial {
                upper_iteration: 0,
                ..
            }
        )));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_trials_match_sequential() {
        let original = sphere(OptimizationType::Minimize);
        let bounds = AdaptationBounds::default().with_population_size(4, 16);
        let sequential = adaptive(Arc::clone(&original), bounds.clone(), 21).run().unwrap();

        let scoring = AdaptationType::BestSolution;
        let adaptation = AdaptationProblem::new(original, bounds, scoring, trial_stop()).unwrap();
        let config = EaConfig::default()
            .with_population_size(4)
            .with_seed(21)
            .with_parallel(true);
        let parallel = AdaptiveEvolutionaryAlgorithm::new(adaptation, outer_stop(2), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(parallel.best, sequential.best);
        assert_eq!(parallel.best_config, sequential.best_config);
    }
}
