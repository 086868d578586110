//! EA evolutionary loop execution.
//!
//! [`EvolutionaryAlgorithm`] orchestrates the search:
//! evaluate → track best → check stop → select → crossover → mutate →
//! elitism → repeat.

use super::config::EaConfig;
use super::generation::{BestSnapshot, Generation};
use crate::error::{OptimizationError, Result};
use crate::logging::{log_isolated, IterationLogger, RunScope};
use crate::problem::{ObjectiveValue, OptimizationProblem, Solution, Value};
use crate::random::{create_rng, resolve_seed, EvolutionRng};
use crate::stop_conditions::{StopConditions, TerminalState};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of one algorithm instance.
///
/// `Initialized → Running → Finished(_)`. A run aborted by an evaluation
/// error stays `Running`; an instance is never run twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmState {
    Initialized,
    Running,
    Finished(TerminalState),
}

/// Result of an EA optimization run.
#[derive(Debug, Clone)]
pub struct EaResult {
    /// The best solution found during the entire run.
    pub best: Solution,

    /// Fitness of `best`.
    pub best_fitness: ObjectiveValue,

    /// Iteration in which `best` was first found.
    pub best_iteration: usize,

    /// Why the run stopped.
    pub terminal_state: TerminalState,

    /// Number of iterations executed.
    pub iterations: usize,

    /// Primary fitness of the global best at the end of each iteration.
    pub fitness_history: Vec<f64>,

    /// The last evaluated generation.
    pub final_generation: Vec<Solution>,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,

    /// Number of iteration logger calls that failed.
    pub logging_failures: usize,

    /// Seed the run's random generator was created from.
    pub seed: u64,
}

/// Computes the evaluation of every unevaluated member of a generation.
///
/// `iteration` is the iteration the members belong to.
pub(crate) trait GenerationEvaluator {
    fn evaluate(&mut self, iteration: usize, members: &mut [Solution]) -> Result<()>;

    /// Whether a child identical to a parent may inherit its evaluation.
    ///
    /// Sound only when evaluating a genotype twice gives the same result.
    fn reuses_parent_evaluation(&self) -> bool {
        true
    }
}

/// Evaluates members directly against the problem.
struct ProblemEvaluator<'a> {
    problem: &'a OptimizationProblem,
    parallel: bool,
}

impl GenerationEvaluator for ProblemEvaluator<'_> {
    fn evaluate(&mut self, _iteration: usize, members: &mut [Solution]) -> Result<()> {
        if self.parallel {
            evaluate_parallel(self.problem, members)
        } else {
            evaluate_sequential(self.problem, members)
        }
    }
}

fn evaluate_sequential(problem: &OptimizationProblem, members: &mut [Solution]) -> Result<()> {
    members
        .iter_mut()
        .try_for_each(|s| s.evaluate(problem).map(|_| ()))
}

#[cfg(feature = "parallel")]
fn evaluate_parallel(problem: &OptimizationProblem, members: &mut [Solution]) -> Result<()> {
    use rayon::prelude::*;
    members
        .par_iter_mut()
        .try_for_each(|s| s.evaluate(problem).map(|_| ()))
}

#[cfg(not(feature = "parallel"))]
fn evaluate_parallel(problem: &OptimizationProblem, members: &mut [Solution]) -> Result<()> {
    evaluate_sequential(problem, members)
}

/// The evolutionary algorithm over one [`OptimizationProblem`].
///
/// # Usage
///
/// ```
/// use u_evolution::ea::{EaConfig, EvolutionaryAlgorithm};
/// use u_evolution::problem::{DecisionVariable, OptimizationProblem, Value};
/// use u_evolution::{StopConditions, TerminalState};
///
/// let problem = OptimizationProblem::builder()
///     .variable("x", DecisionVariable::integer(0, 10).unwrap())
///     .objective(|v| Ok(v[0].as_f64().unwrap_or(f64::NAN)))
///     .minimize()
///     .build()
///     .unwrap();
/// let stop = StopConditions::builder()
///     .satisfying_fitness_value(0.0)
///     .max_iterations(500)
///     .build()
///     .unwrap();
/// let config = EaConfig::default().with_population_size(4).with_seed(42);
///
/// let mut ea = EvolutionaryAlgorithm::new(&problem, stop, config).unwrap();
/// let result = ea.run().unwrap();
/// assert_eq!(result.terminal_state, TerminalState::Converged);
/// assert_eq!(result.best.genotype(), &[Value::Int(0)]);
/// ```
pub struct EvolutionaryAlgorithm<'a> {
    problem: &'a OptimizationProblem,
    stop: StopConditions,
    config: EaConfig,
    logger: Option<Arc<dyn IterationLogger>>,
    scope: RunScope,
    initial_population: Vec<Solution>,
    state: AlgorithmState,
}

impl<'a> EvolutionaryAlgorithm<'a> {
    /// Creates an algorithm instance in the `Initialized` state.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the stop conditions or the configuration
    /// are invalid for this problem.
    pub fn new(
        problem: &'a OptimizationProblem,
        stop: StopConditions,
        config: EaConfig,
    ) -> Result<Self> {
        stop.validate()?;
        config.validate_for(problem.dimension())?;
        Ok(Self {
            problem,
            stop,
            config,
            logger: None,
            scope: RunScope::Main,
            initial_population: Vec::new(),
            state: AlgorithmState::Initialized,
        })
    }

    /// Attaches an iteration logger.
    pub fn with_logger(mut self, logger: Arc<dyn IterationLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Seeds the first generation. Missing members are sampled; already
    /// evaluated solutions are not evaluated again.
    ///
    /// # Errors
    /// `InvalidConfiguration` when there are more solutions than
    /// `population_size` or a genotype does not fit the problem.
    pub fn with_initial_population(mut self, solutions: Vec<Solution>) -> Result<Self> {
        if solutions.len() > self.config.population_size {
            return Err(OptimizationError::config(format!(
                "initial population has {} solutions, population_size is {}",
                solutions.len(),
                self.config.population_size
            )));
        }
        if let Some(bad) = solutions
            .iter()
            .position(|s| !self.problem.is_valid_genotype(s.genotype()))
        {
            return Err(OptimizationError::config(format!(
                "initial solution #{bad} does not fit the problem's decision variables"
            )));
        }
        self.initial_population = solutions;
        Ok(self)
    }

    pub(crate) fn with_scope(mut self, scope: RunScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn state(&self) -> AlgorithmState {
        self.state
    }

    pub fn config(&self) -> &EaConfig {
        &self.config
    }

    pub fn problem(&self) -> &OptimizationProblem {
        self.problem
    }

    /// Runs the search until a stop condition fires.
    ///
    /// # Errors
    /// - `InvalidState` when the instance has already been run
    /// - `Evaluation` when an objective or penalty function fails; the run
    ///   is aborted
    pub fn run(&mut self) -> Result<EaResult> {
        let mut evaluator = ProblemEvaluator {
            problem: self.problem,
            parallel: self.config.parallel,
        };
        self.run_with(&mut evaluator)
    }

    pub(crate) fn run_with<E: GenerationEvaluator>(
        &mut self,
        evaluator: &mut E,
    ) -> Result<EaResult> {
        if self.state != AlgorithmState::Initialized {
            return Err(OptimizationError::state(format!(
                "algorithm can only be run once, current state is {:?}",
                self.state
            )));
        }
        self.state = AlgorithmState::Running;
        let result = self.search(evaluator)?;
        self.state = AlgorithmState::Finished(result.terminal_state);
        Ok(result)
    }

    fn search<E: GenerationEvaluator>(&mut self, evaluator: &mut E) -> Result<EaResult> {
        let direction = self.problem.direction();
        let seed = resolve_seed(self.config.seed);
        let mut rng = create_rng(seed);
        let started = Instant::now();
        let mut stop = self.stop.start(direction, started);

        tracing::info!(
            population_size = self.config.population_size,
            selection = self.config.selection.label(),
            crossover = self.config.crossover.label(),
            mutation = self.config.mutation.label(),
            seed,
            "evolutionary run started"
        );

        let mut generation = Generation::new(self.initial_members(&mut rng));
        let mut fitness_history = Vec::new();
        let mut logging_failures = 0;
        let mut iteration = 0;

        let terminal_state = loop {
            // 1. Evaluate
            evaluator.evaluate(iteration, generation.members_mut())?;

            // 2. Track the global best, then log
            let improved = generation.update_best(iteration, direction)?;
            let best = global_best(&generation)?;
            fitness_history.push(best.solution.fitness_f64());
            if let Some(logger) = &self.logger {
                if log_isolated(
                    logger.as_ref(),
                    self.scope,
                    iteration,
                    &best.solution,
                    generation.members(),
                ) {
                    logging_failures += 1;
                }
            }
            tracing::debug!(
                iteration,
                improved,
                best_fitness = best.solution.fitness_f64(),
                "iteration evaluated"
            );

            // 3. Stop conditions
            let iteration_best = generation
                .iteration_best(direction)
                .and_then(Solution::fitness)
                .ok_or_else(|| OptimizationError::state("generation has no evaluated member"))?;
            if let Some(state) = stop.observe(iteration, iteration_best, Instant::now()) {
                break state;
            }

            // 4. Next generation
            let children = self.breed(
                generation.members(),
                evaluator.reuses_parent_evaluation(),
                &mut rng,
            )?;
            generation.replace_members(children);
            iteration += 1;

            // 5. Elitism, on evaluated children
            if self.config.apply_elitism {
                evaluator.evaluate(iteration, generation.members_mut())?;
                generation.preserve_best(direction);
            }
        };

        let best = global_best(&generation)?.clone();
        let elapsed = stop.elapsed(Instant::now());
        tracing::info!(
            ?terminal_state,
            iterations = iteration + 1,
            best_fitness = best.solution.fitness_f64(),
            elapsed_ms = elapsed.as_millis() as u64,
            "evolutionary run finished"
        );

        let BestSnapshot {
            solution,
            iteration: best_iteration,
        } = best;
        Ok(EaResult {
            best_fitness: solution
                .fitness()
                .cloned()
                .ok_or_else(|| OptimizationError::state("best solution is unevaluated"))?,
            best: solution,
            best_iteration,
            terminal_state,
            iterations: iteration + 1,
            fitness_history,
            final_generation: generation.into_members(),
            elapsed,
            logging_failures,
            seed,
        })
    }

    /// Caller-provided solutions first, the rest sampled.
    fn initial_members(&mut self, rng: &mut EvolutionRng) -> Vec<Solution> {
        let mut members = std::mem::take(&mut self.initial_population);
        while members.len() < self.config.population_size {
            members.push(Solution::new(self.problem.sample_genotype(rng)));
        }
        members
    }

    fn breed(
        &self,
        members: &[Solution],
        reuse_evaluations: bool,
        rng: &mut EvolutionRng,
    ) -> Result<Vec<Solution>> {
        let config = &self.config;
        let direction = self.problem.direction();
        let pairs = config.selection.select_pairs(members, direction, rng)?;
        let mut children = Vec::with_capacity(pairs.len() * 2);
        for (a, b) in pairs {
            let parents = [&members[a], &members[b]];
            let (p1, p2) = (parents[0].genotype(), parents[1].genotype());
            let (mut c1, mut c2) = config.crossover.apply(p1, p2, rng)?;
            for child in [&mut c1, &mut c2] {
                let variables = self.problem.variables();
                config.mutation.apply(child, variables, config.mutation_chance, rng)?;
            }
            for child in [c1, c2] {
                children.push(if reuse_evaluations {
                    offspring(child, parents)
                } else {
                    Solution::new(child)
                });
            }
        }
        Ok(children)
    }
}

/// Wraps a child genotype, reusing a parent's evaluation when the child is
/// an unchanged copy of it.
fn offspring(genotype: Vec<Value>, parents: [&Solution; 2]) -> Solution {
    match parents
        .iter()
        .find(|p| p.genotype() == genotype.as_slice())
        .and_then(|p| p.evaluation())
    {
        Some(evaluation) => Solution::evaluated(genotype, evaluation.clone()),
        None => Solution::new(genotype),
    }
}

fn global_best(generation: &Generation) -> Result<&BestSnapshot> {
    generation
        .best()
        .ok_or_else(|| OptimizationError::state("no global best recorded"))
}
