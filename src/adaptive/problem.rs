//! The adaptation problem: EA hyperparameters as decision variables.
//!
//! A genotype of the adaptation problem decodes into an [`EaConfig`]. Its
//! objective runs one bounded inner trial of the [`EvolutionaryAlgorithm`]
//! on the original problem and scores the outcome.

use super::config::{
    crossover_from_label, mutation_from_label, selection_from_label, AdaptationBounds,
    AdaptationType, OperatorParams,
};
use crate::ea::{Crossover, EaConfig, EaResult, EvolutionaryAlgorithm, Mutation, Selection};
use crate::error::{BoxError, OptimizationError, Result};
use crate::logging::{IterationLogger, RunScope};
use crate::problem::{DecisionVariable, OptimizationProblem, Solution, Value};
use crate::random::hash_words;
use crate::stop_conditions::StopConditions;
use std::sync::Arc;

/// Names of the adaptation problem's decision variables, in gene order.
pub const ADAPTATION_VARIABLES: [&str; 11] = [
    "population_size",
    "selection_type",
    "crossover_type",
    "mutation_type",
    "mutation_chance",
    "apply_elitism",
    "tournament_group_size",
    "roulette_bias",
    "ranking_bias",
    "crossover_points",
    "mutation_points",
];

const POPULATION_SIZE: usize = 0;
const SELECTION_TYPE: usize = 1;
const CROSSOVER_TYPE: usize = 2;
const MUTATION_TYPE: usize = 3;
const MUTATION_CHANCE: usize = 4;
const APPLY_ELITISM: usize = 5;
const TOURNAMENT_GROUP_SIZE: usize = 6;
const ROULETTE_BIAS: usize = 7;
const RANKING_BIAS: usize = 8;
const CROSSOVER_POINTS: usize = 9;
const MUTATION_POINTS: usize = 10;

/// Salt for seeds derived from adaptation genotypes.
const GENOTYPE_SEED_SALT: u64 = 0xADA9_7ED0_5EED;

/// Outcome of one inner trial run.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Configuration the trial ran with, seed included.
    pub config: EaConfig,
    pub result: EaResult,
    /// Score under the [`AdaptationType`], in the original direction.
    pub score: f64,
}

/// Everything a trial needs; shared read-only by concurrent trials.
#[derive(Debug)]
pub(crate) struct TrialSpec {
    original: Arc<OptimizationProblem>,
    bounds: AdaptationBounds,
    adaptation_type: AdaptationType,
    trial_stop: StopConditions,
}

impl TrialSpec {
    pub(crate) fn original(&self) -> &OptimizationProblem {
        &self.original
    }

    fn decode(&self, genotype: &[Value]) -> Result<EaConfig> {
        if genotype.len() != ADAPTATION_VARIABLES.len() {
            return Err(OptimizationError::state(format!(
                "adaptation genotype has {} genes, expected {}",
                genotype.len(),
                ADAPTATION_VARIABLES.len()
            )));
        }
        let malformed = |i: usize| {
            OptimizationError::state(format!(
                "adaptation gene '{}' has an unexpected value {:?}",
                ADAPTATION_VARIABLES[i], genotype[i]
            ))
        };
        let float = |i: usize| genotype[i].as_f64().ok_or_else(|| malformed(i));
        let count = |i: usize| {
            genotype[i]
                .as_i64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| malformed(i))
        };
        let label = |i: usize| genotype[i].as_label().ok_or_else(|| malformed(i));

        let population_size = float(POPULATION_SIZE)?.round() as usize;
        if population_size < 2 || population_size % 2 != 0 {
            return Err(malformed(POPULATION_SIZE));
        }
        let params = OperatorParams {
            group_size: count(TOURNAMENT_GROUP_SIZE)?.clamp(2, population_size),
            roulette_bias: float(ROULETTE_BIAS)?,
            ranking_bias: float(RANKING_BIAS)?,
            crossover_points: count(CROSSOVER_POINTS)?,
            mutation_points: count(MUTATION_POINTS)?,
        };

        Ok(EaConfig {
            population_size,
            selection: selection_from_label(label(SELECTION_TYPE)?, &params)
                .ok_or_else(|| malformed(SELECTION_TYPE))?,
            crossover: crossover_from_label(label(CROSSOVER_TYPE)?, &params)
                .ok_or_else(|| malformed(CROSSOVER_TYPE))?,
            mutation: mutation_from_label(label(MUTATION_TYPE)?, &params)
                .ok_or_else(|| malformed(MUTATION_TYPE))?,
            mutation_chance: float(MUTATION_CHANCE)?,
            apply_elitism: genotype[APPLY_ELITISM]
                .as_bool()
                .ok_or_else(|| malformed(APPLY_ELITISM))?,
            parallel: false,
            seed: None,
        })
    }

    /// Runs the original problem with `config` under the trial stop
    /// conditions. Pure given `(config, seed)`.
    pub(crate) fn run_config(
        &self,
        config: EaConfig,
        seed: u64,
        scope: RunScope,
        logger: Option<&Arc<dyn IterationLogger>>,
    ) -> Result<TrialOutcome> {
        let config = config.with_seed(seed);
        let stop = self.trial_stop.clone();
        let mut ea = EvolutionaryAlgorithm::new(&self.original, stop, config.clone())?
            .with_scope(scope);
        if let Some(logger) = logger {
            ea = ea.with_logger(Arc::clone(logger));
        }
        let result = ea.run()?;
        let score = self.score(&result);
        Ok(TrialOutcome {
            config,
            result,
            score,
        })
    }

    pub(crate) fn run_genotype(
        &self,
        genotype: &[Value],
        seed: u64,
        scope: RunScope,
        logger: Option<&Arc<dyn IterationLogger>>,
    ) -> Result<TrialOutcome> {
        let config = self.decode(genotype)?;
        self.run_config(config, seed, scope, logger)
    }

    fn score(&self, result: &EaResult) -> f64 {
        match self.adaptation_type {
            AdaptationType::BestSolution => result.best.fitness_f64(),
            AdaptationType::BestSolutions { count } => self.best_fitnesses(result, count).sum(),
            AdaptationType::BestSolutionsPercentile { percentile } => {
                let n = result.final_generation.len();
                let k = ((percentile * n as f64).ceil() as usize).clamp(1, n.max(1));
                self.best_fitnesses(result, k).sum::<f64>() / k as f64
            }
        }
    }

    /// Primary fitnesses of the `k` best members of the final generation.
    fn best_fitnesses<'r>(&self, result: &'r EaResult, k: usize) -> impl Iterator<Item = f64> + 'r {
        let direction = self.original.direction();
        let mut ranked: Vec<&Solution> = result.final_generation.iter().collect();
        ranked.sort_by(|a, b| a.compare(b, direction));
        ranked.into_iter().take(k).map(Solution::fitness_f64)
    }
}

/// Optimization problem over the EA's own hyperparameters.
///
/// Its decision variables are listed in [`ADAPTATION_VARIABLES`]; its
/// direction is the original problem's direction, because scores are
/// fitness values of the original problem.
///
/// ```
/// use std::sync::Arc;
/// use u_evolution::adaptive::{AdaptationBounds, AdaptationProblem, AdaptationType};
/// use u_evolution::problem::{DecisionVariable, OptimizationProblem};
/// use u_evolution::StopConditions;
///
/// let original = OptimizationProblem::builder()
///     .variable("x", DecisionVariable::integer(0, 10).unwrap())
///     .objective(|v| Ok(v[0].as_f64().unwrap_or(f64::NAN)))
///     .build()
///     .unwrap();
/// let adaptation = AdaptationProblem::new(
///     Arc::new(original),
///     AdaptationBounds::default().with_population_size(4, 16),
///     AdaptationType::BestSolution,
///     StopConditions::builder().max_iterations(10).build().unwrap(),
/// )
/// .unwrap();
/// assert_eq!(adaptation.problem().dimension(), 11);
/// ```
#[derive(Debug)]
pub struct AdaptationProblem {
    spec: Arc<TrialSpec>,
    problem: OptimizationProblem,
}

impl AdaptationProblem {
    /// Builds the adaptation problem for `original`.
    ///
    /// # Errors
    /// `InvalidConfiguration` for invalid bounds or adaptation type, and for
    /// trial stop conditions without a `time_limit` or `max_iterations`.
    pub fn new(
        original: Arc<OptimizationProblem>,
        bounds: AdaptationBounds,
        adaptation_type: AdaptationType,
        trial_stop: StopConditions,
    ) -> Result<Self> {
        bounds.validate()?;
        adaptation_type.validate(bounds.population_size.0)?;
        trial_stop.validate()?;
        if trial_stop.time_limit().is_none() && trial_stop.max_iterations().is_none() {
            return Err(OptimizationError::config(
                "trial stop conditions need a time_limit or max_iterations so every trial ends",
            ));
        }
        let bounds = bounds.clamped_to(original.dimension());

        let mut builder = OptimizationProblem::builder().direction(original.direction());
        for (name, variable) in ADAPTATION_VARIABLES.iter().zip(variables(&bounds)?) {
            builder = builder.variable(*name, variable);
        }

        let spec = Arc::new(TrialSpec {
            original,
            bounds,
            adaptation_type,
            trial_stop,
        });
        let objective_spec = Arc::clone(&spec);
        let problem = builder
            .objective(move |genotype: &[Value]| {
                let seed = hash_words(GENOTYPE_SEED_SALT, genotype.iter().map(Value::fingerprint));
                objective_spec
                    .run_genotype(genotype, seed, RunScope::Main, None)
                    .map(|trial| trial.score)
                    .map_err(|e| Box::new(e) as BoxError)
            })
            .build()?;

        Ok(Self { spec, problem })
    }

    /// The adaptation problem itself.
    pub fn problem(&self) -> &OptimizationProblem {
        &self.problem
    }

    /// The problem whose solutions the trials search for.
    pub fn original(&self) -> &OptimizationProblem {
        &self.spec.original
    }

    /// Bounds after clamping to the original problem.
    pub fn bounds(&self) -> &AdaptationBounds {
        &self.spec.bounds
    }

    pub fn adaptation_type(&self) -> AdaptationType {
        self.spec.adaptation_type
    }

    pub fn trial_stop_conditions(&self) -> &StopConditions {
        &self.spec.trial_stop
    }

    pub(crate) fn spec(&self) -> &Arc<TrialSpec> {
        &self.spec
    }

    /// Decodes an adaptation genotype into an inner-run configuration.
    ///
    /// The tournament group size is capped at the decoded population size.
    ///
    /// # Errors
    /// `InvalidState` for a genotype that does not come from this problem.
    pub fn decode(&self, genotype: &[Value]) -> Result<EaConfig> {
        self.spec.decode(genotype)
    }

    /// Encodes `config` as an adaptation genotype, or `None` when it lies
    /// outside the bounds. Parameters unused by the chosen operators take
    /// the lower bound of their range.
    pub fn encode(&self, config: &EaConfig) -> Option<Vec<Value>> {
        let b = &self.spec.bounds;
        let (group_size, roulette_bias, ranking_bias) = match config.selection {
            Selection::Tournament { group_size } | Selection::DoubleTournament { group_size } => {
                (group_size, b.roulette_bias.0, b.ranking_bias.0)
            }
            Selection::Roulette { bias } => (b.tournament_group_size.0, bias, b.ranking_bias.0),
            Selection::Ranking { bias } => (b.tournament_group_size.0, b.roulette_bias.0, bias),
            Selection::Uniform => (b.tournament_group_size.0, b.roulette_bias.0, b.ranking_bias.0),
        };
        let crossover_points = match config.crossover {
            Crossover::MultiPoint { points } => points,
            _ => b.crossover_points.0,
        };
        let mutation_points = match config.mutation {
            Mutation::MultiPoint { points } => points,
            _ => b.mutation_points.0,
        };
        let genotype = vec![
            Value::Float(config.population_size as f64),
            Value::from(config.selection.label()),
            Value::from(config.crossover.label()),
            Value::from(config.mutation.label()),
            Value::Float(config.mutation_chance),
            Value::Bool(config.apply_elitism),
            Value::Int(group_size as i64),
            Value::Float(roulette_bias),
            Value::Float(ranking_bias),
            Value::Int(crossover_points as i64),
            Value::Int(mutation_points as i64),
        ];
        self.problem.is_valid_genotype(&genotype).then_some(genotype)
    }

    /// Runs one inner trial for `genotype` with an explicit seed.
    ///
    /// Pure: the same genotype and seed always give the same outcome (for
    /// trial stop conditions that do not depend on wall-clock time).
    pub fn run_trial(&self, genotype: &[Value], seed: u64) -> Result<TrialOutcome> {
        self.spec.run_genotype(genotype, seed, RunScope::Main, None)
    }
}

fn variables(b: &AdaptationBounds) -> Result<Vec<DecisionVariable>> {
    let (min_pop, max_pop) = b.population_size;
    let int_range = |(lo, hi): (usize, usize)| DecisionVariable::integer(lo as i64, hi as i64);
    Ok(vec![
        DecisionVariable::discrete(min_pop as f64, max_pop as f64, 2.0)?,
        DecisionVariable::choice(b.selection_types.iter().map(String::as_str))?,
        DecisionVariable::choice(b.crossover_types.iter().map(String::as_str))?,
        DecisionVariable::choice(b.mutation_types.iter().map(String::as_str))?,
        DecisionVariable::float(b.mutation_chance.0, b.mutation_chance.1)?,
        DecisionVariable::choice(b.apply_elitism.iter().copied())?,
        int_range(b.tournament_group_size)?,
        DecisionVariable::float(b.roulette_bias.0, b.roulette_bias.1)?,
        DecisionVariable::float(b.ranking_bias.0, b.ranking_bias.1)?,
        int_range(b.crossover_points)?,
        int_range(b.mutation_points)?,
    ])
}
