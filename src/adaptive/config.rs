//! Adaptation configuration: how trials are scored and which
//! hyperparameter ranges are explored.

use crate::ea::{Crossover, Mutation, Selection, MAX_RANKING_BIAS, MAX_ROULETTE_BIAS};
use crate::error::{OptimizationError, Result};

/// How an inner trial run is turned into a score.
///
/// Scores are primary fitness values of the original problem and are
/// optimized in the original problem's direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdaptationType {
    /// Fitness of the best solution the trial found.
    #[default]
    BestSolution,

    /// Sum of the `count` best fitnesses of the trial's final generation.
    BestSolutions { count: usize },

    /// Mean of the best `ceil(percentile * N)` fitnesses (at least one) of
    /// the trial's final generation of `N` solutions. `0 < percentile <= 1`.
    BestSolutionsPercentile { percentile: f64 },
}

impl AdaptationType {
    /// Checks parameters against the smallest population a trial may use.
    pub fn validate(&self, min_population_size: usize) -> Result<()> {
        match *self {
            AdaptationType::BestSolution => Ok(()),
            AdaptationType::BestSolutions { count } => {
                if count == 0 || count > min_population_size {
                    return Err(OptimizationError::config(format!(
                        "best solutions count must be in [1, {min_population_size}], got {count}"
                    )));
                }
                Ok(())
            }
            AdaptationType::BestSolutionsPercentile { percentile } => {
                if !(percentile > 0.0 && percentile <= 1.0) {
                    return Err(OptimizationError::config(format!(
                        "percentile must be in (0, 1], got {percentile}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Hyperparameter ranges explored by the adaptive algorithm.
///
/// Point counts are clamped to the original problem's gene count when the
/// adaptation problem is built.
///
/// ```
/// use u_evolution::adaptive::AdaptationBounds;
///
/// let bounds = AdaptationBounds::default()
///     .with_population_size(4, 20)
///     .with_selection_types(["Tournament", "Ranking"])
///     .with_mutation_chance(0.01, 0.1);
/// assert!(bounds.validate().is_ok());
/// assert!(AdaptationBounds::default().with_population_size(3, 9).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptationBounds {
    /// Inclusive population range. The minimum must be even; sizes step by 2.
    pub population_size: (usize, usize),
    /// Allowed [`Selection`] labels.
    pub selection_types: Vec<String>,
    /// Allowed [`Crossover`] labels. `Pattern` is not adaptable.
    pub crossover_types: Vec<String>,
    /// Allowed [`Mutation`] labels.
    pub mutation_types: Vec<String>,
    pub mutation_chance: (f64, f64),
    pub apply_elitism: Vec<bool>,
    pub tournament_group_size: (usize, usize),
    pub roulette_bias: (f64, f64),
    pub ranking_bias: (f64, f64),
    pub crossover_points: (usize, usize),
    pub mutation_points: (usize, usize),
}

impl Default for AdaptationBounds {
    fn default() -> Self {
        Self {
            population_size: (10, 100),
            selection_types: SELECTION_LABELS.iter().map(|s| s.to_string()).collect(),
            crossover_types: CROSSOVER_LABELS.iter().map(|s| s.to_string()).collect(),
            mutation_types: MUTATION_LABELS.iter().map(|s| s.to_string()).collect(),
            mutation_chance: (0.001, 0.2),
            apply_elitism: vec![true, false],
            tournament_group_size: (2, 6),
            roulette_bias: (1.1, MAX_ROULETTE_BIAS),
            ranking_bias: (1.1, MAX_RANKING_BIAS),
            crossover_points: (1, 3),
            mutation_points: (1, 3),
        }
    }
}

pub(crate) const SELECTION_LABELS: [&str; 5] =
    ["Uniform", "Tournament", "DoubleTournament", "Roulette", "Ranking"];
pub(crate) const CROSSOVER_LABELS: [&str; 3] = ["SinglePoint", "MultiPoint", "Uniform"];
pub(crate) const MUTATION_LABELS: [&str; 3] = ["Probabilistic", "SinglePoint", "MultiPoint"];

/// Operator parameters decoded alongside the operator labels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OperatorParams {
    pub group_size: usize,
    pub roulette_bias: f64,
    pub ranking_bias: f64,
    pub crossover_points: usize,
    pub mutation_points: usize,
}

pub(crate) fn selection_from_label(label: &str, p: &OperatorParams) -> Option<Selection> {
    Some(match label {
        "Uniform" => Selection::Uniform,
        "Tournament" => Selection::Tournament {
            group_size: p.group_size,
        },
        "DoubleTournament" => Selection::DoubleTournament {
            group_size: p.group_size,
        },
        "Roulette" => Selection::Roulette {
            bias: p.roulette_bias,
        },
        "Ranking" => Selection::Ranking {
            bias: p.ranking_bias,
        },
        _ => return None,
    })
}

pub(crate) fn crossover_from_label(label: &str, p: &OperatorParams) -> Option<Crossover> {
    Some(match label {
        "SinglePoint" => Crossover::SinglePoint,
        "MultiPoint" => Crossover::MultiPoint {
            points: p.crossover_points,
        },
        "Uniform" => Crossover::Uniform,
        _ => return None,
    })
}

pub(crate) fn mutation_from_label(label: &str, p: &OperatorParams) -> Option<Mutation> {
    Some(match label {
        "Probabilistic" => Mutation::Probabilistic,
        "SinglePoint" => Mutation::SinglePoint,
        "MultiPoint" => Mutation::MultiPoint {
            points: p.mutation_points,
        },
        _ => return None,
    })
}

fn labels<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

impl AdaptationBounds {
    pub fn with_population_size(mut self, min: usize, max: usize) -> Self {
        self.population_size = (min, max);
        self
    }

    pub fn with_selection_types<S: Into<String>>(
        mut self,
        types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.selection_types = labels(types);
        self
    }

    pub fn with_crossover_types<S: Into<String>>(
        mut self,
        types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.crossover_types = labels(types);
        self
    }

    pub fn with_mutation_types<S: Into<String>>(
        mut self,
        types: impl IntoIterator<Item = S>,
    ) -> Self {
        self.mutation_types = labels(types);
        self
    }

    pub fn with_mutation_chance(mut self, min: f64, max: f64) -> Self {
        self.mutation_chance = (min, max);
        self
    }

    pub fn with_elitism_options(mut self, options: impl IntoIterator<Item = bool>) -> Self {
        self.apply_elitism = options.into_iter().collect();
        self
    }

    pub fn with_tournament_group_size(mut self, min: usize, max: usize) -> Self {
        self.tournament_group_size = (min, max);
        self
    }

    pub fn with_roulette_bias(mut self, min: f64, max: f64) -> Self {
        self.roulette_bias = (min, max);
        self
    }

    pub fn with_ranking_bias(mut self, min: f64, max: f64) -> Self {
        self.ranking_bias = (min, max);
        self
    }

    pub fn with_crossover_points(mut self, min: usize, max: usize) -> Self {
        self.crossover_points = (min, max);
        self
    }

    pub fn with_mutation_points(mut self, min: usize, max: usize) -> Self {
        self.mutation_points = (min, max);
        self
    }

    /// Validates ranges and labels.
    pub fn validate(&self) -> Result<()> {
        let (min_pop, max_pop) = self.population_size;
        if min_pop < 2 || min_pop % 2 != 0 || min_pop > max_pop {
            return Err(OptimizationError::config(format!(
                "population_size range must be even, >= 2 and non-empty, got {min_pop}..={max_pop}"
            )));
        }

        let sample_params = OperatorParams {
            group_size: 2,
            roulette_bias: MAX_ROULETTE_BIAS,
            ranking_bias: MAX_RANKING_BIAS,
            crossover_points: 1,
            mutation_points: 1,
        };
        check_labels("selection", &self.selection_types, |l| {
            selection_from_label(l, &sample_params).is_some()
        })?;
        check_labels("crossover", &self.crossover_types, |l| {
            crossover_from_label(l, &sample_params).is_some()
        })?;
        check_labels("mutation", &self.mutation_types, |l| {
            mutation_from_label(l, &sample_params).is_some()
        })?;

        let (lo, hi) = self.mutation_chance;
        if !(0.0 <= lo && lo <= hi && hi <= 1.0) {
            return Err(OptimizationError::config(format!(
                "mutation_chance range must lie in [0, 1], got {lo}..={hi}"
            )));
        }
        if self.apply_elitism.is_empty() {
            return Err(OptimizationError::config("apply_elitism options must not be empty"));
        }

        check_range("tournament_group_size", self.tournament_group_size, 2)?;
        check_bias("roulette_bias", self.roulette_bias, MAX_ROULETTE_BIAS)?;
        check_bias("ranking_bias", self.ranking_bias, MAX_RANKING_BIAS)?;
        check_range("crossover_points", self.crossover_points, 1)?;
        check_range("mutation_points", self.mutation_points, 1)
    }

    /// Narrows point-count ranges to what a genotype of `genotype_len`
    /// genes supports (at most half of the genes, at least one).
    pub(crate) fn clamped_to(&self, genotype_len: usize) -> Self {
        let cap = (genotype_len / 2).max(1);
        let clamp = |(lo, hi): (usize, usize)| (lo.min(cap), hi.min(cap));
        Self {
            crossover_points: clamp(self.crossover_points),
            mutation_points: clamp(self.mutation_points),
            ..self.clone()
        }
    }
}

fn check_labels(kind: &str, values: &[String], known: impl Fn(&str) -> bool) -> Result<()> {
    if values.is_empty() {
        return Err(OptimizationError::config(format!("{kind} types must not be empty")));
    }
    if let Some(bad) = values.iter().find(|l| !known(l.as_str())) {
        return Err(OptimizationError::config(format!(
            "unknown or non-adaptable {kind} type '{bad}'"
        )));
    }
    Ok(())
}

fn check_range(name: &str, (lo, hi): (usize, usize), min: usize) -> Result<()> {
    if lo < min || lo > hi {
        return Err(OptimizationError::config(format!(
            "{name} range must satisfy {min} <= min <= max, got {lo}..={hi}"
        )));
    }
    Ok(())
}

fn check_bias(name: &str, (lo, hi): (f64, f64), max: f64) -> Result<()> {
    if !(lo > 1.0 && lo <= hi && hi <= max) {
        return Err(OptimizationError::config(format!(
            "{name} range must lie in (1, {max}], got {lo}..={hi}"
        )));
    }
    Ok(())
}
