//! EA configuration.
//!
//! [`EaConfig`] holds the hyperparameters of one evolutionary run. These are
//! exactly the knobs the adaptive algorithm tunes.

use super::crossover::Crossover;
use super::mutation::{check_chance, Mutation};
use super::selection::Selection;
use crate::error::{OptimizationError, Result};

/// Configuration for the Evolutionary Algorithm.
///
/// # Defaults
///
/// ```
/// use u_evolution::ea::{Crossover, EaConfig, Mutation, Selection};
///
/// let config = EaConfig::default();
/// assert_eq!(config.population_size, 50);
/// assert_eq!(config.selection, Selection::Uniform);
/// assert_eq!(config.crossover, Crossover::SinglePoint);
/// assert_eq!(config.mutation, Mutation::Probabilistic);
/// assert!(config.apply_elitism);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_evolution::ea::{EaConfig, Selection};
///
/// let config = EaConfig::default()
///     .with_population_size(80)
///     .with_selection(Selection::Tournament { group_size: 4 })
///     .with_mutation_chance(0.05)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EaConfig {
    /// Number of solutions per generation. Must be even and at least 2,
    /// since crossover always produces pairs.
    pub population_size: usize,

    /// Parent pair selection strategy.
    pub selection: Selection,

    /// Crossover operator applied to every parent pair.
    pub crossover: Crossover,

    /// Mutation operator applied to every child.
    pub mutation: Mutation,

    /// Mutation probability in `[0, 1]`, interpreted by [`Mutation`].
    pub mutation_chance: f64,

    /// Whether the global best always survives into the next generation.
    pub apply_elitism: bool,

    /// Evaluate generations with rayon. Has no effect without the
    /// `parallel` feature.
    pub parallel: bool,

    /// Random seed for reproducibility. `None` draws a random seed.
    pub seed: Option<u64>,
}

impl Default for EaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            selection: Selection::default(),
            crossover: Crossover::default(),
            mutation: Mutation::default(),
            mutation_chance: 0.1,
            apply_elitism: true,
            parallel: false,
            seed: None,
        }
    }
}

impl EaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the selection strategy.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the crossover operator.
    pub fn with_crossover(mut self, crossover: Crossover) -> Self {
        self.crossover = crossover;
        self
    }

    /// Sets the mutation operator.
    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutation = mutation;
        self
    }

    /// Sets the mutation chance. Not clamped: out-of-range values are
    /// reported by [`validate`](Self::validate).
    pub fn with_mutation_chance(mut self, chance: f64) -> Self {
        self.mutation_chance = chance;
        self
    }

    pub fn with_elitism(mut self, enabled: bool) -> Self {
        self.apply_elitism = enabled;
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the problem-independent parameters.
    ///
    /// Operator parameters that depend on the genotype length are checked by
    /// [`validate_for`](Self::validate_for).
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 || self.population_size % 2 != 0 {
            return Err(OptimizationError::config(format!(
                "population_size must be even and at least 2, got {}",
                self.population_size
            )));
        }
        check_chance(self.mutation_chance)?;
        self.selection.validate(self.population_size)
    }

    /// Validates everything, including operator parameters against a
    /// genotype of `genotype_len` genes.
    pub fn validate_for(&self, genotype_len: usize) -> Result<()> {
        self.validate()?;
        self.crossover.validate(genotype_len)?;
        self.mutation.validate(genotype_len)
    }
}
