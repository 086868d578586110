//! Evolutionary Algorithm.
//!
//! A generation-based search over the value genotypes of an
//! [`OptimizationProblem`](crate::problem::OptimizationProblem). Operators
//! are closed sets of strategies picked by enum at construction time.
//!
//! # Key Types
//!
//! - [`EaConfig`]: hyperparameters (population size, operators, elitism)
//! - [`EvolutionaryAlgorithm`]: executes the evolutionary loop
//! - [`EaResult`]: best solution, terminal state and run statistics
//! - [`Generation`]: population snapshot with the never-regressing global best
//!
//! # Operators
//!
//! - [`Selection`]: Uniform, Tournament, DoubleTournament, Roulette, Ranking
//! - [`Crossover`]: SinglePoint, MultiPoint, Uniform, Pattern
//! - [`Mutation`]: Probabilistic, SinglePoint, MultiPoint
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Eiben & Smith (2015), *Introduction to Evolutionary Computing*

mod config;
mod crossover;
mod generation;
mod mutation;
mod runner;
mod selection;

pub use config::EaConfig;
pub use crossover::{Crossover, MAX_PATTERN_LEN};
pub use generation::{BestSnapshot, Generation};
pub use mutation::Mutation;
pub use runner::{AlgorithmState, EaResult, EvolutionaryAlgorithm};
pub use selection::{Selection, MAX_RANKING_BIAS, MAX_ROULETTE_BIAS};

pub(crate) use runner::GenerationEvaluator;
