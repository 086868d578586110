//! Adaptive Evolutionary Algorithm.
//!
//! Two-level optimization: an outer evolutionary search over EA
//! hyperparameters whose fitness is the outcome of a bounded inner run on
//! the caller's problem.
//!
//! # Key Types
//!
//! - [`AdaptationBounds`]: hyperparameter ranges explored by the outer search
//! - [`AdaptationType`]: how an inner run is scored
//! - [`AdaptationProblem`]: the hyperparameter problem and its trial function
//! - [`AdaptiveEvolutionaryAlgorithm`]: executes the two-level loop
//! - [`AdaptiveResult`]: best original solution plus the configuration that
//!   produced it
//!
//! # Cost
//!
//! Every outer fitness evaluation is one complete inner run, so an outer
//! generation costs `population_size` inner runs. Scores are never
//! inherited from a parent, since each trial runs on its own seed. Enable
//! the `parallel` feature and
//! [`EaConfig::with_parallel`](crate::ea::EaConfig::with_parallel) on the
//! outer configuration to run the trials of a generation concurrently.
//!
//! # References
//!
//! - Grefenstette (1986), "Optimization of Control Parameters for Genetic Algorithms"
//! - Eiben, Hinterding & Michalewicz (1999), "Parameter Control in Evolutionary Algorithms"

mod config;
mod problem;
mod runner;

pub use config::{AdaptationBounds, AdaptationType};
pub use problem::{AdaptationProblem, TrialOutcome, ADAPTATION_VARIABLES};
pub use runner::{AdaptiveEvolutionaryAlgorithm, AdaptiveResult};
