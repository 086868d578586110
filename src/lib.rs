//! Evolutionary optimization with adaptive hyperparameter tuning.
//!
//! - **Problem model** ([`problem`]): typed decision variables, objective,
//!   constraints and penalty, with a minimize or maximize direction.
//! - **Evolutionary Algorithm** ([`ea`]): generation-based search with
//!   pluggable selection, crossover and mutation strategies and optional
//!   elitism.
//! - **Adaptive Evolutionary Algorithm** ([`adaptive`]): an outer
//!   evolutionary search over the EA's own hyperparameters, scoring each
//!   candidate by a bounded inner run on the caller's problem.
//! - **Stop conditions** ([`stop_conditions`]): time limit, satisfying
//!   fitness, stagnation and iteration budget.
//!
//! # Architecture
//!
//! Algorithms are generic over the problem through boxed closures and
//! dynamically typed [`Value`](problem::Value) genes. Randomness comes from
//! explicitly seeded generators ([`random`]), so every run is reproducible
//! from its seed. Per-iteration reporting goes through the
//! [`IterationLogger`](logging::IterationLogger) trait; diagnostics use
//! `tracing`.

pub mod adaptive;
pub mod ea;
pub mod error;
pub mod logging;
pub mod problem;
pub mod random;
pub mod stop_conditions;

pub use error::{BoxError, OptimizationError, Result};
pub use stop_conditions::{StopConditions, TerminalState};
