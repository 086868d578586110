//! Iteration logging collaborator.
//!
//! Algorithms report every iteration to an optional [`IterationLogger`].
//! The call is synchronous and its outcome never influences the search: a
//! failing logger is reported through `tracing` and counted, nothing more.

use crate::error::BoxError;
use crate::problem::Solution;

/// How much of each iteration is handed to the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogVerbosity {
    /// Only the best solution found so far.
    #[default]
    BestSolution,
    /// The best solution and the whole current generation.
    FullGeneration,
}

/// Which run an iteration record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    /// The top-level run started by the caller.
    Main,
    /// The adaptive algorithm's run of the default configuration.
    Baseline,
    /// An inner trial run of the adaptive algorithm.
    Trial {
        upper_iteration: usize,
        index: usize,
    },
}

/// Data passed to the logger after an iteration has been evaluated.
#[derive(Debug, Clone, Copy)]
pub struct IterationRecord<'a> {
    pub scope: RunScope,
    pub iteration: usize,
    /// Best solution found so far in this run.
    pub best: &'a Solution,
    /// The current generation, present at [`LogVerbosity::FullGeneration`].
    pub generation: Option<&'a [Solution]>,
}

/// Receives iteration records.
///
/// Implementations must be thread-safe: inner runs of the adaptive
/// algorithm may log concurrently.
pub trait IterationLogger: Send + Sync {
    fn verbosity(&self) -> LogVerbosity {
        LogVerbosity::BestSolution
    }

    /// Persists one iteration record.
    fn log_iteration(&self, record: &IterationRecord<'_>) -> Result<(), BoxError>;
}

/// Logger that emits iteration records as `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    verbosity: LogVerbosity,
}

impl TracingLogger {
    pub fn new(verbosity: LogVerbosity) -> Self {
        Self { verbosity }
    }
}

impl IterationLogger for TracingLogger {
    fn verbosity(&self) -> LogVerbosity {
        self.verbosity
    }

    fn log_iteration(&self, record: &IterationRecord<'_>) -> Result<(), BoxError> {
        let (upper_iteration, index) = match record.scope {
            RunScope::Main | RunScope::Baseline => (None, None),
            RunScope::Trial {
                upper_iteration,
                index,
            } => (Some(upper_iteration), Some(index)),
        };
        tracing::info!(
            target: "u_evolution::iterations",
            iteration = record.iteration,
            upper_iteration,
            trial = index,
            baseline = record.scope == RunScope::Baseline,
            best_fitness = record.best.fitness_f64(),
            best_penalty = record.best.penalty(),
            generation_size = record.generation.map(<[Solution]>::len),
            "iteration finished"
        );
        if let Some(generation) = record.generation {
            for (i, s) in generation.iter().enumerate() {
                tracing::trace!(
                    target: "u_evolution::iterations",
                    iteration = record.iteration,
                    member = i,
                    fitness = s.fitness_f64(),
                    genotype = ?s.genotype(),
                );
            }
        }
        Ok(())
    }
}

/// Calls `logger` and downgrades a failure to a warning.
///
/// Returns `true` when the logger failed.
pub(crate) fn log_isolated(
    logger: &dyn IterationLogger,
    scope: RunScope,
    iteration: usize,
    best: &Solution,
    generation: &[Solution],
) -> bool {
    let record = IterationRecord {
        scope,
        iteration,
        best,
        generation: match logger.verbosity() {
            LogVerbosity::FullGeneration => Some(generation),
            LogVerbosity::BestSolution => None,
        },
    };
    match logger.log_iteration(&record) {
        Ok(()) => false,
        Err(e) => {
            tracing::warn!(error = %e, iteration, ?scope, "iteration logger failed; continuing");
            true
        }
    }
}
