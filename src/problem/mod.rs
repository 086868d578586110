//! Problem modelling: decision variables, problems and solutions.
//!
//! - [`DecisionVariable`]: bounded domain and sampling rule of one gene
//! - [`OptimizationProblem`]: ordered variables, constraints, penalty,
//!   objective and direction
//! - [`Solution`]: genotype plus cached [`Evaluation`] (objective, penalty,
//!   fitness)

mod model;
mod solution;
mod variables;

pub use model::{ObjectiveValue, OptimizationProblem, OptimizationProblemBuilder, OptimizationType};
pub use solution::{Evaluation, Solution};
pub use variables::{DecisionVariable, Value};
