//! Candidate solutions and the fitness model.

use super::model::{ObjectiveValue, OptimizationProblem, OptimizationType};
use super::variables::Value;
use crate::error::Result;
use std::cmp::Ordering;

/// Cached result of evaluating a genotype against its problem.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluation {
    /// Raw objective value.
    pub objective: ObjectiveValue,
    /// Non-negative constraint penalty, zero when feasible.
    pub penalty: f64,
    /// Objective worsened by the penalty in the problem's direction.
    pub fitness: ObjectiveValue,
}

impl Evaluation {
    /// Combines an objective and a penalty into a fitness.
    ///
    /// Under `Minimize` the penalty is added, under `Maximize` subtracted,
    /// so an infeasible solution is always ranked below an otherwise equal
    /// feasible one.
    pub fn new(objective: ObjectiveValue, penalty: f64, direction: OptimizationType) -> Self {
        let fitness = objective.penalized(penalty, direction);
        Self {
            objective,
            penalty,
            fitness,
        }
    }
}

/// One candidate assignment of values to decision variables.
///
/// The genotype is fixed at construction. The evaluation is computed
/// lazily by [`evaluate`](Self::evaluate) and cached.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    genotype: Vec<Value>,
    evaluation: Option<Evaluation>,
}

impl Solution {
    pub fn new(genotype: Vec<Value>) -> Self {
        Self {
            genotype,
            evaluation: None,
        }
    }

    /// A solution whose evaluation is already known.
    pub fn evaluated(genotype: Vec<Value>, evaluation: Evaluation) -> Self {
        Self {
            genotype,
            evaluation: Some(evaluation),
        }
    }

    pub fn genotype(&self) -> &[Value] {
        &self.genotype
    }

    pub fn into_genotype(self) -> Vec<Value> {
        self.genotype
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn objective(&self) -> Option<&ObjectiveValue> {
        self.evaluation.as_ref().map(|e| &e.objective)
    }

    pub fn penalty(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.penalty)
    }

    pub fn fitness(&self) -> Option<&ObjectiveValue> {
        self.evaluation.as_ref().map(|e| &e.fitness)
    }

    /// Primary fitness component, NaN while unevaluated.
    pub fn fitness_f64(&self) -> f64 {
        self.fitness().map_or(f64::NAN, ObjectiveValue::primary)
    }

    /// Evaluates objective and penalty unless already cached.
    ///
    /// Errors from the caller's functions are returned unchanged and leave
    /// the solution unevaluated.
    pub fn evaluate(&mut self, problem: &OptimizationProblem) -> Result<&Evaluation> {
        let evaluation = match self.evaluation.take() {
            Some(cached) => cached,
            None => {
                let objective = problem.objective(&self.genotype)?;
                let penalty = problem.penalty(&self.genotype)?;
                Evaluation::new(objective, penalty, problem.direction())
            }
        };
        Ok(self.evaluation.insert(evaluation))
    }

    /// Orders two solutions best first. Unevaluated solutions rank last.
    pub fn compare(&self, other: &Solution, direction: OptimizationType) -> Ordering {
        match (self.fitness(), other.fitness()) {
            (Some(a), Some(b)) => direction.compare(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Whether this solution is strictly better than `other`.
    pub fn is_better_than(&self, other: &Solution, direction: OptimizationType) -> bool {
        self.compare(other, direction) == Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, OptimizationError};
    use crate::problem::DecisionVariable;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn problem(direction: OptimizationType, penalty: f64) -> OptimizationProblem {
        OptimizationProblem::builder()
            .variable("x", DecisionVariable::float(-100.0, 100.0).unwrap())
            .penalty(move |_| Ok(penalty))
            .objective(|v| Ok(v[0].as_f64().unwrap()))
            .direction(direction)
            .build()
            .unwrap()
    }

    #[test]
    fn test_minimize_lower_objective_is_better() {
        let p = problem(OptimizationType::Minimize, 1.0);
        let mut a = Solution::new(vec![Value::Float(1.0)]);
        let mut b = Solution::new(vec![Value::Float(2.0)]);
        a.evaluate(&p).unwrap();
        b.evaluate(&p).unwrap();
        assert_eq!(a.fitness(), Some(&ObjectiveValue::Single(2.0)));
        assert!(a.is_better_than(&b, p.direction()));
    }

    #[test]
    fn test_maximize_higher_objective_is_better() {
        let p = problem(OptimizationType::Maximize, 1.0);
        let mut a = Solution::new(vec![Value::Float(1.0)]);
        let mut b = Solution::new(vec![Value::Float(2.0)]);
        a.evaluate(&p).unwrap();
        b.evaluate(&p).unwrap();
        assert_eq!(b.fitness(), Some(&ObjectiveValue::Single(1.0)));
        assert!(b.is_better_than(&a, p.direction()));
    }

    #[test]
    fn test_penalty_worsens_in_both_directions() {
        for dir in [OptimizationType::Minimize, OptimizationType::Maximize] {
            let feasible = Evaluation::new(ObjectiveValue::Single(5.0), 0.0, dir);
            let infeasible = Evaluation::new(ObjectiveValue::Single(5.0), 2.0, dir);
            assert!(dir.is_better(&feasible.fitness, &infeasible.fitness));
        }
    }

    #[test]
    fn test_evaluation_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let p = OptimizationProblem::builder()
            .variable("x", DecisionVariable::integer(0, 3).unwrap())
            .objective(move |_| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(1.0)
            })
            .build()
            .unwrap();
        let mut s = Solution::new(vec![Value::Int(1)]);
        s.evaluate(&p).unwrap();
        s.evaluate(&p).unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_failed_evaluation_leaves_solution_unevaluated() {
        let p = OptimizationProblem::builder()
            .variable("x", DecisionVariable::integer(0, 3).unwrap())
            .objective(|_| Err::<f64, BoxError>("bad input".into()))
            .build()
            .unwrap();
        let mut s = Solution::new(vec![Value::Int(1)]);
        assert!(matches!(s.evaluate(&p), Err(OptimizationError::Evaluation(_))));
        assert!(!s.is_evaluated());
        assert!(s.fitness_f64().is_nan());
    }

    #[test]
    fn test_unevaluated_ranks_last() {
        let p = problem(OptimizationType::Minimize, 0.0);
        let mut a = Solution::new(vec![Value::Float(50.0)]);
        a.evaluate(&p).unwrap();
        let b = Solution::new(vec![Value::Float(-50.0)]);
        assert!(a.is_better_than(&b, p.direction()));
    }
}
