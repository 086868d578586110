//! Population snapshots and the global-best tracker.

use crate::error::{OptimizationError, Result};
use crate::problem::{OptimizationType, Solution};

/// Immutable copy of the best solution found so far.
///
/// Held by value so it survives the generation it was found in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestSnapshot {
    pub solution: Solution,
    /// Iteration in which the solution was first found.
    pub iteration: usize,
}

/// One population snapshot plus the global best across all generations.
///
/// The global best is replaced only on strict improvement, so it never
/// regresses even when a later generation is worse.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    members: Vec<Solution>,
    best: Option<BestSnapshot>,
}

impl Generation {
    pub fn new(members: Vec<Solution>) -> Self {
        Self {
            members,
            best: None,
        }
    }

    pub fn members(&self) -> &[Solution] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut [Solution] {
        &mut self.members
    }

    pub fn into_members(self) -> Vec<Solution> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Global best across every generation seen so far.
    pub fn best(&self) -> Option<&BestSnapshot> {
        self.best.as_ref()
    }

    /// Best member of this generation; the lowest index wins ties.
    pub fn iteration_best(&self, direction: OptimizationType) -> Option<&Solution> {
        self.members
            .iter()
            .min_by(|a, b| a.compare(b, direction))
    }

    /// Folds this generation into the global best.
    ///
    /// Returns `true` on strict improvement.
    ///
    /// # Errors
    /// `InvalidState` when the generation is empty or not fully evaluated.
    pub(crate) fn update_best(
        &mut self,
        iteration: usize,
        direction: OptimizationType,
    ) -> Result<bool> {
        if self.members.iter().any(|s| !s.is_evaluated()) {
            return Err(OptimizationError::state(
                "generation contains unevaluated solutions",
            ));
        }
        let candidate = self
            .iteration_best(direction)
            .ok_or_else(|| OptimizationError::state("generation is empty"))?;
        let improved = match &self.best {
            None => true,
            Some(best) => candidate.is_better_than(&best.solution, direction),
        };
        if improved {
            self.best = Some(BestSnapshot {
                solution: candidate.clone(),
                iteration,
            });
        }
        Ok(improved)
    }

    /// Moves to the next generation, keeping the global best.
    pub(crate) fn replace_members(&mut self, members: Vec<Solution>) {
        self.members = members;
    }

    /// Re-inserts the global best unless its genotype is already present.
    ///
    /// The worst member is replaced; among equally bad members the lowest
    /// index is chosen. Returns the replaced index, if any.
    pub(crate) fn preserve_best(&mut self, direction: OptimizationType) -> Option<usize> {
        let best = self.best.as_ref()?;
        if self
            .members
            .iter()
            .any(|s| s.genotype() == best.solution.genotype())
        {
            return None;
        }
        let mut worst: Option<usize> = None;
        for (i, s) in self.members.iter().enumerate() {
            match worst {
                Some(w) if !self.members[w].is_better_than(s, direction) => {}
                _ => worst = Some(i),
            }
        }
        let worst = worst?;
        self.members[worst] = best.solution.clone();
        Some(worst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Evaluation, ObjectiveValue, Value};

    const MIN: OptimizationType = OptimizationType::Minimize;

    fn scored(gene: i64, fitness: f64) -> Solution {
        Solution::evaluated(
            vec![Value::Int(gene)],
            Evaluation::new(ObjectiveValue::Single(fitness), 0.0, MIN),
        )
    }

    #[test]
    fn test_global_best_never_regresses() {
        let mut gen = Generation::new(vec![scored(0, 5.0), scored(1, 3.0)]);
        assert!(gen.update_best(0, MIN).unwrap());
        gen.replace_members(vec![scored(2, 9.0), scored(3, 8.0)]);
        assert!(!gen.update_best(1, MIN).unwrap());
        let best = gen.best().unwrap();
        assert_eq!(best.solution.genotype(), &[Value::Int(1)]);
        assert_eq!(best.iteration, 0);
    }

    #[test]
    fn test_equal_fitness_keeps_earlier_snapshot() {
        let mut gen = Generation::new(vec![scored(0, 3.0)]);
        gen.update_best(0, MIN).unwrap();
        gen.replace_members(vec![scored(1, 3.0)]);
        assert!(!gen.update_best(1, MIN).unwrap());
        assert_eq!(gen.best().unwrap().iteration, 0);
    }

    #[test]
    fn test_iteration_best_tie_takes_lowest_index() {
        let gen = Generation::new(vec![scored(0, 4.0), scored(1, 2.0), scored(2, 2.0)]);
        let best = gen.iteration_best(MIN).unwrap();
        assert_eq!(best.genotype(), &[Value::Int(1)]);
    }

    #[test]
    fn test_empty_or_unevaluated_is_invalid_state() {
        let mut empty = Generation::new(Vec::new());
        assert!(empty.update_best(0, MIN).unwrap_err().is_invalid_state());

        let mut raw = Generation::new(vec![Solution::new(vec![Value::Int(0)])]);
        assert!(raw.update_best(0, MIN).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_preserve_best_replaces_first_worst() {
        let mut gen = Generation::new(vec![scored(0, 1.0)]);
        gen.update_best(0, MIN).unwrap();
        gen.replace_members(vec![scored(1, 6.0), scored(2, 9.0), scored(3, 9.0), scored(4, 2.0)]);
        assert_eq!(gen.preserve_best(MIN), Some(1));
        assert_eq!(gen.members()[1].genotype(), &[Value::Int(0)]);
        assert_eq!(gen.members()[2].genotype(), &[Value::Int(3)]);
    }

    #[test]
    fn test_preserve_best_skips_duplicate_genotype() {
        let mut gen = Generation::new(vec![scored(0, 1.0)]);
        gen.update_best(0, MIN).unwrap();
        gen.replace_members(vec![scored(5, 7.0), scored(0, 1.0)]);
        assert_eq!(gen.preserve_best(MIN), None);
        assert_eq!(gen.members()[0].genotype(), &[Value::Int(5)]);
    }
}
