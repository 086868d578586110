//! Mutation operators.
//!
//! Mutation re-samples genes from their own [`DecisionVariable`] domain, so
//! a mutated genotype is always valid for the problem.

use crate::error::{OptimizationError, Result};
use crate::problem::{DecisionVariable, Value};
use rand::seq::index;
use rand::Rng;

/// Mutation strategy.
///
/// All variants take the same `mutation_chance` but interpret it
/// differently; the expected number of re-sampled genes is about
/// `L * chance` for each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mutation {
    /// Each gene is re-sampled independently with probability `chance`.
    #[default]
    Probabilistic,

    /// With probability `min(1, L * chance)` one random gene is re-sampled.
    SinglePoint,

    /// With probability `min(1, L * chance / points)` that many distinct
    /// genes are re-sampled. Expected: `1 <= points <= L`.
    MultiPoint { points: usize },
}

impl Mutation {
    /// Stable name of the variant, used as a choice label.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Probabilistic => "Probabilistic",
            Mutation::SinglePoint => "SinglePoint",
            Mutation::MultiPoint { .. } => "MultiPoint",
        }
    }

    /// Checks the variant's parameters against the genotype length.
    pub fn validate(&self, genotype_len: usize) -> Result<()> {
        if let Mutation::MultiPoint { points } = *self {
            if points == 0 || points > genotype_len {
                return Err(OptimizationError::config(format!(
                    "mutation points must be in [1, {genotype_len}], got {points}"
                )));
            }
        }
        Ok(())
    }

    /// Mutates `genotype` in place.
    ///
    /// # Errors
    /// - `InvalidConfiguration` when `chance` is outside `[0, 1]`
    /// - `InvalidState` when the genotype and variables differ in length
    pub fn apply<R: Rng>(
        &self,
        genotype: &mut [Value],
        variables: &[DecisionVariable],
        chance: f64,
        rng: &mut R,
    ) -> Result<()> {
        check_chance(chance)?;
        let n = genotype.len();
        if n != variables.len() {
            return Err(OptimizationError::state(format!(
                "genotype has {n} genes, problem has {} decision variables",
                variables.len()
            )));
        }
        if n == 0 || chance == 0.0 {
            return Ok(());
        }

        match *self {
            Mutation::Probabilistic => {
                for (gene, var) in genotype.iter_mut().zip(variables) {
                    if chance >= 1.0 || rng.random::<f64>() < chance {
                        *gene = var.sample(rng);
                    }
                }
            }
            Mutation::SinglePoint => {
                if rng.random_bool((n as f64 * chance).min(1.0)) {
                    let i = rng.random_range(0..n);
                    genotype[i] = variables[i].sample(rng);
                }
            }
            Mutation::MultiPoint { points } => {
                let k = points.clamp(1, n);
                if rng.random_bool((n as f64 * chance / k as f64).min(1.0)) {
                    for i in index::sample(rng, n, k) {
                        genotype[i] = variables[i].sample(rng);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Rejects a mutation chance outside `[0, 1]` (NaN included).
pub(crate) fn check_chance(chance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&chance) {
        return Err(OptimizationError::config(format!(
            "mutation_chance must be in [0, 1], got {chance}"
        )));
    }
    Ok(())
}
