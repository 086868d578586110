//! Crossover operators on value genotypes.
//!
//! Every operator turns one parent pair into exactly two children of the
//! same length. Gene `i` of a child always comes from gene `i` of one of the
//! parents, so children stay inside the problem's domains without repair.
//!
//! # Operators
//!
//! - [`Crossover::SinglePoint`]: swap tails after one random cut
//! - [`Crossover::MultiPoint`]: alternate segments between several cuts
//! - [`Crossover::Uniform`]: each gene from a randomly chosen parent
//! - [`Crossover::Pattern`]: fixed bit mask decides gene origin
//!
//! Genotypes of length 1 have no cut point; all operators then return the
//! parents unchanged.

use crate::error::{OptimizationError, Result};
use crate::problem::Value;
use rand::seq::index;
use rand::Rng;

/// Longest genotype a [`Crossover::Pattern`] mask can describe.
pub const MAX_PATTERN_LEN: usize = 64;

/// Crossover strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crossover {
    /// One cut index in `[1, L-1]`, tails swapped.
    #[default]
    SinglePoint,

    /// `points` distinct cut indices in `[1, L-1]`; the children take
    /// alternating segments from the parents. Expected: `1 <= points < L`.
    MultiPoint { points: usize },

    /// Each gene position is swapped between the children with
    /// probability 1/2.
    Uniform,

    /// Child 1 takes gene `i` from parent 2 when bit `i` of `mask` is set,
    /// child 2 gets the complement. Requires `L <= 64`.
    Pattern { mask: u64 },
}

impl Crossover {
    /// Stable name of the variant, used as a choice label.
    pub fn label(&self) -> &'static str {
        match self {
            Crossover::SinglePoint => "SinglePoint",
            Crossover::MultiPoint { .. } => "MultiPoint",
            Crossover::Uniform => "Uniform",
            Crossover::Pattern { .. } => "Pattern",
        }
    }

    /// Checks the variant's parameters against the genotype length.
    pub fn validate(&self, genotype_len: usize) -> Result<()> {
        match *self {
            Crossover::SinglePoint | Crossover::Uniform => Ok(()),
            Crossover::MultiPoint { points } => {
                let max = genotype_len.saturating_sub(1).max(1);
                if points == 0 || points > max {
                    return Err(OptimizationError::config(format!(
                        "crossover points out of [1, {max}] for {genotype_len} genes, got {points}"
                    )));
                }
                Ok(())
            }
            Crossover::Pattern { .. } => {
                if genotype_len > MAX_PATTERN_LEN {
                    return Err(OptimizationError::config(format!(
                        "pattern crossover caps genes at {MAX_PATTERN_LEN}, got {genotype_len}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Produces two children from two parents.
    ///
    /// # Errors
    /// `InvalidState` when the parents are empty or differ in length.
    pub fn apply<R: Rng>(
        &self,
        parent1: &[Value],
        parent2: &[Value],
        rng: &mut R,
    ) -> Result<(Vec<Value>, Vec<Value>)> {
        let n = parent1.len();
        if n != parent2.len() {
            return Err(OptimizationError::state(format!(
                "parents differ in length: {n} vs {}",
                parent2.len()
            )));
        }
        if n == 0 {
            return Err(OptimizationError::state("cannot cross over empty genotypes"));
        }
        if n == 1 {
            return Ok((parent1.to_vec(), parent2.to_vec()));
        }

        let swap = match *self {
            Crossover::SinglePoint => {
                let cut = rng.random_range(1..n);
                segment_mask(n, &[cut])
            }
            Crossover::MultiPoint { points } => {
                let k = points.clamp(1, n - 1);
                let mut cuts: Vec<usize> = index::sample(rng, n - 1, k)
                    .iter()
                    .map(|i| i + 1)
                    .collect();
                cuts.sort_unstable();
                segment_mask(n, &cuts)
            }
            Crossover::Uniform => (0..n).map(|_| rng.random_bool(0.5)).collect(),
            Crossover::Pattern { mask } => (0..n).map(|i| i < 64 && mask >> i & 1 == 1).collect(),
        };
        Ok(exchange(parent1, parent2, &swap))
    }
}

/// Marks genes lying in odd-numbered segments between sorted `cuts`.
fn segment_mask(n: usize, cuts: &[usize]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(n);
    let mut swapped = false;
    let mut next = cuts.iter().peekable();
    for i in 0..n {
        while next.next_if(|&&c| c == i).is_some() {
            swapped = !swapped;
        }
        mask.push(swapped);
    }
    mask
}

fn exchange(parent1: &[Value], parent2: &[Value], swap: &[bool]) -> (Vec<Value>, Vec<Value>) {
    parent1
        .iter()
        .zip(parent2)
        .zip(swap)
        .map(|((a, b), &s)| if s { (b.clone(), a.clone()) } else { (a.clone(), b.clone()) })
        .unzip()
}
