//! Parent selection strategies.
//!
//! Every strategy turns a generation of `N` evaluated solutions into `N/2`
//! ordered parent pairs. The two members of a pair are always distinct
//! individuals; across pairs an individual may be picked any number of
//! times.
//!
//! # References
//!
//! - Eiben & Smith (2015), *Introduction to Evolutionary Computing*, 2nd ed.,
//!   sections 5.2.1–5.2.4 (fitness-proportional, ranking, tournament)
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"

use crate::error::{OptimizationError, Result};
use crate::problem::{OptimizationType, Solution};
use rand::seq::index;
use rand::Rng;

/// Upper bound of [`Selection::Roulette`] bias.
pub const MAX_ROULETTE_BIAS: f64 = 100.0;
/// Upper bound of [`Selection::Ranking`] bias.
pub const MAX_RANKING_BIAS: f64 = 2.0;

/// Selection strategy for choosing parent pairs.
///
/// ```
/// use u_evolution::ea::Selection;
///
/// let sel = Selection::Tournament { group_size: 4 };
/// assert_eq!(sel.label(), "Tournament");
/// assert!(Selection::Roulette { bias: 0.5 }.validate(10).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selection {
    /// Every individual is equally likely to become a parent.
    #[default]
    Uniform,

    /// Draw one random group of `group_size` individuals and take its two
    /// best members as the pair.
    Tournament { group_size: usize },

    /// Each parent is the best of its own random group; the second group
    /// is drawn without the first winner.
    DoubleTournament { group_size: usize },

    /// Fitness-proportional selection on linearly scaled fitness so that
    /// the best individual is `bias` times as likely as the worst.
    ///
    /// Falls back to uniform selection when all fitnesses are equal or
    /// any of them is not finite. Expected: `1 < bias <= 100`.
    Roulette { bias: f64 },

    /// Linear ranking: `P(rank) ∝ 2 - s + 2·rank·(s - 1)/(N - 1)` where the
    /// worst has rank 0. `bias = 2` is classic ranking, values near 1
    /// approach uniform selection. Expected: `1 < bias <= 2`.
    Ranking { bias: f64 },
}

impl Selection {
    /// Stable name of the variant, used as a choice label.
    pub fn label(&self) -> &'static str {
        match self {
            Selection::Uniform => "Uniform",
            Selection::Tournament { .. } => "Tournament",
            Selection::DoubleTournament { .. } => "DoubleTournament",
            Selection::Roulette { .. } => "Roulette",
            Selection::Ranking { .. } => "Ranking",
        }
    }

    /// Checks the variant's parameters against a population size.
    pub fn validate(&self, population_size: usize) -> Result<()> {
        match *self {
            Selection::Uniform => Ok(()),
            Selection::Tournament { group_size } | Selection::DoubleTournament { group_size } => {
                if group_size < 2 || group_size > population_size {
                    return Err(OptimizationError::config(format!(
                        "tournament group_size must be in [2, {population_size}], got {group_size}"
                    )));
                }
                Ok(())
            }
            Selection::Roulette { bias } => {
                if !(bias > 1.0 && bias <= MAX_ROULETTE_BIAS) {
                    return Err(OptimizationError::config(format!(
                        "roulette bias must be in (1, {MAX_ROULETTE_BIAS}], got {bias}"
                    )));
                }
                Ok(())
            }
            Selection::Ranking { bias } => {
                if !(bias > 1.0 && bias <= MAX_RANKING_BIAS) {
                    return Err(OptimizationError::config(format!(
                        "ranking bias must be in (1, {MAX_RANKING_BIAS}], got {bias}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Selects `generation.len() / 2` parent pairs (indices into `generation`).
    ///
    /// # Errors
    /// `InvalidState` when the generation has fewer than two members or a
    /// fitness-based strategy meets an unevaluated solution.
    pub fn select_pairs<R: Rng>(
        &self,
        generation: &[Solution],
        direction: OptimizationType,
        rng: &mut R,
    ) -> Result<Vec<(usize, usize)>> {
        let n = generation.len();
        if n < 2 {
            return Err(OptimizationError::state(format!(
                "cannot select parent pairs from a generation of {n}"
            )));
        }
        if *self != Selection::Uniform && generation.iter().any(|s| !s.is_evaluated()) {
            return Err(OptimizationError::state(
                "fitness-based selection on an unevaluated generation",
            ));
        }

        let pairs = n / 2;
        let out = match *self {
            Selection::Uniform => (0..pairs).map(|_| uniform_pair(n, rng)).collect(),
            Selection::Tournament { group_size } => (0..pairs)
                .map(|_| tournament_pair(generation, group_size, direction, rng))
                .collect(),
            Selection::DoubleTournament { group_size } => (0..pairs)
                .map(|_| double_tournament_pair(generation, group_size, direction, rng))
                .collect(),
            Selection::Roulette { bias } => match roulette_weights(generation, bias, direction) {
                Some(weights) => (0..pairs).map(|_| weighted_pair(&weights, rng)).collect(),
                None => (0..pairs).map(|_| uniform_pair(n, rng)).collect(),
            },
            Selection::Ranking { bias } => {
                let weights = ranking_weights(generation, bias, direction);
                (0..pairs).map(|_| weighted_pair(&weights, rng)).collect()
            }
        };
        Ok(out)
    }
}

fn uniform_pair<R: Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    let picked = index::sample(rng, n, 2);
    (picked.index(0), picked.index(1))
}

/// Best member of a random group of `k` drawn from `candidates`.
fn group_best<R: Rng>(
    generation: &[Solution],
    candidates: &[usize],
    k: usize,
    direction: OptimizationType,
    rng: &mut R,
) -> usize {
    index::sample(rng, candidates.len(), k.clamp(1, candidates.len()))
        .iter()
        .map(|i| candidates[i])
        .min_by(|&a, &b| generation[a].compare(&generation[b], direction))
        .unwrap_or(candidates[0])
}

fn tournament_pair<R: Rng>(
    generation: &[Solution],
    group_size: usize,
    direction: OptimizationType,
    rng: &mut R,
) -> (usize, usize) {
    let k = group_size.clamp(2, generation.len());
    let mut group = index::sample(rng, generation.len(), k).into_vec();
    // Stable sort keeps draw order among equals, so ties stay random.
    group.sort_by(|&a, &b| generation[a].compare(&generation[b], direction));
    (group[0], group[1])
}

fn double_tournament_pair<R: Rng>(
    generation: &[Solution],
    group_size: usize,
    direction: OptimizationType,
    rng: &mut R,
) -> (usize, usize) {
    let all: Vec<usize> = (0..generation.len()).collect();
    let first = group_best(generation, &all, group_size, direction, rng);
    let rest: Vec<usize> = all.into_iter().filter(|&i| i != first).collect();
    let second = group_best(generation, &rest, group_size, direction, rng);
    (first, second)
}

/// Linear scaling `w = factor * f + offset` with `w(best) = bias`,
/// `w(worst) = 1`. `None` when scaling is undefined.
fn roulette_weights(
    generation: &[Solution],
    bias: f64,
    direction: OptimizationType,
) -> Option<Vec<f64>> {
    let fitness: Vec<f64> = generation.iter().map(Solution::fitness_f64).collect();
    if fitness.iter().any(|f| !f.is_finite()) {
        return None;
    }
    let best = fitness
        .iter()
        .copied()
        .min_by(|a, b| direction.compare_scalar(*a, *b))?;
    let worst = fitness
        .iter()
        .copied()
        .max_by(|a, b| direction.compare_scalar(*a, *b))?;
    if best == worst {
        return None;
    }
    let factor = (bias - 1.0) / (best - worst);
    let offset = 1.0 - factor * worst;
    Some(fitness.iter().map(|f| factor * f + offset).collect())
}

fn ranking_weights(generation: &[Solution], bias: f64, direction: OptimizationType) -> Vec<f64> {
    let n = generation.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| generation[a].compare(&generation[b], direction));

    let mut weights = vec![0.0; n];
    for (position, &idx) in order.iter().enumerate() {
        let rank = (n - 1 - position) as f64; // worst = 0
        weights[idx] = 2.0 - bias + 2.0 * rank * (bias - 1.0) / (n - 1) as f64;
    }
    weights
}

fn weighted_pair<R: Rng>(weights: &[f64], rng: &mut R) -> (usize, usize) {
    let first = weighted_index(weights, None, rng);
    let second = weighted_index(weights, Some(first), rng);
    (first, second)
}

/// Roulette wheel draw, optionally skipping one index.
///
/// Degenerates to a uniform draw among the eligible indices when their
/// total weight is not positive.
fn weighted_index<R: Rng>(weights: &[f64], exclude: Option<usize>, rng: &mut R) -> usize {
    let eligible = |i: usize| Some(i) != exclude;
    let total: f64 = weights
        .iter()
        .enumerate()
        .filter(|(i, w)| eligible(*i) && **w > 0.0)
        .map(|(_, w)| *w)
        .sum();

    if !(total > 0.0 && total.is_finite()) {
        let pool: Vec<usize> = (0..weights.len()).filter(|&i| eligible(i)).collect();
        return pool[rng.random_range(0..pool.len())];
    }

    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last = 0;
    for (i, &w) in weights.iter().enumerate() {
        if !eligible(i) || w <= 0.0 {
            continue;
        }
        cumulative += w;
        last = i;
        if cumulative > threshold {
            return i;
        }
    }
    last // floating-point fallback
}
