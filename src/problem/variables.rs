//! Decision variables and the values they produce.

use crate::error::{OptimizationError, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::fmt;

/// Relative tolerance used when checking that a value lies on a step grid.
const GRID_TOLERANCE: f64 = 1e-9;

/// A single gene value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Label(String),
}

impl Value {
    /// Numeric view of the value. Integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Value::Label(v) => Some(v),
            _ => None,
        }
    }

    /// Stable 64-bit encoding, used to derive seeds from genotypes.
    pub(crate) fn fingerprint(&self) -> u64 {
        match self {
            Value::Int(v) => *v as u64,
            Value::Float(v) => v.to_bits(),
            Value::Bool(v) => *v as u64 ^ 0xB001,
            Value::Label(s) => s
                .bytes()
                .fold(0xCBF2_9CE4_8422_2325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x0100_0000_01B3)
                }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Label(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Label(v.to_string())
    }
}

/// Domain and sampling rule of one gene.
///
/// Construct through [`integer`](Self::integer), [`discrete`](Self::discrete),
/// [`float`](Self::float) or [`choice`](Self::choice), which enforce the
/// domain invariants. Immutable afterwards.
///
/// ```
/// use u_evolution::problem::DecisionVariable;
///
/// let x = DecisionVariable::discrete(0.0, 1.0, 0.25).unwrap();
/// assert_eq!(x.cardinality(), Some(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionVariable {
    /// Any integer in `[min, max]`.
    Integer { min: i64, max: i64 },

    /// `min + i * step` for every `i` keeping the value `<= max`.
    Discrete { min: f64, max: f64, step: f64 },

    /// Any real number in `[min, max]`.
    Float { min: f64, max: f64 },

    /// One of an explicit, non-empty set of values.
    Choice(Vec<Value>),
}

impl DecisionVariable {
    pub fn integer(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(OptimizationError::config(format!(
                "integer variable: min ({min}) must not exceed max ({max})"
            )));
        }
        Ok(Self::Integer { min, max })
    }

    pub fn discrete(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(OptimizationError::config(
                "discrete variable: bounds and step must be finite",
            ));
        }
        if min > max {
            return Err(OptimizationError::config(format!(
                "discrete variable: min ({min}) must not exceed max ({max})"
            )));
        }
        if step <= 0.0 {
            return Err(OptimizationError::config(format!(
                "discrete variable: step must be positive, got {step}"
            )));
        }
        Ok(Self::Discrete { min, max, step })
    }

    pub fn float(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) {
            return Err(OptimizationError::config(
                "float variable: bounds must be finite",
            ));
        }
        if min > max {
            return Err(OptimizationError::config(format!(
                "float variable: min ({min}) must not exceed max ({max})"
            )));
        }
        Ok(Self::Float { min, max })
    }

    pub fn choice<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Result<Self> {
        let mut unique: Vec<Value> = Vec::new();
        for v in values.into_iter().map(Into::into) {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        if unique.is_empty() {
            return Err(OptimizationError::config(
                "choice variable: set of values must not be empty",
            ));
        }
        Ok(Self::Choice(unique))
    }

    /// Draws one value uniformly from the domain.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Value {
        match self {
            Self::Integer { min, max } => Value::Int(rng.random_range(*min..=*max)),
            Self::Discrete { min, max, step } => {
                let last = self.grid_steps();
                let i = rng.random_range(0..=last);
                Value::Float((min + i as f64 * step).min(*max))
            }
            Self::Float { min, max } => Value::Float(sample_float(*min, *max, rng)),
            Self::Choice(values) => values
                .choose(rng)
                .cloned()
                // Choice sets are non-empty by construction.
                .unwrap_or_else(|| values[0].clone()),
        }
    }

    /// Whether `value` belongs to the domain.
    pub fn is_valid(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Integer { min, max }, Value::Int(v)) => (*min..=*max).contains(v),
            (Self::Discrete { min, max, step }, v) => match v.as_f64() {
                Some(x) if x >= *min && x <= *max => {
                    let k = (x - min) / step;
                    (k - k.round()).abs() <= GRID_TOLERANCE * k.abs().max(1.0)
                }
                _ => false,
            },
            (Self::Float { min, max }, Value::Float(v)) => v >= min && v <= max,
            (Self::Choice(values), v) => values.contains(v),
            _ => false,
        }
    }

    /// Number of distinct values, or `None` for continuous domains.
    pub fn cardinality(&self) -> Option<u64> {
        match self {
            Self::Integer { min, max } => Some(max.abs_diff(*min).saturating_add(1)),
            Self::Discrete { .. } => Some(self.grid_steps().saturating_add(1)),
            Self::Float { min, max } => (min == max).then_some(1),
            Self::Choice(values) => Some(values.len() as u64),
        }
    }

    /// Index of the last grid point of a discrete domain.
    fn grid_steps(&self) -> u64 {
        match self {
            Self::Discrete { min, max, step } => {
                // Nudge up so that e.g. (1.0 - 0.0) / 0.1 still yields 10.
                let n = ((max - min) / step + GRID_TOLERANCE).floor();
                n.max(0.0) as u64
            }
            _ => 0,
        }
    }
}

/// Uniform draw from `[min, max]`, also when `max - min` overflows.
fn sample_float<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    if (max - min).is_finite() {
        return rng.random_range(min..=max);
    }
    let half_span = max / 2.0 - min / 2.0;
    let offset = half_span * rng.random::<f64>();
    (min + offset + offset).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    #[test]
    fn test_invalid_domains_rejected() {
        assert!(DecisionVariable::integer(5, 1).is_err());
        assert!(DecisionVariable::discrete(0.0, 1.0, 0.0).is_err());
        assert!(DecisionVariable::discrete(0.0, 1.0, -0.5).is_err());
        assert!(DecisionVariable::float(1.0, 0.0).is_err());
        assert!(DecisionVariable::float(0.0, f64::INFINITY).is_err());
        assert!(DecisionVariable::choice(Vec::<Value>::new()).is_err());
    }

    #[test]
    fn test_degenerate_domains_allowed() {
        let mut rng = create_rng(1);
        let x = DecisionVariable::integer(3, 3).unwrap();
        assert_eq!(x.sample(&mut rng), Value::Int(3));
        let f = DecisionVariable::float(2.5, 2.5).unwrap();
        assert_eq!(f.sample(&mut rng), Value::Float(2.5));
    }

    #[test]
    fn test_float_range_wider_than_f64_max() {
        let x = DecisionVariable::float(-1e308, 1e308).unwrap();
        let mut rng = create_rng(1);
        let mut signs = [false; 2];
        for _ in 0..200 {
            let v = x.sample(&mut rng);
            assert!(x.is_valid(&v), "{v:?} outside the domain");
            if let Value::Float(f) = v {
                signs[usize::from(f >= 0.0)] = true;
            }
        }
        assert_eq!(signs, [true, true]);
    }

    #[test]
    fn test_discrete_grid_includes_max() {
        let x = DecisionVariable::discrete(0.0, 1.0, 0.1).unwrap();
        assert_eq!(x.cardinality(), Some(11));
        let mut rng = create_rng(3);
        let mut saw_max = false;
        for _ in 0..2000 {
            if let Value::Float(v) = x.sample(&mut rng) {
                if (v - 1.0).abs() < 1e-9 {
                    saw_max = true;
                }
            }
        }
        assert!(saw_max, "max grid point never sampled");
    }

    #[test]
    fn test_discrete_validity() {
        let x = DecisionVariable::discrete(10.0, 20.0, 2.0).unwrap();
        assert!(x.is_valid(&Value::Float(14.0)));
        assert!(x.is_valid(&Value::Int(20)));
        assert!(!x.is_valid(&Value::Float(15.0)));
        assert!(!x.is_valid(&Value::Float(22.0)));
        assert!(!x.is_valid(&Value::Bool(true)));
    }

    #[test]
    fn test_choice_deduplicates() {
        let x = DecisionVariable::choice(["a", "b", "a"]).unwrap();
        assert_eq!(x.cardinality(), Some(2));
        assert!(x.is_valid(&Value::from("b")));
        assert!(!x.is_valid(&Value::from("c")));
    }

    #[test]
    fn test_choice_samples_every_member() {
        let x = DecisionVariable::choice([true, false]).unwrap();
        let mut rng = create_rng(11);
        let mut seen = [false; 2];
        for _ in 0..200 {
            match x.sample(&mut rng) {
                Value::Bool(true) => seen[0] = true,
                Value::Bool(false) => seen[1] = true,
                other => panic!("unexpected sample {other:?}"),
            }
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn test_type_mismatch_is_invalid() {
        let x = DecisionVariable::integer(0, 10).unwrap();
        assert!(!x.is_valid(&Value::Float(1.0)));
        let f = DecisionVariable::float(0.0, 1.0).unwrap();
        assert!(!f.is_valid(&Value::Int(0)));
    }

    proptest! {
        #[test]
        fn prop_integer_samples_in_bounds(a in -1000i64..1000, span in 0i64..500, seed: u64) {
            let x = DecisionVariable::integer(a, a + span).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                let v = x.sample(&mut rng);
                prop_assert!(x.is_valid(&v), "{v:?} outside [{a}, {}]", a + span);
            }
        }

        #[test]
        fn prop_discrete_samples_on_grid(
            min in -100.0f64..100.0,
            span in 0.0f64..50.0,
            step in 0.01f64..5.0,
            seed: u64,
        ) {
            let x = DecisionVariable::discrete(min, min + span, step).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                let v = x.sample(&mut rng);
                prop_assert!(x.is_valid(&v), "{v:?} not on grid {min}+k*{step}");
            }
        }

        #[test]
        fn prop_float_samples_in_bounds(min in -1e6f64..1e6, span in 0.0f64..1e3, seed: u64) {
            let x = DecisionVariable::float(min, min + span).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                let v = x.sample(&mut rng);
                prop_assert!(x.is_valid(&v));
            }
        }

        #[test]
        fn prop_choice_samples_members(
            members in proptest::collection::vec(-50i64..50, 1..10),
            seed: u64,
        ) {
            let x = DecisionVariable::choice(members.clone()).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                let v = x.sample(&mut rng);
                prop_assert!(members.contains(&v.as_i64().unwrap()));
            }
        }
    }
}
