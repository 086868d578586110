//! Optimization problem definition.

use super::variables::{DecisionVariable, Value};
use crate::error::{BoxError, OptimizationError, Result};
use rand::Rng;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type ObjectiveFn = dyn Fn(&[Value]) -> std::result::Result<ObjectiveValue, BoxError> + Send + Sync;
type PenaltyFn = dyn Fn(&[Value]) -> std::result::Result<f64, BoxError> + Send + Sync;
type ConstraintFn = dyn Fn(&[Value]) -> f64 + Send + Sync;

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimizationType {
    #[default]
    Minimize,
    Maximize,
}

impl OptimizationType {
    /// Orders two objective values best first.
    ///
    /// `Ordering::Less` means `a` is better than `b`. Components are
    /// compared lexicographically; NaN components always rank worst.
    pub fn compare(self, a: &ObjectiveValue, b: &ObjectiveValue) -> Ordering {
        for (x, y) in a.components().iter().zip(b.components()) {
            let ord = self.compare_scalar(*x, *y);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.components().len().cmp(&b.components().len())
    }

    /// Orders two scalars best first, NaN last.
    pub fn compare_scalar(self, a: f64, b: f64) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match self {
                    OptimizationType::Minimize => ord,
                    OptimizationType::Maximize => ord.reverse(),
                }
            }
        }
    }

    /// Whether `a` is strictly better than `b`.
    pub fn is_better(self, a: &ObjectiveValue, b: &ObjectiveValue) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Applies a non-negative penalty so that it always worsens the value.
    pub fn worsen(self, value: f64, penalty: f64) -> f64 {
        match self {
            OptimizationType::Minimize => value + penalty,
            OptimizationType::Maximize => value - penalty,
        }
    }
}

/// Value of the objective function: one criterion or several.
///
/// Multi-criteria values are ranked lexicographically; the first component
/// is the primary criterion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectiveValue {
    Single(f64),
    Multi(Vec<f64>),
}

impl ObjectiveValue {
    pub fn components(&self) -> &[f64] {
        match self {
            ObjectiveValue::Single(v) => std::slice::from_ref(v),
            ObjectiveValue::Multi(v) => v,
        }
    }

    /// The primary (first) criterion. NaN for an empty multi value.
    pub fn primary(&self) -> f64 {
        self.components().first().copied().unwrap_or(f64::NAN)
    }

    /// Applies `penalty` to every component in the worsening direction.
    pub fn penalized(&self, penalty: f64, direction: OptimizationType) -> ObjectiveValue {
        match self {
            ObjectiveValue::Single(v) => ObjectiveValue::Single(direction.worsen(*v, penalty)),
            ObjectiveValue::Multi(v) => {
                ObjectiveValue::Multi(v.iter().map(|x| direction.worsen(*x, penalty)).collect())
            }
        }
    }
}

impl From<f64> for ObjectiveValue {
    fn from(v: f64) -> Self {
        ObjectiveValue::Single(v)
    }
}

impl From<Vec<f64>> for ObjectiveValue {
    fn from(v: Vec<f64>) -> Self {
        ObjectiveValue::Multi(v)
    }
}

impl fmt::Display for ObjectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveValue::Single(v) => write!(f, "{v}"),
            ObjectiveValue::Multi(v) => write!(f, "{v:?}"),
        }
    }
}

/// A problem to be optimized.
///
/// The ordered decision variables define the gene layout of every
/// [`Solution`](super::Solution). Built once with
/// [`OptimizationProblem::builder`] and shared read-only afterwards.
///
/// ```
/// use u_evolution::problem::{DecisionVariable, OptimizationProblem};
///
/// let problem = OptimizationProblem::builder()
///     .variable("x", DecisionVariable::integer(0, 10).unwrap())
///     .variable("y", DecisionVariable::float(-1.0, 1.0).unwrap())
///     .constraint("x_plus_y_le_5", |v| {
///         v[0].as_f64().unwrap_or(0.0) + v[1].as_f64().unwrap_or(0.0) - 5.0
///     })
///     .objective(|v| Ok(v[0].as_f64().unwrap_or(0.0) * v[1].as_f64().unwrap_or(0.0)))
///     .maximize()
///     .build()
///     .unwrap();
/// assert_eq!(problem.dimension(), 2);
/// ```
#[derive(Clone)]
pub struct OptimizationProblem {
    names: Vec<String>,
    variables: Vec<DecisionVariable>,
    constraints: Vec<(String, Arc<ConstraintFn>)>,
    penalty: Option<Arc<PenaltyFn>>,
    objective: Arc<ObjectiveFn>,
    direction: OptimizationType,
}

impl OptimizationProblem {
    pub fn builder() -> OptimizationProblemBuilder {
        OptimizationProblemBuilder::default()
    }

    /// Number of decision variables (genotype length).
    pub fn dimension(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &[DecisionVariable] {
        &self.variables
    }

    pub fn variable_names(&self) -> &[String] {
        &self.names
    }

    /// Position of the variable called `name` in the genotype.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn direction(&self) -> OptimizationType {
        self.direction
    }

    /// Samples one value per decision variable.
    pub fn sample_genotype<R: Rng>(&self, rng: &mut R) -> Vec<Value> {
        self.variables.iter().map(|v| v.sample(rng)).collect()
    }

    /// Whether `values` has the right length and every gene is in its domain.
    pub fn is_valid_genotype(&self, values: &[Value]) -> bool {
        values.len() == self.variables.len()
            && self
                .variables
                .iter()
                .zip(values)
                .all(|(var, v)| var.is_valid(v))
    }

    /// Evaluates the objective function.
    pub fn objective(&self, values: &[Value]) -> Result<ObjectiveValue> {
        self.check_len(values)?;
        (self.objective)(values).map_err(OptimizationError::Evaluation)
    }

    /// Evaluates the penalty: the explicit penalty function when one was
    /// given, otherwise the sum of positive constraint violations.
    pub fn penalty(&self, values: &[Value]) -> Result<f64> {
        self.check_len(values)?;
        let penalty = match &self.penalty {
            Some(f) => f(values).map_err(OptimizationError::Evaluation)?,
            None => {
                let mut sum = 0.0;
                for (name, c) in &self.constraints {
                    let violation = c(values);
                    if violation.is_nan() {
                        return Err(OptimizationError::Evaluation(
                            format!("constraint '{name}' returned NaN").into(),
                        ));
                    }
                    if violation > 0.0 {
                        sum += violation;
                    }
                }
                sum
            }
        };
        if penalty.is_nan() || penalty < 0.0 {
            return Err(OptimizationError::Evaluation(
                format!("penalty must be a non-negative number, got {penalty}").into(),
            ));
        }
        Ok(penalty)
    }

    /// Whether every registered constraint is satisfied. A NaN constraint
    /// value counts as violated.
    pub fn is_feasible(&self, values: &[Value]) -> bool {
        self.constraints.iter().all(|(_, c)| c(values) <= 0.0)
    }

    /// Names of the constraints violated by `values`.
    pub fn violated_constraints(&self, values: &[Value]) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|(_, c)| {
                let violation = c(values);
                violation.is_nan() || violation > 0.0
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn check_len(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.variables.len() {
            return Err(OptimizationError::state(format!(
                "genotype has {} genes, problem has {} decision variables",
                values.len(),
                self.variables.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for OptimizationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationProblem")
            .field("variables", &self.names.iter().zip(&self.variables).collect::<Vec<_>>())
            .field(
                "constraints",
                &self.constraints.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("explicit_penalty", &self.penalty.is_some())
            .field("direction", &self.direction)
            .finish()
    }
}

/// Builder for [`OptimizationProblem`].
#[derive(Default)]
pub struct OptimizationProblemBuilder {
    names: Vec<String>,
    variables: Vec<DecisionVariable>,
    constraints: Vec<(String, Arc<ConstraintFn>)>,
    penalty: Option<Arc<PenaltyFn>>,
    objective: Option<Arc<ObjectiveFn>>,
    direction: OptimizationType,
}

impl OptimizationProblemBuilder {
    /// Appends a decision variable. Order defines the gene layout.
    pub fn variable(mut self, name: impl Into<String>, variable: DecisionVariable) -> Self {
        self.names.push(name.into());
        self.variables.push(variable);
        self
    }

    /// Registers a constraint returning its violation (`<= 0` when satisfied).
    pub fn constraint<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> f64 + Send + Sync + 'static,
    {
        self.constraints.push((name.into(), Arc::new(f)));
        self
    }

    /// Sets an explicit penalty function, overriding the constraint sum.
    pub fn penalty<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<f64, BoxError> + Send + Sync + 'static,
    {
        self.penalty = Some(Arc::new(f));
        self
    }

    pub fn objective<F, O>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<O, BoxError> + Send + Sync + 'static,
        O: Into<ObjectiveValue>,
    {
        self.objective = Some(Arc::new(move |v: &[Value]| f(v).map(Into::<ObjectiveValue>::into)));
        self
    }

    pub fn direction(mut self, direction: OptimizationType) -> Self {
        self.direction = direction;
        self
    }

    pub fn minimize(self) -> Self {
        self.direction(OptimizationType::Minimize)
    }

    pub fn maximize(self) -> Self {
        self.direction(OptimizationType::Maximize)
    }

    pub fn build(self) -> Result<OptimizationProblem> {
        if self.variables.is_empty() {
            return Err(OptimizationError::config(
                "problem must have at least one decision variable",
            ));
        }
        for (i, name) in self.names.iter().enumerate() {
            if name.is_empty() {
                return Err(OptimizationError::config(format!(
                    "decision variable #{i} has an empty name"
                )));
            }
            if self.names[..i].contains(name) {
                return Err(OptimizationError::config(format!(
                    "duplicate decision variable name '{name}'"
                )));
            }
        }
        let objective = self
            .objective
            .ok_or_else(|| OptimizationError::config("problem has no objective function"))?;
        Ok(OptimizationProblem {
            names: self.names,
            variables: self.variables,
            constraints: self.constraints,
            penalty: self.penalty,
            objective,
            direction: self.direction,
        })
    }
}
