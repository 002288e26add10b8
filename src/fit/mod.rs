use serde::{Serialize, Deserialize};
use crate::prob::ProbError;

/// Expectation maximization for finite mixtures, with per-component
/// regularization of the mixing proportions.
pub mod em;

/// Default cap on EM iterations.
pub const MAX_ITERATIONS : usize = 1000;

/// Default stopping tolerance on the largest change of a mixing proportion.
pub const TOLERANCE : f64 = 1e-4;

/// Settings shared by every estimator called through Distribution::fit. Leaf
/// distributions with closed-form estimates ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitParams {

    pub max_iterations : usize,

    pub tolerance : f64

}

impl Default for FitParams {

    fn default() -> Self {
        Self { max_iterations : MAX_ITERATIONS, tolerance : TOLERANCE }
    }

}

/// Outcome of a call to Distribution::fit. Distributions without an estimator
/// report Unsupported, which is an expected result rather than an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fit {

    Fitted { neg_log_likelihood : f64, iterations : usize },

    Unsupported

}

impl Fit {

    pub fn neg_log_likelihood(&self) -> Option<f64> {
        match self {
            Fit::Fitted { neg_log_likelihood, .. } => Some(*neg_log_likelihood),
            Fit::Unsupported => None
        }
    }

}

/// Resolves optional per-datum weights into a vector, checking they match the
/// data and carry some mass.
pub(crate) fn data_weights(n : usize, weights : Option<&[f64]>) -> Result<Vec<f64>, ProbError> {
    match weights {
        Some(w) => {
            if w.len() != n {
                return Err(ProbError::Dimension { expected : n, found : w.len() });
            }
            if w.iter().any(|v| !(*v >= 0.0) || !v.is_finite()) {
                return Err(ProbError::InvalidParameter(String::from("Data weights must be finite and non-negative")));
            }
            Ok(w.to_vec())
        },
        None => Ok(vec![1.0; n])
    }
}
