use nalgebra::*;
use rand::RngCore;
use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use thiserror::Error;
use crate::fit::{Fit, FitParams};
use crate::model::TextFormat;

/// Implements ConditionalDistribution for an unconditional distribution, which
/// is a conditional distribution over zero parent dimensions: conditioning
/// returns the distribution itself. The optional third argument names an
/// inherent method returning the number of discrete states.
#[macro_export]
macro_rules! unconditional {
    ($ty:ty, $kind:expr) => {
        $crate::unconditional!($ty, $kind, |_d : &$ty| None);
    };
    ($ty:ty, $kind:expr, $states:expr) => {
        impl $crate::prob::ConditionalDistribution for $ty {

            fn kind(&self) -> $crate::prob::Kind {
                $kind
            }

            fn ndims_child(&self) -> usize {
                $crate::prob::Distribution::ndims(self)
            }

            fn ndims_parent(&self) -> usize {
                0
            }

            fn nstates(&self) -> Option<usize> {
                let states : fn(&$ty) -> Option<usize> = $states;
                states(self)
            }

            fn density_given(
                &self,
                _c : &nalgebra::DVector<f64>
            ) -> Result<Box<dyn $crate::prob::Distribution>, $crate::prob::ProbError> {
                Ok($crate::prob::Distribution::clone_box(self))
            }

            fn density_at(
                &self,
                x : &nalgebra::DVector<f64>,
                _c : &nalgebra::DVector<f64>
            ) -> Result<f64, $crate::prob::ProbError> {
                $crate::prob::Distribution::density(self, x)
            }

            fn sample_given(
                &self,
                _c : &nalgebra::DVector<f64>,
                rng : &mut dyn rand::RngCore
            ) -> Result<nalgebra::DVector<f64>, $crate::prob::ProbError> {
                $crate::prob::Distribution::sample(self, rng)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_distribution(&self) -> Option<&dyn $crate::prob::Distribution> {
                Some(self)
            }

            fn clone_conditional(&self) -> Box<dyn $crate::prob::ConditionalDistribution> {
                Box::new(self.clone())
            }

            fn into_conditional(self : Box<Self>) -> Box<dyn $crate::prob::ConditionalDistribution> {
                self
            }

        }
    };
}

mod gaussian;

pub use gaussian::*;

/// Point masses used to represent observed variables.
mod delta;

pub use delta::*;

mod discrete;

pub use discrete::*;

mod uniform;

pub use uniform::*;

mod noninformative;

pub use noninformative::*;

/// Finite mixtures with an expectation-maximization update.
mod mixture;

pub use mixture::*;

/// Distributions conditional on the values of parent variables.
mod conditional;

pub use conditional::*;

/// Messages exchanged between variables are immutable once published, so they
/// are shared by reference count instead of copied.
pub type Message = Arc<dyn Distribution>;

/// Concrete type tag of a distribution. Handler resolution is keyed on
/// sequences of these tags, so every distribution type must report a tag
/// distinct from all the others. Types defined outside this crate use Other
/// with their type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Noninformative,
    Gaussian,
    GaussianDelta,
    Discrete,
    DiscreteDelta,
    Uniform,
    Mixture,
    ConditionalGaussian,
    ConditionalDiscrete,
    Other(&'static str)
}

impl Kind {

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Noninformative => "Noninformative",
            Kind::Gaussian => "Gaussian",
            Kind::GaussianDelta => "GaussianDelta",
            Kind::Discrete => "Discrete",
            Kind::DiscreteDelta => "DiscreteDelta",
            Kind::Uniform => "Uniform",
            Kind::Mixture => "Mixture",
            Kind::ConditionalGaussian => "ConditionalGaussian",
            Kind::ConditionalDiscrete => "ConditionalDiscrete",
            Kind::Other(name) => *name
        }
    }

    /// Whether the tag names a distribution that requires parent values.
    pub fn is_conditional(&self) -> bool {
        match self {
            Kind::ConditionalGaussian | Kind::ConditionalDiscrete => true,
            _ => false
        }
    }

    pub fn is_delta(&self) -> bool {
        match self {
            Kind::GaussianDelta | Kind::DiscreteDelta => true,
            _ => false
        }
    }

}

impl Display for Kind {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }

}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbError {

    #[error("Operation {op} is not supported by {kind}")]
    Unsupported { op : &'static str, kind : Kind },

    #[error("Expected argument of dimension {expected}, but found {found}")]
    Dimension { expected : usize, found : usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Degenerate {0}")]
    Degenerate(String),

    #[error("Support of {0} is not well defined")]
    SupportNotWellDefined(Kind),

    #[error("Could not bracket mass 1 - {epsilon} for {kind}")]
    SupportSearch { kind : Kind, epsilon : f64 }

}

/// A probability density over a child variable, given the values of its parent
/// variables. Conditioning (density_given) yields an ordinary Distribution, so
/// the evaluation of a density at a point x for parent values c agrees with
/// first conditioning on c and then evaluating the result at x.
///
/// The trait is object-safe: variables hold their conditional distribution as
/// `Box<dyn ConditionalDistribution>` and the handler registry inspects the
/// concrete type through kind() and as_any().
pub trait ConditionalDistribution
where
    Self : TextFormat + Debug + Send + Sync
{

    fn kind(&self) -> Kind;

    fn ndims_child(&self) -> usize;

    fn ndims_parent(&self) -> usize;

    /// Number of states of a discrete child variable; None for continuous ones.
    fn nstates(&self) -> Option<usize> {
        None
    }

    fn density_given(&self, c : &DVector<f64>) -> Result<Box<dyn Distribution>, ProbError>;

    fn density_at(&self, x : &DVector<f64>, c : &DVector<f64>) -> Result<f64, ProbError> {
        self.density_given(c)?.density(x)
    }

    fn sample_given(&self, c : &DVector<f64>, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError> {
        self.density_given(c)?.sample(rng)
    }

    fn as_any(&self) -> &dyn Any;

    /// Unconditional distributions return themselves here.
    fn as_distribution(&self) -> Option<&dyn Distribution> {
        None
    }

    fn clone_conditional(&self) -> Box<dyn ConditionalDistribution>;

    fn into_conditional(self : Box<Self>) -> Box<dyn ConditionalDistribution>;

}

/// Trait shared by all unconditional probability distributions. Besides density
/// evaluation and sampling, a distribution summarizes itself by its first two
/// moments and by an effective support (the smallest interval holding all but
/// epsilon of its mass), which is what numerical handlers use to decide where
/// to integrate.
///
/// Operations a distribution cannot perform (the cdf of a multivariate
/// distribution, sampling from a Noninformative) return ProbError::Unsupported.
/// Estimation from data is optional: fit returns Fit::Unsupported by default,
/// which callers treat as an expected outcome rather than as a failure.
pub trait Distribution
where
    Self : ConditionalDistribution
{

    fn ndims(&self) -> usize;

    fn density(&self, x : &DVector<f64>) -> Result<f64, ProbError>;

    fn log_density(&self, x : &DVector<f64>) -> Result<f64, ProbError> {
        Ok(self.density(x)?.ln())
    }

    /// Cumulative distribution function, defined for univariate distributions.
    fn cdf(&self, _x : f64) -> Result<f64, ProbError> {
        Err(ProbError::Unsupported { op : "cdf", kind : self.kind() })
    }

    fn sample(&self, rng : &mut dyn RngCore) -> Result<DVector<f64>, ProbError>;

    fn expected_value(&self) -> Result<f64, ProbError>;

    fn sqrt_variance(&self) -> Result<f64, ProbError>;

    /// Interval [lo, hi] with cdf(lo) <= epsilon/2 and 1 - cdf(hi) <= epsilon/2,
    /// found by expansion then bisection over the cdf.
    fn effective_support(&self, epsilon : f64) -> Result<(f64, f64), ProbError> {
        search_support(self, epsilon)
    }

    /// Updates the parameters from (optionally weighted) data, returning the
    /// negative log-likelihood of the data under the updated parameters.
    fn fit(
        &mut self,
        _data : &[DVector<f64>],
        _weights : Option<&[f64]>,
        _params : &FitParams
    ) -> Result<Fit, ProbError> {
        Ok(Fit::Unsupported)
    }

    fn clone_box(&self) -> Box<dyn Distribution>;

}

impl Clone for Box<dyn Distribution> {

    fn clone(&self) -> Self {
        self.clone_box()
    }

}

impl Clone for Box<dyn ConditionalDistribution> {

    fn clone(&self) -> Self {
        self.clone_conditional()
    }

}

const MAX_EXPANSIONS : usize = 128;

const MAX_BISECTIONS : usize = 200;

/// Relative width at which the bisection on each tail stops.
const SUPPORT_TOLERANCE : f64 = 1e-10;

pub fn search_support<D>(d : &D, epsilon : f64) -> Result<(f64, f64), ProbError>
where
    D : Distribution + ?Sized
{
    if !(epsilon > 0.0 && epsilon < 1.0) {
        return Err(ProbError::InvalidParameter(format!("Support epsilon {} outside (0, 1)", epsilon)));
    }
    let tail = epsilon / 2.0;
    let center = d.expected_value().unwrap_or(0.0);
    let scale = d.sqrt_variance()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(1.0);
    let failed = || ProbError::SupportSearch { kind : d.kind(), epsilon };

    let mut lo = center - scale;
    let mut n = 0;
    while d.cdf(lo)? > tail {
        lo = center - 2.0 * (center - lo);
        n += 1;
        if n > MAX_EXPANSIONS || !lo.is_finite() {
            return Err(failed());
        }
    }
    let mut hi = center + scale;
    n = 0;
    while 1.0 - d.cdf(hi)? > tail {
        hi = center + 2.0 * (hi - center);
        n += 1;
        if n > MAX_EXPANSIONS || !hi.is_finite() {
            return Err(failed());
        }
    }

    // Tighten each end: a keeps cdf(a) <= tail, b keeps 1 - cdf(b) <= tail.
    let width = (hi - lo).abs().max(scale);
    let (mut a, mut b) = (lo, center.max(lo));
    if d.cdf(b)? <= tail {
        a = b;
    } else {
        for _ in 0..MAX_BISECTIONS {
            if b - a <= SUPPORT_TOLERANCE * width {
                break;
            }
            let m = 0.5 * (a + b);
            if d.cdf(m)? <= tail {
                a = m;
            } else {
                b = m;
            }
        }
    }
    let lower = a;

    let (mut a, mut b) = (center.min(hi), hi);
    if 1.0 - d.cdf(a)? <= tail {
        b = a;
    } else {
        for _ in 0..MAX_BISECTIONS {
            if b - a <= SUPPORT_TOLERANCE * width {
                break;
            }
            let m = 0.5 * (a + b);
            if 1.0 - d.cdf(m)? <= tail {
                b = m;
            } else {
                a = m;
            }
        }
    }
    Ok((lower, b))
}

/// Standard normal cumulative distribution.
pub(crate) fn standard_normal_cdf(z : f64) -> f64 {
    0.5 * (1.0 + statrs::function::erf::erf(z / std::f64::consts::SQRT_2))
}

pub(crate) fn check_dims(x : &DVector<f64>, expected : usize) -> Result<(), ProbError> {
    if x.nrows() == expected {
        Ok(())
    } else {
        Err(ProbError::Dimension { expected, found : x.nrows() })
    }
}

/// Normalizes a vector of non-negative weights in place, failing when they
/// carry no mass.
pub(crate) fn normalize(p : &mut [f64]) -> Result<(), ProbError> {
    let total : f64 = p.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(ProbError::Degenerate(format!("probability vector with total mass {}", total)));
    }
    p.iter_mut().for_each(|v| *v /= total);
    Ok(())
}
