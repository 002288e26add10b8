use std::sync::Arc;
use nalgebra::DVector;
use tracing::debug;
use crate::prob::*;
use crate::fit::FitParams;
use crate::fit::em::expectation_maximization;
use crate::dispatch::*;
use crate::inference::{PropagationError, HandlerContext};

/// Gaussian components the approximation starts from.
const NCOMPONENTS : usize = 4;

/// Grid points over the common support.
const NPOINTS : usize = 256;

/// Components left with a smaller proportion are dropped after the fit.
const MIN_PROPORTION : f64 = 5e-3;

/// Catch-all for lambdas and posteriors over univariate continuous factors
/// (Gaussian, Uniform, mixtures) with no closed-form product. Consulted only
/// when no key is registered for the inputs.
pub(crate) fn register(r : &mut Registry, approximation : MixtureApproximation) {
    let h = Arc::new(approximation);
    r.lambda.register_family(&[], Accepts::AnyContinuous, h.clone());
    r.posterior.register_family(&[], Accepts::AnyContinuous, h);
}

/// Product of univariate densities approximated by a Gaussian mixture.
///
/// The product is evaluated at the midpoints of a regular grid over the
/// intersection of the factors' effective supports, and a mixture with evenly
/// spaced components is fit to the grid by expectation maximization, each
/// point weighted by the product density there. Components whose proportion
/// falls under MIN_PROPORTION are pruned and the rest renormalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureApproximation {

    params : FitParams,

    epsilon : f64

}

impl MixtureApproximation {

    /// params drive the EM fit; epsilon is the mass each factor may leave
    /// outside the interval the product is evaluated over.
    pub fn new(params : FitParams, epsilon : f64) -> Self {
        Self { params, epsilon }
    }

    pub fn params(&self) -> &FitParams {
        &self.params
    }

    pub fn approximate(&self, factors : &[&dyn Distribution]) -> Result<Mixture, ProbError> {
        let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);
        for f in factors.iter() {
            if f.ndims() != 1 {
                return Err(ProbError::Unsupported { op : "mixture approximation", kind : f.kind() });
            }
            let (a, b) = f.effective_support(self.epsilon)?;
            lo = lo.max(a);
            hi = hi.min(b);
        }
        if !(lo < hi) {
            return Err(ProbError::Degenerate(format!("factors share no support ([{}, {}])", lo, hi)));
        }

        let step = (hi - lo) / NPOINTS as f64;
        let data : Vec<DVector<f64>> = (0..NPOINTS)
            .map(|i| DVector::from_element(1, lo + step * (i as f64 + 0.5)))
            .collect();
        let mut w = Vec::with_capacity(NPOINTS);
        for x in data.iter() {
            let mut p = 1.0;
            for f in factors.iter() {
                p *= f.density(x)?;
            }
            w.push(p);
        }
        let total : f64 = w.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(ProbError::Degenerate(format!("product mass {} over [{}, {}]", total, lo, hi)));
        }
        w.iter_mut().for_each(|wi| *wi *= NPOINTS as f64 / total);

        let width = hi - lo;
        let mut components : Vec<Box<dyn Distribution>> = Vec::with_capacity(NCOMPONENTS);
        for i in 0..NCOMPONENTS {
            let mean = lo + width * (i as f64 + 0.5) / NCOMPONENTS as f64;
            components.push(Box::new(Gaussian::new(mean, width / NCOMPONENTS as f64)?));
        }
        let mut mixture = Mixture::equal(components)?;
        let fit = expectation_maximization(&mut mixture, &data, Some(&w), &self.params)?;
        debug!(lo, hi, nfactors = factors.len(), ?fit, "Approximated product by mixture");

        let (kept, mut proportions) : (Vec<Box<dyn Distribution>>, Vec<f64>) = mixture.components()
            .iter()
            .zip(mixture.proportions().iter())
            .filter(|(_, k)| **k >= MIN_PROPORTION)
            .map(|(c, k)| (c.clone(), *k))
            .unzip();
        normalize(&mut proportions)?;
        Mixture::new(kept, proportions)
    }

}

impl LambdaHandler for MixtureApproximation {

    fn name(&self) -> &'static str {
        "mixture-approximation"
    }

    fn description(&self) -> Description {
        vec![(Accepts::AnyContinuous, Arity::ZeroOrMore)]
    }

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let factors : Vec<&dyn Distribution> = lambda_messages.iter()
            .filter(|m| m.kind() != Kind::Noninformative)
            .map(|m| &**m)
            .collect();
        Ok(Arc::new(self.approximate(&factors).in_handler(LambdaHandler::name(self))?))
    }

}

impl PosteriorHandler for MixtureApproximation {

    fn name(&self) -> &'static str {
        "mixture-approximation"
    }

    fn description(&self) -> Description {
        vec![(Accepts::AnyContinuous, Arity::Exactly(2))]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        Ok(Arc::new(self.approximate(&[&**pi, &**lambda]).in_handler(PosteriorHandler::name(self))?))
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::SUPPORT_EPSILON;
    use crate::inference::Engine;

    /// Mean of N(mu, sigma) truncated to [a, b], by the midpoint rule.
    fn truncated_mean(mu : f64, sigma : f64, a : f64, b : f64) -> f64 {
        let g = Gaussian::new(mu, sigma).unwrap();
        let n = 20_000;
        let h = (b - a) / n as f64;
        let (mut m0, mut m1) = (0.0, 0.0);
        for i in 0..n {
            let x = a + h * (i as f64 + 0.5);
            let p = g.density(&DVector::from_element(1, x)).unwrap();
            m0 += p;
            m1 += p * x;
        }
        m1 / m0
    }

    #[test]
    fn uniform_prior_with_gaussian_lambda() {
        let pi : Message = Arc::new(Uniform::new(0.0, 1.0).unwrap());
        let lambda : Message = Arc::new(Gaussian::new(1.0, 2.0f64.sqrt()).unwrap());
        let r = Registry::with_defaults();
        let h = r.resolve_posterior(&pi, &lambda).unwrap();
        assert_eq!(h.name(), "mixture-approximation");
        let post = h.compute_posterior(&pi, &lambda).unwrap();
        assert_eq!(post.kind(), Kind::Mixture);
        let expected = truncated_mean(1.0, 2.0f64.sqrt(), 0.0, 1.0);
        assert!((post.expected_value().unwrap() - expected).abs() < 0.01);
        let m = post.as_any().downcast_ref::<Mixture>().unwrap();
        assert!(m.proportions().iter().all(|k| *k >= MIN_PROPORTION));
        assert!((m.proportions().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_lambdas_intersect() {
        let msgs : Vec<Message> = vec![
            Arc::new(Uniform::new(0.0, 2.0).unwrap()),
            Arc::new(Noninformative),
            Arc::new(Uniform::new(1.0, 3.0).unwrap())
        ];
        let l = Engine::default().compute_lambda(&msgs).unwrap();
        assert_eq!(l.kind(), Kind::Mixture);
        assert!((l.expected_value().unwrap() - 1.5).abs() < 0.01);
        assert!(l.sqrt_variance().unwrap() < 0.35);
    }

    #[test]
    fn disjoint_supports_are_numerical_failures() {
        let h = MixtureApproximation::new(FitParams::default(), SUPPORT_EPSILON);
        let pi : Message = Arc::new(Uniform::new(0.0, 1.0).unwrap());
        let lambda : Message = Arc::new(Uniform::new(2.0, 3.0).unwrap());
        match h.compute_posterior(&pi, &lambda) {
            Err(PropagationError::Numerical { handler, source : ProbError::Degenerate(_) }) => {
                assert_eq!(handler, "mixture-approximation");
            },
            other => panic!("Unexpected result: {:?}", other.map(|m| m.kind()))
        }
    }

    #[test]
    fn fit_settings_reach_the_approximation() {
        let pi : Message = Arc::new(Uniform::new(-3.0, 3.0).unwrap());
        let lambda : Message = Arc::new(Gaussian::new(2.0, 1.0).unwrap());
        let short = MixtureApproximation::new(FitParams { max_iterations : 1, tolerance : 0.0 }, SUPPORT_EPSILON);
        let long = MixtureApproximation::new(FitParams::default(), SUPPORT_EPSILON);
        let a = short.approximate(&[&*pi, &*lambda]).unwrap();
        let b = long.approximate(&[&*pi, &*lambda]).unwrap();
        let gap = a.proportions().iter()
            .zip(b.proportions().iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        assert!(a.ncomponents() != b.ncomponents() || gap > 1e-6);
    }

}
