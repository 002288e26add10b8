use std::sync::Arc;
use nalgebra::DVector;
use crate::prob::*;
use crate::dispatch::*;
use crate::dispatch::pi::state_weights;
use crate::inference::{PropagationError, HandlerContext};

/// Mass left out when checking that an observation lies in the support of pi.
const DELTA_SUPPORT_EPSILON : f64 = 1e-6;

pub(crate) fn register(r : &mut Registry) {
    r.posterior.register(&[Kind::Gaussian], Arc::new(GaussianPosterior));
    r.posterior.register(&[Kind::Discrete], Arc::new(DiscretePosterior));

    let at_states = Arc::new(DiscreteContinuousPosterior);
    r.posterior.register(&[Kind::Discrete, Kind::Gaussian], at_states.clone());
    r.posterior.register(&[Kind::Discrete, Kind::Mixture], at_states);

    let delta = Arc::new(DeltaPosterior);
    r.posterior.register(&[Kind::Gaussian, Kind::GaussianDelta], delta.clone());
    r.posterior.register(&[Kind::Mixture, Kind::GaussianDelta], delta.clone());
    r.posterior.register(&[Kind::Uniform, Kind::GaussianDelta], delta.clone());
    r.posterior.register(&[Kind::Discrete, Kind::DiscreteDelta], delta);

    let mixtures = Arc::new(MixturePosterior);
    r.posterior.register(&[Kind::Mixture], mixtures.clone());
    r.posterior.register(&[Kind::Mixture, Kind::Gaussian], mixtures.clone());
    r.posterior.register(&[Kind::Gaussian, Kind::Mixture], mixtures);
}

pub struct GaussianPosterior;

impl PosteriorHandler for GaussianPosterior {

    fn name(&self) -> &'static str {
        "gaussian-posterior"
    }

    fn description(&self) -> Description {
        vec![(Accepts::Kind(Kind::Gaussian), Arity::Exactly(2))]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        let mut terms = Vec::with_capacity(2);
        for d in [pi, lambda].iter() {
            let g = expect::<Gaussian>(self.name(), "Gaussian", &***d)?;
            terms.push((g.expected_value().in_handler(self.name())?, g.sqrt_variance().in_handler(self.name())?));
        }
        let (product, _) = Gaussian::densities_product(&terms).in_handler(self.name())?;
        Ok(Arc::new(product))
    }

}

pub struct DiscretePosterior;

impl PosteriorHandler for DiscretePosterior {

    fn name(&self) -> &'static str {
        "discrete-posterior"
    }

    fn description(&self) -> Description {
        vec![(Accepts::Kind(Kind::Discrete), Arity::Exactly(2))]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        let p = expect::<Discrete>(self.name(), "Discrete", &**pi)?;
        let l = expect::<Discrete>(self.name(), "Discrete", &**lambda)?;
        if p.dimensions() != l.dimensions() {
            return Err(ProbError::Dimension { expected : p.dimensions().len(), found : l.dimensions().len() })
                .in_handler(self.name());
        }
        let product : Vec<f64> = p.probabilities().iter()
            .zip(l.probabilities().iter())
            .map(|(a, b)| a * b)
            .collect();
        Ok(Arc::new(Discrete::new(p.dimensions().to_vec(), product).in_handler(self.name())?))
    }

}

/// Discrete pi and a continuous likelihood: the likelihood is read off at each
/// state index.
pub struct DiscreteContinuousPosterior;

impl PosteriorHandler for DiscreteContinuousPosterior {

    fn name(&self) -> &'static str {
        "discrete-continuous-posterior"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::Discrete), Arity::Exactly(1)),
            (Accepts::AnyDistribution, Arity::Exactly(1))
        ]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        let p = expect::<Discrete>(self.name(), "Discrete", &**pi)?;
        let nstates = p.probabilities().len();
        if p.dimensions().len() != 1 {
            return Err(ProbError::Dimension { expected : 1, found : p.dimensions().len() }).in_handler(self.name());
        }
        let l = state_weights(&**lambda, nstates).in_handler(self.name())?;
        let product : Vec<f64> = p.probabilities().iter().zip(l.iter()).map(|(a, b)| a * b).collect();
        Ok(Arc::new(Discrete::univariate(product).in_handler(self.name())?))
    }

}

/// An observation (delta lambda) is the posterior, provided pi gives it mass.
pub struct DeltaPosterior;

impl PosteriorHandler for DeltaPosterior {

    fn name(&self) -> &'static str {
        "delta-posterior"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::AnyDistribution, Arity::Exactly(1))
        ]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        if !lambda.kind().is_delta() {
            return Err(PropagationError::UnexpectedInput {
                handler : self.name(),
                expected : "GaussianDelta or DiscreteDelta",
                found : lambda.kind()
            });
        }
        let x = lambda.expected_value().in_handler(self.name())?;
        let inside = if let Some(d) = lambda.as_any().downcast_ref::<DiscreteDelta>() {
            let point = DVector::from_iterator(d.point().len(), d.point().iter().map(|s| *s as f64));
            pi.density(&point).in_handler(self.name())? > 0.0
        } else {
            let (lo, hi) = pi.effective_support(DELTA_SUPPORT_EPSILON).in_handler(self.name())?;
            x >= lo && x <= hi
        };
        if !inside {
            return Err(ProbError::InvalidParameter(format!("observed value {} has no mass under {}", x, pi.kind())))
                .in_handler(self.name());
        }
        Ok(lambda.clone())
    }

}

pub struct MixturePosterior;

impl PosteriorHandler for MixturePosterior {

    fn name(&self) -> &'static str {
        "mixture-posterior"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::AnyDistribution, Arity::Exactly(1))
        ]
    }

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        let product = Mixture::mixture_product(&[&**pi, &**lambda]).in_handler(self.name())?;
        Ok(Arc::new(product))
    }

}
