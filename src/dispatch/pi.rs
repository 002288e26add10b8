use std::sync::Arc;
use nalgebra::DVector;
use crate::prob::*;
use crate::dispatch::*;
use crate::inference::{PropagationError, HandlerContext};

pub(crate) fn register(r : &mut Registry) {
    r.pi.register_family(&[Kind::ConditionalGaussian], Accepts::AnyGaussian, Arc::new(LinearGaussianPi));
    r.pi.register_exact(&[Kind::ConditionalGaussian, Kind::Mixture], Arc::new(LinearGaussianMixturePi));
    r.pi.register_family(&[Kind::ConditionalDiscrete], Accepts::AnyDiscrete, Arc::new(DiscretePi));
}

/// Marginal of x | c ~ N(a'c + b, v) over independent univariate Gaussian (or
/// observed) parents: N(b + sum a_i m_i, v + sum (a_i s_i)^2).
pub struct LinearGaussianPi;

impl PiHandler for LinearGaussianPi {

    fn name(&self) -> &'static str {
        "linear-gaussian-pi"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::ConditionalGaussian), Arity::Exactly(1)),
            (Accepts::AnyGaussian, Arity::ZeroOrMore)
        ]
    }

    fn compute_pi(&self, cond : &dyn ConditionalDistribution, pi_messages : &[Message]) -> Result<Message, PropagationError> {
        let cg = expect_conditional::<ConditionalGaussian>(self.name(), "ConditionalGaussian", cond)?;
        let a = cg.multipliers();
        if a.nrows() != pi_messages.len() {
            return Err(ProbError::Dimension { expected : a.nrows(), found : pi_messages.len() }).in_handler(self.name());
        }
        let mut mean = cg.offset();
        let mut var = cg.variance();
        for (ai, m) in a.iter().zip(pi_messages.iter()) {
            mean += ai * m.expected_value().in_handler(self.name())?;
            var += (ai * m.sqrt_variance().in_handler(self.name())?).powi(2);
        }
        Ok(Arc::new(Gaussian::new(mean, var.sqrt()).in_handler(self.name())?))
    }

}

/// Marginal of a linear-Gaussian child of a single parent whose pi is a mixture
/// of Gaussians: one linear-Gaussian marginal per component, with the parent's
/// mixing proportions.
pub struct LinearGaussianMixturePi;

impl PiHandler for LinearGaussianMixturePi {

    fn name(&self) -> &'static str {
        "linear-gaussian-mixture-pi"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::ConditionalGaussian), Arity::Exactly(1)),
            (Accepts::Kind(Kind::Mixture), Arity::Exactly(1))
        ]
    }

    fn compute_pi(&self, cond : &dyn ConditionalDistribution, pi_messages : &[Message]) -> Result<Message, PropagationError> {
        let cg = expect_conditional::<ConditionalGaussian>(self.name(), "ConditionalGaussian", cond)?;
        if cg.multipliers().nrows() != 1 || pi_messages.len() != 1 {
            return Err(ProbError::Dimension { expected : 1, found : pi_messages.len() }).in_handler(self.name());
        }
        let a = cg.multipliers()[0];
        let terms = Mixture::gaussian_terms(&*pi_messages[0]).in_handler(self.name())?;
        let mut components : Vec<Box<dyn Distribution>> = Vec::with_capacity(terms.len());
        let mut proportions = Vec::with_capacity(terms.len());
        for (k, m, s) in terms {
            let var = cg.variance() + (a * s).powi(2);
            components.push(Box::new(Gaussian::new(cg.offset() + a * m, var.sqrt()).in_handler(self.name())?));
            proportions.push(k);
        }
        Ok(Arc::new(Mixture::new(components, proportions).in_handler(self.name())?))
    }

}

/// Marginal of a conditional probability table over independent discrete (or
/// observed) parents: P(x) = sum_c P(x | c) prod_k pi_k(c_k).
pub struct DiscretePi;

impl PiHandler for DiscretePi {

    fn name(&self) -> &'static str {
        "discrete-pi"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::ConditionalDiscrete), Arity::Exactly(1)),
            (Accepts::AnyDiscrete, Arity::ZeroOrMore)
        ]
    }

    fn compute_pi(&self, cond : &dyn ConditionalDistribution, pi_messages : &[Message]) -> Result<Message, PropagationError> {
        let cd = expect_conditional::<ConditionalDiscrete>(self.name(), "ConditionalDiscrete", cond)?;
        if cd.parent_dims().len() != pi_messages.len() {
            return Err(ProbError::Dimension { expected : cd.parent_dims().len(), found : pi_messages.len() })
                .in_handler(self.name());
        }
        let weights = parent_state_weights(pi_messages, cd.parent_dims()).in_handler(self.name())?;
        let nstates = cd.nstates().unwrap_or(0);
        let mut p = vec![0.0; nstates];
        for row in 0..cd.nrows() {
            let w : f64 = cd.configuration(row).iter()
                .zip(weights.iter())
                .map(|(s, wk)| wk[*s])
                .product();
            if w > 0.0 {
                for (x, px) in p.iter_mut().enumerate() {
                    *px += w * cd.probability(row, x);
                }
            }
        }
        Ok(Arc::new(Discrete::univariate(p).in_handler(self.name())?))
    }

}

/// Probability each parent pi-message assigns to each of the parent's states.
pub(crate) fn parent_state_weights(messages : &[Message], dims : &[usize]) -> Result<Vec<Vec<f64>>, ProbError> {
    messages.iter()
        .zip(dims.iter())
        .map(|(m, n)| state_weights(&**m, *n))
        .collect()
}

pub(crate) fn state_weights(d : &dyn Distribution, nstates : usize) -> Result<Vec<f64>, ProbError> {
    (0..nstates)
        .map(|s| d.density(&DVector::from_element(1, s as f64)))
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn linear_gaussian_marginal() {
        let r = Registry::with_defaults();
        let cg = ConditionalGaussian::new(DVector::from_vec(vec![2.0, -1.0]), 1.0, 0.5).unwrap();
        let parents : Vec<Message> = vec![
            Arc::new(Gaussian::new(1.0, 1.0).unwrap()),
            Arc::new(GaussianDelta::new(3.0).unwrap())
        ];
        let h = r.resolve_pi(&cg, &parents).unwrap();
        assert_eq!(h.name(), "linear-gaussian-pi");
        let pi = h.compute_pi(&cg, &parents).unwrap();
        assert!((pi.expected_value().unwrap() - 0.0).abs() < 1e-12);
        assert!((pi.sqrt_variance().unwrap() - 4.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn mixture_parent_needs_exact_count() {
        let r = Registry::with_defaults();
        let cg = ConditionalGaussian::single(1.0, 0.0, 1.0).unwrap();
        let m : Message = Arc::new(Mixture::equal(vec![
            Box::new(Gaussian::new(-1.0, 1.0).unwrap()),
            Box::new(Gaussian::new(1.0, 1.0).unwrap())
        ]).unwrap());
        let pi = r.resolve_pi(&cg, &[m.clone()]).unwrap().compute_pi(&cg, &[m.clone()]).unwrap();
        assert_eq!(pi.kind(), Kind::Mixture);
        assert!(pi.expected_value().unwrap().abs() < 1e-12);
        let cg2 = ConditionalGaussian::new(DVector::from_vec(vec![1.0, 1.0]), 0.0, 1.0).unwrap();
        assert!(matches!(
            r.resolve_pi(&cg2, &[m.clone(), m]),
            Err(PropagationError::HandlerNotFound { .. })
        ));
    }

    #[test]
    fn discrete_marginal_sums_over_configurations() {
        let cd = ConditionalDiscrete::new(2, vec![2, 2], vec![
            vec![0.9, 0.1], vec![0.5, 0.5], vec![0.3, 0.7], vec![0.0, 1.0]
        ]).unwrap();
        let parents : Vec<Message> = vec![
            Arc::new(Discrete::univariate(vec![0.4, 0.6]).unwrap()),
            Arc::new(DiscreteDelta::state(2, 1).unwrap())
        ];
        let pi = DiscretePi.compute_pi(&cd, &parents).unwrap();
        let p0 = 0.4 * 0.5 + 0.6 * 0.0;
        assert!((pi.density(&DVector::from_element(1, 0.0)).unwrap() - p0).abs() < 1e-12);
    }

}
