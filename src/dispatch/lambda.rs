use std::sync::Arc;
use crate::prob::*;
use crate::dispatch::*;
use crate::inference::{PropagationError, HandlerContext};

pub(crate) fn register(r : &mut Registry) {
    r.lambda.register(&[Kind::Gaussian], Arc::new(GaussianProduct));
    r.lambda.register(&[Kind::Discrete], Arc::new(DiscreteProduct));
    let mixtures = Arc::new(MixtureProduct);
    r.lambda.register(&[Kind::Mixture], mixtures.clone());
    r.lambda.register(&[Kind::Mixture, Kind::Gaussian], mixtures.clone());
    r.lambda.register(&[Kind::Gaussian, Kind::Mixture], mixtures);
}

fn informative(messages : &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.kind() != Kind::Noninformative).collect()
}

/// Lambda-messages are likelihoods, so only their product up to a constant
/// matters: the normalized product of the Gaussian densities.
pub struct GaussianProduct;

impl LambdaHandler for GaussianProduct {

    fn name(&self) -> &'static str {
        "gaussian-product-lambda"
    }

    fn description(&self) -> Description {
        vec![(Accepts::Kind(Kind::Gaussian), Arity::ZeroOrMore)]
    }

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let mut terms = Vec::with_capacity(lambda_messages.len());
        for m in informative(lambda_messages) {
            let g = expect::<Gaussian>(self.name(), "Gaussian", &**m)?;
            terms.push((g.expected_value().in_handler(self.name())?, g.sqrt_variance().in_handler(self.name())?));
        }
        let (product, _) = Gaussian::densities_product(&terms).in_handler(self.name())?;
        Ok(Arc::new(product))
    }

}

pub struct DiscreteProduct;

impl LambdaHandler for DiscreteProduct {

    fn name(&self) -> &'static str {
        "discrete-product-lambda"
    }

    fn description(&self) -> Description {
        vec![(Accepts::Kind(Kind::Discrete), Arity::ZeroOrMore)]
    }

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let mut product : Option<(Vec<usize>, Vec<f64>)> = None;
        for m in informative(lambda_messages) {
            let d = expect::<Discrete>(self.name(), "Discrete", &**m)?;
            product = Some(match product {
                None => (d.dimensions().to_vec(), d.probabilities().to_vec()),
                Some((dims, mut p)) => {
                    if dims.as_slice() != d.dimensions() {
                        return Err(ProbError::Dimension { expected : dims.len(), found : d.dimensions().len() })
                            .in_handler(self.name());
                    }
                    p.iter_mut().zip(d.probabilities().iter()).for_each(|(a, b)| *a *= b);
                    (dims, p)
                }
            });
        }
        match product {
            Some((dims, p)) => Ok(Arc::new(Discrete::new(dims, p).in_handler(self.name())?)),
            None => Ok(Arc::new(Noninformative))
        }
    }

}

/// Product of Gaussian mixtures and plain Gaussians, as a mixture with one
/// component per combination of factor components.
pub struct MixtureProduct;

impl LambdaHandler for MixtureProduct {

    fn name(&self) -> &'static str {
        "mixture-product-lambda"
    }

    fn description(&self) -> Description {
        vec![(Accepts::AnyDistribution, Arity::ZeroOrMore)]
    }

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let factors : Vec<&dyn Distribution> = informative(lambda_messages).into_iter().map(|m| &**m).collect();
        Ok(Arc::new(Mixture::mixture_product(&factors).in_handler(self.name())?))
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::DVector;
    use crate::inference::Engine;

    #[test]
    fn gaussian_lambdas_combine_in_closed_form() {
        let r = Registry::with_defaults();
        let msgs : Vec<Message> = vec![
            Arc::new(Gaussian::new(0.0, 1.0).unwrap()),
            Arc::new(Noninformative),
            Arc::new(Gaussian::new(2.0, 1.0).unwrap()),
            Arc::new(Gaussian::new(4.0, 2.0).unwrap())
        ];
        let h = r.resolve_lambda(&msgs).unwrap();
        assert_eq!(h.name(), "gaussian-product-lambda");
        let l = h.compute_lambda(&msgs).unwrap();
        let precision = 1.0 + 1.0 + 0.25;
        let mean = (0.0 + 2.0 + 4.0 * 0.25) / precision;
        assert!((l.expected_value().unwrap() - mean).abs() < 1e-12);
        assert!((l.sqrt_variance().unwrap() - (1.0 / precision).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn discrete_lambdas_multiply_elementwise() {
        let msgs : Vec<Message> = vec![
            Arc::new(Discrete::univariate(vec![0.2, 0.8]).unwrap()),
            Arc::new(Discrete::univariate(vec![0.5, 0.5]).unwrap()),
            Arc::new(Discrete::univariate(vec![0.75, 0.25]).unwrap())
        ];
        let l = Engine::default().compute_lambda(&msgs).unwrap();
        let p0 = 0.2 * 0.75 / (0.2 * 0.75 + 0.8 * 0.25);
        assert!((l.density(&DVector::from_element(1, 0.0)).unwrap() - p0).abs() < 1e-12);
    }

    #[test]
    fn mixed_families_use_mixture_product() {
        let msgs : Vec<Message> = vec![
            Arc::new(Gaussian::new(0.0, 1.0).unwrap()),
            Arc::new(Mixture::equal(vec![
                Box::new(Gaussian::new(-1.0, 1.0).unwrap()),
                Box::new(Gaussian::new(1.0, 1.0).unwrap())
            ]).unwrap())
        ];
        let l = Engine::default().compute_lambda(&msgs).unwrap();
        assert_eq!(l.kind(), Kind::Mixture);
        assert!(l.expected_value().unwrap().abs() < 1e-12);
    }

}
