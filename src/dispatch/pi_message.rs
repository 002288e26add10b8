use std::sync::Arc;
use crate::prob::*;
use crate::dispatch::*;
use crate::inference::PropagationError;

pub(crate) fn register(r : &mut Registry) {
    let h = Arc::new(PosteriorOfOthers);
    r.pi_message.register(&[Kind::Gaussian], h.clone());
    r.pi_message.register(&[Kind::Discrete], h.clone());
    r.pi_message.register(&[Kind::Mixture], h.clone());
    r.pi_message.register(&[Kind::Mixture, Kind::Gaussian], h.clone());
    r.pi_message.register(&[Kind::Gaussian, Kind::Mixture], h);
}

/// Pi-message as the belief of the sender with the recipient's evidence left
/// out: the lambda combining the other children's messages is resolved and
/// multiplied into pi through the registry, so any family with lambda and
/// posterior handlers gets pi-messages too.
pub struct PosteriorOfOthers;

impl PiMessageHandler for PosteriorOfOthers {

    fn name(&self) -> &'static str {
        "posterior-of-others"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::AnyDistribution, Arity::ZeroOrMore)
        ]
    }

    fn compute_pi_message(
        &self,
        registry : &Registry,
        pi : &Message,
        lambda_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        let others : Vec<Message> = lambda_messages.iter().flatten().cloned().collect();
        let lambda = registry.resolve_lambda(&others)?.compute_lambda(&others)?;
        registry.resolve_posterior(pi, &lambda)?.compute_posterior(pi, &lambda)
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn pi_message_excludes_recipient() {
        let r = Registry::with_defaults();
        let pi : Message = Arc::new(Gaussian::new(0.0, 1.0).unwrap());
        let from_other : Message = Arc::new(Gaussian::new(2.0, 1.0).unwrap());
        let lambdas = vec![None, Some(from_other)];
        let h = r.resolve_pi_message(&pi, &lambdas).unwrap();
        assert_eq!(h.name(), "posterior-of-others");
        let msg = h.compute_pi_message(&r, &pi, &lambdas).unwrap();
        assert!((msg.expected_value().unwrap() - 1.0).abs() < 1e-12);
        assert!((msg.sqrt_variance().unwrap() - 0.5f64.sqrt()).abs() < 1e-12);
    }

}
