use std::sync::Arc;
use crate::prob::*;
use crate::dispatch::*;
use crate::inference::PropagationError;

/// pi of a variable without parents: its own (unconditional) distribution.
pub struct OwnDistribution;

impl PiHandler for OwnDistribution {

    fn name(&self) -> &'static str {
        "own-distribution"
    }

    fn description(&self) -> Description {
        vec![(Accepts::AnyDistribution, Arity::Exactly(1))]
    }

    fn compute_pi(&self, cond : &dyn ConditionalDistribution, pi_messages : &[Message]) -> Result<Message, PropagationError> {
        if !pi_messages.is_empty() {
            return Err(PropagationError::UnexpectedInput {
                handler : self.name(),
                expected : "no pi-messages",
                found : pi_messages[0].kind()
            });
        }
        match cond.as_distribution() {
            Some(d) => Ok(Arc::from(d.clone_box())),
            None => Err(PropagationError::UnexpectedInput {
                handler : self.name(),
                expected : "an unconditional distribution",
                found : cond.kind()
            })
        }
    }

}

/// lambda of a variable whose children say nothing (or which has no children).
pub struct NoLambda;

impl LambdaHandler for NoLambda {

    fn name(&self) -> &'static str {
        "no-lambda"
    }

    fn description(&self) -> Description {
        vec![(Accepts::Kind(Kind::Noninformative), Arity::ZeroOrMore)]
    }

    fn compute_lambda(&self, _lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        Ok(Arc::new(Noninformative))
    }

}

/// lambda when exactly one child is informative: that child's message.
pub struct SoleLambda;

impl LambdaHandler for SoleLambda {

    fn name(&self) -> &'static str {
        "sole-lambda"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::Noninformative), Arity::ZeroOrMore),
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::Kind(Kind::Noninformative), Arity::ZeroOrMore)
        ]
    }

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let mut informative = lambda_messages.iter().filter(|m| m.kind() != Kind::Noninformative);
        match (informative.next(), informative.next()) {
            (Some(m), None) => Ok(m.clone()),
            (Some(_), Some(m)) => Err(PropagationError::UnexpectedInput {
                handler : self.name(),
                expected : "a single informative lambda-message",
                found : m.kind()
            }),
            (None, _) => Ok(Arc::new(Noninformative))
        }
    }

}

/// pi-message when the other children say nothing: the sender's pi.
pub struct PiPassThrough;

impl PiMessageHandler for PiPassThrough {

    fn name(&self) -> &'static str {
        "pi-pass-through"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::Kind(Kind::Noninformative), Arity::ZeroOrMore)
        ]
    }

    fn compute_pi_message(
        &self,
        _registry : &Registry,
        pi : &Message,
        _lambda_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        Ok(pi.clone())
    }

}

pub struct NoLambdaMessage;

impl LambdaMessageHandler for NoLambdaMessage {

    fn name(&self) -> &'static str {
        "no-lambda-message"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyConditional, Arity::Exactly(1)),
            (Accepts::Kind(Kind::Noninformative), Arity::Exactly(1)),
            (Accepts::AnyDistribution, Arity::ZeroOrMore)
        ]
    }

    fn compute_lambda_message(
        &self,
        _cond : &dyn ConditionalDistribution,
        _lambda : &Message,
        _pi_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        Ok(Arc::new(Noninformative))
    }

}

/// Posterior under a Noninformative lambda, which is pi itself.
pub struct PiPosterior;

impl PosteriorHandler for PiPosterior {

    fn name(&self) -> &'static str {
        "pi-posterior"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::AnyDistribution, Arity::Exactly(1)),
            (Accepts::Kind(Kind::Noninformative), Arity::Exactly(1))
        ]
    }

    fn compute_posterior(&self, pi : &Message, _lambda : &Message) -> Result<Message, PropagationError> {
        Ok(pi.clone())
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn trivial_handlers_do_not_need_registrations() {
        let r = Registry::empty();
        let g : Message = Arc::new(Gaussian::new(0.0, 1.0).unwrap());
        let none : Message = Arc::new(Noninformative);

        let own = r.resolve_pi(&Gaussian::new(2.0, 1.0).unwrap(), &[]).unwrap();
        let pi = own.compute_pi(&Gaussian::new(2.0, 1.0).unwrap(), &[]).unwrap();
        assert_eq!(pi.expected_value().unwrap(), 2.0);

        let sole = r.resolve_lambda(&[none.clone(), g.clone(), none.clone()]).unwrap();
        assert_eq!(sole.name(), "sole-lambda");
        let l = sole.compute_lambda(&[none.clone(), g.clone(), none.clone()]).unwrap();
        assert!(Arc::ptr_eq(&l, &g));

        assert_eq!(r.resolve_lambda(&[]).unwrap().name(), "no-lambda");
        assert_eq!(r.resolve_pi_message(&g, &[None, Some(none.clone())]).unwrap().name(), "pi-pass-through");
        assert_eq!(r.resolve_posterior(&g, &none).unwrap().name(), "pi-posterior");
        let cg = ConditionalGaussian::single(1.0, 0.0, 1.0).unwrap();
        assert_eq!(r.resolve_lambda_message(&cg, &none, &[None]).unwrap().name(), "no-lambda-message");
    }

    #[test]
    fn conditional_without_parents_has_no_pi() {
        let cg = ConditionalGaussian::single(1.0, 0.0, 1.0).unwrap();
        assert!(matches!(
            OwnDistribution.compute_pi(&cg, &[]),
            Err(PropagationError::UnexpectedInput { .. })
        ));
    }

}
