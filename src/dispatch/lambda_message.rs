use std::sync::Arc;
use crate::prob::*;
use crate::dispatch::*;
use crate::dispatch::pi::state_weights;
use crate::inference::{PropagationError, HandlerContext};

/// The lambda and the pi-messages of the sender follow the conditional in one
/// sequence, so a family covers any mix of observed and unobserved parents.
pub(crate) fn register(r : &mut Registry) {
    r.lambda_message.register_family(&[Kind::ConditionalGaussian], Accepts::AnyGaussian, Arc::new(LinearGaussianLambdaMessage));
    r.lambda_message.register_family(&[Kind::ConditionalDiscrete], Accepts::AnyDiscrete, Arc::new(DiscreteLambdaMessage));
}

/// Position of the recipient parent: the only absent pi-message.
fn recipient(handler : &'static str, pi_messages : &[Option<Message>]) -> Result<usize, PropagationError> {
    let mut absent = pi_messages.iter().enumerate().filter(|(_, m)| m.is_none()).map(|(i, _)| i);
    match (absent.next(), absent.next()) {
        (Some(s), None) => Ok(s),
        _ => Err(ProbError::InvalidParameter(String::from("exactly one pi-message must be left out")))
            .in_handler(handler)
    }
}

/// Inverts x | c ~ N(a'c + b, v) for the recipient parent s: with lambda
/// N(m, t^2) and the other parents' pi-messages N(m_i, s_i^2), the message is
/// N((m - b - sum a_i m_i) / a_s, (t^2 + v + sum (a_i s_i)^2) / a_s^2). A zero
/// multiplier means the child carries no information about the parent.
pub struct LinearGaussianLambdaMessage;

impl LambdaMessageHandler for LinearGaussianLambdaMessage {

    fn name(&self) -> &'static str {
        "linear-gaussian-lambda-message"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::ConditionalGaussian), Arity::Exactly(1)),
            (Accepts::AnyGaussian, Arity::Exactly(1)),
            (Accepts::AnyGaussian, Arity::ZeroOrMore)
        ]
    }

    fn compute_lambda_message(
        &self,
        cond : &dyn ConditionalDistribution,
        lambda : &Message,
        pi_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        let cg = expect_conditional::<ConditionalGaussian>(self.name(), "ConditionalGaussian", cond)?;
        let a = cg.multipliers();
        if a.nrows() != pi_messages.len() {
            return Err(ProbError::Dimension { expected : a.nrows(), found : pi_messages.len() }).in_handler(self.name());
        }
        let s = recipient(self.name(), pi_messages)?;
        if a[s] == 0.0 {
            return Ok(Arc::new(Noninformative));
        }
        let mut mean = lambda.expected_value().in_handler(self.name())? - cg.offset();
        let mut var = lambda.sqrt_variance().in_handler(self.name())?.powi(2) + cg.variance();
        for (ai, m) in a.iter().zip(pi_messages.iter()) {
            if let Some(m) = m {
                mean -= ai * m.expected_value().in_handler(self.name())?;
                var += (ai * m.sqrt_variance().in_handler(self.name())?).powi(2);
            }
        }
        let msg = Gaussian::new(mean / a[s], var.sqrt() / a[s].abs()).in_handler(self.name())?;
        Ok(Arc::new(msg))
    }

}

/// Likelihood of each state u of the recipient parent:
/// sum over the other parents' configurations of prod_k pi_k(c_k) times
/// sum_x lambda(x) P(x | u, c).
pub struct DiscreteLambdaMessage;

impl LambdaMessageHandler for DiscreteLambdaMessage {

    fn name(&self) -> &'static str {
        "discrete-lambda-message"
    }

    fn description(&self) -> Description {
        vec![
            (Accepts::Kind(Kind::ConditionalDiscrete), Arity::Exactly(1)),
            (Accepts::AnyDiscrete, Arity::Exactly(1)),
            (Accepts::AnyDiscrete, Arity::ZeroOrMore)
        ]
    }

    fn compute_lambda_message(
        &self,
        cond : &dyn ConditionalDistribution,
        lambda : &Message,
        pi_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        let cd = expect_conditional::<ConditionalDiscrete>(self.name(), "ConditionalDiscrete", cond)?;
        let dims = cd.parent_dims();
        if dims.len() != pi_messages.len() {
            return Err(ProbError::Dimension { expected : dims.len(), found : pi_messages.len() }).in_handler(self.name());
        }
        let s = recipient(self.name(), pi_messages)?;
        let nstates = cd.nstates().unwrap_or(0);
        let likelihood = state_weights(&**lambda, nstates).in_handler(self.name())?;
        let mut weights = Vec::with_capacity(dims.len());
        for (m, n) in pi_messages.iter().zip(dims.iter()) {
            weights.push(match m {
                Some(m) => Some(state_weights(&**m, *n).in_handler(self.name())?),
                None => None
            });
        }

        let mut msg = vec![0.0; dims[s]];
        for row in 0..cd.nrows() {
            let config = cd.configuration(row);
            let w : f64 = config.iter()
                .zip(weights.iter())
                .filter_map(|(c, wk)| wk.as_ref().map(|wk| wk[*c]))
                .product();
            if w > 0.0 {
                let child : f64 = likelihood.iter()
                    .enumerate()
                    .map(|(x, l)| l * cd.probability(row, x))
                    .sum();
                msg[config[s]] += w * child;
            }
        }
        Ok(Arc::new(Discrete::univariate(msg).in_handler(self.name())?))
    }

}
