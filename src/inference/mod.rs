use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use crate::prob::*;
use crate::dispatch::{HandlerKey, Registry};
use crate::graph::remote::TransportError;
use crate::config::Config;

/// Failures of message computations. HandlerNotFound and Transport concern a
/// single edge: the message on that edge could not be computed, and callers
/// decide whether to substitute a fallback, abandon the edge or fail the round.
#[derive(Debug, Error)]
pub enum PropagationError {

    #[error("No handler for {exact} (also tried {loose})")]
    HandlerNotFound { exact : HandlerKey, loose : HandlerKey },

    #[error("Handler {handler} expected {expected}, received {found}")]
    UnexpectedInput { handler : &'static str, expected : &'static str, found : Kind },

    #[error("Handler {handler} failed: {source}")]
    Numerical { handler : &'static str, #[source] source : ProbError },

    #[error(transparent)]
    Prob(#[from] ProbError),

    #[error("Transport failure on edge {from} -> {to}: {source}")]
    Transport { from : String, to : String, #[source] source : TransportError },

    #[error("{direction} message {from} -> {to} could not be computed: {source}")]
    Edge { direction : &'static str, from : String, to : String, #[source] source : Box<PropagationError> },

    #[error("Unknown variable {0}")]
    UnknownVariable(String),

    #[error("{0} is not a parent of {1}")]
    NotAParent(String, String),

    #[error("Evidence {value} is not a valid value of {variable}: {reason}")]
    InvalidEvidence { variable : String, value : f64, reason : String },

    #[error("Variable {0} is hosted remotely; only its pi-messages are available")]
    Remote(String)

}

impl PropagationError {

    /// Whether the failure concerns only the edge the message travels on.
    pub fn is_edge_failure(&self) -> bool {
        match self {
            PropagationError::HandlerNotFound { .. }
                | PropagationError::Transport { .. }
                | PropagationError::Edge { .. } => true,
            _ => false
        }
    }

}

/// Attaches a handler name to numerical errors raised inside it.
pub(crate) trait HandlerContext<T> {

    fn in_handler(self, handler : &'static str) -> Result<T, PropagationError>;

}

impl<T> HandlerContext<T> for Result<T, ProbError> {

    fn in_handler(self, handler : &'static str) -> Result<T, PropagationError> {
        self.map_err(|source| PropagationError::Numerical { handler, source })
    }

}

/// The five quantities of Pearl's message passing, each delegated to the
/// handler the registry resolves for the concrete types of its inputs.
/// The engine holds no state besides the registry, which is shared and
/// read-only once built.
///
/// - pi: predictive distribution of a variable from its conditional and the
/// pi-messages of its parents;
/// - lambda: likelihood of a variable from the lambda-messages of its children;
/// - pi-message: what a parent tells one child, combining its pi with the
/// lambda-messages of all its other children;
/// - lambda-message: what a child tells one parent, integrating its lambda
/// against its conditional and the pi-messages of all its other parents;
/// - posterior: normalized product of pi and lambda.
#[derive(Clone)]
pub struct Engine {
    registry : Arc<Registry>
}

impl fmt::Debug for Engine {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.registry;
        let n = r.pi.len() + r.lambda.len() + r.pi_message.len() + r.lambda_message.len() + r.posterior.len();
        write!(f, "Engine {{ handlers : {} }}", n)
    }

}

impl Default for Engine {

    fn default() -> Self {
        Self::from_config(&Config::default())
    }

}

impl Engine {

    pub fn new(registry : Registry) -> Self {
        Self { registry : Arc::new(registry) }
    }

    /// Engine over the built-in handlers, with the fit settings and support
    /// epsilon of the configuration.
    pub fn from_config(config : &Config) -> Self {
        Self::new(Registry::with_settings(config.fit, config.support_epsilon))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn compute_pi(
        &self,
        cond : &dyn ConditionalDistribution,
        pi_messages : &[Message]
    ) -> Result<Message, PropagationError> {
        let h = self.registry.resolve_pi(cond, pi_messages)?;
        debug!(handler = h.name(), "Computing pi");
        h.compute_pi(cond, pi_messages)
    }

    pub fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError> {
        let h = self.registry.resolve_lambda(lambda_messages)?;
        debug!(handler = h.name(), "Computing lambda");
        h.compute_lambda(lambda_messages)
    }

    /// lambda_messages holds one entry per child of the sender, None for the recipient.
    pub fn compute_pi_message(
        &self,
        pi : &Message,
        lambda_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        let h = self.registry.resolve_pi_message(pi, lambda_messages)?;
        debug!(handler = h.name(), "Computing pi-message");
        h.compute_pi_message(&self.registry, pi, lambda_messages)
    }

    /// pi_messages holds one entry per parent of the sender, None for the recipient.
    pub fn compute_lambda_message(
        &self,
        cond : &dyn ConditionalDistribution,
        lambda : &Message,
        pi_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError> {
        let h = self.registry.resolve_lambda_message(cond, lambda, pi_messages)?;
        debug!(handler = h.name(), "Computing lambda-message");
        h.compute_lambda_message(cond, lambda, pi_messages)
    }

    pub fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError> {
        let h = self.registry.resolve_posterior(pi, lambda)?;
        debug!(handler = h.name(), "Computing posterior");
        h.compute_posterior(pi, lambda)
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    fn gaussian(m : f64, s : f64) -> Message {
        Arc::new(Gaussian::new(m, s).unwrap())
    }

    #[test]
    fn noninformative_lambda_leaves_pi_unchanged() {
        let engine = Engine::default();
        let pi = gaussian(1.0, 2.0);
        let lambda : Message = Arc::new(Noninformative);
        let post = engine.compute_posterior(&pi, &lambda).unwrap();
        assert!(Arc::ptr_eq(&post, &pi));
        let msg = engine.compute_pi_message(&pi, &[None, Some(lambda.clone())]).unwrap();
        assert!(Arc::ptr_eq(&msg, &pi));
        let l = engine.compute_lambda(&[lambda.clone(), lambda]).unwrap();
        assert_eq!(l.kind(), Kind::Noninformative);
    }

    #[test]
    fn missing_handler_is_recoverable() {
        let engine = Engine::default();
        let pi : Message = Arc::new(Discrete::univariate(vec![0.5, 0.5]).unwrap());
        let lambda : Message = Arc::new(Uniform::new(0.0, 1.0).unwrap());
        let err = engine.compute_posterior(&pi, &lambda).unwrap_err();
        assert!(err.is_edge_failure());
        match err {
            PropagationError::HandlerNotFound { exact, loose } => {
                assert_eq!(exact.to_string(), "posterior:1Discrete1Uniform");
                assert_eq!(loose.to_string(), "posterior:DiscreteUniform");
            },
            other => panic!("Unexpected error {}", other)
        }
    }

    #[test]
    fn configured_fit_settings_reach_handlers() {
        let mut config = Config::default();
        config.fit = crate::fit::FitParams { max_iterations : 1, tolerance : 0.0 };
        let pi : Message = Arc::new(Uniform::new(-3.0, 3.0).unwrap());
        let lambda = gaussian(2.0, 1.0);
        let short = Engine::from_config(&config).compute_posterior(&pi, &lambda).unwrap();
        let long = Engine::default().compute_posterior(&pi, &lambda).unwrap();
        let (a, b) = (
            short.as_any().downcast_ref::<Mixture>().unwrap(),
            long.as_any().downcast_ref::<Mixture>().unwrap()
        );
        let gap = a.proportions().iter()
            .zip(b.proportions().iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        assert!(a.ncomponents() != b.ncomponents() || gap > 1e-6);
    }

}
