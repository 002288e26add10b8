use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use tracing::trace;
use crate::prob::*;
use crate::inference::PropagationError;
use crate::fit::FitParams;
use crate::config::SUPPORT_EPSILON;

/// Handlers for degenerate inputs (no parents, nothing informative from
/// children) and the identity handler for a single lambda input.
pub mod trivial;

/// Predictive (pi) handlers: marginalize a conditional over its parents' pi-messages.
pub mod pi;

/// Diagnostic (lambda) handlers: combine lambda-messages from children.
pub mod lambda;

pub mod pi_message;

pub mod lambda_message;

/// Posterior handlers: normalized product of pi and lambda.
pub mod posterior;

/// Gaussian-mixture approximation of products that have no closed form.
pub mod approximation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Posterior,
    Pi,
    Lambda,
    PiMessage,
    LambdaMessage
}

impl Operation {

    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Posterior => "posterior",
            Operation::Pi => "pi",
            Operation::Lambda => "lambda",
            Operation::PiMessage => "pi-message",
            Operation::LambdaMessage => "lambda-message"
        }
    }

}

/// A maximal run of consecutive inputs of the same concrete type. The count is
/// absent in keys built without counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Run {

    pub kind : Kind,

    pub count : Option<usize>

}

/// Lookup key of a handler: the operation plus the run-length encoded sequence
/// of input types, in role order (e.g. conditional, lambda, pi-messages for a
/// lambda-message). Every input tuple maps to two keys: one with the exact run
/// counts, which selects handlers registered for a specific arity, and one
/// without counts, which selects handlers accepting any number of repetitions
/// in each run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {

    pub op : Operation,

    pub runs : Vec<Run>

}

impl HandlerKey {

    pub fn with_counts<I>(op : Operation, kinds : I) -> Self
    where
        I : IntoIterator<Item = Kind>
    {
        Self::encode(op, kinds, true)
    }

    pub fn without_counts<I>(op : Operation, kinds : I) -> Self
    where
        I : IntoIterator<Item = Kind>
    {
        Self::encode(op, kinds, false)
    }

    fn encode<I>(op : Operation, kinds : I, counts : bool) -> Self
    where
        I : IntoIterator<Item = Kind>
    {
        let mut runs : Vec<(Kind, usize)> = Vec::new();
        for k in kinds {
            match runs.last_mut() {
                Some(run) if run.0 == k => {
                    run.1 += 1;
                    continue;
                },
                _ => { }
            }
            runs.push((k, 1));
        }
        let runs = runs.into_iter()
            .map(|(kind, n)| Run { kind, count : if counts { Some(n) } else { None } })
            .collect();
        Self { op, runs }
    }

    /// Input types a key stands for, taking one repetition for runs without a count.
    pub fn representative(&self) -> Vec<Kind> {
        self.runs.iter()
            .flat_map(|r| std::iter::repeat(r.kind).take(r.count.unwrap_or(1)))
            .collect()
    }

}

impl Display for HandlerKey {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.op.tag())?;
        for r in self.runs.iter() {
            match r.count {
                Some(n) => write!(f, "{}{}", n, r.kind)?,
                None => write!(f, "{}", r.kind)?
            }
        }
        Ok(())
    }

}

/// Element of an acceptance descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accepts {
    Kind(Kind),
    AnyDistribution,
    AnyConditional,
    AnyGaussian,
    AnyDiscrete,
    AnyContinuous
}

impl Accepts {

    pub fn admits(&self, k : Kind) -> bool {
        match self {
            Accepts::Kind(a) => *a == k,
            Accepts::AnyDistribution => !k.is_conditional(),
            Accepts::AnyConditional => true,
            Accepts::AnyGaussian => k == Kind::Gaussian || k == Kind::GaussianDelta,
            Accepts::AnyDiscrete => k == Kind::Discrete || k == Kind::DiscreteDelta,
            Accepts::AnyContinuous => k == Kind::Gaussian || k == Kind::Uniform || k == Kind::Mixture
        }
    }

    /// Built-in kinds admitted, used to check family registrations.
    pub fn examples(&self) -> Vec<Kind> {
        let all = [
            Kind::Noninformative,
            Kind::Gaussian,
            Kind::GaussianDelta,
            Kind::Discrete,
            Kind::DiscreteDelta,
            Kind::Uniform,
            Kind::Mixture,
            Kind::ConditionalGaussian,
            Kind::ConditionalDiscrete
        ];
        match self {
            Accepts::Kind(k) => vec![*k],
            other => all.iter().cloned().filter(|k| other.admits(*k)).collect()
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exactly(usize),
    ZeroOrMore
}

/// Ordered (type, arity) pairs describing the inputs a handler accepts. It is
/// advisory: resolution never consults it, but Registry::validate uses it to
/// catch handlers registered under keys they cannot process.
pub type Description = Vec<(Accepts, Arity)>;

/// Whether the sequence of input types satisfies the descriptor.
pub fn matches(description : &[(Accepts, Arity)], kinds : &[Kind]) -> bool {
    match description.split_first() {
        None => kinds.is_empty(),
        Some(((accepts, Arity::Exactly(n)), rest)) => {
            kinds.len() >= *n
                && kinds[..*n].iter().all(|k| accepts.admits(*k))
                && matches(rest, &kinds[*n..])
        },
        Some(((accepts, Arity::ZeroOrMore), rest)) => {
            let longest = kinds.iter().take_while(|k| accepts.admits(**k)).count();
            (0..=longest).rev().any(|n| matches(rest, &kinds[n..]))
        }
    }
}

pub trait PiHandler : Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> Description;

    fn compute_pi(&self, cond : &dyn ConditionalDistribution, pi_messages : &[Message]) -> Result<Message, PropagationError>;

}

pub trait LambdaHandler : Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> Description;

    fn compute_lambda(&self, lambda_messages : &[Message]) -> Result<Message, PropagationError>;

}

/// The slot of lambda_messages belonging to the recipient child is None.
pub trait PiMessageHandler : Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> Description;

    fn compute_pi_message(
        &self,
        registry : &Registry,
        pi : &Message,
        lambda_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError>;

}

/// The slot of pi_messages belonging to the recipient parent is None.
pub trait LambdaMessageHandler : Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> Description;

    fn compute_lambda_message(
        &self,
        cond : &dyn ConditionalDistribution,
        lambda : &Message,
        pi_messages : &[Option<Message>]
    ) -> Result<Message, PropagationError>;

}

pub trait PosteriorHandler : Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> Description;

    fn compute_posterior(&self, pi : &Message, lambda : &Message) -> Result<Message, PropagationError>;

}

/// Registration holding for a fixed prefix of kinds followed by one or more
/// inputs of any kind the members admit, in any order and number.
pub struct Family<H : ?Sized> {

    pub prefix : Vec<Kind>,

    pub members : Accepts,

    handler : Arc<H>

}

impl<H : ?Sized> Family<H> {

    pub fn admits(&self, kinds : &[Kind]) -> bool {
        kinds.len() > self.prefix.len()
            && kinds.starts_with(&self.prefix)
            && kinds[self.prefix.len()..].iter().all(|k| self.members.admits(*k))
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

}

/// Handlers of one operation, keyed by HandlerKey, plus family registrations
/// consulted when neither key of an input sequence is registered.
pub struct Table<H : ?Sized> {
    op : Operation,
    entries : HashMap<HandlerKey, Arc<H>>,
    families : Vec<Family<H>>
}

impl<H : ?Sized> Table<H> {

    fn new(op : Operation) -> Self {
        Self { op, entries : HashMap::new(), families : Vec::new() }
    }

    /// Registers a handler for any number of repetitions within each run of
    /// kinds (consecutive equal kinds collapse into one run).
    pub fn register(&mut self, kinds : &[Kind], handler : Arc<H>) {
        self.entries.insert(HandlerKey::without_counts(self.op, kinds.iter().cloned()), handler);
    }

    /// Registers a handler for exactly this sequence of kinds.
    pub fn register_exact(&mut self, kinds : &[Kind], handler : Arc<H>) {
        self.entries.insert(HandlerKey::with_counts(self.op, kinds.iter().cloned()), handler);
    }

    /// Registers a handler for the prefix followed by any non-empty sequence of
    /// admitted kinds. Families are tried in registration order, after both keys.
    pub fn register_family(&mut self, prefix : &[Kind], members : Accepts, handler : Arc<H>) {
        self.families.push(Family { prefix : prefix.to_vec(), members, handler });
    }

    pub fn families(&self) -> impl Iterator<Item = &Family<H>> {
        self.families.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &HandlerKey> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&HandlerKey, &Arc<H>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.families.is_empty()
    }

    /// Key with counts first, then the key without counts, then the families.
    pub fn lookup(&self, kinds : &[Kind]) -> Result<Arc<H>, PropagationError> {
        let exact = HandlerKey::with_counts(self.op, kinds.iter().cloned());
        if let Some(h) = self.entries.get(&exact) {
            trace!(key = %exact, "Resolved handler");
            return Ok(h.clone());
        }
        let loose = HandlerKey::without_counts(self.op, kinds.iter().cloned());
        match self.entries.get(&loose) {
            Some(h) => {
                trace!(key = %loose, "Resolved handler without counts");
                Ok(h.clone())
            },
            None => match self.families.iter().find(|f| f.admits(kinds)) {
                Some(f) => {
                    trace!(key = %loose, members = ?f.members, "Resolved handler by family");
                    Ok(f.handler.clone())
                },
                None => Err(PropagationError::HandlerNotFound { exact, loose })
            }
        }
    }

}

fn informative<'a, I>(messages : I) -> impl Iterator<Item = &'a Message>
where
    I : IntoIterator<Item = &'a Message>
{
    messages.into_iter().filter(|m| m.kind() != Kind::Noninformative)
}

/// Registry of message-passing handlers and resolver from concrete input
/// types to the handler computing an operation over them.
///
/// Resolution first checks the degenerate cases, which never depend on the
/// registry contents: a variable without parents takes its own distribution as
/// pi; lambda inputs that are all Noninformative select trivial handlers for
/// lambda, pi-messages, lambda-messages and posteriors; a single informative
/// lambda input is passed through unchanged. Otherwise the concrete types of the
/// inputs, in role order and skipping absent entries, are looked up under the
/// key with run counts, then under the key without counts, then against the
/// family registrations of the operation. A miss is reported
/// as PropagationError::HandlerNotFound, which callers treat as a failure of the
/// message on that edge only.
///
/// New distribution types and handlers are added by registering them; nothing
/// in the resolver or the engine changes.
pub struct Registry {

    pub pi : Table<dyn PiHandler>,

    pub lambda : Table<dyn LambdaHandler>,

    pub pi_message : Table<dyn PiMessageHandler>,

    pub lambda_message : Table<dyn LambdaMessageHandler>,

    pub posterior : Table<dyn PosteriorHandler>

}

impl Default for Registry {

    fn default() -> Self {
        Self::with_defaults()
    }

}

impl Registry {

    pub fn empty() -> Self {
        Self {
            pi : Table::new(Operation::Pi),
            lambda : Table::new(Operation::Lambda),
            pi_message : Table::new(Operation::PiMessage),
            lambda_message : Table::new(Operation::LambdaMessage),
            posterior : Table::new(Operation::Posterior)
        }
    }

    /// Registry holding every handler built into the crate.
    pub fn with_defaults() -> Self {
        Self::with_settings(FitParams::default(), SUPPORT_EPSILON)
    }

    /// Built-in handlers, with the mixture approximation fitted under params
    /// over supports leaving out epsilon of each factor's mass.
    pub fn with_settings(params : FitParams, epsilon : f64) -> Self {
        let mut r = Self::empty();
        pi::register(&mut r);
        lambda::register(&mut r);
        pi_message::register(&mut r);
        lambda_message::register(&mut r);
        posterior::register(&mut r);
        approximation::register(&mut r, approximation::MixtureApproximation::new(params, epsilon));
        r
    }

    pub fn resolve_pi(
        &self,
        cond : &dyn ConditionalDistribution,
        pi_messages : &[Message]
    ) -> Result<Arc<dyn PiHandler>, PropagationError> {
        if pi_messages.is_empty() {
            return Ok(Arc::new(trivial::OwnDistribution));
        }
        let kinds : Vec<Kind> = std::iter::once(cond.kind())
            .chain(pi_messages.iter().map(|m| m.kind()))
            .collect();
        self.pi.lookup(&kinds)
    }

    pub fn resolve_lambda(&self, lambda_messages : &[Message]) -> Result<Arc<dyn LambdaHandler>, PropagationError> {
        let kinds : Vec<Kind> = informative(lambda_messages).map(|m| m.kind()).collect();
        if kinds.is_empty() {
            return Ok(Arc::new(trivial::NoLambda));
        }
        if kinds.len() == 1 {
            return Ok(Arc::new(trivial::SoleLambda));
        }
        self.lambda.lookup(&kinds)
    }

    pub fn resolve_pi_message(
        &self,
        pi : &Message,
        lambda_messages : &[Option<Message>]
    ) -> Result<Arc<dyn PiMessageHandler>, PropagationError> {
        let lambdas : Vec<Kind> = informative(lambda_messages.iter().flatten()).map(|m| m.kind()).collect();
        if lambdas.is_empty() {
            return Ok(Arc::new(trivial::PiPassThrough));
        }
        let kinds : Vec<Kind> = std::iter::once(pi.kind()).chain(lambdas).collect();
        self.pi_message.lookup(&kinds)
    }

    pub fn resolve_lambda_message(
        &self,
        cond : &dyn ConditionalDistribution,
        lambda : &Message,
        pi_messages : &[Option<Message>]
    ) -> Result<Arc<dyn LambdaMessageHandler>, PropagationError> {
        if lambda.kind() == Kind::Noninformative {
            return Ok(Arc::new(trivial::NoLambdaMessage));
        }
        let kinds : Vec<Kind> = vec![cond.kind(), lambda.kind()].into_iter()
            .chain(pi_messages.iter().flatten().map(|m| m.kind()))
            .collect();
        self.lambda_message.lookup(&kinds)
    }

    pub fn resolve_posterior(&self, pi : &Message, lambda : &Message) -> Result<Arc<dyn PosteriorHandler>, PropagationError> {
        if lambda.kind() == Kind::Noninformative {
            return Ok(Arc::new(trivial::PiPosterior));
        }
        self.posterior.lookup(&[pi.kind(), lambda.kind()])
    }

    /// Checks every registered key against the acceptance descriptor of its
    /// handler, returning the keys whose handler would not accept the inputs the
    /// key stands for. A family is checked on its prefix followed by every pair
    /// of admitted built-in kinds.
    pub fn validate(&self) -> Vec<HandlerKey> {
        fn check<'a, H : ?Sized + 'a>(
            table : &'a Table<H>,
            describe : impl Fn(&H) -> Description,
            out : &mut Vec<HandlerKey>
        ) {
            for (key, handler) in table.entries() {
                if !matches(&describe(handler), &key.representative()) {
                    out.push(key.clone());
                }
            }
            for f in table.families() {
                let members = f.members.examples();
                for a in members.iter() {
                    for b in members.iter() {
                        let kinds : Vec<Kind> = f.prefix.iter().cloned().chain(vec![*a, *b]).collect();
                        if !matches(&describe(&f.handler), &kinds) {
                            out.push(HandlerKey::with_counts(table.op, kinds));
                        }
                    }
                }
            }
        }
        let mut out = Vec::new();
        check(&self.pi, |h| h.description(), &mut out);
        check(&self.lambda, |h| h.description(), &mut out);
        check(&self.pi_message, |h| h.description(), &mut out);
        check(&self.lambda_message, |h| h.description(), &mut out);
        check(&self.posterior, |h| h.description(), &mut out);
        out
    }

}

/// Downcasts a message to the concrete type a handler was registered for.
pub(crate) fn expect<'a, T : 'static>(
    handler : &'static str,
    expected : &'static str,
    d : &'a dyn Distribution
) -> Result<&'a T, PropagationError> {
    d.as_any()
        .downcast_ref::<T>()
        .ok_or(PropagationError::UnexpectedInput { handler, expected, found : d.kind() })
}

pub(crate) fn expect_conditional<'a, T : 'static>(
    handler : &'static str,
    expected : &'static str,
    d : &'a dyn ConditionalDistribution
) -> Result<&'a T, PropagationError> {
    d.as_any()
        .downcast_ref::<T>()
        .ok_or(PropagationError::UnexpectedInput { handler, expected, found : d.kind() })
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn keys_run_length_encode_in_role_order() {
        let kinds = [Kind::Gaussian, Kind::Gaussian, Kind::Discrete];
        let exact = HandlerKey::with_counts(Operation::PiMessage, kinds.iter().cloned());
        let loose = HandlerKey::without_counts(Operation::PiMessage, kinds.iter().cloned());
        assert_eq!(exact.to_string(), "pi-message:2Gaussian1Discrete");
        assert_eq!(loose.to_string(), "pi-message:GaussianDiscrete");
        assert_eq!(exact.runs.len(), 2);
        let split = HandlerKey::without_counts(Operation::Pi, vec![Kind::Gaussian, Kind::Discrete, Kind::Gaussian]);
        assert_eq!(split.runs.len(), 3);
    }

    #[test]
    fn descriptors_match_with_backtracking() {
        let d = vec![
            (Accepts::Kind(Kind::ConditionalGaussian), Arity::Exactly(1)),
            (Accepts::AnyGaussian, Arity::ZeroOrMore),
            (Accepts::Kind(Kind::Gaussian), Arity::Exactly(1))
        ];
        assert!(matches(&d, &[Kind::ConditionalGaussian, Kind::GaussianDelta, Kind::Gaussian]));
        assert!(matches(&d, &[Kind::ConditionalGaussian, Kind::Gaussian]));
        assert!(!matches(&d, &[Kind::ConditionalGaussian]));
        assert!(!matches(&d, &[Kind::ConditionalGaussian, Kind::Gaussian, Kind::Discrete]));
    }

    struct Tag(&'static str);

    impl PosteriorHandler for Tag {

        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> Description {
            vec![(Accepts::AnyDistribution, Arity::ZeroOrMore)]
        }

        fn compute_posterior(&self, pi : &Message, _lambda : &Message) -> Result<Message, PropagationError> {
            Ok(pi.clone())
        }

    }

    #[test]
    fn families_hold_for_any_alternation() {
        let mut t : Table<dyn PosteriorHandler> = Table::new(Operation::Posterior);
        t.register(&[Kind::Gaussian], Arc::new(Tag("keyed")));
        t.register_family(&[Kind::ConditionalGaussian], Accepts::AnyGaussian, Arc::new(Tag("family")));
        let mut kinds = vec![Kind::ConditionalGaussian];
        for i in 0..9 {
            kinds.push(if i % 2 == 0 { Kind::Gaussian } else { Kind::GaussianDelta });
        }
        assert_eq!(t.lookup(&kinds).unwrap().name(), "family");
        assert_eq!(t.lookup(&[Kind::Gaussian, Kind::Gaussian]).unwrap().name(), "keyed");
        assert!(t.lookup(&[Kind::ConditionalGaussian]).is_err());
        assert!(t.lookup(&[Kind::ConditionalGaussian, Kind::Gaussian, Kind::Discrete]).is_err());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn default_registry_is_consistent() {
        let r = Registry::with_defaults();
        assert!(r.validate().is_empty(), "{:?}", r.validate());
        assert!(!r.posterior.is_empty());
    }

}
