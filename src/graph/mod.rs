use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::{toposort, is_cyclic_undirected};
use nalgebra::DVector;
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use crate::prob::*;
use crate::inference::{Engine, PropagationError};
use crate::config::{Config, EdgeFailurePolicy};
use crate::model::{NetworkSpec, VariableSpec, TextFormat};

/// Interface to parent variables hosted elsewhere.
pub mod remote;

use remote::*;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NetworkError {

    #[error("Variable {0} already exists")]
    DuplicateVariable(String),

    #[error("Unknown variable {0}")]
    UnknownVariable(String),

    #[error("Distribution of {variable} expects {expected} parent dimensions, but its parents have {found}")]
    ParentDimension { variable : String, expected : usize, found : usize },

    #[error("Distribution of {variable} expects {expected} states for parent {parent}, which has {found:?}")]
    ParentStates { variable : String, parent : String, expected : usize, found : Option<usize> },

    #[error("Adding {0} would create a cycle; only polytrees are supported")]
    NotAPolytree(String)

}

enum Source {
    Local(Box<dyn ConditionalDistribution>),
    Remote(Box<dyn RemoteVariable>)
}

impl fmt::Debug for Source {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(d) => write!(f, "Local({})", d.kind()),
            Source::Remote(_) => write!(f, "Remote")
        }
    }

}

/// A node of the network. Messages are cached in the node that receives them:
/// pi_messages has one slot per parent, lambda_messages one slot per child,
/// in the order of the parents and children vectors.
#[derive(Debug)]
struct Variable {

    name : String,

    source : Source,

    parents : Vec<NodeIndex>,

    children : Vec<NodeIndex>,

    evidence : Option<Message>,

    pi : Option<Message>,

    lambda : Option<Message>,

    posterior : Option<Message>,

    pi_messages : Vec<Option<Message>>,

    lambda_messages : Vec<Option<Message>>

}

impl Variable {

    fn new(name : &str, source : Source, parents : Vec<NodeIndex>) -> Self {
        let n = parents.len();
        Self {
            name : name.to_string(),
            source,
            parents,
            children : Vec::new(),
            evidence : None,
            pi : None,
            lambda : None,
            posterior : None,
            pi_messages : vec![None; n],
            lambda_messages : Vec::new()
        }
    }

    fn ndims(&self) -> usize {
        match &self.source {
            Source::Local(d) => d.ndims_child(),
            Source::Remote(r) => r.ndims()
        }
    }

    fn nstates(&self) -> Option<usize> {
        match &self.source {
            Source::Local(d) => d.nstates(),
            Source::Remote(r) => r.nstates()
        }
    }

    fn invalidate(&mut self) {
        self.pi = None;
        self.lambda = None;
        self.posterior = None;
        self.pi_messages.iter_mut().for_each(|m| *m = None);
        self.lambda_messages.iter_mut().for_each(|m| *m = None);
    }

}

/// A lambda-message that could not be computed and was replaced by
/// Noninformative under EdgeFailurePolicy::Noninformative.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgeFailure {

    pub from : String,

    pub to : String,

    pub direction : String,

    pub reason : String

}

/// Summary of the posterior of one variable.
#[derive(Debug, Clone, Serialize)]
pub struct BeliefSummary {

    pub variable : String,

    pub kind : String,

    pub mean : Option<f64>,

    pub stddev : Option<f64>,

    pub support : Option<(f64, f64)>,

    pub text : String

}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedVariable {

    pub variable : String,

    pub reason : String

}

/// Outcome of BeliefNetwork::propagate.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationReport {

    pub beliefs : Vec<BeliefSummary>,

    pub failures : Vec<EdgeFailure>,

    pub unresolved : Vec<UnresolvedVariable>

}

impl PropagationReport {

    pub fn belief(&self, variable : &str) -> Option<&BeliefSummary> {
        self.beliefs.iter().find(|b| b.variable == variable)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

}

/// A belief network over a polytree of variables, each holding a conditional
/// distribution given its parents (or, for parents hosted elsewhere, a client
/// for their pi-messages). Beliefs are computed on demand by Pearl's message
/// passing: asking for the posterior of a variable pulls the pi-messages and
/// lambda-messages it depends on, computing each through the engine and
/// caching it in the receiving variable. Caches stay valid until evidence
/// changes, at which point all of them are dropped.
///
/// Queries take `&mut self` because they fill the caches. Networks are Send,
/// so they can be moved to a worker thread or put behind a lock.
#[derive(Debug)]
pub struct BeliefNetwork {

    name : String,

    graph : DiGraph<Variable, ()>,

    index : HashMap<String, NodeIndex>,

    engine : Engine,

    config : Config,

    failures : Vec<EdgeFailure>

}

impl BeliefNetwork {

    pub fn new(name : &str) -> Self {
        Self::with_config(name, Config::default())
    }

    /// Network whose handlers and edge policy both follow the configuration.
    pub fn with_config(name : &str, config : Config) -> Self {
        Self::with_engine(name, Engine::from_config(&config), config)
    }

    pub fn with_engine(name : &str, engine : Engine, config : Config) -> Self {
        Self {
            name : name.to_string(),
            graph : DiGraph::new(),
            index : HashMap::new(),
            engine,
            config,
            failures : Vec::new()
        }
    }

    /// Builds a network from its description. Variables may be listed in any
    /// order.
    pub fn from_spec(spec : NetworkSpec, engine : Engine, config : Config) -> Result<Self, NetworkError> {
        let mut bn = Self::with_engine(&spec.name, engine, config);
        let declared : Vec<String> = spec.variables.iter().map(|v| v.name.clone()).collect();
        let mut pending = spec.variables;
        while !pending.is_empty() {
            let (ready, rest) : (Vec<VariableSpec>, Vec<VariableSpec>) = pending.into_iter()
                .partition(|v| v.parents.iter().all(|p| bn.index.contains_key(p)));
            if ready.is_empty() {
                for v in rest.iter() {
                    if let Some(p) = v.parents.iter().find(|p| !declared.contains(*p)) {
                        return Err(NetworkError::UnknownVariable(p.clone()));
                    }
                }
                let first = rest.first().map(|v| v.name.clone()).unwrap_or_default();
                return Err(NetworkError::NotAPolytree(first));
            }
            for v in ready {
                let parents : Vec<&str> = v.parents.iter().map(|p| &p[..]).collect();
                bn.add_variable(&v.name, v.distribution, &parents)?;
            }
            pending = rest;
        }
        Ok(bn)
    }

    /// Description of the locally hosted variables.
    pub fn to_spec(&self) -> NetworkSpec {
        let order = toposort(&self.graph, None).unwrap_or_default();
        let variables = order.iter()
            .filter_map(|ix| {
                let v = &self.graph[*ix];
                match &v.source {
                    Source::Local(d) => Some(VariableSpec {
                        name : v.name.clone(),
                        parents : v.parents.iter().map(|p| self.graph[*p].name.clone()).collect(),
                        distribution : d.clone_conditional()
                    }),
                    Source::Remote(_) => None
                }
            })
            .collect();
        NetworkSpec { name : self.name.clone(), variables }
    }

    pub fn to_text(&self) -> String {
        self.to_spec().to_text()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(move |ix| &self.graph[ix].name[..])
    }

    pub fn parents(&self, name : &str) -> Result<Vec<&str>, PropagationError> {
        let ix = self.node(name)?;
        Ok(self.graph[ix].parents.iter().map(|p| &self.graph[*p].name[..]).collect())
    }

    pub fn children(&self, name : &str) -> Result<Vec<&str>, PropagationError> {
        let ix = self.node(name)?;
        Ok(self.graph[ix].children.iter().map(|c| &self.graph[*c].name[..]).collect())
    }

    pub fn distribution(&self, name : &str) -> Result<&dyn ConditionalDistribution, PropagationError> {
        let ix = self.node(name)?;
        match &self.graph[ix].source {
            Source::Local(d) => Ok(&**d),
            Source::Remote(_) => Err(PropagationError::Remote(name.to_string()))
        }
    }

    /// Lambda-messages replaced by Noninformative since evidence last changed.
    pub fn failures(&self) -> &[EdgeFailure] {
        &self.failures
    }

    pub fn add_variable(
        &mut self,
        name : &str,
        distribution : Box<dyn ConditionalDistribution>,
        parents : &[&str]
    ) -> Result<(), NetworkError> {
        let parent_ixs = self.check_new(name, parents)?;
        let found : usize = parent_ixs.iter().map(|p| self.graph[*p].ndims()).sum();
        if found != distribution.ndims_parent() {
            return Err(NetworkError::ParentDimension {
                variable : name.to_string(),
                expected : distribution.ndims_parent(),
                found
            });
        }
        if let Some(cd) = distribution.as_any().downcast_ref::<ConditionalDiscrete>() {
            for (p, n) in parent_ixs.iter().zip(cd.parent_dims().iter()) {
                let states = self.graph[*p].nstates();
                if states != Some(*n) {
                    return Err(NetworkError::ParentStates {
                        variable : name.to_string(),
                        parent : self.graph[*p].name.clone(),
                        expected : *n,
                        found : states
                    });
                }
            }
        }
        self.insert(name, Source::Local(distribution), parent_ixs)
    }

    /// Adds a parent variable hosted elsewhere. Remote variables have no parents
    /// in this network; their pi-messages are requested from the client.
    pub fn add_remote_variable(&mut self, name : &str, remote : Box<dyn RemoteVariable>) -> Result<(), NetworkError> {
        let parent_ixs = self.check_new(name, &[])?;
        self.insert(name, Source::Remote(remote), parent_ixs)
    }

    fn check_new(&self, name : &str, parents : &[&str]) -> Result<Vec<NodeIndex>, NetworkError> {
        if self.index.contains_key(name) {
            return Err(NetworkError::DuplicateVariable(name.to_string()));
        }
        let mut ixs = Vec::with_capacity(parents.len());
        for p in parents.iter() {
            let ix = self.index.get(*p).ok_or_else(|| NetworkError::UnknownVariable(p.to_string()))?;
            if ixs.contains(ix) {
                return Err(NetworkError::NotAPolytree(name.to_string()));
            }
            ixs.push(*ix);
        }
        Ok(ixs)
    }

    fn insert(&mut self, name : &str, source : Source, parents : Vec<NodeIndex>) -> Result<(), NetworkError> {
        let ix = self.graph.add_node(Variable::new(name, source, parents.clone()));
        for p in parents.iter() {
            self.graph.add_edge(*p, ix, ());
        }
        if is_cyclic_undirected(&self.graph) {
            // The new node is the last one, so removing it leaves other indices intact.
            self.graph.remove_node(ix);
            return Err(NetworkError::NotAPolytree(name.to_string()));
        }
        for p in parents.iter() {
            let parent = &mut self.graph[*p];
            parent.children.push(ix);
            parent.lambda_messages.push(None);
        }
        self.index.insert(name.to_string(), ix);
        self.invalidate();
        debug!(variable = name, nparents = parents.len(), "Added variable");
        Ok(())
    }

    fn node(&self, name : &str) -> Result<NodeIndex, PropagationError> {
        self.index.get(name).cloned().ok_or_else(|| PropagationError::UnknownVariable(name.to_string()))
    }

    fn invalidate(&mut self) {
        for ix in self.graph.node_indices().collect::<Vec<_>>() {
            self.graph[ix].invalidate();
        }
        self.failures.clear();
    }

    /// Observes a variable. Discrete variables take a state index; continuous
    /// ones a real value. Every cached message is dropped.
    pub fn assign_evidence(&mut self, name : &str, value : f64) -> Result<(), PropagationError> {
        let ix = self.node(name)?;
        let var = &self.graph[ix];
        if let Source::Remote(_) = var.source {
            return Err(PropagationError::Remote(name.to_string()));
        }
        let invalid = |reason : String| PropagationError::InvalidEvidence { variable : name.to_string(), value, reason };
        let delta : Message = match var.nstates() {
            Some(n) => {
                if value.fract() != 0.0 || value < 0.0 || value >= n as f64 {
                    return Err(invalid(format!("expected a state index below {}", n)));
                }
                Arc::new(DiscreteDelta::state(n, value as usize).map_err(|e| invalid(e.to_string()))?)
            },
            None => {
                if var.ndims() != 1 {
                    return Err(invalid(format!("variable has {} dimensions", var.ndims())));
                }
                Arc::new(GaussianDelta::new(value).map_err(|e| invalid(e.to_string()))?)
            }
        };
        debug!(variable = name, value, "Assigned evidence");
        self.invalidate();
        self.graph[ix].evidence = Some(delta);
        Ok(())
    }

    pub fn clear_evidence(&mut self, name : &str) -> Result<(), PropagationError> {
        let ix = self.node(name)?;
        if self.graph[ix].evidence.is_some() {
            self.invalidate();
            self.graph[ix].evidence = None;
        }
        Ok(())
    }

    pub fn clear_all_evidence(&mut self) {
        self.invalidate();
        for ix in self.graph.node_indices().collect::<Vec<_>>() {
            self.graph[ix].evidence = None;
        }
    }

    pub fn evidence(&self, name : &str) -> Result<Option<Message>, PropagationError> {
        Ok(self.graph[self.node(name)?].evidence.clone())
    }

    pub fn pi(&mut self, name : &str) -> Result<Message, PropagationError> {
        let ix = self.node(name)?;
        self.ensure_pi(ix)
    }

    pub fn lambda(&mut self, name : &str) -> Result<Message, PropagationError> {
        let ix = self.node(name)?;
        self.ensure_lambda(ix)
    }

    pub fn posterior(&mut self, name : &str) -> Result<Message, PropagationError> {
        let ix = self.node(name)?;
        self.ensure_posterior(ix)
    }

    /// Message from parent to child.
    pub fn pi_message(&mut self, parent : &str, child : &str) -> Result<Message, PropagationError> {
        let (p, c) = (self.node(parent)?, self.node(child)?);
        let pos = self.graph[c].parents.iter().position(|ix| *ix == p)
            .ok_or_else(|| PropagationError::NotAParent(parent.to_string(), child.to_string()))?;
        self.ensure_pi_message(c, pos)
    }

    /// Message from child to parent.
    pub fn lambda_message(&mut self, parent : &str, child : &str) -> Result<Message, PropagationError> {
        let (p, c) = (self.node(parent)?, self.node(child)?);
        let pos = self.graph[p].children.iter().position(|ix| *ix == c)
            .ok_or_else(|| PropagationError::NotAParent(parent.to_string(), child.to_string()))?;
        self.ensure_lambda_message(p, pos)
    }

    fn ensure_pi(&mut self, ix : NodeIndex) -> Result<Message, PropagationError> {
        let var = &self.graph[ix];
        if let Some(e) = &var.evidence {
            return Ok(e.clone());
        }
        if let Some(pi) = &var.pi {
            return Ok(pi.clone());
        }
        if let Source::Remote(_) = var.source {
            return Err(PropagationError::Remote(var.name.clone()));
        }
        let nparents = var.parents.len();
        let mut pis = Vec::with_capacity(nparents);
        for pos in 0..nparents {
            pis.push(self.ensure_pi_message(ix, pos)?);
        }
        let var = &self.graph[ix];
        let pi = match &var.source {
            Source::Local(d) => self.engine.compute_pi(&**d, &pis)?,
            Source::Remote(_) => return Err(PropagationError::Remote(var.name.clone()))
        };
        debug!(variable = %var.name, kind = %pi.kind(), "Computed pi");
        self.graph[ix].pi = Some(pi.clone());
        Ok(pi)
    }

    fn ensure_lambda(&mut self, ix : NodeIndex) -> Result<Message, PropagationError> {
        let var = &self.graph[ix];
        if let Some(e) = &var.evidence {
            return Ok(e.clone());
        }
        if let Some(lambda) = &var.lambda {
            return Ok(lambda.clone());
        }
        let nchildren = var.children.len();
        let mut lambdas = Vec::with_capacity(nchildren);
        for pos in 0..nchildren {
            lambdas.push(self.ensure_lambda_message(ix, pos)?);
        }
        let lambda = self.engine.compute_lambda(&lambdas)?;
        debug!(variable = %self.graph[ix].name, kind = %lambda.kind(), "Computed lambda");
        self.graph[ix].lambda = Some(lambda.clone());
        Ok(lambda)
    }

    fn ensure_posterior(&mut self, ix : NodeIndex) -> Result<Message, PropagationError> {
        let var = &self.graph[ix];
        if let Some(e) = &var.evidence {
            return Ok(e.clone());
        }
        if let Some(post) = &var.posterior {
            return Ok(post.clone());
        }
        let pi = self.ensure_pi(ix)?;
        let lambda = self.ensure_lambda(ix)?;
        let post = self.engine.compute_posterior(&pi, &lambda)?;
        self.graph[ix].posterior = Some(post.clone());
        Ok(post)
    }

    /// Pi-message into child from its parent at position pos.
    fn ensure_pi_message(&mut self, child : NodeIndex, pos : usize) -> Result<Message, PropagationError> {
        if let Some(m) = &self.graph[child].pi_messages[pos] {
            return Ok(m.clone());
        }
        let parent = self.graph[child].parents[pos];
        let from = self.graph[parent].name.clone();
        let to = self.graph[child].name.clone();

        let evidence = self.graph[parent].evidence.clone();
        let reply = match &self.graph[parent].source {
            Source::Remote(r) => Some(r.pi_message(&to)),
            Source::Local(_) => None
        };
        let msg = if let Some(e) = evidence {
            e
        } else if let Some(reply) = reply {
            reply.map_err(|source| PropagationError::Transport {
                from : from.clone(),
                to : to.clone(),
                source
            })?
        } else {
            let pi = self.ensure_pi(parent)?;
            let siblings = self.graph[parent].children.clone();
            let mut lambdas = Vec::with_capacity(siblings.len());
            for (i, c) in siblings.iter().enumerate() {
                if *c == child {
                    lambdas.push(None);
                } else {
                    lambdas.push(Some(self.ensure_lambda_message(parent, i)?));
                }
            }
            self.engine.compute_pi_message(&pi, &lambdas).map_err(|e| edge_error("pi-message", &from, &to, e))?
        };
        debug!(from = %from, to = %to, kind = %msg.kind(), "Computed pi-message");
        self.graph[child].pi_messages[pos] = Some(msg.clone());
        Ok(msg)
    }

    /// Lambda-message into parent from its child at position pos.
    fn ensure_lambda_message(&mut self, parent : NodeIndex, pos : usize) -> Result<Message, PropagationError> {
        if let Some(m) = &self.graph[parent].lambda_messages[pos] {
            return Ok(m.clone());
        }
        let child = self.graph[parent].children[pos];
        let from = self.graph[child].name.clone();
        let to = self.graph[parent].name.clone();

        let lambda = self.ensure_lambda(child)?;
        let coparents = self.graph[child].parents.clone();
        let mut pis = Vec::with_capacity(coparents.len());
        for (i, p) in coparents.iter().enumerate() {
            if *p == parent {
                pis.push(None);
            } else {
                pis.push(Some(self.ensure_pi_message(child, i)?));
            }
        }
        let computed = match &self.graph[child].source {
            Source::Local(d) => self.engine.compute_lambda_message(&**d, &lambda, &pis),
            Source::Remote(_) => Err(PropagationError::Remote(from.clone()))
        };
        let msg = match computed {
            Ok(msg) => msg,
            Err(e) if e.is_edge_failure() && self.config.propagation.edge_failure == EdgeFailurePolicy::Noninformative => {
                warn!(from = %from, to = %to, error = %e, "Lambda-message replaced by Noninformative");
                self.failures.push(EdgeFailure {
                    from : from.clone(),
                    to : to.clone(),
                    direction : String::from("lambda-message"),
                    reason : e.to_string()
                });
                Arc::new(Noninformative)
            },
            Err(e) => return Err(edge_error("lambda-message", &from, &to, e))
        };
        debug!(from = %from, to = %to, kind = %msg.kind(), "Computed lambda-message");
        self.graph[parent].lambda_messages[pos] = Some(msg.clone());
        Ok(msg)
    }

    /// Computes the posterior of every local variable, parents first. Under
    /// EdgeFailurePolicy::Fail the first failure aborts propagation; otherwise
    /// variables whose posterior cannot be computed are reported as unresolved.
    pub fn propagate(&mut self) -> Result<PropagationReport, PropagationError> {
        let order = toposort(&self.graph, None)
            .map_err(|c| PropagationError::UnknownVariable(self.graph[c.node_id()].name.clone()))?;
        let mut beliefs = Vec::new();
        let mut unresolved = Vec::new();
        for ix in order {
            if let Source::Remote(_) = self.graph[ix].source {
                continue;
            }
            let name = self.graph[ix].name.clone();
            match self.ensure_posterior(ix) {
                Ok(post) => beliefs.push(summarize(&name, &*post, self.config.support_epsilon)),
                Err(e) => {
                    if self.config.propagation.edge_failure == EdgeFailurePolicy::Fail {
                        return Err(e);
                    }
                    warn!(variable = %name, error = %e, "Posterior unresolved");
                    unresolved.push(UnresolvedVariable { variable : name, reason : e.to_string() });
                }
            }
        }
        debug!(nbeliefs = beliefs.len(), nfailures = self.failures.len(), nunresolved = unresolved.len(), "Propagated");
        Ok(PropagationReport { beliefs, failures : self.failures.clone(), unresolved })
    }

    /// Draws one joint sample by ancestral sampling from the prior (evidence is
    /// not taken into account). Remote parents are sampled from their
    /// pi-message to their first child.
    pub fn sample_joint(&self, rng : &mut dyn RngCore) -> Result<HashMap<String, DVector<f64>>, PropagationError> {
        let order = toposort(&self.graph, None)
            .map_err(|c| PropagationError::UnknownVariable(self.graph[c.node_id()].name.clone()))?;
        let mut values : HashMap<NodeIndex, DVector<f64>> = HashMap::new();
        for ix in order {
            let var = &self.graph[ix];
            let x = match &var.source {
                Source::Local(d) => {
                    let mut c = Vec::new();
                    for p in var.parents.iter() {
                        if let Some(v) = values.get(p) {
                            c.extend(v.iter().cloned());
                        }
                    }
                    d.sample_given(&DVector::from_vec(c), rng)?
                },
                Source::Remote(r) => {
                    let child = var.children.first()
                        .map(|c| self.graph[*c].name.clone())
                        .ok_or_else(|| PropagationError::Remote(var.name.clone()))?;
                    let msg = r.pi_message(&child).map_err(|source| PropagationError::Transport {
                        from : var.name.clone(),
                        to : child.clone(),
                        source
                    })?;
                    msg.sample(rng)?
                }
            };
            values.insert(ix, x);
        }
        Ok(values.into_iter().map(|(ix, v)| (self.graph[ix].name.clone(), v)).collect())
    }

}

fn edge_error(direction : &'static str, from : &str, to : &str, e : PropagationError) -> PropagationError {
    if e.is_edge_failure() {
        if let PropagationError::Edge { .. } = e {
            return e;
        }
        PropagationError::Edge { direction, from : from.to_string(), to : to.to_string(), source : Box::new(e) }
    } else {
        e
    }
}

fn summarize(name : &str, d : &dyn Distribution, epsilon : f64) -> BeliefSummary {
    BeliefSummary {
        variable : name.to_string(),
        kind : d.kind().to_string(),
        mean : d.expected_value().ok(),
        stddev : d.sqrt_variance().ok(),
        support : d.effective_support(epsilon).ok(),
        text : d.to_text("")
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn chain() -> BeliefNetwork {
        let mut bn = BeliefNetwork::new("chain");
        bn.add_variable("x", Box::new(Gaussian::new(0.0, 1.0).unwrap()), &[]).unwrap();
        bn.add_variable("y", Box::new(ConditionalGaussian::single(2.0, 1.0, 1.0).unwrap()), &["x"]).unwrap();
        bn
    }

    #[test]
    fn structure_is_validated() {
        let mut bn = chain();
        assert_eq!(
            bn.add_variable("y", Box::new(Gaussian::new(0.0, 1.0).unwrap()), &[]),
            Err(NetworkError::DuplicateVariable(String::from("y")))
        );
        assert!(matches!(
            bn.add_variable("z", Box::new(ConditionalGaussian::single(1.0, 0.0, 1.0).unwrap()), &["w"]),
            Err(NetworkError::UnknownVariable(_))
        ));
        assert!(matches!(
            bn.add_variable("z", Box::new(Gaussian::new(0.0, 1.0).unwrap()), &["y"]),
            Err(NetworkError::ParentDimension { .. })
        ));
        let two = ConditionalGaussian::new(DVector::from_vec(vec![1.0, 1.0]), 0.0, 1.0).unwrap();
        assert_eq!(
            bn.add_variable("z", Box::new(two), &["x", "y"]),
            Err(NetworkError::NotAPolytree(String::from("z")))
        );
        assert_eq!(bn.variables().count(), 2);
        assert!(bn.children("x").unwrap() == vec!["y"]);
    }

    #[test]
    fn evidence_replaces_beliefs_and_caches() {
        let mut bn = chain();
        let before = bn.posterior("x").unwrap();
        assert!((before.sqrt_variance().unwrap() - 1.0).abs() < 1e-12);
        bn.assign_evidence("y", 3.0).unwrap();
        let after = bn.posterior("x").unwrap();
        // x | y = 3 with y = 2x + 1 + e, var(e) = 1: precision 1 + 4, mean 2 * 2 / 5.
        assert!((after.expected_value().unwrap() - 0.8).abs() < 1e-12);
        assert!((after.sqrt_variance().unwrap() - 0.2f64.sqrt()).abs() < 1e-12);
        assert_eq!(bn.posterior("y").unwrap().kind(), Kind::GaussianDelta);
        bn.clear_evidence("y").unwrap();
        assert!((bn.posterior("x").unwrap().expected_value().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn discrete_evidence_must_be_a_state() {
        let mut bn = BeliefNetwork::new("coin");
        bn.add_variable("c", Box::new(Discrete::univariate(vec![0.5, 0.5]).unwrap()), &[]).unwrap();
        assert!(matches!(bn.assign_evidence("c", 2.0), Err(PropagationError::InvalidEvidence { .. })));
        assert!(matches!(bn.assign_evidence("c", 0.5), Err(PropagationError::InvalidEvidence { .. })));
        bn.assign_evidence("c", 1.0).unwrap();
        assert_eq!(bn.posterior("c").unwrap().kind(), Kind::DiscreteDelta);
    }

    #[test]
    fn spec_round_trip_preserves_structure() {
        let bn = chain();
        let spec = NetworkSpec::parse(&bn.to_text()).unwrap();
        let again = BeliefNetwork::from_spec(spec, Engine::default(), Config::default()).unwrap();
        assert_eq!(again.parents("y").unwrap(), vec!["x"]);
        assert_eq!(again.name(), "chain");
    }

}
