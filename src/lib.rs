//! Belief propagation over polytree-structured belief networks with mixed
//! discrete and continuous variables, following Pearl's pi/lambda message
//! passing. The computation of each message is delegated to a handler chosen
//! at runtime from the concrete distribution types of its inputs, so new
//! families of distributions are supported by registering handlers for them.
//!
//! ```
//! use belief::prob::*;
//! use belief::graph::BeliefNetwork;
//!
//! let mut bn = BeliefNetwork::new("chain");
//! bn.add_variable("x", Box::new(Gaussian::new(0.0, 1.0).unwrap()), &[]).unwrap();
//! bn.add_variable("y", Box::new(ConditionalGaussian::single(1.0, 0.0, 1.0).unwrap()), &["x"]).unwrap();
//! bn.assign_evidence("y", 2.0).unwrap();
//! let x = bn.posterior("x").unwrap();
//! assert!((x.expected_value().unwrap() - 1.0).abs() < 1e-12);
//! ```

/// Distribution traits, type tags and the leaf distributions (Gaussian, point
/// masses, discrete tables, uniform, noninformative, mixtures and the
/// linear-Gaussian and tabular conditionals).
pub mod prob;

/// Estimation of distribution parameters from (weighted) data, including
/// expectation maximization for mixtures.
pub mod fit;

/// Text representation of distributions and belief networks.
pub mod model;

/// Registry of message-passing handlers and the resolver that selects them
/// from the types of their inputs.
pub mod dispatch;

/// Engine computing pi, lambda, pi-messages, lambda-messages and posteriors.
pub mod inference;

/// Belief networks: structure, evidence and propagation.
pub mod graph;

/// Runtime settings.
pub mod config;
