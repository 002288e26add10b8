use thiserror::Error;
use crate::prob::Message;

/// Failure to reach or understand a variable hosted elsewhere. It is distinct
/// from a missing handler, but propagation treats both as failures of the
/// message on one edge.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {

    #[error("{host} is unreachable: {reason}")]
    Unreachable { host : String, reason : String },

    #[error("Malformed reply: {0}")]
    Protocol(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64)

}

/// Client side of a parent variable living in another process or host. The
/// network only ever asks it for pi-messages toward a named child; how the
/// request travels is up to the implementation.
pub trait RemoteVariable : Send + Sync {

    /// Dimension of the remote variable's values.
    fn ndims(&self) -> usize {
        1
    }

    /// Number of states, for discrete variables.
    fn nstates(&self) -> Option<usize> {
        None
    }

    fn pi_message(&self, child : &str) -> Result<Message, TransportError>;

}
