//! Model identifiers and the failover invocation strategy

pub mod candidates;
pub mod failover;

pub use candidates::{ModelCandidates, ModelId};
pub use failover::{
    AttemptFailure, AttemptOutcome, CommittedStream, DEFAULT_RETRY_AFTER_SECS, FailoverInvoker,
    Invocation, InvocationError,
};
