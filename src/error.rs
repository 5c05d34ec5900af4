//! Error kinds that the simulation core can recover from locally, per the
//! "exception-based control flow → result sums" design note: none of these
//! ever unwind a connection's tick loop by themselves.

use thiserror::Error;

/// A fault raised by a single rocket's [`crate::rocket::Rocket::step`].
/// The caller (C7) always keeps stepping the other rockets regardless.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum RocketFault {
    /// `total_mass <= 1e-6`: physics is skipped this tick, state preserved.
    #[error("degenerate total mass, physics skipped this tick")]
    Degenerate,
    /// An unrecoverable numeric fault (e.g. a NaN) was produced mid-step.
    /// The rocket is marked done with a large negative reward.
    #[error("fatal fault during integration step")]
    Fatal,
}

/// Raised when loading the policy's model/stats blobs fails. The session
/// downgrades this to `agent_enabled = false` rather than propagating it.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("model artifact not found or unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("norm stats blob has invalid length (expected {expected}, got {got})")]
    MalformedStats { expected: usize, got: usize },
}

/// Raised when a policy's batched prediction call fails. C7 never
/// propagates this: the affected rockets fall back to the zero action for
/// that tick and the batch is logged once.
#[derive(Debug, Error, Clone)]
#[error("policy batch prediction failed: {0}")]
pub struct PolicyPredictError(pub String);
