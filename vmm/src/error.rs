//! Error taxonomy for the manager's host boundary.
//!
//! Per spec, recoverable page pressure (no Free, no Standby) is not an
//! error: it is surfaced as [`crate::fault::FaultOutcome::Redo`] and retried
//! by the caller. Only host-primitive failures and configuration mistakes
//! are modeled here; invariant violations elsewhere in the manager panic
//! directly rather than flowing through this type, since there is no
//! meaningful recovery from a torn PTE.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("host physical frame allocator failed: {reason}")]
    FrameAllocationFailed { reason: String },

    #[error("invalid manager configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, VmError>;
