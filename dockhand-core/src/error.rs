//! Error types for the core domain

use thiserror::Error;

use crate::domain::container::ContainerPhase;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by domain logic that does no I/O
#[derive(Debug, Error)]
pub enum CoreError {
    /// Registry credential could not be encoded or decoded
    #[error("registry auth codec failed: {0}")]
    Auth(String),

    /// Image reference is not usable
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidImageRef { reference: String, reason: String },

    /// Container lifecycle transition that the state machine forbids
    #[error("container cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: ContainerPhase,
        to: ContainerPhase,
    },
}
