//! Container domain types
//!
//! A verification container moves through a fixed lifecycle:
//!
//! ```text
//! Created -> Started -> Inspected -> Passed | Failed -> Removed
//! ```
//!
//! `Removed` can be reached from any phase before it so cleanup always
//! happens, even when start or inspection fails.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Prefix of every container name created by the pipeline
pub const CONTAINER_NAME_PREFIX: &str = "dockhand-test";

/// Lifecycle phase of a verification container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerPhase {
    Created,
    Started,
    Inspected,
    Passed,
    Failed,
    Removed,
}

impl ContainerPhase {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: ContainerPhase) -> bool {
        use ContainerPhase::*;
        match (self, next) {
            (Removed, _) => false,
            (_, Removed) => true,
            (Created, Started) => true,
            (Started, Inspected) => true,
            (Inspected, Passed) | (Inspected, Failed) => true,
            _ => false,
        }
    }
}

/// One container created during verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub id: String,
    pub name: String,
    phase: ContainerPhase,
    pub exit_code: Option<i64>,
}

impl ContainerInstance {
    /// Tracks a container the engine just created
    pub fn created(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phase: ContainerPhase::Created,
            exit_code: None,
        }
    }

    pub fn phase(&self) -> ContainerPhase {
        self.phase
    }

    /// Moves to the next phase, rejecting skipped or backwards transitions
    pub fn advance(&mut self, next: ContainerPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Short form of the identifier for display
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }
}

/// Generates a container name that embeds the label and is unique per run
pub fn container_name(label: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", CONTAINER_NAME_PREFIX, label, &suffix[..8])
}

/// Container state as observed by an inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Engine status string ("created", "running", "exited", ...)
    pub status: String,
    pub running: bool,
    pub exit_code: i64,
    /// Error reported by the engine, empty when none
    pub error: String,
}

impl ContainerState {
    /// Renders the pass/fail verdict for this state
    ///
    /// Only an exited container with exit code 0 and no engine error passes.
    pub fn verdict(&self) -> Verdict {
        if self.running {
            return Verdict::Failed(FailureReason::StillRunning);
        }
        if !self.error.is_empty() {
            return Verdict::Failed(FailureReason::EngineError(self.error.clone()));
        }
        if self.exit_code != 0 {
            return Verdict::Failed(FailureReason::NonZeroExit(self.exit_code));
        }
        if self.status != "exited" {
            return Verdict::Failed(FailureReason::UnexpectedStatus(self.status.clone()));
        }
        Verdict::Passed
    }
}

/// Outcome of the in-container test
///
/// A failed verdict is pipeline data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Passed,
    Failed(FailureReason),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    /// Phase the container enters for this verdict
    pub fn phase(&self) -> ContainerPhase {
        match self {
            Verdict::Passed => ContainerPhase::Passed,
            Verdict::Failed(_) => ContainerPhase::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    NonZeroExit(i64),
    StillRunning,
    EngineError(String),
    UnexpectedStatus(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NonZeroExit(code) => write!(f, "exit code {} (must be 0)", code),
            FailureReason::StillRunning => f.write_str("container still running after test window"),
            FailureReason::EngineError(e) => write!(f, "engine reported error: {}", e),
            FailureReason::UnexpectedStatus(s) => write!(f, "unexpected container status '{}'", s),
        }
    }
}
