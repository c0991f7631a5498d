//! Pipeline error taxonomy
//!
//! Every fatal outcome of a run is one of these variants. A failed container
//! test is not an error; it is carried by the verdict in the run report.

use dockhand_client::ClientError;
use dockhand_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport failure: {0}")]
    Transport(#[source] ClientError),

    #[error("Registry authentication failed: {0}")]
    Auth(#[source] ClientError),

    #[error("Cannot pull image {image}: {source}")]
    Pull {
        image: String,
        #[source]
        source: ClientError,
    },

    #[error("Image build failed: {0}")]
    Build(#[source] ClientError),

    #[error("Image push failed: {0}")]
    Push(#[source] ClientError),

    #[error("Cannot create container: {0}")]
    ContainerCreate(#[source] ClientError),

    #[error("Cannot start container: {0}")]
    ContainerStart(#[source] ClientError),

    #[error("Cannot inspect container: {0}")]
    Inspect(#[source] ClientError),

    #[error("Container lifecycle violated: {0}")]
    Lifecycle(#[from] CoreError),

    #[error("Cannot remove container {id}: {reason}")]
    Removal { id: String, reason: String },

    #[error("Label {label} is already used in cloud {cloud}")]
    LabelConflict { label: String, cloud: String },

    #[error("CI server refused to create a template for label {label}")]
    TemplateRejected { label: String },

    #[error("Cannot create CI job: {0}")]
    JobCreation(#[source] ClientError),

    #[error("Cannot trigger CI job: {0}")]
    Trigger(#[source] ClientError),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LabelConflict { .. } | Self::TemplateRejected { .. } => 1,
            Self::Config(_) => 2,
            Self::Transport(_) => 10,
            Self::Auth(_) => 11,
            Self::Pull { .. } => 12,
            Self::Build(_) => 13,
            Self::Push(_) => 14,
            Self::ContainerCreate(_)
            | Self::ContainerStart(_)
            | Self::Inspect(_)
            | Self::Lifecycle(_)
            | Self::Removal { .. } => 15,
            Self::JobCreation(_) => 16,
            Self::Trigger(_) => 17,
            Self::Cancelled => 130,
        }
    }

    /// Name of the stage that failed, for diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Transport(_) => "transport",
            Self::Auth(_) => "registry authentication",
            Self::Pull { .. } => "image pull",
            Self::Build(_) => "image build",
            Self::Push(_) => "image push",
            Self::ContainerCreate(_) => "container create",
            Self::ContainerStart(_) => "container start",
            Self::Inspect(_) => "container inspect",
            Self::Lifecycle(_) => "container lifecycle",
            Self::Removal { .. } => "container removal",
            Self::LabelConflict { .. } => "label check",
            Self::TemplateRejected { .. } => "template creation",
            Self::JobCreation(_) => "job creation",
            Self::Trigger(_) => "job trigger",
            Self::Cancelled => "cancellation",
        }
    }
}

/// Attaches a pipeline stage to a client result
///
/// Auth codec failures surface as [`PipelineError::Auth`] whichever stage
/// they happen in.
pub(crate) trait StageExt<T> {
    fn stage(self, wrap: fn(ClientError) -> PipelineError) -> Result<T, PipelineError>;
}

impl<T> StageExt<T> for Result<T, ClientError> {
    fn stage(self, wrap: fn(ClientError) -> PipelineError) -> Result<T, PipelineError> {
        self.map_err(|e| match e {
            ClientError::Auth(_) => PipelineError::Auth(e),
            other => wrap(other),
        })
    }
}
