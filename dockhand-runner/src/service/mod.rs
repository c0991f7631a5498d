//! Service layer
//!
//! One service per pipeline stage. Services hold a reference to a repository,
//! apply the stage's rules and turn client failures into [`PipelineError`]s.
//! Every remote call is raced against the run's cancellation token.

mod images;
mod lifecycle;
mod provisioning;
mod publish;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

pub use images::ImageResolver;
pub use lifecycle::{ContainerLifecycle, Verification};
pub use provisioning::Provisioner;
pub use publish::ImagePublisher;

/// Runs `call` unless the run is cancelled first
///
/// On cancellation the call's future is dropped, which closes any open
/// response body.
pub(crate) async fn or_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = T>,
) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        out = call => Ok(out),
    }
}
