//! Test container lifecycle
//!
//! Create, start, watch, judge, remove. Removal runs exactly once for every
//! container the engine created, whatever happened in between, and is not
//! cancellable (only bounded by [`REMOVE_TIMEOUT`]).

use std::time::Duration;

use dockhand_core::domain::container::{ContainerInstance, ContainerPhase, ContainerState, Verdict};
use dockhand_core::domain::image::ResolvedImage;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::or_cancelled;
use crate::config::VerificationSettings;
use crate::error::{PipelineError, StageExt};
use crate::repository::EngineRepository;

/// Longest wait for the engine to remove a container
pub const REMOVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one container test
#[derive(Debug, Clone)]
pub struct Verification {
    pub container: ContainerInstance,
    pub verdict: Verdict,
    /// Why removal failed, if it did; the verdict stands regardless
    pub removal_error: Option<String>,
}

pub struct ContainerLifecycle<'a> {
    engine: &'a dyn EngineRepository,
    test_window: Duration,
    poll_interval: Duration,
}

impl<'a> ContainerLifecycle<'a> {
    pub fn new(engine: &'a dyn EngineRepository, settings: &VerificationSettings) -> Self {
        Self {
            engine,
            test_window: settings.test_window,
            poll_interval: settings.poll_interval,
        }
    }

    /// Runs the full test of `image` in a container called `name`
    pub async fn verify(
        &self,
        image: &ResolvedImage,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Verification, PipelineError> {
        let mut container = match self.create(&image.id, name, cancel).await {
            Ok(container) => container,
            Err(PipelineError::Cancelled) => {
                // the create request may already have reached the engine
                self.discard(name).await;
                return Err(PipelineError::Cancelled);
            }
            Err(e) => return Err(e),
        };

        let verdict = self.exercise(&mut container, cancel).await;

        let removal_error = match self.remove(&mut container).await {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e.to_string())
            }
        };

        let verdict = verdict?;
        match &verdict {
            Verdict::Passed => info!("Container test passed for {}", image.image),
            Verdict::Failed(reason) => warn!("Container test failed for {}: {}", image.image, reason),
        }

        Ok(Verification {
            container,
            verdict,
            removal_error,
        })
    }

    pub async fn create(
        &self,
        image: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<ContainerInstance, PipelineError> {
        let id = or_cancelled(cancel, self.engine.create_container(image, name))
            .await?
            .stage(PipelineError::ContainerCreate)?;
        let container = ContainerInstance::created(id, name);
        info!("Created container {} ({})", name, container.short_id());
        Ok(container)
    }

    /// Starts the container without waiting for it to finish
    pub async fn start(
        &self,
        container: &mut ContainerInstance,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        or_cancelled(cancel, self.engine.start_container(&container.id))
            .await?
            .stage(PipelineError::ContainerStart)?;
        container.advance(ContainerPhase::Started)?;
        debug!("Started container {}", container.short_id());
        Ok(())
    }

    pub async fn inspect(
        &self,
        container: &ContainerInstance,
        cancel: &CancellationToken,
    ) -> Result<ContainerState, PipelineError> {
        or_cancelled(cancel, self.engine.inspect_container(&container.id))
            .await?
            .stage(PipelineError::Inspect)
    }

    /// Force-removes the container with its volumes
    pub async fn remove(&self, container: &mut ContainerInstance) -> Result<(), PipelineError> {
        let removal = tokio::time::timeout(
            REMOVE_TIMEOUT,
            self.engine.remove_container(&container.id),
        )
        .await;

        let reason = match removal {
            Ok(Ok(())) => {
                container.advance(ContainerPhase::Removed)?;
                info!("Removed container {}", container.name);
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {:?}", REMOVE_TIMEOUT),
        };

        Err(PipelineError::Removal {
            id: container.id.clone(),
            reason,
        })
    }

    async fn exercise(
        &self,
        container: &mut ContainerInstance,
        cancel: &CancellationToken,
    ) -> Result<Verdict, PipelineError> {
        self.start(container, cancel).await?;
        self.await_verdict(container, cancel).await
    }

    /// Inspects until the container stops or the test window elapses
    async fn await_verdict(
        &self,
        container: &mut ContainerInstance,
        cancel: &CancellationToken,
    ) -> Result<Verdict, PipelineError> {
        let deadline = Instant::now() + self.test_window;

        let state = loop {
            let state = self.inspect(container, cancel).await?;
            let now = Instant::now();
            if !state.running || now >= deadline {
                break state;
            }
            debug!(
                "Container {} still running ({})",
                container.short_id(),
                state.status
            );
            let pause = self.poll_interval.min(deadline - now);
            or_cancelled(cancel, tokio::time::sleep(pause)).await?;
        };

        container.advance(ContainerPhase::Inspected)?;
        if !state.running {
            container.exit_code = Some(state.exit_code);
        }
        info!(
            "Container {} status: {}, exit code: {}",
            container.short_id(),
            state.status,
            state.exit_code
        );

        let verdict = state.verdict();
        container.advance(verdict.phase())?;
        Ok(verdict)
    }

    /// Best-effort removal by name of a container whose creation was cut short
    async fn discard(&self, name: &str) {
        match tokio::time::timeout(REMOVE_TIMEOUT, self.engine.remove_container(name)).await {
            Ok(Ok(())) => info!("Removed container {}", name),
            Ok(Err(e)) if e.is_not_found() => debug!("Container {} was never created", name),
            Ok(Err(e)) => warn!("Cannot remove container {}: {}", name, e),
            Err(_) => warn!("Cannot remove container {}: no answer within {:?}", name, REMOVE_TIMEOUT),
        }
    }
}
