//! Optional build and publish stage

use dockhand_client::StreamSummary;
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::ImageRef;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::or_cancelled;
use crate::error::{PipelineError, StageExt};
use crate::repository::EngineRepository;

pub struct ImagePublisher<'a> {
    engine: &'a dyn EngineRepository,
}

impl<'a> ImagePublisher<'a> {
    pub fn new(engine: &'a dyn EngineRepository) -> Self {
        Self { engine }
    }

    /// Builds `image` with the repository as remote context
    pub async fn build(
        &self,
        image: &ImageRef,
        repo_url: &str,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, PipelineError> {
        info!("Building {} from {}", image, repo_url);
        let summary = or_cancelled(cancel, self.engine.build_image(image.name(), repo_url))
            .await?
            .stage(PipelineError::Build)?;

        match &summary.image_id {
            Some(id) => info!("Built {} ({})", image, id),
            None => info!("Built {}", image),
        }
        Ok(summary)
    }

    /// Pushes `image` to its registry
    pub async fn publish(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, PipelineError> {
        info!("Pushing {}", image);
        let summary = or_cancelled(cancel, self.engine.push_image(image, credential))
            .await?
            .stage(PipelineError::Push)?;
        info!("Pushed {}", image);
        Ok(summary)
    }
}
