//! Image resolution: local lookup, pull, stale fallback

use dockhand_client::{ClientError, Result as ClientResult};
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::{ImageRef, ResolvedImage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::or_cancelled;
use crate::error::PipelineError;
use crate::repository::EngineRepository;

/// Makes an image available on the engine
pub struct ImageResolver<'a> {
    engine: &'a dyn EngineRepository,
}

impl<'a> ImageResolver<'a> {
    pub fn new(engine: &'a dyn EngineRepository) -> Self {
        Self { engine }
    }

    /// Resolves `image` to an engine identifier
    ///
    /// A fresh pull always wins. When the pull fails and a copy was already
    /// present, that copy is returned marked stale. Cancellation is never
    /// turned into a fallback.
    pub async fn resolve(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
        cancel: &CancellationToken,
    ) -> Result<ResolvedImage, PipelineError> {
        let local = match or_cancelled(cancel, self.engine.inspect_image(image.name())).await? {
            Ok(found) => found,
            Err(e) => {
                debug!("Local lookup of {} failed: {}", image, e);
                None
            }
        };

        if let Some(id) = &local {
            debug!("Found local copy of {} ({})", image, id);
        }

        info!("Pulling {}", image.pull_reference());
        match or_cancelled(cancel, self.pull_and_inspect(image, credential)).await? {
            Ok(id) => {
                let resolved = ResolvedImage {
                    image: image.clone(),
                    id,
                    stale: false,
                };
                info!("Image {} is up to date ({})", image, resolved.short_id());
                Ok(resolved)
            }
            Err(e @ ClientError::Auth(_)) => Err(PipelineError::Auth(e)),
            Err(e) => match local {
                Some(id) => {
                    warn!(
                        "Cannot pull the latest version of {}: {}. Using the local copy instead",
                        image, e
                    );
                    Ok(ResolvedImage {
                        image: image.clone(),
                        id,
                        stale: true,
                    })
                }
                None => Err(PipelineError::Pull {
                    image: image.to_string(),
                    source: e,
                }),
            },
        }
    }

    /// Pulls the image and reads back its identifier by the supplied name
    async fn pull_and_inspect(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
    ) -> ClientResult<String> {
        let summary = self
            .engine
            .pull_image(&image.pull_reference(), credential)
            .await?;
        if let Some(status) = &summary.last_status {
            debug!("Pull finished: {}", status);
        }

        self.engine
            .inspect_image(image.name())
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("image {} after pull", image)))
    }
}
