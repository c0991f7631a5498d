//! Container engine repository

use async_trait::async_trait;
use dockhand_client::{EngineConnection, Result, StreamSummary};
use dockhand_core::domain::container::ContainerState;
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::ImageRef;

/// Engine operations used by the pipeline
#[async_trait]
pub trait EngineRepository: Send + Sync {
    /// Identifier of a local image, `None` when absent
    async fn inspect_image(&self, name: &str) -> Result<Option<String>>;

    /// Pulls `reference`, reading the progress stream to the end
    async fn pull_image(
        &self,
        reference: &str,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary>;

    /// Builds `tag` from a remote context
    async fn build_image(&self, tag: &str, remote: &str) -> Result<StreamSummary>;

    async fn push_image(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary>;

    /// Creates a named container and returns its identifier
    async fn create_container(&self, image: &str, name: &str) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerState>;

    /// Force-removes a container and its volumes (accepts an id or a name)
    async fn remove_container(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl EngineRepository for EngineConnection {
    async fn inspect_image(&self, name: &str) -> Result<Option<String>> {
        let image = EngineConnection::inspect_image(self, name).await?;
        Ok(image.map(|i| i.id))
    }

    async fn pull_image(
        &self,
        reference: &str,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        EngineConnection::pull_image(self, reference, credential).await
    }

    async fn build_image(&self, tag: &str, remote: &str) -> Result<StreamSummary> {
        EngineConnection::build_image(self, tag, remote).await
    }

    async fn push_image(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        EngineConnection::push_image(self, image, credential).await
    }

    async fn create_container(&self, image: &str, name: &str) -> Result<String> {
        EngineConnection::create_container(self, image, name).await
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        EngineConnection::start_container(self, id).await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerState> {
        EngineConnection::inspect_container(self, id).await
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        EngineConnection::remove_container(self, id).await
    }
}
