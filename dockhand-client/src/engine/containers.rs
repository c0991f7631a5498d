//! Container endpoints: create, start, inspect, remove

use dockhand_core::domain::container::ContainerState;
use dockhand_core::dto::engine::{ContainerCreated, ContainerInspect, CreateContainer};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::EngineConnection;
use crate::error::Result;

impl EngineConnection {
    /// Create a container from an image
    ///
    /// # Arguments
    /// * `image` - Image name or resolved ID
    /// * `name` - Container name; the engine rejects names already in use (409)
    ///
    /// # Returns
    /// The container ID
    pub async fn create_container(&self, image: &str, name: &str) -> Result<String> {
        let url = self.url("/containers/create");
        let response = self
            .client
            .post(&url)
            .query(&[("name", name)])
            .json(&CreateContainer {
                image: image.to_string(),
            })
            .send()
            .await?;

        let created: ContainerCreated = self.handle_response(response).await?;
        for warning in created.warnings.iter().flatten() {
            warn!("Engine warning creating {}: {}", name, warning);
        }

        debug!("Created container {} ({})", name, created.id);
        Ok(created.id)
    }

    /// Ask the engine to start a container
    ///
    /// Returns as soon as the engine accepted the request; it does not wait for
    /// the container to finish.
    pub async fn start_container(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/containers/{}/start", id));
        let response = self.client.post(&url).send().await?;

        // 304: already started
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(());
        }

        self.handle_empty_response(response).await
    }

    /// Read the current state of a container
    pub async fn inspect_container(&self, id: &str) -> Result<ContainerState> {
        let url = self.url(&format!("/containers/{}/json", id));
        let response = self.client.get(&url).send().await?;

        let inspect: ContainerInspect = self.handle_response(response).await?;
        Ok(inspect.state.into())
    }

    /// Force-remove a container together with its volumes
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/containers/{}", id));
        let response = self
            .client
            .delete(&url)
            .query(&[("force", "true"), ("v", "true")])
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
