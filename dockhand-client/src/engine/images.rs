//! Image endpoints: inspect, pull, build, push

use dockhand_core::auth;
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::ImageRef;
use dockhand_core::dto::engine::ImageInspect;
use reqwest::StatusCode;
use tracing::debug;

use super::stream::{self, StreamSummary};
use super::{EngineConnection, REGISTRY_AUTH_HEADER};
use crate::error::Result;

impl EngineConnection {
    // =============================================================================
    // Image Lookup
    // =============================================================================

    /// Inspect an image by name or ID
    ///
    /// # Returns
    /// `None` when the engine has no such image
    pub async fn inspect_image(&self, name: &str) -> Result<Option<ImageInspect>> {
        let url = self.url(&format!("/images/{}/json", name));
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            response.bytes().await?;
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    // =============================================================================
    // Registry Transfers
    // =============================================================================

    /// Pull an image from its registry
    ///
    /// The progress stream is drained completely; a transfer that breaks off
    /// is reported as an error, never as a pulled image.
    ///
    /// # Arguments
    /// * `reference` - Reference to pull, including tag or digest
    /// * `credential` - Registry credential, encoded into `X-Registry-Auth`
    pub async fn pull_image(
        &self,
        reference: &str,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        let url = self.url("/images/create");
        debug!("Pulling {} via {}", reference, url);

        let response = self
            .client
            .post(&url)
            .query(&[("fromImage", reference)])
            .header(REGISTRY_AUTH_HEADER, auth::encode(credential)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }

        stream::drain(response).await
    }

    /// Push a tagged image to its registry
    pub async fn push_image(
        &self,
        image: &ImageRef,
        credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        let url = self.url(&format!("/images/{}/push", image.repository()));
        debug!("Pushing {} via {}", image, url);

        let response = self
            .client
            .post(&url)
            .query(&[("tag", image.push_tag())])
            .header(REGISTRY_AUTH_HEADER, auth::encode(credential)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }

        stream::drain(response).await
    }

    // =============================================================================
    // Build
    // =============================================================================

    /// Build an image on the engine from a remote source repository
    ///
    /// # Arguments
    /// * `tag` - Name to tag the built image with
    /// * `remote` - Repository URL the engine clones as build context
    pub async fn build_image(&self, tag: &str, remote: &str) -> Result<StreamSummary> {
        let url = self.url("/build");
        debug!("Building {} from {}", tag, remote);

        let response = self
            .client
            .post(&url)
            .query(&[("remote", remote), ("t", tag)])
            .header(reqwest::header::CONTENT_TYPE, "application/x-tar")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }

        stream::drain(response).await
    }
}
