//! CI server repository

use async_trait::async_trait;
use dockhand_client::{CiClient, Result};
use dockhand_core::domain::ci::{CiLabel, JobHandle, JobSpec, LabelMatch};

/// CI operations used by the pipeline
#[async_trait]
pub trait CiRepository: Send + Sync {
    /// False when the label already exists in the cloud's label listing
    async fn is_label_unique(&self, label: &CiLabel, mode: LabelMatch) -> Result<bool>;

    /// False when the server refused to create the agent template
    async fn create_template(&self, label: &CiLabel, image: &str) -> Result<bool>;

    async fn verify_connection(&self) -> Result<()>;

    async fn create_job(&self, spec: &JobSpec) -> Result<JobHandle>;

    /// Starts one build of the job without parameters
    async fn trigger(&self, job: &JobHandle) -> Result<bool>;
}

#[async_trait]
impl CiRepository for CiClient {
    async fn is_label_unique(&self, label: &CiLabel, mode: LabelMatch) -> Result<bool> {
        CiClient::is_label_unique(self, label, mode).await
    }

    async fn create_template(&self, label: &CiLabel, image: &str) -> Result<bool> {
        CiClient::create_template(self, label, image).await
    }

    async fn verify_connection(&self) -> Result<()> {
        CiClient::verify_connection(self).await
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<JobHandle> {
        CiClient::create_job(self, spec).await
    }

    async fn trigger(&self, job: &JobHandle) -> Result<bool> {
        CiClient::trigger(self, job).await
    }
}
