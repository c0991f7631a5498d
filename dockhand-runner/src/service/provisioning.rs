//! CI provisioning: label check, agent template, job creation and trigger

use dockhand_core::domain::ci::{CiLabel, JobHandle, JobSpec, LabelMatch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::or_cancelled;
use crate::error::{PipelineError, StageExt};
use crate::repository::CiRepository;

/// A label the CI server reported as unused
///
/// Only [`Provisioner::check_label`] hands these out, so nothing can create a
/// template or a job for a label that was not checked first.
#[derive(Debug, Clone)]
pub struct UniqueLabel(CiLabel);

impl UniqueLabel {
    pub fn label(&self) -> &CiLabel {
        &self.0
    }
}

pub struct Provisioner<'a> {
    ci: &'a dyn CiRepository,
    label_match: LabelMatch,
}

impl<'a> Provisioner<'a> {
    pub fn new(ci: &'a dyn CiRepository, label_match: LabelMatch) -> Self {
        Self { ci, label_match }
    }

    /// Returns `None` when the label already exists in the cloud
    pub async fn check_label(
        &self,
        label: &CiLabel,
        cancel: &CancellationToken,
    ) -> Result<Option<UniqueLabel>, PipelineError> {
        let unique = or_cancelled(cancel, self.ci.is_label_unique(label, self.label_match))
            .await?
            .stage(PipelineError::Transport)?;

        if unique {
            info!("Label {} is free in cloud {}", label.label, label.cloud);
            Ok(Some(UniqueLabel(label.clone())))
        } else {
            info!("Label {} already exists in cloud {}", label.label, label.cloud);
            Ok(None)
        }
    }

    /// Registers the agent template; false when the server refused
    pub async fn create_template(
        &self,
        label: &UniqueLabel,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, PipelineError> {
        let created = or_cancelled(cancel, self.ci.create_template(label.label(), image))
            .await?
            .stage(PipelineError::Transport)?;
        if created {
            info!("Agent template {} created for {}", label.label().label, image);
        }
        Ok(created)
    }

    pub async fn connect(&self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        or_cancelled(cancel, self.ci.verify_connection())
            .await?
            .stage(PipelineError::Transport)
    }

    /// Creates the `<label>_JOB` pipeline job
    pub async fn create_job(
        &self,
        label: &UniqueLabel,
        repo_url: &str,
        cancel: &CancellationToken,
    ) -> Result<JobHandle, PipelineError> {
        let spec = JobSpec::for_label(&label.label().label, repo_url);
        let job = or_cancelled(cancel, self.ci.create_job(&spec))
            .await?
            .stage(PipelineError::JobCreation)?;
        info!("Job {} created", job.name);
        Ok(job)
    }

    pub async fn trigger(
        &self,
        job: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<bool, PipelineError> {
        or_cancelled(cancel, self.ci.trigger(job))
            .await?
            .stage(PipelineError::Trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{CallLog, FakeCi};

    fn label() -> CiLabel {
        CiLabel::new("AzureCloud", "TeamX_Agent")
    }

    #[tokio::test]
    async fn test_taken_label_yields_none() {
        let log = CallLog::default();
        let ci = FakeCi::new(&log).with_label_taken();

        let checked = Provisioner::new(&ci, LabelMatch::Token)
            .check_label(&label(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(checked.is_none());
        assert_eq!(log.calls(), vec!["ci.is_label_unique TeamX_Agent"]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_transport_error() {
        let log = CallLog::default();
        let ci = FakeCi::new(&log).failing("is_label_unique");

        let err = Provisioner::new(&ci, LabelMatch::Token)
            .check_label(&label(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(err.exit_code(), 10);
    }

    #[tokio::test]
    async fn test_template_and_job_for_unique_label() {
        let log = CallLog::default();
        let ci = FakeCi::new(&log);
        let cancel = CancellationToken::new();
        let provisioner = Provisioner::new(&ci, LabelMatch::Token);

        let unique = provisioner
            .check_label(&label(), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(
            provisioner
                .create_template(&unique, "registry.example.com/agent:1.0", &cancel)
                .await
                .unwrap()
        );
        let job = provisioner
            .create_job(&unique, "https://github.com/example/agent", &cancel)
            .await
            .unwrap();
        assert_eq!(job.name, "TeamX_Agent_JOB");
        assert!(provisioner.trigger(&job, &cancel).await.unwrap());

        assert_eq!(
            log.calls()[1],
            "ci.create_template AzureCloud TeamX_Agent registry.example.com/agent:1.0"
        );
    }

    #[tokio::test]
    async fn test_rejected_template_returns_false() {
        let log = CallLog::default();
        let ci = FakeCi::new(&log).rejecting_templates();
        let cancel = CancellationToken::new();
        let provisioner = Provisioner::new(&ci, LabelMatch::Token);

        let unique = provisioner
            .check_label(&label(), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(!provisioner.create_template(&unique, "agent", &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_job_creation_failure() {
        let log = CallLog::default();
        let ci = FakeCi::new(&log).failing("create_job");
        let cancel = CancellationToken::new();
        let provisioner = Provisioner::new(&ci, LabelMatch::Token);

        let unique = provisioner
            .check_label(&label(), &cancel)
            .await
            .unwrap()
            .unwrap();
        let err = provisioner
            .create_job(&unique, "https://github.com/example/agent", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::JobCreation(_)));
        assert_eq!(err.exit_code(), 16);
    }
}
