//! Pipeline driver
//!
//! Runs the stages strictly in order:
//!
//! 1. optional build and push of the image
//! 2. image resolution (pull, with stale fallback)
//! 3. container test, always followed by removal
//! 4. label check, agent template, CI connection check, job creation, trigger
//!
//! CI stages are skipped when the container test failed under
//! [`TestFailurePolicy::Abort`]. Nothing on the CI server is mutated before
//! the label check returned "unique".

use chrono::{DateTime, Utc};
use dockhand_core::domain::ci::{CiLabel, JobHandle};
use dockhand_core::domain::container::{Verdict, container_name};
use dockhand_core::domain::image::{ImageRef, ResolvedImage};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, TestFailurePolicy};
use crate::error::PipelineError;
use crate::repository::{CiRepository, EngineRepository};
use crate::service::{ContainerLifecycle, ImagePublisher, ImageResolver, Provisioner, Verification};

/// What a run that did not fail ended with
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Provisioned { job: JobHandle, triggered: bool },
    /// Container test failed; CI stages were not run
    ProvisioningSkipped,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub image: ResolvedImage,
    pub verification: Verification,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        match self.outcome {
            RunOutcome::Provisioned { .. } => 0,
            RunOutcome::ProvisioningSkipped => 3,
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    engine: &'a dyn EngineRepository,
    ci: &'a dyn CiRepository,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        engine: &'a dyn EngineRepository,
        ci: &'a dyn CiRepository,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            engine,
            ci,
            cancel,
        }
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let config = self.config;
        let cancel = &self.cancel;

        let image =
            ImageRef::parse(&config.image).map_err(|e| PipelineError::Config(e.to_string()))?;

        if config.build_image {
            info!("=== Build and publish ===");
            let publisher = ImagePublisher::new(self.engine);
            publisher.build(&image, &config.repo_url, cancel).await?;
            publisher
                .publish(&image, &config.registry.credential(), cancel)
                .await?;
        }

        info!("=== Image and container verification ===");
        let resolved = ImageResolver::new(self.engine)
            .resolve(&image, &config.registry.credential(), cancel)
            .await?;
        if resolved.stale {
            warn!(
                "Verifying a possibly outdated local copy of {} ({})",
                image,
                resolved.short_id()
            );
        }

        let name = container_name(&config.ci.label);
        let verification = ContainerLifecycle::new(self.engine, &config.verification)
            .verify(&resolved, &name, cancel)
            .await?;

        if let Verdict::Failed(reason) = &verification.verdict {
            match config.verification.on_failure {
                TestFailurePolicy::Abort => {
                    warn!("Skipping CI provisioning: {}", reason);
                    return Ok(RunReport {
                        image: resolved,
                        verification,
                        outcome: RunOutcome::ProvisioningSkipped,
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
                TestFailurePolicy::Continue => {
                    warn!("Provisioning despite failed container test: {}", reason)
                }
            }
        }

        info!("=== CI provisioning ===");
        let outcome = self.provision(&image).await?;

        Ok(RunReport {
            image: resolved,
            verification,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn provision(&self, image: &ImageRef) -> Result<RunOutcome, PipelineError> {
        let config = self.config;
        let cancel = &self.cancel;
        let label = CiLabel::new(&config.ci.cloud, &config.ci.label);
        let provisioner = Provisioner::new(self.ci, config.ci.label_match);

        let unique = provisioner.check_label(&label, cancel).await?.ok_or_else(|| {
            PipelineError::LabelConflict {
                label: label.label.clone(),
                cloud: label.cloud.clone(),
            }
        })?;

        if !provisioner
            .create_template(&unique, image.name(), cancel)
            .await?
        {
            return Err(PipelineError::TemplateRejected {
                label: label.label.clone(),
            });
        }

        provisioner.connect(cancel).await?;
        let job = provisioner
            .create_job(&unique, &config.repo_url, cancel)
            .await?;
        let triggered = provisioner.trigger(&job, cancel).await?;
        if triggered {
            info!("Job {} triggered", job.name);
        } else {
            warn!("Job {} was created but the trigger was not accepted", job.name);
        }

        Ok(RunOutcome::Provisioned { job, triggered })
    }
}
