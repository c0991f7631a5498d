//! Recording fakes for service and pipeline tests
//!
//! Both fakes append to one shared call log so tests can assert the global
//! order of remote calls. An operation can be told to fail or to never
//! return (to exercise cancellation).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dockhand_client::{ClientError, Result, StreamSummary};
use dockhand_core::domain::ci::{CiLabel, JobHandle, JobSpec, LabelMatch};
use dockhand_core::domain::container::ContainerState;
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::ImageRef;

use super::{CiRepository, EngineRepository};

pub const CONTAINER_ID: &str = "c0ffee1234567890";

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of calls whose entry starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Operation names in call order, without arguments
    pub fn operations(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }
}

fn simulated(op: &str) -> ClientError {
    ClientError::api_error(500, format!("simulated {} failure", op))
}

pub fn exited(code: i64) -> ContainerState {
    ContainerState {
        status: "exited".to_string(),
        running: false,
        exit_code: code,
        error: String::new(),
    }
}

pub fn running() -> ContainerState {
    ContainerState {
        status: "running".to_string(),
        running: true,
        exit_code: 0,
        error: String::new(),
    }
}

pub struct FakeEngine {
    log: CallLog,
    local_image: Mutex<Option<String>>,
    pulled_image: Option<String>,
    states: Mutex<VecDeque<ContainerState>>,
    failing: Vec<&'static str>,
    hanging: Option<&'static str>,
}

impl FakeEngine {
    /// Engine on which a pull succeeds and yields `sha256:fresh`
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            local_image: Mutex::new(None),
            pulled_image: Some("sha256:fresh".to_string()),
            states: Mutex::new(VecDeque::new()),
            failing: Vec::new(),
            hanging: None,
        }
    }

    pub fn with_local_image(self, id: &str) -> Self {
        *self.local_image.lock().unwrap() = Some(id.to_string());
        self
    }

    /// States returned by successive container inspections; the last one repeats
    pub fn with_states(self, states: Vec<ContainerState>) -> Self {
        *self.states.lock().unwrap() = states.into();
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn hanging(mut self, op: &'static str) -> Self {
        self.hanging = Some(op);
        self
    }

    async fn call(&self, op: &'static str, arg: &str) -> Result<()> {
        self.log.push(format!("engine.{} {}", op, arg));
        if self.hanging == Some(op) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&op) {
            return Err(simulated(op));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineRepository for FakeEngine {
    async fn inspect_image(&self, name: &str) -> Result<Option<String>> {
        self.call("inspect_image", name).await?;
        Ok(self.local_image.lock().unwrap().clone())
    }

    async fn pull_image(
        &self,
        reference: &str,
        _credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        self.call("pull", reference).await?;
        if let Some(id) = &self.pulled_image {
            *self.local_image.lock().unwrap() = Some(id.clone());
        }
        Ok(StreamSummary::default())
    }

    async fn build_image(&self, tag: &str, _remote: &str) -> Result<StreamSummary> {
        self.call("build", tag).await?;
        Ok(StreamSummary::default())
    }

    async fn push_image(
        &self,
        image: &ImageRef,
        _credential: &RegistryCredential,
    ) -> Result<StreamSummary> {
        self.call("push", image.name()).await?;
        Ok(StreamSummary::default())
    }

    async fn create_container(&self, _image: &str, name: &str) -> Result<String> {
        self.call("create", name).await?;
        Ok(CONTAINER_ID.to_string())
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.call("start", id).await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerState> {
        self.call("inspect_container", id).await?;
        let mut states = self.states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        Ok(state.unwrap_or_else(|| exited(0)))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.call("remove", id).await
    }
}

pub struct FakeCi {
    log: CallLog,
    label_taken: bool,
    template_accepted: bool,
    failing: Vec<&'static str>,
    hanging: Option<&'static str>,
}

impl FakeCi {
    /// CI server on which every call succeeds
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            label_taken: false,
            template_accepted: true,
            failing: Vec::new(),
            hanging: None,
        }
    }

    pub fn with_label_taken(mut self) -> Self {
        self.label_taken = true;
        self
    }

    pub fn rejecting_templates(mut self) -> Self {
        self.template_accepted = false;
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn hanging(mut self, op: &'static str) -> Self {
        self.hanging = Some(op);
        self
    }

    async fn call(&self, op: &'static str, arg: &str) -> Result<()> {
        self.log.push(format!("ci.{} {}", op, arg));
        if self.hanging == Some(op) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&op) {
            return Err(simulated(op));
        }
        Ok(())
    }
}

#[async_trait]
impl CiRepository for FakeCi {
    async fn is_label_unique(&self, label: &CiLabel, _mode: LabelMatch) -> Result<bool> {
        self.call("is_label_unique", &label.label).await?;
        Ok(!self.label_taken)
    }

    async fn create_template(&self, label: &CiLabel, image: &str) -> Result<bool> {
        self.call("create_template", &format!("{} {} {}", label.cloud, label.label, image))
            .await?;
        Ok(self.template_accepted)
    }

    async fn verify_connection(&self) -> Result<()> {
        self.call("verify_connection", "").await
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<JobHandle> {
        self.call("create_job", &format!("{} {}", spec.name, spec.repo_url))
            .await?;
        Ok(JobHandle {
            name: spec.name.clone(),
            url: format!("http://ci.test/job/{}/", spec.name),
        })
    }

    async fn trigger(&self, job: &JobHandle) -> Result<bool> {
        self.call("trigger", &job.name).await?;
        Ok(true)
    }
}
