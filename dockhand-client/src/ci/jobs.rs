//! Job endpoints: create and trigger pipeline jobs

use dockhand_core::domain::ci::{JobHandle, JobSpec};
use reqwest::{RequestBuilder, StatusCode};
use tera::{Context, Tera};
use tracing::{debug, info};

use super::CiClient;
use crate::error::{ClientError, Result};

const JOB_TEMPLATE_NAME: &str = "job.xml";
const JOB_TEMPLATE: &str = include_str!("../../templates/job.xml");

/// Renders the pipeline job definition for `spec`
///
/// Every interpolated value is XML-escaped.
pub fn render_job_config(spec: &JobSpec) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(JOB_TEMPLATE_NAME, JOB_TEMPLATE)
        .map_err(|e| ClientError::Template(e.to_string()))?;
    tera.autoescape_on(vec![".xml"]);
    tera.set_escape_fn(escape_xml);

    let mut context = Context::new();
    context.insert("repo_url", &spec.repo_url);
    context.insert("timer_spec", &spec.timer_spec);
    context.insert("branch", &spec.branch);
    context.insert("script_path", &spec.script_path);

    tera.render(JOB_TEMPLATE_NAME, &context)
        .map_err(|e| ClientError::Template(format!("{:?}", e)))
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl CiClient {
    async fn with_crumb(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.crumb().await? {
            Some(crumb) => request.header(crumb.crumb_request_field, crumb.crumb),
            None => request,
        })
    }

    /// Create a pipeline job from a job spec
    ///
    /// Not idempotent: the server rejects a second job with the same name.
    pub async fn create_job(&self, spec: &JobSpec) -> Result<JobHandle> {
        let config = render_job_config(spec)?;
        let request = self
            .authed(self.client.post(self.url("/createItem")))
            .query(&[("name", spec.name.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(config);
        let response = self.with_crumb(request).await?.send().await?;

        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }
        response.bytes().await?;

        let handle = JobHandle {
            name: spec.name.clone(),
            url: self.job_url(&spec.name)?,
        };
        info!("Created job {} at {}", handle.name, handle.url);
        Ok(handle)
    }

    /// Trigger a build of a job without parameters
    ///
    /// # Returns
    /// Whether the server accepted the build (200 or 201)
    pub async fn trigger(&self, job: &JobHandle) -> Result<bool> {
        let request = self.authed(self.client.post(format!("{}build", job.url)));
        let response = self.with_crumb(request).await?.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::api_error(response).await);
        }
        response.bytes().await?;

        debug!("Trigger of {} answered {}", job.name, status);
        Ok(status == StatusCode::OK || status == StatusCode::CREATED)
    }
}
