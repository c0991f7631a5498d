//! CI server client
//!
//! Talks to the CI server with HTTP Basic authentication. Script endpoints
//! return unstructured text; gzip-encoded bodies are decoded transparently.

mod jobs;
mod scripts;

pub use jobs::render_job_config;
pub use scripts::{LABELS_SCRIPT, TEMPLATE_SCRIPT};

use dockhand_core::dto::ci::Crumb;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::debug;

use crate::error::{ClientError, Result};

/// HTTP client for the CI server
#[derive(Clone)]
pub struct CiClient {
    /// Base URL of the CI server (e.g., "http://ci.example.com")
    base_url: String,
    username: String,
    password: String,
    /// HTTP client instance
    client: Client,
}

impl CiClient {
    /// Create a new CI client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the CI server
    /// * `username` - User allowed to run scripts and create jobs
    /// * `password` - Password or API token of that user
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_client(base_url, username, password, Client::new())
    }

    /// Create a new CI client with a custom HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client,
        }
    }

    /// Get the base URL of the CI server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    /// Checks that the server answers and accepts our credentials
    pub async fn verify_connection(&self) -> Result<()> {
        let response = self
            .authed(self.client.get(self.url("/api/json")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }
        response.bytes().await?;
        Ok(())
    }

    /// Fetches a CSRF crumb; `None` when the server has crumbs disabled
    async fn crumb(&self) -> Result<Option<Crumb>> {
        let response = self
            .authed(self.client.get(self.url("/crumbIssuer/api/json")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("CI server issues no CSRF crumbs");
            response.bytes().await?;
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Absolute URL of a job, ending in a slash
    fn job_url(&self, name: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["job", name, ""]);
        Ok(url.to_string())
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the body as text
    async fn handle_text(&self, response: reqwest::Response) -> Result<String> {
        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }

        Ok(response.text().await?)
    }
}

impl std::fmt::Debug for CiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = CiClient::new("http://ci.example.com/", "user", "pass");
        assert_eq!(client.base_url(), "http://ci.example.com");
    }

    #[test]
    fn test_debug_hides_password() {
        let client = CiClient::new("http://ci.example.com", "user", "hunter2");
        assert!(!format!("{:?}", client).contains("hunter2"));
    }

    #[test]
    fn test_job_url_encodes_name() {
        let client = CiClient::new("http://ci.example.com/jenkins/", "u", "p");
        assert_eq!(
            client.job_url("TeamX_Agent_JOB").unwrap(),
            "http://ci.example.com/jenkins/job/TeamX_Agent_JOB/"
        );
        assert_eq!(
            client.job_url("a b/c").unwrap(),
            "http://ci.example.com/jenkins/job/a%20b%2Fc/"
        );
    }
}
