//! Container engine connection
//!
//! One [`EngineConnection`] is built per run from an endpoint and a
//! [`TransportMode`]. Construction only builds the HTTP client; no request is
//! sent until a stage calls one of the image or container operations.

mod containers;
mod images;
pub mod stream;

use reqwest::{Certificate, Client, Identity};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Engine API version every request is pinned to
pub const API_VERSION: &str = "v1.24";

/// User-Agent sent on every engine request
pub const USER_AGENT: &str = "engine-api-cli-1.0";

/// Header carrying the encoded registry credential on pull and push
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// PEM files for mutual TLS with the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl TlsMaterial {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>, ca: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            ca: ca.into(),
        }
    }

    /// Uses `cert.pem`, `key.pem` and `ca.pem` from a directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("cert.pem"), dir.join("key.pem"), dir.join("ca.pem"))
    }

    fn read(path: &Path, what: &str) -> Result<Vec<u8>> {
        std::fs::read(path)
            .map_err(|e| ClientError::Tls(format!("cannot read {} {}: {}", what, path.display(), e)))
    }

    /// Client certificate and private key as one identity
    fn identity(&self) -> Result<Identity> {
        let mut pem = Self::read(&self.cert, "client certificate")?;
        pem.push(b'\n');
        pem.extend(Self::read(&self.key, "private key")?);
        Identity::from_pem(&pem).map_err(|e| {
            ClientError::Tls(format!(
                "cannot parse client certificate {} / key {}: {}",
                self.cert.display(),
                self.key.display(),
                e
            ))
        })
    }

    fn ca_certificates(&self) -> Result<Vec<Certificate>> {
        let pem = Self::read(&self.ca, "CA certificate")?;
        let certs = Certificate::from_pem_bundle(&pem).map_err(|e| {
            ClientError::Tls(format!("cannot parse CA certificate {}: {}", self.ca.display(), e))
        })?;
        if certs.is_empty() {
            return Err(ClientError::Tls(format!(
                "no certificate found in {}",
                self.ca.display()
            )));
        }
        Ok(certs)
    }
}

/// How the connection to the engine is secured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    /// Client certificate + key, server verified against the given CA
    MutualTls(TlsMaterial),
    /// No peer verification; `http://` endpoints are sent in cleartext
    Insecure,
}

/// An authenticated handle to one container engine endpoint
#[derive(Debug, Clone)]
pub struct EngineConnection {
    /// Endpoint as configured, trailing slash stripped
    endpoint: String,
    /// HTTP base including the API version (e.g. "https://host:2376/v1.24")
    api_url: String,
    secure: bool,
    client: Client,
}

impl EngineConnection {
    /// Builds a connection to `endpoint` using the given transport
    ///
    /// `tcp://` endpoints are spoken to over HTTPS. Mutual TLS fails if any
    /// of the three PEM files cannot be loaded or parsed.
    pub fn new(endpoint: &str, mode: TransportMode) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let secure = matches!(mode, TransportMode::MutualTls(_));
        let base = http_base(&endpoint, secure)?;

        let builder = Client::builder().user_agent(USER_AGENT);
        let client = match &mode {
            TransportMode::MutualTls(material) => {
                debug!(
                    "Loading TLS material: cert={}, key={}, ca={}",
                    material.cert.display(),
                    material.key.display(),
                    material.ca.display()
                );
                let mut builder = builder.use_rustls_tls().identity(material.identity()?);
                for ca in material.ca_certificates()? {
                    builder = builder.add_root_certificate(ca);
                }
                builder.build()?
            }
            TransportMode::Insecure => {
                warn!(
                    "Engine connection to {} does not verify the server certificate",
                    endpoint
                );
                builder
                    .use_rustls_tls()
                    .danger_accept_invalid_certs(true)
                    .build()?
            }
        };

        Ok(Self {
            api_url: format!("{}/{}", base, API_VERSION),
            endpoint,
            secure,
            client,
        })
    }

    /// Endpoint as configured (trailing slash stripped)
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Versioned HTTP base URL requests are sent to
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Whether the server is verified with mutual TLS
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Check the status code and deserialize a JSON body
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

    /// Check the status code of a response without a meaningful body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(crate::api_error(response).await);
        }
        // Consume whatever the engine sent so the connection can be reused
        response.bytes().await?;
        Ok(())
    }
}

/// Maps an engine endpoint onto the HTTP base URL used for requests
fn http_base(endpoint: &str, secure: bool) -> Result<String> {
    if let Some(rest) = endpoint.strip_prefix("tcp://") {
        return Ok(format!("https://{}", rest));
    }
    if endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }
    if endpoint.starts_with("http://") {
        if secure {
            return Err(ClientError::InvalidEndpoint(format!(
                "{} is cleartext and cannot carry mutual TLS",
                endpoint
            )));
        }
        return Ok(endpoint.to_string());
    }
    Err(ClientError::InvalidEndpoint(format!(
        "{} (expected tcp://, https:// or http://)",
        endpoint
    )))
}
