//! Dockhand HTTP clients
//!
//! Typed clients for the two remote systems the pipeline drives:
//!
//! - [`EngineConnection`]: the container engine REST API (pinned to `v1.24`),
//!   over mutual TLS or an explicitly insecure transport
//! - [`CiClient`]: the CI server's scripting endpoints and job API
//!
//! Both are built once per run and only need `&self` afterwards.
//!
//! # Example
//!
//! ```no_run
//! use dockhand_client::{EngineConnection, TlsMaterial, TransportMode};
//!
//! # fn example() -> dockhand_client::Result<()> {
//! let material = TlsMaterial::from_dir("/etc/dockhand/tls");
//! let engine = EngineConnection::new("tcp://build-host:2376", TransportMode::MutualTls(material))?;
//! println!("Engine API at {}", engine.api_url());
//! # Ok(())
//! # }
//! ```

pub mod ci;
pub mod engine;
pub mod error;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use ci::CiClient;
pub use engine::stream::StreamSummary;
pub use engine::{API_VERSION, EngineConnection, TlsMaterial, TransportMode, USER_AGENT};
pub use error::{ClientError, Result};

/// Read the body of a non-2xx response into an API error
pub(crate) async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    // The engine wraps messages as {"message": "..."}
    let message = serde_json::from_str::<dockhand_core::dto::engine::EngineErrorBody>(&error_text)
        .map(|body| body.message)
        .unwrap_or(error_text);
    ClientError::api_error(status, message.trim())
}
