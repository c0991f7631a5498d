//! Run configuration
//!
//! Built once from the command line before any remote call and passed by
//! reference to every stage. Nothing mutates it afterwards.

use std::path::PathBuf;
use std::time::Duration;

use dockhand_client::{TlsMaterial, TransportMode};
use dockhand_core::domain::ci::{LabelMatch, is_valid_label};
use dockhand_core::domain::credential::RegistryCredential;
use dockhand_core::domain::image::ImageRef;

/// Default time a test container gets to finish
pub const DEFAULT_TEST_WINDOW: Duration = Duration::from_secs(30);

/// Default delay between two inspections while the container runs
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineSettings,
    pub registry: RegistrySettings,

    /// Image to qualify, e.g. "registry.example.com/agent:1.0"
    pub image: String,

    /// Build and push the image from `repo_url` before verifying it
    pub build_image: bool,

    /// Source repository; build context and job SCM remote
    pub repo_url: String,

    pub ci: CiSettings,
    pub verification: VerificationSettings,

    /// Upper bound for the whole run; cancels it when reached
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Daemon endpoint ("tcp://host:2376" or "https://host:2376")
    pub url: String,
    pub transport: TransportSettings,
}

/// How the engine connection is secured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSettings {
    /// Directory holding cert.pem, key.pem and ca.pem
    TlsDir(PathBuf),
    TlsFiles {
        cert: PathBuf,
        key: PathBuf,
        ca: PathBuf,
    },
    /// Skip certificate verification (local development only)
    Insecure,
}

impl TransportSettings {
    pub fn mode(&self) -> TransportMode {
        match self {
            TransportSettings::TlsDir(dir) => TransportMode::MutualTls(TlsMaterial::from_dir(dir)),
            TransportSettings::TlsFiles { cert, key, ca } => {
                TransportMode::MutualTls(TlsMaterial::new(cert, key, ca))
            }
            TransportSettings::Insecure => TransportMode::Insecure,
        }
    }
}

#[derive(Clone)]
pub struct RegistrySettings {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl RegistrySettings {
    /// Credential for a single pull or push
    pub fn credential(&self) -> RegistryCredential {
        RegistryCredential::new(&self.username, &self.password, &self.url)
    }
}

impl std::fmt::Debug for RegistrySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct CiSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Cloud configuration the agent template belongs to
    pub cloud: String,
    pub label: String,
    pub label_match: LabelMatch,
}

impl std::fmt::Debug for CiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cloud", &self.cloud)
            .field("label", &self.label)
            .field("label_match", &self.label_match)
            .finish()
    }
}

/// What happens to provisioning when the container test fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TestFailurePolicy {
    /// Remove the container and stop before any CI stage
    #[default]
    Abort,
    /// Warn and provision anyway
    Continue,
}

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub test_window: Duration,
    pub poll_interval: Duration,
    pub on_failure: TestFailurePolicy,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            test_window: DEFAULT_TEST_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_failure: TestFailurePolicy::Abort,
        }
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.url.is_empty() {
            anyhow::bail!("engine url cannot be empty");
        }

        ImageRef::parse(&self.image)?;

        if self.repo_url.is_empty() {
            anyhow::bail!("repo_url cannot be empty");
        }

        if !self.ci.url.starts_with("http://") && !self.ci.url.starts_with("https://") {
            anyhow::bail!("ci url must start with http:// or https://");
        }

        if self.ci.cloud.is_empty() {
            anyhow::bail!("cloud name cannot be empty");
        }

        if self.ci.label.is_empty() {
            anyhow::bail!("label cannot be empty");
        }

        if !is_valid_label(&self.ci.label) {
            anyhow::bail!(
                "label '{}' may only contain letters, digits, '_', '.' and '-'",
                self.ci.label
            );
        }

        if self.verification.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.verification.test_window.is_zero() {
            anyhow::bail!("test_window must be greater than 0");
        }

        if self.deadline.is_some_and(|d| d.is_zero()) {
            anyhow::bail!("deadline must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineSettings {
                url: "tcp://localhost:2376".to_string(),
                transport: TransportSettings::Insecure,
            },
            registry: RegistrySettings {
                url: "registry.example.com".to_string(),
                username: String::new(),
                password: String::new(),
            },
            image: "registry.example.com/agent:1.0".to_string(),
            build_image: false,
            repo_url: "https://github.com/example/agent".to_string(),
            ci: CiSettings {
                url: "http://localhost:8080".to_string(),
                username: String::new(),
                password: String::new(),
                cloud: "AzureCloud".to_string(),
                label: "TeamX_Agent".to_string(),
                label_match: LabelMatch::Token,
            },
            verification: VerificationSettings::default(),
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.verification.test_window, Duration::from_secs(30));
        assert_eq!(config.verification.poll_interval, Duration::from_secs(1));
        assert_eq!(config.verification.on_failure, TestFailurePolicy::Abort);
        assert_eq!(config.ci.label_match, LabelMatch::Token);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.ci.url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.ci.url = "https://ci.example.com".to_string();
        assert!(config.validate().is_ok());

        config.ci.label = "Team X".to_string();
        assert!(config.validate().is_err());
        for label in ["team,x", "team:x", "<TeamX>", "team|x"] {
            config.ci.label = label.to_string();
            assert!(config.validate().is_err(), "{} accepted", label);
        }
        config.ci.label = "team-x.agent_1".to_string();
        assert!(config.validate().is_ok());
        config.ci.label = "TeamX_Agent".to_string();

        config.image = String::new();
        assert!(config.validate().is_err());
        config.image = "agent".to_string();

        config.verification.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.verification.poll_interval = Duration::from_millis(250);

        config.deadline = Some(Duration::ZERO);
        assert!(config.validate().is_err());
        config.deadline = Some(Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_credential() {
        let mut config = Config::default();
        config.registry.username = "ci".to_string();
        config.registry.password = "s3cret".to_string();

        let credential = config.registry.credential();
        assert_eq!(credential.username, "ci");
        assert_eq!(credential.password, "s3cret");
        assert_eq!(credential.server_address, "registry.example.com");
    }

    #[test]
    fn test_debug_hides_passwords() {
        let mut config = Config::default();
        config.registry.password = "registry-pw".to_string();
        config.ci.password = "ci-pw".to_string();

        let printed = format!("{:?}", config);
        assert!(!printed.contains("registry-pw"));
        assert!(!printed.contains("ci-pw"));
    }

    #[test]
    fn test_transport_mode() {
        let tls = TransportSettings::TlsDir(PathBuf::from("/certs"));
        assert!(matches!(tls.mode(), TransportMode::MutualTls(_)));
        assert!(matches!(
            TransportSettings::Insecure.mode(),
            TransportMode::Insecure
        ));
    }
}
