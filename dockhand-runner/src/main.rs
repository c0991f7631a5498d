//! Dockhand
//!
//! Qualifies a container image and onboards it as a CI build agent.
//!
//! Architecture:
//! - Configuration: command line and `DOCKHAND_*` environment, validated once
//! - Repositories: engine and CI server behind traits
//! - Services: one per stage (resolve, publish, container test, provisioning)
//! - Pipeline: runs the stages in order and produces a run report
//!
//! Ctrl-C and the optional run deadline cancel the run; a container created
//! before that point is still removed.

mod config;
mod error;
mod pipeline;
mod repository;
mod service;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dockhand_client::{CiClient, ClientError, EngineConnection};
use dockhand_core::domain::ci::LabelMatch;
use dockhand_core::domain::container::Verdict;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{
    CiSettings, Config, EngineSettings, RegistrySettings, TestFailurePolicy, TransportSettings,
    VerificationSettings,
};
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, RunOutcome, RunReport};

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Verify a container image and provision it as a CI agent", long_about = None)]
struct Cli {
    /// Container engine endpoint
    #[arg(long, env = "DOCKHAND_ENGINE_URL", default_value = "tcp://localhost:2376")]
    engine_url: String,

    /// Directory with cert.pem, key.pem and ca.pem (defaults to ~/.docker)
    #[arg(long, env = "DOCKHAND_TLS_DIR")]
    tls_dir: Option<PathBuf>,

    /// Client certificate (overrides --tls-dir; needs --tls-key and --tls-ca)
    #[arg(long, env = "DOCKHAND_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "DOCKHAND_TLS_KEY", requires = "tls_ca")]
    tls_key: Option<PathBuf>,

    #[arg(long, env = "DOCKHAND_TLS_CA", requires = "tls_cert")]
    tls_ca: Option<PathBuf>,

    /// Do not verify the engine's certificate
    #[arg(long, env = "DOCKHAND_INSECURE", conflicts_with_all = ["tls_dir", "tls_cert"])]
    insecure: bool,

    /// Registry server address
    #[arg(long, env = "DOCKHAND_REGISTRY_URL")]
    registry_url: String,

    #[arg(long, env = "DOCKHAND_REGISTRY_USER", default_value = "")]
    registry_user: String,

    #[arg(long, env = "DOCKHAND_REGISTRY_PASSWORD", default_value = "", hide_env_values = true)]
    registry_password: String,

    /// Image to verify, e.g. registry.example.com/agent:1.0
    #[arg(long, env = "DOCKHAND_IMAGE")]
    image: String,

    /// Build and push the image from --repo-url first
    #[arg(long, env = "DOCKHAND_BUILD")]
    build: bool,

    /// Source repository of the image
    #[arg(long, env = "DOCKHAND_REPO_URL")]
    repo_url: String,

    /// CI server base URL
    #[arg(long, env = "DOCKHAND_CI_URL")]
    ci_url: String,

    #[arg(long, env = "DOCKHAND_CI_USER", default_value = "")]
    ci_user: String,

    #[arg(long, env = "DOCKHAND_CI_PASSWORD", default_value = "", hide_env_values = true)]
    ci_password: String,

    /// Cloud configuration holding the agent templates
    #[arg(long, env = "DOCKHAND_CLOUD")]
    cloud: String,

    /// Agent label to create
    #[arg(long, env = "DOCKHAND_LABEL")]
    label: String,

    /// How the label is matched against existing ones: token or substring
    #[arg(long, env = "DOCKHAND_LABEL_MATCH", default_value = "token")]
    label_match: LabelMatch,

    /// Seconds the test container gets to finish
    #[arg(long, env = "DOCKHAND_TEST_WINDOW", default_value_t = 30)]
    test_window: u64,

    /// Milliseconds between two inspections of the test container
    #[arg(long, env = "DOCKHAND_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Provision the agent even when the container test fails
    #[arg(long, env = "DOCKHAND_PROVISION_ON_TEST_FAILURE")]
    provision_on_test_failure: bool,

    /// Cancel the whole run after this many seconds
    #[arg(long, env = "DOCKHAND_DEADLINE")]
    deadline: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<Config> {
        let transport = if self.insecure {
            TransportSettings::Insecure
        } else if let (Some(cert), Some(key), Some(ca)) = (self.tls_cert, self.tls_key, self.tls_ca) {
            TransportSettings::TlsFiles { cert, key, ca }
        } else {
            TransportSettings::TlsDir(self.tls_dir.unwrap_or_else(default_cert_dir))
        };

        let config = Config {
            engine: EngineSettings {
                url: self.engine_url,
                transport,
            },
            registry: RegistrySettings {
                url: self.registry_url,
                username: self.registry_user,
                password: self.registry_password,
            },
            image: self.image,
            build_image: self.build,
            repo_url: self.repo_url,
            ci: CiSettings {
                url: self.ci_url,
                username: self.ci_user,
                password: self.ci_password,
                cloud: self.cloud,
                label: self.label,
                label_match: self.label_match,
            },
            verification: VerificationSettings {
                test_window: Duration::from_secs(self.test_window),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                on_failure: if self.provision_on_test_failure {
                    TestFailurePolicy::Continue
                } else {
                    TestFailurePolicy::Abort
                },
            },
            deadline: self.deadline.map(Duration::from_secs),
        };

        config.validate()?;
        Ok(config)
    }
}

fn default_cert_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".docker")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dockhand=info,dockhand_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(PipelineError::Config(e.to_string()).exit_code());
        }
    };

    info!(
        "Starting Dockhand: image={}, engine={}, ci={}, cloud={}, label={}",
        config.image, config.engine.url, config.ci.url, config.ci.cloud, config.ci.label
    );

    match run(&config).await {
        Ok(report) => {
            log_summary(&report);
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            error!("Stage '{}' failed: {}", e.stage(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(config: &Config) -> Result<RunReport, PipelineError> {
    let engine = connect_engine(config)?;
    let ci = CiClient::new(&config.ci.url, &config.ci.username, &config.ci.password);

    let cancel = CancellationToken::new();
    spawn_cancel_watchers(&cancel, config.deadline);

    Pipeline::new(config, &engine, &ci, cancel).run().await
}

/// Builds the engine connection; unusable TLS material is a transport failure
fn connect_engine(config: &Config) -> Result<EngineConnection, PipelineError> {
    EngineConnection::new(&config.engine.url, config.engine.transport.mode()).map_err(|e| match e {
        ClientError::InvalidEndpoint(_) => PipelineError::Config(e.to_string()),
        other => PipelineError::Transport(other),
    })
}

/// Cancels the run on Ctrl-C or when the deadline passes
fn spawn_cancel_watchers(cancel: &CancellationToken, deadline: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            token.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    warn!("Run deadline of {:?} reached, cancelling run", deadline);
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
    }
}

fn log_summary(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    info!(
        "Image {} ({}{})",
        report.image.image,
        report.image.short_id(),
        if report.image.stale { ", stale local copy" } else { "" }
    );

    let verification = &report.verification;
    match &verification.verdict {
        Verdict::Passed => {
            info!("Container test passed ({})", verification.container.name)
        }
        Verdict::Failed(reason) => {
            warn!("Container test failed ({}): {}", verification.container.name, reason)
        }
    }
    if let Some(reason) = &verification.removal_error {
        warn!(
            "Container {} may still exist: {}",
            verification.container.name, reason
        );
    }

    match &report.outcome {
        RunOutcome::Provisioned { job, triggered } => info!(
            "Job {} at {} ({})",
            job.name,
            job.url,
            if *triggered { "triggered" } else { "not triggered" }
        ),
        RunOutcome::ProvisioningSkipped => warn!("CI provisioning skipped"),
    }

    info!(
        "Run finished in {}.{:03}s",
        elapsed.num_seconds(),
        elapsed.num_milliseconds() % 1000
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &[&str] = &[
        "dockhand",
        "--registry-url",
        "registry.example.com",
        "--image",
        "registry.example.com/agent:1.0",
        "--repo-url",
        "https://github.com/example/agent",
        "--ci-url",
        "https://ci.example.com",
        "--cloud",
        "AzureCloud",
        "--label",
        "TeamX_Agent",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap().into_config().unwrap();

        assert_eq!(config.engine.url, "tcp://localhost:2376");
        assert!(matches!(
            config.engine.transport,
            TransportSettings::TlsDir(_)
        ));
        assert!(!config.build_image);
        assert_eq!(config.ci.label_match, LabelMatch::Token);
        assert_eq!(config.verification.test_window, Duration::from_secs(30));
        assert_eq!(config.verification.poll_interval, Duration::from_secs(1));
        assert_eq!(config.verification.on_failure, TestFailurePolicy::Abort);
        assert_eq!(config.deadline, None);
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--insecure",
            "--build",
            "--label-match",
            "substring",
            "--provision-on-test-failure",
            "--deadline",
            "600",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.engine.transport, TransportSettings::Insecure);
        assert!(config.build_image);
        assert_eq!(config.ci.label_match, LabelMatch::Substring);
        assert_eq!(config.verification.on_failure, TestFailurePolicy::Continue);
        assert_eq!(config.deadline, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_explicit_tls_files() {
        let config = parse(&[
            "--tls-cert",
            "/certs/cert.pem",
            "--tls-key",
            "/certs/key.pem",
            "--tls-ca",
            "/certs/ca.pem",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(
            config.engine.transport,
            TransportSettings::TlsFiles {
                cert: PathBuf::from("/certs/cert.pem"),
                key: PathBuf::from("/certs/key.pem"),
                ca: PathBuf::from("/certs/ca.pem"),
            }
        );
    }

    #[test]
    fn test_missing_tls_material_is_transport_error() {
        let mut config = Config::default();
        config.engine.transport = TransportSettings::TlsDir(PathBuf::from("/nonexistent/dockhand-tls"));

        let err = connect_engine(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Transport(ClientError::Tls(_))));
        assert_eq!(err.exit_code(), 10);
        assert_eq!(err.stage(), "transport");
    }

    #[test]
    fn test_unsupported_engine_scheme_is_config_error() {
        let mut config = Config::default();
        config.engine.url = "unix:///var/run/docker.sock".to_string();

        let err = connect_engine(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_partial_tls_files_rejected() {
        assert!(parse(&["--tls-cert", "/certs/cert.pem"]).is_err());
    }

    #[test]
    fn test_unknown_label_match_rejected() {
        assert!(parse(&["--label-match", "fuzzy"]).is_err());
    }

    #[test]
    fn test_invalid_label_fails_validation() {
        let cli = Cli::try_parse_from(
            REQUIRED
                .iter()
                .map(|arg| if *arg == "TeamX_Agent" { "Team X" } else { *arg }),
        )
        .unwrap();
        assert!(cli.into_config().is_err());
    }
}
