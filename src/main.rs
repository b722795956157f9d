//! TLS Runtime CLI entry point.
//!
//! Drives the engine through the client facade: acquire the artifact, issue
//! a request, or manage sessions.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tls_runtime_acquire::{DependencyLocator, EngineAcquirer};
use tls_runtime_client::TlsClient;
use tls_runtime_common::{ConfigFile, LogConfig, RuntimeConfig};

#[derive(Debug, Parser)]
#[command(name = "tls-runtime", version, about = "Client runtime for the TLS engine")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Use exactly this engine artifact and never download.
    #[arg(long, env = "TLS_RUNTIME_CUSTOM_LIBRARY_PATH")]
    custom_library_path: Option<PathBuf>,

    /// Directory for downloaded engine artifacts.
    #[arg(long, env = "TLS_RUNTIME_CUSTOM_LIBRARY_DOWNLOAD_PATH")]
    custom_library_download_path: Option<PathBuf>,

    /// Number of worker slots.
    #[arg(long, env = "TLS_RUNTIME_WORKERS")]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Make sure the engine artifact is on disk.
    Ensure,

    #[command(flatten)]
    Call(Call),
}

/// Subcommands that go through the client facade.
#[derive(Debug, Subcommand)]
enum Call {
    /// Issue one request; prints the engine's response document.
    Request { payload: String },
    /// Print a session's cookies.
    Cookies { payload: String },
    /// Add cookies to a session.
    AddCookies { payload: String },
    /// Tear down one session.
    DestroySession { payload: String },
    /// Tear down every session.
    DestroyAll,
}

impl Cli {
    /// Load the config file, then apply command line overrides.
    fn load_config(&self) -> anyhow::Result<ConfigFile> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigFile::default(),
        };

        let engine = &mut file.runtime.engine;
        if let Some(path) = &self.custom_library_path {
            engine.custom_library_path = Some(path.clone());
        }
        if let Some(path) = &self.custom_library_download_path {
            engine.custom_library_download_path = Some(path.clone());
        }
        if let Some(workers) = self.workers {
            file.runtime.pool.workers = workers;
        }

        Ok(file)
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.load_config()?;

    init_tracing(&file.log);

    info!("Starting TLS Runtime");

    let config = file.runtime;
    match cli.command {
        Command::Ensure => ensure(&config).await,
        Command::Call(call) => run(&config, call).await,
    }
}

async fn ensure(config: &RuntimeConfig) -> anyhow::Result<()> {
    let artifact = DependencyLocator::for_current_platform()
        .resolve(&config.engine)
        .context("Failed to resolve engine artifact")?;

    let outcome = EngineAcquirer::new()?
        .ensure_present(&artifact)
        .await
        .context("Failed to acquire engine")?;

    info!(?outcome, path = %artifact.expected_local_path().display(), "Engine ready");
    println!("{}", artifact.expected_local_path().display());
    Ok(())
}

async fn run(config: &RuntimeConfig, call: Call) -> anyhow::Result<()> {
    let client = TlsClient::new(config).context("Failed to start client")?;
    info!(workers = client.pool().size(), "Client started");

    let output = match call {
        Call::Request { payload } => {
            let outcome = client.request(payload).await.context("request failed")?;
            client
                .free_memory(outcome.buffer)
                .await
                .context("freeMemory failed")?;
            outcome.body
        }
        Call::Cookies { payload } => client
            .get_cookies_from_session(payload)
            .await
            .context("getCookiesFromSession failed")?,
        Call::AddCookies { payload } => client
            .add_cookies_to_session(payload)
            .await
            .context("addCookiesToSession failed")?,
        Call::DestroySession { payload } => client
            .destroy_session(payload)
            .await
            .context("destroySession failed")?,
        Call::DestroyAll => client.destroy_all().await.context("destroyAll failed")?,
    };

    println!("{output}");
    client.shutdown().await;

    Ok(())
}
