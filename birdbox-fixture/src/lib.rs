pub mod env_file;
pub mod process;
pub mod readiness;

mod container;

use std::{collections::BTreeMap, path::PathBuf};

use color_eyre::eyre::{Result, WrapErr, eyre};
use testcontainers::{ContainerAsync, GenericImage};
use tracing::{error, info};

use crate::process::ProcessHandle;

const CLI_COMMAND_VAR: &str = "BIRDBOX_CLI_COMMAND";
const DEFAULT_CLI_COMMAND: &str = "cubejs-server";
const SERVER_BINARY_VAR: &str = "BIRDBOX_SERVER_BINARY";

/// How to stand the analytics server up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Run the released image in a container.
    Docker,
    /// Spawn the server CLI as a child process.
    Cli,
    /// Spawn a locally built server binary.
    Local,
}

/// Everything needed to start one server instance.
#[derive(Debug, Clone, Default)]
pub struct StartConfig {
    /// Database the server is configured against. Logging only; the actual
    /// credentials come from the env file.
    pub db_type: String,
    /// Variables loaded from the env file.
    pub env: BTreeMap<String, String>,
    /// Overrides applied on top of the env file for spawned servers.
    /// Container servers get the env file verbatim.
    pub extra_env: BTreeMap<String, String>,
}

/// Handle to a running server instance: the API base URL plus whatever is
/// needed to tear the server down.
///
/// `stop` consumes the handle, so it cannot run twice. A handle dropped
/// before `stop` still reaps its server: process children are killed by
/// [`ProcessHandle`]'s Drop and containers by testcontainers' own Drop.
pub struct BirdBox {
    api_url: String,
    source: ServerSource,
}

enum ServerSource {
    Container(ContainerAsync<GenericImage>),
    Process(ProcessHandle),
    External,
}

impl BirdBox {
    /// Start a server in the given mode and wait until it accepts queries.
    /// Startup failure aborts the run; there are no retries.
    pub async fn start(mode: ServerMode, config: &StartConfig) -> Result<Self> {
        info!(db_type = %config.db_type, ?mode, "starting analytics server");
        match mode {
            ServerMode::Docker => Self::start_from_container(config).await,
            ServerMode::Cli | ServerMode::Local => Self::start_from_process(mode, config).await,
        }
    }

    /// Use a server someone else already started, e.g. one kept alive
    /// across runs. Stopping an attached handle leaves the server running.
    pub async fn attach(api_url: impl Into<String>) -> Result<Self> {
        let birdbox = Self {
            api_url: api_url.into(),
            source: ServerSource::External,
        };
        readiness::wait_until_ready(&birdbox.api_url).await?;
        Ok(birdbox)
    }

    async fn start_from_container(config: &StartConfig) -> Result<Self> {
        let (container, port) = container::start_container(&config.env).await?;
        let birdbox = Self {
            api_url: api_url(port),
            source: ServerSource::Container(container),
        };
        readiness::wait_until_ready(&birdbox.api_url).await?;
        Ok(birdbox)
    }

    async fn start_from_process(mode: ServerMode, config: &StartConfig) -> Result<Self> {
        let program = match mode {
            ServerMode::Cli => PathBuf::from(
                std::env::var(CLI_COMMAND_VAR).unwrap_or_else(|_| DEFAULT_CLI_COMMAND.to_string()),
            ),
            ServerMode::Local => {
                PathBuf::from(std::env::var(SERVER_BINARY_VAR).map_err(|_| {
                    eyre!("mode local needs {SERVER_BINARY_VAR} to point at a server binary")
                })?)
            }
            ServerMode::Docker => unreachable!("docker servers are container backed"),
        };

        let port = portpicker::pick_unused_port().ok_or_else(|| eyre!("no free ports"))?;

        let mut env = config.env.clone();
        env.extend(config.extra_env.clone());

        let process = ProcessHandle::spawn(&program, &[], &env, port)?;
        let birdbox = Self {
            api_url: api_url(port),
            source: ServerSource::Process(process),
        };

        if let Err(e) = readiness::wait_until_ready(&birdbox.api_url).await {
            if let ServerSource::Process(process) = &birdbox.source {
                error!(
                    "server never became ready, log tail:\n{}",
                    process.log_tail()
                );
            }
            return Err(e);
        }
        Ok(birdbox)
    }

    /// Base URL of the server's HTTP API.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Tear the server down.
    pub async fn stop(self) -> Result<()> {
        match self.source {
            ServerSource::Container(container) => {
                container.stop().await.wrap_err("stopping server container")?;
            }
            ServerSource::Process(process) => process.stop(),
            ServerSource::External => {}
        }
        info!("server stopped");
        Ok(())
    }
}

fn api_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/cubejs-api")
}
