// Service configuration
//
// Built once at process start from environment plus CLI overrides and
// shared into request handlers as Arc<Config>. Nothing here mutates after
// startup, so no locking is required.

use crate::exec::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_TASK_TIMEOUT};
use clap::ValueEnum;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Environment variable holding the expected static token. If it is unset,
/// every request is unauthorized.
pub const TOKEN_ENV_VAR: &str = "CMD_SERVICE_TOKEN";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8081;

/// Which of the two service variants to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceMode {
    /// Free-form commands on `POST /run`, authorized with
    /// `Authorization: Bearer <token>`.
    Direct,
    /// Allowlisted tasks on `POST /run/{task}`, authorized with
    /// `X-Token: <token>`.
    Tasks,
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on.
    pub bind_addr: IpAddr,

    /// Port to listen on.
    pub port: u16,

    /// Service variant.
    pub mode: ServiceMode,

    /// Expected token; `None` when [`TOKEN_ENV_VAR`] is unset.
    pub token: Option<String>,

    /// Timeout for free-form commands.
    pub command_timeout: Duration,

    /// Timeout for allowlisted tasks.
    pub task_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            mode: ServiceMode::Direct,
            token: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl Config {
    /// Build the configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            token: std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }
}
