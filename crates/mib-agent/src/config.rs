//! Agent configuration.

use clap::Parser;
use mib_core::Context;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Default address reported as the server address.
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:161";

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;

fn default_server_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

/// MIB agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Name reported by the server-name metric.
    pub server_name: String,

    /// Address reported by the server-address metric.
    pub server_address: String,

    /// Context the objects are registered under.
    pub context: Context,

    /// Interval between refreshes. None disables periodic refresh.
    pub refresh_interval: Option<Duration>,

    /// JSON catalog overriding the built-in identifiers.
    pub catalog_path: Option<PathBuf>,

    /// Log every object's final value as JSON on shutdown.
    pub dump_snapshot: bool,
}

impl AgentConfig {
    /// Create a configuration with the given server name.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            context: Context::default(),
            refresh_interval: Some(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)),
            catalog_path: None,
            dump_snapshot: false,
        }
    }

    /// Set the reported server address.
    pub fn with_server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = address.into();
        self
    }

    /// Set the registration context.
    pub fn with_context(mut self, context: impl Into<Context>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Disable periodic refresh.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_interval = None;
        self
    }

    /// Load identifiers from a catalog file.
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Log a JSON snapshot on shutdown.
    pub fn with_snapshot_dump(mut self) -> Self {
        self.dump_snapshot = true;
        self
    }

    /// Check if periodic refresh is enabled.
    pub fn has_refresh(&self) -> bool {
        self.refresh_interval.is_some()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(default_server_name())
    }
}

/// Command-line arguments for the agent.
#[derive(Parser, Debug)]
#[command(name = "mib-agent")]
#[command(version, about = "MIB agent exposing live server metrics", long_about = None)]
pub struct Args {
    /// Server name to report.
    #[arg(long)]
    pub name: Option<String>,

    /// Server address to report.
    #[arg(long, default_value = DEFAULT_SERVER_ADDRESS)]
    pub address: String,

    /// Context to register objects under (empty for the default context).
    #[arg(long, default_value = "")]
    pub context: String,

    /// Refresh interval in seconds. Set to 0 to disable periodic refresh.
    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL_SECS)]
    pub refresh_interval: u64,

    /// JSON catalog file overriding the built-in identifiers.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Log the final object values as JSON on shutdown.
    #[arg(long)]
    pub dump: bool,
}

impl Args {
    /// Convert command-line arguments to agent configuration.
    ///
    /// Rejects a blank server name or address, and context names containing
    /// whitespace or control characters.
    pub fn into_config(self) -> Result<AgentConfig, Error> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::Config("server name must not be blank".to_string()));
            }
        }
        if self.address.trim().is_empty() {
            return Err(Error::Config("server address must not be blank".to_string()));
        }
        if self
            .context
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::Config(format!(
                "invalid context '{}': whitespace and control characters are not allowed",
                self.context.escape_debug()
            )));
        }

        let refresh_interval = if self.refresh_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval))
        };

        Ok(AgentConfig {
            server_name: self.name.unwrap_or_else(default_server_name),
            server_address: self.address,
            context: Context::new(self.context),
            refresh_interval,
            catalog_path: self.catalog,
            dump_snapshot: self.dump,
        })
    }
}
