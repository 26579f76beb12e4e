use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::cli::Cli;

const DEFAULT_LISTEN_ADDR: &str = ":5000";
const DEFAULT_BACKEND_ADDRESSES: [&str; 2] = ["http://es01:9200", "http://es02:9200"];
const DEFAULT_INDEX: &str = "people";

/// Top-level application configuration loaded from file + environment + flags.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub backend: BackendSection,
    pub bootstrap: BootstrapSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("PEOPLE_SEARCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load configuration from the given file (if it exists) layered under the environment.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = config::Config::builder();

        if config_path.exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PEOPLE_SEARCH")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("backend.addresses")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let mut config: Self = settings.try_deserialize()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        Ok(config)
    }

    /// Command-line flags take precedence over file and environment values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen_addr) = &cli.listen_addr {
            self.server.listen_addr = listen_addr.clone();
        }
        if let Some(addresses) = &cli.es_addresses {
            self.backend.addresses = split_addresses(addresses);
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.addresses.is_empty() {
            bail!("backend.addresses must contain at least one address");
        }
        if self.bootstrap.index.trim().is_empty() {
            bail!("bootstrap.index must be specified");
        }
        let server = &self.server;
        if server.read_timeout_secs == 0
            || server.write_timeout_secs == 0
            || server.idle_timeout_secs == 0
        {
            bail!("server timeouts must be greater than zero");
        }
        server.bind_addr()?;
        Ok(())
    }
}

/// Split a comma separated address list, dropping blank entries.
pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: String,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl ServerSection {
    /// Resolve `listen_addr` into something `TcpListener::bind` accepts.
    ///
    /// An empty host (`":5000"`) binds every interface.
    pub fn bind_addr(&self) -> Result<String> {
        let addr = self.listen_addr.trim();
        let (host, port) = addr
            .rsplit_once(':')
            .with_context(|| format!("listen address '{}' is missing a port", addr))?;

        port.parse::<u16>()
            .with_context(|| format!("listen address '{}' has an invalid port", addr))?;

        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(format!("{}:{}", host, port))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            read_timeout_secs: 5,
            write_timeout_secs: 10,
            idle_timeout_secs: 15,
            shutdown_grace_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub addresses: Vec<String>,
    pub max_retries: usize,
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            addresses: DEFAULT_BACKEND_ADDRESSES
                .iter()
                .map(|addr| addr.to_string())
                .collect(),
            max_retries: 3,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapSection {
    pub index: String,
    /// Treat a 404 from the initial index deletion as "nothing to delete".
    pub tolerate_missing_index: bool,
    /// Refresh the index after loading so records are searchable immediately.
    pub refresh: bool,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            tolerate_missing_index: true,
            refresh: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}
