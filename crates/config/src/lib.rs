use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "pawline.toml",
    "config/pawline.toml",
    "crates/config/pawline.toml",
    "../pawline.toml",
    "../config/pawline.toml",
    "../crates/config/pawline.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pawline.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Tunables for the message relay itself.
///
/// ```
/// use pawline_config::RelayConfig;
///
/// let relay = RelayConfig::default();
/// assert_eq!(relay.heartbeat_seconds, 30);
/// assert_eq!(relay.history_limit, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Seconds between liveness sweeps. A connection that misses two
    /// consecutive sweeps is terminated.
    #[serde(default = "RelayConfig::default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// Maximum number of messages replayed to a connection on join.
    #[serde(default = "RelayConfig::default_history_limit")]
    pub history_limit: u32,
    /// Capacity of each connection's outbound queue. A peer whose queue is
    /// full is skipped during fan-out.
    #[serde(default = "RelayConfig::default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Default room key for connections that do not name a conversation.
    #[serde(default = "RelayConfig::default_room")]
    pub default_room: String,
}

impl RelayConfig {
    const fn default_heartbeat_seconds() -> u64 {
        30
    }

    const fn default_history_limit() -> u32 {
        200
    }

    const fn default_outbound_capacity() -> usize {
        64
    }

    fn default_room() -> String {
        "global".to_string()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_seconds: Self::default_heartbeat_seconds(),
            history_limit: Self::default_history_limit(),
            outbound_capacity: Self::default_outbound_capacity(),
            default_room: Self::default_room(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use pawline_config::load;
///
/// std::env::remove_var("PAWLINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "relay.heartbeat_seconds",
            i64::try_from(defaults.relay.heartbeat_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("relay.history_limit", i64::from(defaults.relay.history_limit))?
        .set_default(
            "relay.outbound_capacity",
            i64::try_from(defaults.relay.outbound_capacity).unwrap_or(i64::MAX),
        )?
        .set_default("relay.default_room", defaults.relay.default_room.clone())?;

    let environment_overrides = config::Environment::with_prefix("PAWLINE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PAWLINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PAWLINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.relay.heartbeat_seconds == 0 {
        config.relay.heartbeat_seconds = RelayConfig::default_heartbeat_seconds();
    }

    debug!(?config, "loaded relay configuration");
    Ok(config)
}
