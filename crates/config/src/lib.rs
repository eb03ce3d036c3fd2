use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "gigboard.toml",
    "config/gigboard.toml",
    "crates/config/gigboard.toml",
    "../gigboard.toml",
    "../config/gigboard.toml",
    "../crates/config/gigboard.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub messaging: MessagingConfig,
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
            port: 7070,
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
            url: "sqlite://gigboard.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Settings for verifying connection credentials.
///
/// ```
/// use gigboard_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.handshake_timeout().as_millis(), 5_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl AuthConfig {
    fn default_jwt_secret() -> String {
        "default_secret_change_in_production".to_string()
    }

    const fn default_handshake_timeout_ms() -> u64 {
        5_000
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Self::default_jwt_secret(),
            handshake_timeout_ms: Self::default_handshake_timeout_ms(),
        }
    }
}

/// Limits applied by the messaging core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Upper bound on message content, in characters.
    #[serde(default = "MessagingConfig::default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "MessagingConfig::default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "MessagingConfig::default_max_page_size")]
    pub max_page_size: u32,
    /// Capacity of each connection's outbound event queue.
    #[serde(default = "MessagingConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl MessagingConfig {
    const fn default_max_message_length() -> usize {
        2_000
    }

    const fn default_page_size() -> u32 {
        20
    }

    const fn default_max_page_size() -> u32 {
        100
    }

    const fn default_outbound_buffer() -> usize {
        256
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_message_length: Self::default_max_message_length(),
            default_page_size: Self::default_page_size(),
            max_page_size: Self::default_max_page_size(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use gigboard_config::load;
///
/// std::env::remove_var("GIGBOARD_CONFIG");
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
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default(
            "auth.handshake_timeout_ms",
            i64::try_from(defaults.auth.handshake_timeout_ms).unwrap_or(i64::MAX),
        )?
        .set_default(
            "messaging.max_message_length",
            i64::try_from(defaults.messaging.max_message_length).unwrap_or(i64::MAX),
        )?
        .set_default(
            "messaging.default_page_size",
            i64::from(defaults.messaging.default_page_size),
        )?
        .set_default(
            "messaging.max_page_size",
            i64::from(defaults.messaging.max_page_size),
        )?
        .set_default(
            "messaging.outbound_buffer",
            i64::try_from(defaults.messaging.outbound_buffer).unwrap_or(i64::MAX),
        )?;

    let environment_overrides = config::Environment::with_prefix("GIGBOARD").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("GIGBOARD_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via GIGBOARD_CONFIG");
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

    if config.messaging.max_page_size == 0 {
        config.messaging.max_page_size = 1;
    }
    if config.messaging.default_page_size > config.messaging.max_page_size {
        config.messaging.default_page_size = config.messaging.max_page_size;
    }

    debug!(
        http = ?config.http,
        database = ?config.database,
        messaging = ?config.messaging,
        "loaded backend configuration"
    );
    Ok(config)
}
