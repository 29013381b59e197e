use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::keys::KeyMaterial;
use crate::session::memory_store::DEFAULT_SWEEP_BATCH;
use crate::session::{MemoryStore, SessionConfig, SessionManager, SessionOptions};

/// Directory searched for a higher-priority `Settings.toml`
pub const CONFIG_DIR_ENV: &str = "SEALED_SESSION_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionOptions,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Which backend holds session data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Stateless: the cookie carries the data
    #[default]
    None,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Seconds between sweeps of expired in-memory records
    pub sweep_interval_seconds: u64,
    pub sweep_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::None,
            sweep_interval_seconds: 60,
            sweep_batch: DEFAULT_SWEEP_BATCH,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Everything `main` needs to serve sessions
pub struct SessionRuntime {
    pub manager: SessionManager,
    /// Set when the in-memory backend is selected; the caller owns the sweeper
    pub memory_store: Option<MemoryStore>,
}

impl Settings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - A settings file cannot be read or parsed
    pub fn load() -> anyhow::Result<Self> {
        Self::load_env_file();
        env_logger::try_init().context("Failed to initialize logger")?;

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (applied separately)
    /// 2. `Settings.toml` in `SEALED_SESSION_CONFIG_DIR`
    /// 3. `Settings.toml` in the current directory
    /// 4. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed.
    pub fn load_base_settings() -> anyhow::Result<Self> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
            log::info!("Loaded base settings from {}", default_config_path.display());
        }

        if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
            let override_path = Path::new(&config_dir).join("Settings.toml");
            if override_path.exists() {
                settings = Self::from_file(&override_path)?;
                log::info!("Overriding settings from {}", override_path.display());
            } else {
                log::info!(
                    "{CONFIG_DIR_ENV} set but no Settings.toml found at: {}",
                    override_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid settings TOML.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        basic_toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        if let Ok(host) = std::env::var("HOST") {
            settings.server.host = host;
        }
        apply_parsed_env_override("PORT", &mut settings.server.port);

        Self::apply_session_env_overrides(&mut settings.session);

        if let Ok(backend) = std::env::var("SESSION_STORE") {
            match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => settings.store.backend = StoreBackend::Memory,
                "none" | "" => settings.store.backend = StoreBackend::None,
                other => log::warn!("Unknown SESSION_STORE `{other}`, keeping configured backend"),
            }
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            settings.logging.level = level;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session: &mut SessionOptions) {
        if let Some(secret) = non_empty_env("SESSION_SECRET") {
            session.secret = Some(secret);
            session.key = None;
        }
        if let Some(salt) = non_empty_env("SESSION_SALT") {
            session.salt = Some(salt);
        }
        if let Some(keys) = non_empty_env("SESSION_KEYS") {
            let keys: Vec<String> = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
            session.key = Some(KeyMaterial::Many(keys));
            session.secret = None;
        }
        if let Some(name) = non_empty_env("SESSION_COOKIE_NAME") {
            session.cookie_name = name;
        }
        apply_parsed_env_override("SESSION_TTL_SECONDS", &mut session.ttl_seconds);
        apply_parsed_env_override("SESSION_MAX_TOKEN_BYTES", &mut session.max_token_bytes);
        if let Ok(secure) = std::env::var("COOKIE_SECURE") {
            if let Ok(secure) = secure.parse::<bool>() {
                session.cookie.secure = Some(secure);
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Build the session manager, attaching the configured store
    ///
    /// # Errors
    ///
    /// Returns an error if the key configuration is invalid, including when
    /// neither `secret` nor `key` is configured.
    pub fn build_manager(&self) -> Result<SessionRuntime, ConfigurationError> {
        let config = SessionConfig::from_options(&self.session)?;

        let (config, memory_store) = match self.store.backend {
            StoreBackend::None => (config, None),
            StoreBackend::Memory => {
                let store = MemoryStore::new();
                (config.with_store(Arc::new(store.clone())), Some(store))
            }
        };

        Ok(SessionRuntime {
            manager: SessionManager::new(config),
            memory_store,
        })
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_seconds.max(1))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn apply_parsed_env_override<T: std::str::FromStr>(env_var: &str, target: &mut T) {
    if let Ok(value_str) = std::env::var(env_var) {
        match value_str.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => log::warn!("Ignoring unparsable {env_var}={value_str}"),
        }
    }
}
