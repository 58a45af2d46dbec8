use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {0}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write config file {0}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: Engine,
    pub database: Database,
    pub notifications: Notifications,
    pub diagnostics: Diagnostics,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    /// Period of the global due-check pass
    pub tick_seconds: u64,
    pub max_concurrent_probes: usize,
    /// Upper bound for a single probe, further capped below each monitor's interval
    pub probe_timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub email_relay_url: Option<String>,
    pub telegram_bot_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            tick_seconds: 15,
            max_concurrent_probes: 32,
            probe_timeout_seconds: 10,
            user_agent: format!("uppe-monitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self { path: "uppe.db".into() }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl Engine {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/config.toml"))
}

fn display_optional(value: &Option<String>) -> &str {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => "(not set)",
    }
}

fn display_secret(value: &Option<String>) -> &str {
    match value {
        Some(value) if !value.is_empty() => "(set)",
        _ => "(not set)",
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Engine")?;
        write_1(f, "Tick Interval (s)", &self.engine.tick_seconds)?;
        write_1(f, "Max Concurrent Probes", &self.engine.max_concurrent_probes)?;
        write_1(f, "Probe Timeout (s)", &self.engine.probe_timeout_seconds)?;
        write_1(f, "User Agent", &self.engine.user_agent)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Notifications")?;
        write_1(f, "Email Relay", &display_optional(&self.notifications.email_relay_url))?;
        write_1(f, "Telegram Bot Token", &display_secret(&self.notifications.telegram_bot_token))?;
        write_title_1(f, "Diagnostics")?;
        write_1(f, "Endpoint", &display_optional(&self.diagnostics.endpoint))?;
        write_1(f, "API Key", &display_secret(&self.diagnostics.api_key))?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,no_run
    /// use std::path;
    /// use uppe_monitor::config;
    ///
    /// let cfg = config::Config::from_config(None::<&path::Path>).unwrap();
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.engine.tick_seconds == 0 {
            return Err(Error::Invalid("engine.tick_seconds must be greater than 0".into()));
        }
        if self.engine.max_concurrent_probes == 0 {
            return Err(Error::Invalid(
                "engine.max_concurrent_probes must be greater than 0".into(),
            ));
        }
        if self.engine.probe_timeout_seconds == 0 {
            return Err(Error::Invalid(
                "engine.probe_timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        std::fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }
}
