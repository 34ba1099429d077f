//! Configuration for the ClustSafe exporter.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable holding the ClustSafe user.
pub const ENV_USER: &str = "CLUSTSAFE_USER";

/// Environment variable holding the ClustSafe password.
pub const ENV_PASSWORD: &str = "CLUSTSAFE_PASSWORD";

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Administration tool settings.
    #[serde(default)]
    pub clustsafe: ClustsafeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on (default: "0.0.0.0:9879").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path under which to expose metrics (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9879".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// How to invoke the ClustSafe administration tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClustsafeConfig {
    /// Tool to execute (default: "cw-clustsafe").
    #[serde(default = "default_tool_path")]
    pub path: String,

    /// Report subset to request.
    #[serde(default)]
    pub command: Subcommand,

    /// Deadline for one invocation (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Treat any stderr output as a failed invocation.
    #[serde(default = "default_fail_on_stderr")]
    pub fail_on_stderr: bool,
}

fn default_tool_path() -> String {
    "cw-clustsafe".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_fail_on_stderr() -> bool {
    true
}

impl Default for ClustsafeConfig {
    fn default() -> Self {
        Self {
            path: default_tool_path(),
            command: Subcommand::default(),
            timeout_secs: default_timeout(),
            fail_on_stderr: default_fail_on_stderr(),
        }
    }
}

/// Report subset understood by the administration tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subcommand {
    /// Modules with their outlets and lines.
    Clustsafes,
    /// Environmental sensors only.
    Sensors,
    /// Everything.
    #[default]
    All,
}

impl Subcommand {
    /// The argument passed to the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcommand::Clustsafes => "clustsafes",
            Subcommand::Sensors => "sensors",
            Subcommand::All => "all",
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subcommand {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clustsafes" => Ok(Subcommand::Clustsafes),
            "sensors" => Ok(Subcommand::Sensors),
            "all" => Ok(Subcommand::All),
            other => Err(ConfigError::Validation(format!(
                "Unknown command '{}', expected one of: clustsafes, sensors, all",
                other
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Login for the administration tool, shared by every scrape.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Create credentials from a user/password pair.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Read credentials from `CLUSTSAFE_USER` and `CLUSTSAFE_PASSWORD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup(ENV_USER).unwrap_or_default();
        let password = lookup(ENV_PASSWORD).unwrap_or_default();

        if user.is_empty() || password.is_empty() {
            return Err(ConfigError::MissingCredentials {
                user_var: ENV_USER,
                password_var: ENV_PASSWORD,
            });
        }

        Ok(Self { user, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .web
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.web.listen
            )));
        }

        if !self.web.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.clustsafe.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ClustSafe command path must not be empty".to_string(),
            ));
        }

        if self.clustsafe.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
