//! Configuration management for docgate
//!
//! Loads configuration with priority:
//! 1. config.toml (or specified config file)
//! 2. Environment variables (`DOCGATE_HOST`, `DOCGATE_PORT`, `DOCGATE_DATA_DIR`)
//! 3. Defaults

use crate::Error;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// docgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body for uploads, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Storage layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Parent directory of `uploads/` and `converted/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Overrides `<data_dir>/uploads`
    pub upload_dir: Option<PathBuf>,

    /// Overrides `<data_dir>/converted`
    pub converted_dir: Option<PathBuf>,
}

/// Converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Upper bound on a single conversion. 0 disables the bound.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Register the built-in text, CSV and JSON handlers
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// External conversion program, used as fallback handler
    pub command: Option<CommandConfig>,
}

/// External conversion program, e.g. `markitdown {path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_command_name")]
    pub name: String,

    pub program: String,

    /// Arguments; `{path}` is replaced by the source path. When no argument
    /// contains the placeholder the path is appended.
    #[serde(default)]
    pub args: Vec<String>,

    /// Media types routed to this program in addition to the fallback role
    #[serde(default)]
    pub media_types: Vec<String>,

    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: None,
            converted_dir: None,
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            builtin: true,
            command: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            service_name: default_service_name(),
        }
    }
}

impl StorageConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.converted_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("converted"))
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl DConfig {
    /// Load configuration with the following priority:
    /// 1. config.toml in current directory or a parent
    /// 2. Environment variables
    /// 3. Defaults
    ///
    /// A missing config file is not an error; the service runs on defaults.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(Some(&path)),
            None => {
                tracing::debug!("No config.toml found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path.map(Path::to_path_buf).or_else(Self::find_config_file) else {
            return Err(anyhow!(
                "config.toml not found. Create one with: cp config.toml.example config.toml"
            ));
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::config_error("server.host must not be empty"));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::config_error(
                "server.max_upload_bytes must be greater than 0",
            ));
        }
        if let Some(ref command) = self.converter.command {
            if command.program.trim().is_empty() {
                return Err(Error::config_error(
                    "converter.command.program must not be empty",
                ));
            }
            if command.name.trim().is_empty() {
                return Err(Error::config_error(
                    "converter.command.name must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Parse configuration text and resolve `${VAR}` references
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: DConfig = toml::from_str(contents)?;
        config.resolve_env_vars();
        Ok(config)
    }

    /// Find config.toml by searching current directory and parents
    fn find_config_file() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;

        loop {
            let config_path = current.join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Resolve ${VAR_NAME} references to environment variables
    fn resolve_env_vars(&mut self) {
        if let Some(resolved) = Self::resolve_env_var(&self.server.host) {
            self.server.host = resolved;
        }

        if let Some(resolved) = Self::resolve_path(&self.storage.data_dir) {
            self.storage.data_dir = resolved;
        }
        if let Some(dir) = self.storage.upload_dir.as_ref().and_then(Self::resolve_path) {
            self.storage.upload_dir = Some(dir);
        }
        if let Some(dir) = self.storage.converted_dir.as_ref().and_then(Self::resolve_path) {
            self.storage.converted_dir = Some(dir);
        }

        if let Some(ref mut command) = self.converter.command {
            if let Some(resolved) = Self::resolve_env_var(&command.program) {
                command.program = resolved;
            }
            for arg in command.args.iter_mut() {
                if let Some(resolved) = Self::resolve_env_var(arg) {
                    *arg = resolved;
                }
            }
        }
    }

    /// Environment variables take precedence over file values
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = env::var("DOCGATE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("DOCGATE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("DOCGATE_PORT is not a valid port: {}", port))?;
        }
        if let Ok(dir) = env::var("DOCGATE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    fn resolve_path(path: &PathBuf) -> Option<PathBuf> {
        path.to_str()
            .and_then(Self::resolve_env_var)
            .map(PathBuf::from)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_command_name() -> String {
    "command".to_string()
}

fn default_service_name() -> String {
    "docgate".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.upload_dir(), PathBuf::from("./data/uploads"));
        assert_eq!(
            config.storage.converted_dir(),
            PathBuf::from("./data/converted")
        );
        assert_eq!(config.converter.timeout(), Some(Duration::from_secs(120)));
        assert!(config.converter.builtin);
        assert_eq!(config.observability.log_format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let config = DConfig::from_toml_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            max_upload_bytes = 1024

            [storage]
            data_dir = "/srv/docgate"
            converted_dir = "/srv/markdown"

            [converter]
            timeout_secs = 0
            builtin = false

            [converter.command]
            name = "markitdown"
            program = "markitdown"
            args = ["{path}"]
            extensions = ["pdf", "docx"]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.server.max_upload_bytes, 1024);
        assert_eq!(
            config.storage.upload_dir(),
            PathBuf::from("/srv/docgate/uploads")
        );
        assert_eq!(
            config.storage.converted_dir(),
            PathBuf::from("/srv/markdown")
        );
        assert_eq!(config.converter.timeout(), None);
        assert!(!config.converter.builtin);

        let command = config.converter.command.unwrap();
        assert_eq!(command.name, "markitdown");
        assert_eq!(command.extensions, vec!["pdf", "docx"]);
        assert!(command.media_types.is_empty());
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_resolve_env_var() {
        unsafe {
            env::set_var("DOCGATE_TEST_CONVERTER", "/opt/bin/markitdown");
        }

        let resolved = DConfig::resolve_env_var("${DOCGATE_TEST_CONVERTER}");
        assert_eq!(resolved, Some("/opt/bin/markitdown".to_string()));

        let not_var = DConfig::resolve_env_var("plain_value");
        assert_eq!(not_var, Some("plain_value".to_string()));

        let config = DConfig::from_toml_str(
            r#"
            [converter.command]
            program = "${DOCGATE_TEST_CONVERTER}"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.converter.command.unwrap().program,
            "/opt/bin/markitdown"
        );

        unsafe {
            env::remove_var("DOCGATE_TEST_CONVERTER");
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = 7070\n").unwrap();

        let config = DConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        // DOCGATE_PORT may be set in the environment running the tests
        if env::var("DOCGATE_PORT").is_err() {
            assert_eq!(config.server.port, 7070);
        }
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        assert!(DConfig::default().validate().is_ok());

        let config = DConfig::from_toml_str("[server]\nmax_upload_bytes = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_upload_bytes")));
        assert_eq!(err.code(), "internal");

        let config = DConfig::from_toml_str("[converter.command]\nprogram = \"  \"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ref msg)) if msg.contains("program")
        ));

        let config = DConfig::from_toml_str("[converter.command]\nprogram = \"markitdown\"\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_runs_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nmax_upload_bytes = 0\n").unwrap();

        let err = DConfig::load_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("max_upload_bytes"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(DConfig::from_toml_str("[server]\nport = \"not a number\"").is_err());
    }
}
