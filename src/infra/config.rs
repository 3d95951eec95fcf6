//! Configuration management infrastructure.
//!
//! This module provides configuration file support: target environment,
//! signing and transport credentials, network and polling behaviour, and the
//! auto-fix budget. Passwords may live in the file but are normally supplied
//! through `SIFEN_SIGN_PASSWORD` / `SIFEN_TLS_PASSWORD`, which take precedence.

use crate::domain::types::{CertPassword, Environment, SchemaVersion};
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SIGN_PASSWORD: &str = "SIFEN_SIGN_PASSWORD";
pub const ENV_TLS_PASSWORD: &str = "SIFEN_TLS_PASSWORD";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SifenConfiguration {
    /// Target environment (`test` or `prod`)
    pub environment: Environment,

    /// Credentials used for XMLDSig
    pub signing: CredentialConfig,

    /// Credentials presented as TLS client identity; falls back to `signing`
    pub transport: Option<CredentialConfig>,

    /// Per-request timeout
    pub network_timeout_seconds: u64,

    /// Attempts for transient network failures
    pub retry_attempts: usize,

    /// First backoff delay; doubled after every failed attempt
    pub retry_base_delay_ms: u64,

    /// Delay between lote status queries
    pub poll_interval_seconds: u64,

    /// Status queries before giving up on a queued lote
    pub max_poll_attempts: u32,

    /// Submissions the auto-fix loop may make for one document
    pub max_autofix_iterations: u32,

    /// Document schema version used for ordering
    pub schema_version: u16,

    /// Where submission records are kept; defaults next to the config file
    pub state_dir: Option<PathBuf>,

    pub verbose: bool,
}

/// Location of one certificate and its key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// PKCS#12 bundle or PEM certificate
    pub cert_path: Option<PathBuf>,

    /// PEM private key, when the certificate is a PEM file
    pub key_path: Option<PathBuf>,

    /// PKCS#12 password; prefer the environment variable
    pub password: Option<String>,
}

impl CredentialConfig {
    #[must_use]
    pub fn password(&self) -> Option<CertPassword> {
        self.password.as_deref().map(CertPassword::new)
    }
}

impl Default for SifenConfiguration {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            signing: CredentialConfig::default(),
            transport: None,
            network_timeout_seconds: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 200,
            poll_interval_seconds: 10,
            max_poll_attempts: 30,
            max_autofix_iterations: 10,
            schema_version: SchemaVersion::V150.0,
            state_dir: None,
            verbose: false,
        }
    }
}

impl SifenConfiguration {
    #[must_use]
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_seconds)
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub fn schema(&self) -> SchemaVersion {
        SchemaVersion(self.schema_version)
    }

    /// Transport credentials, or the signing ones when none are configured.
    #[must_use]
    pub fn transport_credentials(&self) -> &CredentialConfig {
        self.transport.as_ref().unwrap_or(&self.signing)
    }

    /// Apply password overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_SIGN_PASSWORD).ok(),
            std::env::var(ENV_TLS_PASSWORD).ok(),
        );
    }

    /// Apply password overrides. A transport password without a separate
    /// transport section creates one mirroring the signing paths.
    pub fn apply_overrides(&mut self, sign_password: Option<String>, tls_password: Option<String>) {
        if let Some(password) = sign_password {
            self.signing.password = Some(password);
        }
        if let Some(password) = tls_password {
            let transport = self
                .transport
                .get_or_insert_with(|| self.signing.clone());
            transport.password = Some(password);
        }
    }
}

/// Configuration manager for handling config files
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    logger: Logger,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new(logger: &Logger) -> SifenResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self::with_path(config_path, logger))
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P, logger: &Logger) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            logger: logger.child("config"),
        }
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SifenResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("sifen-signer").join("config.toml"))
        } else {
            Ok(PathBuf::from("sifen-signer-config.toml"))
        }
    }

    /// Load configuration from file, falling back to defaults when the file
    /// does not exist. Environment overrides are applied either way.
    pub fn load_with_env(&self) -> SifenResult<SifenConfiguration> {
        let mut config = if self.config_path.exists() {
            self.load()?
        } else {
            self.logger.debug(format!(
                "Configuration file not found, using defaults: {}",
                self.config_path.display()
            ));
            SifenConfiguration::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SifenResult<SifenConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            self.logger.info(format!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            ));
            let default_config = SifenConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SifenResult<SifenConfiguration> {
        self.logger
            .info(format!("Loading configuration from: {}", self.config_path.display()));

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SifenError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SifenConfiguration = toml::from_str(&content).map_err(|e| {
            SifenError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SifenConfiguration) -> SifenResult<()> {
        self.logger
            .info(format!("Saving configuration to: {}", self.config_path.display()));

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SifenError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SifenError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SifenError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate_config(config: &SifenConfiguration) -> SifenResult<()> {
        if config.network_timeout_seconds == 0 {
            return Err(SifenError::ConfigurationError(
                "Network timeout must be greater than 0".to_string(),
            ));
        }
        if config.retry_attempts == 0 {
            return Err(SifenError::ConfigurationError(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }
        if config.max_poll_attempts == 0 {
            return Err(SifenError::ConfigurationError(
                "Max poll attempts must be greater than 0".to_string(),
            ));
        }
        if config.max_autofix_iterations == 0 {
            return Err(SifenError::ConfigurationError(
                "Max auto-fix iterations must be greater than 0".to_string(),
            ));
        }
        for (label, creds) in [
            ("signing", Some(&config.signing)),
            ("transport", config.transport.as_ref()),
        ] {
            let Some(creds) = creds else { continue };
            if creds.key_path.is_some() && creds.cert_path.is_none() {
                return Err(SifenError::ConfigurationError(format!(
                    "{label}: key_path given without cert_path"
                )));
            }
        }
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SifenResult<()> {
        let mut config = self.load_or_create_default()?;

        let parse_number = |value: &str| -> SifenResult<u64> {
            value.parse().map_err(|_| {
                SifenError::ConfigurationError(format!("Invalid number for {key}: {value}"))
            })
        };
        let path = |value: &str| (!value.is_empty()).then(|| PathBuf::from(value));

        match key {
            "environment" => config.environment = value.parse()?,
            "signing.cert_path" => config.signing.cert_path = path(value),
            "signing.key_path" => config.signing.key_path = path(value),
            "transport.cert_path" => {
                config
                    .transport
                    .get_or_insert_with(CredentialConfig::default)
                    .cert_path = path(value);
            }
            "transport.key_path" => {
                config
                    .transport
                    .get_or_insert_with(CredentialConfig::default)
                    .key_path = path(value);
            }
            "network_timeout_seconds" => config.network_timeout_seconds = parse_number(value)?,
            "retry_attempts" => config.retry_attempts = parse_number(value)? as usize,
            "retry_base_delay_ms" => config.retry_base_delay_ms = parse_number(value)?,
            "poll_interval_seconds" => config.poll_interval_seconds = parse_number(value)?,
            "max_poll_attempts" => {
                config.max_poll_attempts = u32::try_from(parse_number(value)?).map_err(|_| {
                    SifenError::ConfigurationError(format!("max_poll_attempts too large: {value}"))
                })?;
            }
            "max_autofix_iterations" => {
                config.max_autofix_iterations =
                    u32::try_from(parse_number(value)?).map_err(|_| {
                        SifenError::ConfigurationError(format!(
                            "max_autofix_iterations too large: {value}"
                        ))
                    })?;
            }
            "schema_version" => {
                config.schema_version = u16::try_from(parse_number(value)?).map_err(|_| {
                    SifenError::ConfigurationError(format!("Invalid schema version: {value}"))
                })?;
            }
            "state_dir" => config.state_dir = path(value),
            "verbose" => {
                config.verbose = value.parse().map_err(|_| {
                    SifenError::ConfigurationError(format!("Invalid boolean value: {value}"))
                })?;
            }
            _ => {
                return Err(SifenError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        Self::validate_config(&config)?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory holding submission records.
    #[must_use]
    pub fn state_dir(&self, config: &SifenConfiguration) -> PathBuf {
        config.state_dir.clone().unwrap_or_else(|| {
            self.config_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
                .join("submissions")
        })
    }

    /// Export configuration as a portable format. Passwords are never
    /// exported.
    pub fn export_config(&self, format: ExportFormat) -> SifenResult<String> {
        let mut config = self.load()?;
        config.signing.password = None;
        if let Some(transport) = config.transport.as_mut() {
            transport.password = None;
        }

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SifenError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SifenError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| SifenError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> SifenResult<()> {
        let config: SifenConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                SifenError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                SifenError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                SifenError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        Self::validate_config(&config)?;
        self.save(&config)
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ExportFormat {
    type Err = SifenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(ExportFormat::Toml),
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(SifenError::ConfigurationError(format!(
                "Unknown export format: {other}"
            ))),
        }
    }
}
