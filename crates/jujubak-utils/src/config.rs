/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Jujubak Config Module
//! This module provides a common configuration framework for our crates.
//!
//! # Variable Naming Convention
//!
//! Variables in this configuration framework follow these naming conventions:
//! - Struct fields use snake_case (e.g., `data_dir`, `retention_days`)
//! - Environment variables use SCREAMING_SNAKE_CASE and are prefixed with "JUJUBAK__"
//!   (e.g., `JUJUBAK__BACKUP__DIR`)
//! - Configuration file keys use snake_case (e.g., `backup.dir`, `log.level`)
//!
//! # Configuration Overriding
//!
//! The configuration values are loaded and overridden in the following order (later sources take precedence):
//!
//! 1. Default values from the embedded `default.toml` file
//! 2. Values from an optional external configuration file (if provided)
//! 3. Environment variables
//!
//! To override a configuration value:
//! - In a configuration file: Use the appropriate key (e.g., `backup.dir = "/srv/backups"`)
//! - Using environment variables: Set the variable with the "JUJUBAK__" prefix and "__" as separators
//!   (e.g., `JUJUBAK__LOG__LEVEL=debug`)
//!
//! # Charm YAML options
//!
//! Two options (`juju.accounts` and `juju.controllers`) hold entire YAML
//! documents as strings, mirroring the descriptor files the control-plane
//! client expects on disk. Both must parse to a mapping with a top-level
//! `controllers` key; [`Settings::validate`] enforces this.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;

// Include the default settings file as a string constant
const DEFAULT_SETTINGS: &str = include_str!("../default.toml");

/// Represents the main settings structure for the application
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Control-plane configuration
    pub juju: Juju,
    /// Backup orchestration configuration
    pub backup: Backup,
    /// Logging configuration
    pub log: Log,
}

/// Represents the control-plane configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Juju {
    /// YAML document describing the accounts used per controller
    pub accounts: String,
    /// YAML document describing the reachable controllers
    pub controllers: String,
    /// Comma-separated subset of controllers to back up (empty means all)
    pub controller_names: String,
    /// State root holding the client data (keys, cookies, descriptor files)
    pub data_dir: String,
}

/// Represents the backup orchestration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Backup {
    /// Directory backup artifacts are written to
    pub dir: String,
    /// Cron schedule expression for the scheduled run
    pub crontab: String,
    /// Days to keep backup artifacts (0 disables purging)
    pub retention_days: u32,
    /// Per-task timeout in seconds handed to the backup tool
    pub timeout: u64,
    /// Comma-separated controllers omitted from scheduled runs
    pub exclude_controllers: String,
    /// Comma-separated workload (charm) names excluded from backups
    pub exclude_charms: String,
    /// Whether the controllers themselves are backed up
    pub backup_controller: bool,
    /// Whether the client configuration is backed up
    pub backup_client_config: bool,
}

/// Represents the logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,
    /// Log format: "text" for human-readable, "json" for structured JSON
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

/// A single account record from the accounts YAML document
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Account {
    /// Username the key-push operation acts as on that controller
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ControllerMapDoc<T> {
    controllers: BTreeMap<String, T>,
}

impl Settings {
    /// Creates a new `Settings` instance
    ///
    /// # Arguments
    ///
    /// * `file` - An optional path to a configuration file
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the `Settings` instance or a `ConfigError`
    pub fn new(file: Option<String>) -> Result<Self, ConfigError> {
        // Start with default settings from the embedded TOML file
        let mut s = Config::builder()
            .add_source(File::from_str(DEFAULT_SETTINGS, config::FileFormat::Toml));

        // If a configuration file is provided, add it as a source
        s = match file {
            Some(x) => s.add_source(File::with_name(x.as_str())),
            None => s,
        };

        // Add environment variables as a source, prefixed with "JUJUBAK" and using "__" as a separator
        s = s.add_source(Environment::with_prefix("JUJUBAK").separator("__"));

        // Build the configuration
        let settings = s.build()?;

        // Deserialize the configuration into a Settings instance
        settings.try_deserialize()
    }

    /// Validates the charm YAML options.
    ///
    /// Both `juju.accounts` and `juju.controllers` must be YAML mappings
    /// carrying a top-level `controllers` key. The first offending option is
    /// reported by name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_controller_doc("juju.accounts", &self.juju.accounts)?;
        validate_controller_doc("juju.controllers", &self.juju.controllers)?;
        Ok(())
    }

    /// Parses `juju.accounts` into controller name -> account records.
    pub fn accounts(&self) -> Result<BTreeMap<String, Account>, ConfigError> {
        let doc: ControllerMapDoc<Account> =
            serde_yaml::from_str(&self.juju.accounts).map_err(|e| {
                ConfigError::Message(format!("invalid yaml for 'juju.accounts' option: {}", e))
            })?;
        Ok(doc.controllers)
    }

    /// Names of every controller described by `juju.controllers`.
    pub fn configured_controllers(&self) -> Result<Vec<String>, ConfigError> {
        yaml_controller_names(&self.juju.controllers)
    }
}

impl Juju {
    /// The configured controller subset as a list (empty when unset).
    pub fn controller_name_list(&self) -> Vec<String> {
        split_csv(&self.controller_names)
    }
}

impl Backup {
    /// Controllers omitted from scheduled runs, as a list.
    pub fn exclude_controller_list(&self) -> Vec<String> {
        split_csv(&self.exclude_controllers)
    }

    /// Excluded workload names, as a list.
    pub fn exclude_charm_list(&self) -> Vec<String> {
        split_csv(&self.exclude_charms)
    }
}

/// Checks that `content` is a YAML mapping with a top-level `controllers` key.
pub fn validate_controller_doc(name: &str, content: &str) -> Result<(), ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| ConfigError::Message(format!("invalid yaml for '{}' option: {}", name, e)))?;
    match value {
        serde_yaml::Value::Mapping(ref m)
            if m.contains_key(&serde_yaml::Value::String("controllers".to_string())) =>
        {
            Ok(())
        }
        _ => Err(ConfigError::Message(format!(
            "invalid yaml for '{}' option: expected a mapping with a 'controllers' key",
            name
        ))),
    }
}

/// Extracts the controller names (mapping keys) from a controllers YAML document.
pub fn yaml_controller_names(content: &str) -> Result<Vec<String>, ConfigError> {
    let doc: ControllerMapDoc<serde_yaml::Value> = serde_yaml::from_str(content)
        .map_err(|e| ConfigError::Message(format!("invalid controllers yaml: {}", e)))?;
    Ok(doc.controllers.keys().cloned().collect())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
