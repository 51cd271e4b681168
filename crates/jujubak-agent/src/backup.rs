/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Backup Processing Module
//!
//! Thin wrapper around the external `juju-backup-all` tool, which performs
//! the actual backup content capture and is treated as opaque. This module
//! derives the tool's configuration record from the agent settings, exposes
//! the controller set a run will touch, invokes the tool, and parses its JSON
//! report into per-controller results. It also owns the retention purge of
//! old backup artifacts.

use chrono::{TimeZone, Utc};
use jujubak_utils::config::yaml_controller_names;
use jujubak_utils::logging::prelude::*;
use jujubak_utils::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::process::Command;

type BackupError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration record handed to the backup tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Back up every controller described by the controllers document
    pub all_controllers: bool,
    /// Back up the controllers themselves
    pub backup_controller: bool,
    /// Back up the client configuration
    pub backup_client_config: bool,
    /// Explicit controller subset (ignored when `all_controllers`)
    pub controllers: Vec<String>,
    /// Workload (charm) names excluded from backups
    pub excluded_charms: Vec<String>,
    pub log_level: String,
    pub output_dir: PathBuf,
    /// Per-task timeout in seconds
    pub timeout: u64,
}

impl BackupConfig {
    /// Derives the record from the agent settings, the same way the charm
    /// options map onto the tool: an empty controller subset means all
    /// controllers, and the exclude flags invert into backup flags.
    pub fn from_settings(settings: &Settings) -> Self {
        let controllers = settings.juju.controller_name_list();
        Self {
            all_controllers: controllers.is_empty(),
            backup_controller: settings.backup.backup_controller,
            backup_client_config: settings.backup.backup_client_config,
            controllers,
            excluded_charms: settings.backup.exclude_charm_list(),
            log_level: settings.log.level.clone(),
            output_dir: PathBuf::from(&settings.backup.dir),
            timeout: settings.backup.timeout,
        }
    }
}

/// Per-controller results parsed from the tool's JSON report. The entries are
/// opaque to the agent and passed through into the results file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupResults {
    pub controllers: BTreeMap<String, serde_json::Value>,
}

/// Drives one invocation of the external backup tool.
pub struct BackupProcessor {
    config: BackupConfig,
    /// Controllers YAML document, used to expand `all_controllers`
    controllers_doc: String,
    tool_bin: PathBuf,
}

impl BackupProcessor {
    pub fn new(config: BackupConfig, controllers_doc: impl Into<String>) -> Self {
        Self {
            config,
            controllers_doc: controllers_doc.into(),
            tool_bin: PathBuf::from("juju-backup-all"),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            BackupConfig::from_settings(settings),
            settings.juju.controllers.clone(),
        )
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Overrides the per-task timeout (the scheduled run's `--task-timeout`).
    pub fn set_timeout(&mut self, timeout: u64) {
        self.config.timeout = timeout;
    }

    /// The set of controller names this run will touch: the configured
    /// subset, or every key of the controllers document when backing up all.
    pub fn controller_names(&self) -> Result<Vec<String>, BackupError> {
        if self.config.all_controllers {
            Ok(yaml_controller_names(&self.controllers_doc)?)
        } else {
            Ok(self.config.controllers.clone())
        }
    }

    /// Runs the tool against every non-omitted controller and parses its
    /// JSON report. Tool failure is an error to the caller.
    pub async fn process_backups(
        &self,
        omit_controllers: &[String],
    ) -> Result<BackupResults, BackupError> {
        let args = self.build_args(omit_controllers)?;
        info!("running {:?} {}", self.tool_bin, args.join(" "));

        let output = Command::new(&self.tool_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                error!("failed to spawn {:?}: {}", self.tool_bin, e);
                BackupError::from(format!("failed to spawn {:?}: {}", self.tool_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("backup tool failed with {}: {}", output.status, stderr.trim());
            return Err(format!(
                "backup tool failed with {}: {}",
                output.status,
                stderr.trim()
            )
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let controllers: BTreeMap<String, serde_json::Value> = serde_json::from_str(&stdout)
            .map_err(|e| {
                error!("failed to parse backup tool report: {}", e);
                BackupError::from(format!("invalid backup tool report: {}", e))
            })?;

        info!("backup results = '{:?}'", controllers);
        Ok(BackupResults { controllers })
    }

    /// Builds the tool invocation from the configuration record, with omitted
    /// controllers removed from the controller list.
    fn build_args(&self, omit_controllers: &[String]) -> Result<Vec<String>, BackupError> {
        let mut args = vec![
            "--output-dir".to_string(),
            self.config.output_dir.display().to_string(),
            "--timeout".to_string(),
            self.config.timeout.to_string(),
            "--log-level".to_string(),
            self.config.log_level.clone(),
            "--format".to_string(),
            "json".to_string(),
        ];
        if !self.config.backup_controller {
            args.push("--skip-controller-backup".to_string());
        }
        if !self.config.backup_client_config {
            args.push("--skip-client-config-backup".to_string());
        }
        for charm in &self.config.excluded_charms {
            args.push("--exclude-charm".to_string());
            args.push(charm.clone());
        }
        for controller in self.controller_names()? {
            if omit_controllers.contains(&controller) {
                debug!("omitting controller '{}' from backup run", controller);
                continue;
            }
            args.push("--controller".to_string());
            args.push(controller);
        }
        Ok(args)
    }
}

/// Deletes backup artifacts older than `retention_days`. Returns the number
/// of files removed. A zero threshold disables purging.
pub fn purge_old_backups(dir: &Path, retention_days: u32) -> Result<usize, BackupError> {
    if retention_days == 0 {
        return Ok(0);
    }
    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(retention_days) * 86_400);
    let mut removed = 0;
    purge_dir(dir, cutoff, &mut removed)?;
    info!(
        "purged {} backup artifacts older than {} days from {}",
        removed,
        retention_days,
        dir.display()
    );
    Ok(removed)
}

fn purge_dir(dir: &Path, cutoff: SystemTime, removed: &mut usize) -> Result<(), BackupError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            purge_dir(&path, cutoff, removed)?;
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if modified < cutoff {
            let stamp = modified
                .duration_since(SystemTime::UNIX_EPOCH)
                .ok()
                .and_then(|d| Utc.timestamp_opt(d.as_secs() as i64, 0).single());
            debug!(
                "purging '{}' (modified {:?})",
                path.display(),
                stamp
            );
            fs::remove_file(&path)?;
            *removed += 1;
        }
    }
    Ok(())
}
