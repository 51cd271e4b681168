/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # CLI Commands Module
//!
//! Implements the command-line interface for the jujubak agent.
//!
//! Every command follows the same startup sequence:
//! 1. Load configuration
//! 2. Initialize logging
//! 3. Do the work
//!
//! `setup` is the provisioning pass run at install/config-change time, `run`
//! is the scheduled job invoked from cron through the rendered wrapper
//! script, `push-keys` is the standalone key propagation action and
//! `check-results` is the nagios plugin over the results file.

use jujubak_utils::logging::prelude::*;
use jujubak_utils::Settings;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::backup::{purge_old_backups, BackupProcessor};
use crate::juju::JujuCliClient;
use crate::paths::Paths;
use crate::results::{self, RunReport};
use crate::{nrpe, provision, sshkeys};

type CommandError = Box<dyn std::error::Error + Send + Sync>;

pub async fn setup(config_file: Option<String>) -> Result<(), CommandError> {
    let config = Settings::new(config_file.clone())?;
    jujubak_utils::logging::init_with_format(&config.log.level, &config.log.format)
        .expect("Failed to initialize logger");
    info!("Starting jujubak setup");

    config.validate()?;
    let paths = Paths::new(&config.juju.data_dir);
    let agent_bin = std::env::current_exe()
        .unwrap_or_else(|_| PathBuf::from("/usr/local/bin/jujubak-agent"));
    let saved_config = config_file
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.agent_config.clone());

    provision::create_backup_user(&paths)?;
    provision::create_backup_dir(&config)?;
    provision::init_data_dir(&paths)?;
    provision::write_data_config(&config, &paths)?;
    provision::deploy_backup_script(&paths, &agent_bin, &saved_config)?;
    provision::update_crontab(&config, &paths)?;
    nrpe::configure_check(&paths, &agent_bin)?;
    provision::chown_recursive(&paths.data_dir)?;

    info!("Setup complete");
    Ok(())
}

pub async fn run(
    config_file: Option<String>,
    debug: bool,
    purge: Option<u32>,
    task_timeout: Option<u64>,
    omit_controllers: Vec<String>,
) -> Result<(), CommandError> {
    let config = Settings::new(config_file)?;
    let level = if debug {
        "debug"
    } else {
        config.log.level.as_str()
    };
    jujubak_utils::logging::init_with_format(level, &config.log.format)
        .expect("Failed to initialize logger");
    info!("Starting scheduled backup run");

    config.validate()?;
    let paths = Paths::new(&config.juju.data_dir);

    let mut processor = BackupProcessor::from_settings(&config);
    if let Some(timeout) = task_timeout {
        processor.set_timeout(timeout);
    }

    // Keys go out first so freshly added models are reachable for the backup
    // tool; per-unit failures land in the report, never abort the run.
    let key_push_report = push_key_report(&config, &paths).await?;

    let mut backup_errors = Vec::new();
    let controllers = match processor.process_backups(&omit_controllers).await {
        Ok(results) => results.controllers,
        Err(e) => {
            error!("backup processing failed: {}", e);
            backup_errors.push(e.to_string());
            BTreeMap::new()
        }
    };

    let failed = !backup_errors.is_empty();
    let report = RunReport::new(controllers, backup_errors, key_push_report.errors);
    report.write(&paths.results_file)?;
    info!("results written to {}", paths.results_file.display());

    if let Some(days) = purge {
        purge_old_backups(std::path::Path::new(&config.backup.dir), days)?;
    }
    provision::chown_recursive(std::path::Path::new(&config.backup.dir))?;

    if failed {
        return Err("backup run recorded errors; see results file".into());
    }
    info!("Scheduled backup run complete");
    Ok(())
}

pub async fn push_keys(config_file: Option<String>) -> Result<(), CommandError> {
    let config = Settings::new(config_file)?;
    jujubak_utils::logging::init_with_format(&config.log.level, &config.log.format)
        .expect("Failed to initialize logger");
    info!("Pushing operator ssh keys");

    config.validate()?;
    let paths = Paths::new(&config.juju.data_dir);
    let report = push_key_report(&config, &paths).await?;

    info!(
        "key push finished: {} added, {} skipped, {} errors",
        report.added.len(),
        report.skipped.len(),
        report.errors.len()
    );
    Ok(())
}

pub fn check_results(
    config_file: Option<String>,
    results_file: Option<PathBuf>,
    max_age_hours: i64,
) -> Result<i32, CommandError> {
    let config = Settings::new(config_file)?;
    let paths = Paths::new(&config.juju.data_dir);
    let path = results_file.unwrap_or(paths.results_file);

    let (status, message) = results::evaluate(&path, max_age_hours, chrono::Utc::now());
    println!("{}: {}", status.label(), message);
    Ok(status.exit_code())
}

/// Shared key propagation step: read the operator pubkey, resolve accounts
/// and the controller set, fan out.
async fn push_key_report(
    config: &Settings,
    paths: &Paths,
) -> Result<sshkeys::KeyPushReport, CommandError> {
    let pubkey = fs::read_to_string(&paths.ssh_public_key).map_err(|e| {
        error!(
            "cannot read operator public key {}: {}",
            paths.ssh_public_key.display(),
            e
        );
        CommandError::from(format!(
            "cannot read operator public key {}: {}",
            paths.ssh_public_key.display(),
            e
        ))
    })?;

    let accounts = config.accounts()?;
    let processor = BackupProcessor::from_settings(config);
    let controller_names = processor.controller_names()?;
    let client = JujuCliClient::new(&config.juju.data_dir);

    sshkeys::push_ssh_keys(&client, &controller_names, &accounts, pubkey.trim()).await
}
