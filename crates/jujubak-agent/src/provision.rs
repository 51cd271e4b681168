/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Provisioning Module
//!
//! Host-level setup for the backup operator: local user, directories, ssh
//! keypair, control-plane descriptor files, the rendered cron wrapper script
//! and the cron definition itself. All of it is simple file and subprocess
//! glue; subprocess failures (`useradd`, `ssh-keygen`, `chown`) are logged
//! and re-raised as fatal.

use jujubak_utils::logging::prelude::*;
use jujubak_utils::Settings;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use tera::{Context, Tera};

use crate::backup::BackupConfig;
use crate::paths::Paths;

type ProvisionError = Box<dyn std::error::Error + Send + Sync>;

/// Local account the backup state and artifacts belong to.
pub const BACKUP_USERNAME: &str = "jujubak";

const RUN_SCRIPT_TEMPLATE: &str = include_str!("../templates/jujubak-run.sh.tera");

/// Creates the state root and the backup system user when absent.
pub fn create_backup_user(paths: &Paths) -> Result<(), ProvisionError> {
    if !paths.data_dir.exists() {
        fs::create_dir_all(&paths.data_dir)?;
    }

    if !user_exists(BACKUP_USERNAME) {
        info!("creating backup user '{}'", BACKUP_USERNAME);
        run_tool(
            "useradd",
            &[
                "--system",
                "--home-dir",
                &paths.data_dir.display().to_string(),
                "--shell",
                "/usr/sbin/nologin",
                BACKUP_USERNAME,
            ],
        )?;
    }
    Ok(())
}

/// Creates the backup output directory and hands it to the backup user.
pub fn create_backup_dir(settings: &Settings) -> Result<(), ProvisionError> {
    let backup_dir = Path::new(&settings.backup.dir);
    if !backup_dir.exists() {
        fs::create_dir_all(backup_dir)?;
        chown_recursive(backup_dir)?;
    }
    Ok(())
}

/// Creates the ssh and cookie directories and generates the operator keypair
/// when missing. Finishes with a recursive chown of the state root.
pub fn init_data_dir(paths: &Paths) -> Result<(), ProvisionError> {
    fs::create_dir_all(&paths.ssh_dir)?;
    fs::create_dir_all(&paths.cookies_dir)?;

    if !paths.ssh_private_key.exists() {
        let keyname = format!("{}@{}", BACKUP_USERNAME, local_hostname());
        debug!("ssh key doesn't exist, creating it...");
        run_tool(
            "ssh-keygen",
            &[
                "-t",
                "rsa",
                "-b",
                "2048",
                "-f",
                &paths.ssh_private_key.display().to_string(),
                "-C",
                &keyname,
                "-N",
                "",
            ],
        )?;
    }

    chown_recursive(&paths.data_dir)
}

/// Writes the controller/account descriptor files, one cookie placeholder per
/// controller, and the saved backup tool configuration.
///
/// The cookie files must exist up front or the client library goes looking
/// for a jar under $HOME and fails.
pub fn write_data_config(settings: &Settings, paths: &Paths) -> Result<(), ProvisionError> {
    fs::create_dir_all(&paths.data_dir)?;
    fs::create_dir_all(&paths.cookies_dir)?;

    fs::write(paths.data_dir.join("controllers.yaml"), &settings.juju.controllers)?;
    fs::write(paths.data_dir.join("accounts.yaml"), &settings.juju.accounts)?;

    for controller_name in settings.configured_controllers()? {
        debug!("writing cookie file for controller: '{}'", controller_name);
        fs::write(paths.cookie_file(&controller_name), "null")?;
    }

    let tool_config = serde_yaml::to_string(&BackupConfig::from_settings(settings))?;
    fs::write(&paths.tool_config, tool_config)?;
    Ok(())
}

/// Renders and installs the cron wrapper script, mode 0755.
pub fn deploy_backup_script(
    paths: &Paths,
    agent_bin: &Path,
    config_file: &Path,
) -> Result<(), ProvisionError> {
    debug!("templating and deploying the run script");
    let mut tera = Tera::default();
    tera.add_raw_template("jujubak-run", RUN_SCRIPT_TEMPLATE)?;

    let mut context = Context::new();
    context.insert("data_dir", &paths.data_dir.display().to_string());
    context.insert("agent_bin", &agent_bin.display().to_string());
    context.insert("config_file", &config_file.display().to_string());
    let script = tera.render("jujubak-run", &context)?;

    if let Some(parent) = paths.backup_script.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&paths.backup_script, script)?;
    fs::set_permissions(&paths.backup_script, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Builds the cron line for the scheduled run. Optional fragments appear only
/// when the corresponding setting is non-zero/non-empty.
pub fn build_cron_line(settings: &Settings, paths: &Paths) -> String {
    let mut cron_job = format!(
        "PATH=/usr/bin:/bin:/snap/bin\n{} root {} --debug",
        settings.backup.crontab,
        paths.backup_script.display()
    );

    if settings.backup.retention_days > 0 {
        cron_job.push_str(&format!(" --purge {}", settings.backup.retention_days));
    }

    if settings.backup.timeout > 0 {
        cron_job.push_str(&format!(" --task-timeout {}", settings.backup.timeout));
    }

    for controller in settings.backup.exclude_controller_list() {
        cron_job.push_str(&format!(" --omit-controller {}", controller));
    }

    cron_job.push_str(&format!(" >> {} 2>&1\n", paths.run_log.display()));
    cron_job
}

/// Writes the cron definition file.
pub fn update_crontab(settings: &Settings, paths: &Paths) -> Result<(), ProvisionError> {
    if let Some(parent) = paths.cron_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&paths.cron_file, build_cron_line(settings, paths))?;
    Ok(())
}

/// Recursively hands `path` to the backup user.
pub fn chown_recursive(path: &Path) -> Result<(), ProvisionError> {
    run_tool(
        "chown",
        &[
            "-R",
            &format!("{}:{}", BACKUP_USERNAME, BACKUP_USERNAME),
            &path.display().to_string(),
        ],
    )
}

fn user_exists(username: &str) -> bool {
    Command::new("id")
        .args(["-u", username])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn local_hostname() -> String {
    Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn run_tool(tool: &str, args: &[&str]) -> Result<(), ProvisionError> {
    let output = Command::new(tool).args(args).output().map_err(|e| {
        error!("failed to spawn '{}': {}", tool, e);
        ProvisionError::from(format!("failed to spawn '{}': {}", tool, e))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("'{}' failed with {}: {}", tool, output.status, stderr.trim());
        return Err(format!("'{}' failed with {}: {}", tool, output.status, stderr.trim()).into());
    }
    Ok(())
}
