/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Monitoring check registration. Installs a small shim into the nagios
//! plugin directory that execs `jujubak-agent check-results` against the
//! results file, and writes the matching NRPE check definition.

use jujubak_utils::logging::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::paths::Paths;

type NrpeError = Box<dyn std::error::Error + Send + Sync>;

pub const CHECK_NAME: &str = "check_jujubak_backup_results";

/// Installs the plugin shim and the NRPE check definition.
pub fn configure_check(paths: &Paths, agent_bin: &Path) -> Result<(), NrpeError> {
    debug!("deploying the nagios check");
    let plugin_path = paths.nagios_plugins_dir.join(CHECK_NAME);

    fs::create_dir_all(&paths.nagios_plugins_dir)?;
    let shim = format!(
        "#!/bin/sh\nexec {} check-results --results-file {}\n",
        agent_bin.display(),
        paths.results_file.display()
    );
    fs::write(&plugin_path, shim)?;
    fs::set_permissions(&plugin_path, fs::Permissions::from_mode(0o755))?;

    if let Some(parent) = paths.nrpe_check_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let definition = format!(
        "# check results file generated by the jujubak scheduled run\n\
         command[{}]={}\n",
        CHECK_NAME,
        plugin_path.display()
    );
    fs::write(&paths.nrpe_check_file, definition)?;

    info!(
        "nagios check '{}' registered at {}",
        CHECK_NAME,
        paths.nrpe_check_file.display()
    );
    Ok(())
}
