/// Filesystem layout used by the agent.
use std::path::{Path, PathBuf};

/// Well-known paths derived from the configured state root.
///
/// System-level locations (cron file, nagios dirs) default to their
/// conventional places; all fields are public so tests can reroot them.
#[derive(Debug, Clone)]
pub struct Paths {
    /// State root for the control-plane client (JUJU_DATA)
    pub data_dir: PathBuf,
    /// SSH material for the backup operator
    pub ssh_dir: PathBuf,
    /// Cookie jar directory expected by the client library
    pub cookies_dir: PathBuf,
    pub ssh_private_key: PathBuf,
    pub ssh_public_key: PathBuf,
    /// Saved backup tool configuration consumed by the scheduled run
    pub tool_config: PathBuf,
    /// Agent configuration saved at setup time and referenced from cron
    pub agent_config: PathBuf,
    /// Rendered wrapper script invoked from cron
    pub backup_script: PathBuf,
    /// Cron definition file
    pub cron_file: PathBuf,
    /// Results file written by the scheduled run, read by the check
    pub results_file: PathBuf,
    /// Log file the cron line redirects into
    pub run_log: PathBuf,
    /// Directory nagios plugins are installed into
    pub nagios_plugins_dir: PathBuf,
    /// NRPE check definition file
    pub nrpe_check_file: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let ssh_dir = data_dir.join("ssh");
        Self {
            ssh_private_key: ssh_dir.join("juju_id_rsa"),
            ssh_public_key: ssh_dir.join("juju_id_rsa.pub"),
            cookies_dir: data_dir.join("cookies"),
            tool_config: data_dir.join("backup-config.yaml"),
            agent_config: data_dir.join("agent.toml"),
            results_file: data_dir.join("auto_backup_results.json"),
            ssh_dir,
            data_dir,
            backup_script: PathBuf::from("/usr/local/bin/jujubak-run"),
            cron_file: PathBuf::from("/etc/cron.d/jujubak"),
            run_log: PathBuf::from("/var/log/jujubak.log"),
            nagios_plugins_dir: PathBuf::from("/usr/local/lib/nagios/plugins"),
            nrpe_check_file: PathBuf::from("/etc/nagios/nrpe.d/check_jujubak.cfg"),
        }
    }

    /// Cookie file location for one controller.
    pub fn cookie_file(&self, controller: &str) -> PathBuf {
        self.cookies_dir.join(format!("{}.json", controller))
    }

    /// Reroots every system-level path under `root`, for tests.
    pub fn with_system_root(mut self, root: &Path) -> Self {
        self.backup_script = root.join("jujubak-run");
        self.cron_file = root.join("cron.d/jujubak");
        self.run_log = root.join("jujubak.log");
        self.nagios_plugins_dir = root.join("nagios/plugins");
        self.nrpe_check_file = root.join("nrpe.d/check_jujubak.cfg");
        self
    }
}
