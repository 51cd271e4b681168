//! # Jujubak Agent
//!
//! Operational glue automating backup orchestration for a multi-controller
//! cluster-management platform. The agent provisions a local backup operator
//! (user, directories, ssh keypair), a cron schedule, and a monitoring check,
//! keeps the operator's ssh key authorized on every model of every configured
//! controller, and delegates the actual backup content capture to the
//! external `juju-backup-all` tool.
//!
//! ## Architecture
//!
//! - [`cli`] — clap subcommands (`setup`, `run`, `push-keys`, `check-results`)
//! - [`provision`] — user/directory/cron/script provisioning
//! - [`juju`] — seam over the control-plane client, with a `juju` CLI backend
//! - [`sshkeys`] — fingerprinting and sequential key fan-out with per-unit
//!   error capture
//! - [`backup`] — wrapper around the external backup tool plus retention purge
//! - [`results`] — results file written per run, consumed by the check
//! - [`nrpe`] — monitoring check registration
//!
//! ## Operation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Cron
//!     participant Agent
//!     participant Controller
//!
//!     Cron->>Agent: run --debug
//!     loop For each controller / model
//!         Agent->>Controller: fetch key fingerprints
//!         Agent->>Controller: add key when absent
//!     end
//!     Agent->>Agent: invoke backup tool
//!     Agent->>Agent: write results file
//! ```

pub mod backup;
pub mod cli;
pub mod juju;
pub mod nrpe;
pub mod paths;
pub mod provision;
pub mod results;
pub mod sshkeys;
