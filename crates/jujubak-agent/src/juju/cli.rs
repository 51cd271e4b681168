/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! `juju` command-line implementation of the client seam.
//!
//! Every operation is one blocking invocation of the `juju` binary with
//! `JUJU_DATA` pointed at the agent's state root, so the acting account is
//! whichever one `accounts.yaml` configures for the controller. Nothing is
//! held open between invocations; dropping a handle releases nothing beyond
//! its own allocation.

use async_trait::async_trait;
use jujubak_utils::logging::prelude::*;
use std::path::PathBuf;
use tokio::process::Command;

use super::{ClientError, ControllerClient, ControllerHandle, ModelHandle};

/// Shared invocation context: binary location and state root.
#[derive(Debug, Clone)]
struct CliRunner {
    juju_bin: PathBuf,
    data_dir: PathBuf,
}

impl CliRunner {
    async fn run(&self, args: &[&str]) -> Result<String, ClientError> {
        debug!("running {:?} {}", self.juju_bin, args.join(" "));
        let output = Command::new(&self.juju_bin)
            .args(args)
            .env("JUJU_DATA", &self.data_dir)
            .output()
            .await
            .map_err(|e| {
                error!("failed to spawn {:?}: {}", self.juju_bin, e);
                ClientError::from(format!("failed to spawn {:?}: {}", self.juju_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "juju {} failed with {}: {}",
                args.first().unwrap_or(&""),
                output.status,
                stderr.trim()
            )
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Production client shelling out to the `juju` CLI.
#[derive(Debug, Clone)]
pub struct JujuCliClient {
    runner: CliRunner,
}

impl JujuCliClient {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_binary("juju", data_dir)
    }

    pub fn with_binary(juju_bin: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner: CliRunner {
                juju_bin: juju_bin.into(),
                data_dir: data_dir.into(),
            },
        }
    }
}

#[async_trait]
impl ControllerClient for JujuCliClient {
    async fn connect_controller(
        &self,
        name: &str,
    ) -> Result<Box<dyn ControllerHandle>, ClientError> {
        // show-controller both validates the name and proves reachability
        self.runner
            .run(&["show-controller", name, "--format", "json"])
            .await?;
        Ok(Box::new(CliController {
            runner: self.runner.clone(),
            name: name.to_string(),
        }))
    }
}

struct CliController {
    runner: CliRunner,
    name: String,
}

#[async_trait]
impl ControllerHandle for CliController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let stdout = self
            .runner
            .run(&["models", "-c", &self.name, "--all", "--format", "json"])
            .await?;
        let doc: serde_json::Value = serde_json::from_str(&stdout).map_err(|e| {
            error!("failed to parse model listing for '{}': {}", self.name, e);
            ClientError::from(format!("invalid model listing: {}", e))
        })?;

        let models = doc
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| ClientError::from("model listing missing 'models' array"))?;

        let mut names = Vec::with_capacity(models.len());
        for model in models {
            let name = model
                .get("short-name")
                .or_else(|| model.get("name"))
                .and_then(|n| n.as_str())
                .ok_or_else(|| ClientError::from("model entry missing name"))?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    async fn connect_model(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, ClientError> {
        let qualified = format!("{}:{}", self.name, model_name);
        self.runner
            .run(&["show-model", &qualified, "--format", "json"])
            .await?;
        Ok(Box::new(CliModel {
            runner: self.runner.clone(),
            qualified,
            name: model_name.to_string(),
        }))
    }
}

struct CliModel {
    runner: CliRunner,
    qualified: String,
    name: String,
}

#[async_trait]
impl ModelHandle for CliModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ssh_key_fingerprints(&self) -> Result<Vec<String>, ClientError> {
        let stdout = self
            .runner
            .run(&["ssh-keys", "-m", &self.qualified])
            .await?;
        Ok(parse_ssh_keys_output(&stdout))
    }

    async fn add_ssh_key(&self, username: &str, pubkey: &str) -> Result<(), ClientError> {
        // The CLI acts as the account selected by JUJU_DATA; the username is
        // logged so runs can be correlated with accounts.yaml.
        debug!(
            "adding ssh key for user '{}' on model '{}'",
            username, self.qualified
        );
        self.runner
            .run(&["add-ssh-key", "-m", &self.qualified, pubkey])
            .await?;
        Ok(())
    }
}

/// Parses `juju ssh-keys` output: a "Keys used in model:" banner followed by
/// one fingerprint per line, or a "No keys" notice when the model has none.
fn parse_ssh_keys_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("Keys used in model") && !line.starts_with("No keys")
        })
        .map(str::to_string)
        .collect()
}
