/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # SSH Key Propagation Module
//!
//! Ensures the backup operator's public key is authorized on every model of
//! every configured controller, deduplicating by fingerprint. Controllers and
//! models are visited strictly sequentially with one call outstanding at a
//! time. A failing model never aborts its sibling models and a failing
//! controller never aborts its sibling controllers: per-unit errors are
//! logged, captured into the [`KeyPushReport`], and the operation completes
//! regardless.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use jujubak_utils::logging::prelude::*;
use jujubak_utils::Account;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::juju::{ClientError, ControllerClient, ControllerHandle};

/// One captured per-unit failure. `model` is `None` for controller-level
/// failures (connect or model listing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyPushError {
    pub controller: String,
    pub model: Option<String>,
    pub error: String,
}

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyPushReport {
    /// Qualified model names (`controller:model`) the key was added to
    pub added: Vec<String>,
    /// Qualified model names where the fingerprint was already present
    pub skipped: Vec<String>,
    /// Per-unit failures; never fatal to the pass
    pub errors: Vec<KeyPushError>,
}

/// Computes the fingerprint of a public key line in the control plane's own
/// convention: lowercase hex MD5 of the decoded key body, a colon between
/// every byte pair, then the key comment in parentheses.
///
/// The line must have exactly three whitespace-separated fields (type, base64
/// body, comment); anything else is a fatal input error.
pub fn ssh_key_fingerprint(raw_pubkey: &str) -> Result<String, ClientError> {
    let fields: Vec<&str> = raw_pubkey.split_whitespace().collect();
    if fields.len() != 3 {
        error!("invalid ssh pubkey: {}", raw_pubkey);
        return Err(format!(
            "invalid ssh pubkey: expected 3 fields, got {}",
            fields.len()
        )
        .into());
    }
    let (body, comment) = (fields[1], fields[2]);

    let key = BASE64
        .decode(body)
        .map_err(|e| format!("invalid ssh pubkey body: {}", e))?;
    let digest = hex::encode(Md5::digest(&key));
    let pairs: Vec<String> = digest
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|pair| pair.iter().collect())
        .collect();
    Ok(format!("{} ({})", pairs.join(":"), comment))
}

/// Pushes `pubkey` to every model of every controller in `controller_names`.
///
/// Only a malformed candidate key is fatal; every remote failure is captured
/// in the returned report.
pub async fn push_ssh_keys(
    client: &dyn ControllerClient,
    controller_names: &[String],
    accounts: &BTreeMap<String, Account>,
    pubkey: &str,
) -> Result<KeyPushReport, ClientError> {
    let fingerprint = ssh_key_fingerprint(pubkey)?;
    let mut report = KeyPushReport::default();

    for controller_name in controller_names {
        match client.connect_controller(controller_name).await {
            Ok(controller) => {
                debug!("processing controller: {}", controller_name);
                match controller.list_models().await {
                    Ok(model_names) => {
                        for model_name in model_names {
                            if let Err(e) = push_to_model(
                                controller.as_ref(),
                                model_name.as_str(),
                                accounts,
                                &fingerprint,
                                pubkey,
                                &mut report,
                            )
                            .await
                            {
                                error!(
                                    "failed to push key to model '{}:{}': {}",
                                    controller_name, model_name, e
                                );
                                report.errors.push(KeyPushError {
                                    controller: controller_name.clone(),
                                    model: Some(model_name.clone()),
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    Err(e) => {
                        error!(
                            "failed to list models on controller '{}': {}",
                            controller_name, e
                        );
                        report.errors.push(KeyPushError {
                            controller: controller_name.clone(),
                            model: None,
                            error: e.to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                error!("failed to connect to controller '{}': {}", controller_name, e);
                report.errors.push(KeyPushError {
                    controller: controller_name.clone(),
                    model: None,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "key push complete: {} added, {} skipped, {} errors",
        report.added.len(),
        report.skipped.len(),
        report.errors.len()
    );
    Ok(report)
}

/// Handles one model: the model handle is acquired here and dropped on
/// return, success or failure, before the caller moves to the next unit.
async fn push_to_model(
    controller: &dyn ControllerHandle,
    model_name: &str,
    accounts: &BTreeMap<String, Account>,
    fingerprint: &str,
    pubkey: &str,
    report: &mut KeyPushReport,
) -> Result<(), ClientError> {
    debug!("connecting to model: '{}'", model_name);
    let model = controller.connect_model(model_name).await?;
    debug!("processing model: {}", model_name);

    let username = accounts
        .get(controller.name())
        .map(|account| account.user.as_str())
        .ok_or_else(|| {
            format!(
                "no account configured for controller '{}'",
                controller.name()
            )
        })?;

    let qualified = format!("{}:{}", controller.name(), model_name);
    let existing = model.ssh_key_fingerprints().await?;
    if existing.iter().any(|fp| fp == fingerprint) {
        debug!("key for user '{}' already present, skipping", username);
        report.skipped.push(qualified);
    } else {
        debug!("ssh key missing for user '{}', adding it", username);
        model.add_ssh_key(username, pubkey).await?;
        report.added.push(qualified);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::juju::ModelHandle;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    const PUBKEY: &str = "ssh-rsa anVqdWJhayB0ZXN0IGtleSBtYXRlcmlhbA== jujubak@host";
    const PUBKEY_FP: &str = "f2:62:b4:75:cd:ae:f9:59:86:ca:ae:c5:db:eb:ba:6f (jujubak@host)";

    #[test]
    fn test_fingerprint_reference_vector() {
        assert_eq!(ssh_key_fingerprint(PUBKEY).unwrap(), PUBKEY_FP);
    }

    #[test]
    fn test_fingerprint_second_vector() {
        let raw = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAAAgQC4 jujubak@backup-0";
        assert_eq!(
            ssh_key_fingerprint(raw).unwrap(),
            "3b:b2:f6:ca:9f:85:55:72:09:18:81:69:37:d1:30:c7 (jujubak@backup-0)"
        );
    }

    #[test]
    fn test_fingerprint_rejects_wrong_field_count() {
        assert!(ssh_key_fingerprint("ssh-rsa AAAA").is_err());
        assert!(ssh_key_fingerprint("ssh-rsa AAAA comment extra").is_err());
        assert!(ssh_key_fingerprint("").is_err());
    }

    #[test]
    fn test_fingerprint_rejects_bad_base64() {
        assert!(ssh_key_fingerprint("ssh-rsa not!base64 comment").is_err());
    }

    // -- mock client -------------------------------------------------------

    #[derive(Clone, Default)]
    struct ModelFixture {
        fingerprints: Vec<String>,
        fail_connect: bool,
        fail_fetch: bool,
    }

    #[derive(Default)]
    struct Recorder {
        added: Vec<(String, String, String)>, // (controller, model, user)
        visited_models: Vec<String>,          // qualified names
    }

    #[derive(Default)]
    struct MockClient {
        // controller -> ordered (model name, fixture)
        controllers: BTreeMap<String, Vec<(String, ModelFixture)>>,
        unreachable: Vec<String>,
        list_fails: Vec<String>,
        recorder: Arc<Mutex<Recorder>>,
    }

    #[async_trait]
    impl ControllerClient for MockClient {
        async fn connect_controller(
            &self,
            name: &str,
        ) -> Result<Box<dyn crate::juju::ControllerHandle>, ClientError> {
            if self.unreachable.iter().any(|c| c == name) {
                return Err(format!("controller '{}' unreachable", name).into());
            }
            let models = self
                .controllers
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown controller '{}'", name))?;
            Ok(Box::new(MockController {
                name: name.to_string(),
                models,
                fail_list: self.list_fails.iter().any(|c| c == name),
                recorder: self.recorder.clone(),
            }))
        }
    }

    struct MockController {
        name: String,
        models: Vec<(String, ModelFixture)>,
        fail_list: bool,
        recorder: Arc<Mutex<Recorder>>,
    }

    #[async_trait]
    impl ControllerHandle for MockController {
        fn name(&self) -> &str {
            &self.name
        }

        async fn list_models(&self) -> Result<Vec<String>, ClientError> {
            if self.fail_list {
                return Err("model listing failed".into());
            }
            Ok(self.models.iter().map(|(name, _)| name.clone()).collect())
        }

        async fn connect_model(
            &self,
            model_name: &str,
        ) -> Result<Box<dyn ModelHandle>, ClientError> {
            let (_, fixture) = self
                .models
                .iter()
                .find(|(name, _)| name == model_name)
                .ok_or_else(|| format!("unknown model '{}'", model_name))?;
            if fixture.fail_connect {
                return Err(format!("model '{}' unreachable", model_name).into());
            }
            self.recorder
                .lock()
                .unwrap()
                .visited_models
                .push(format!("{}:{}", self.name, model_name));
            Ok(Box::new(MockModel {
                controller: self.name.clone(),
                name: model_name.to_string(),
                fixture: fixture.clone(),
                recorder: self.recorder.clone(),
            }))
        }
    }

    struct MockModel {
        controller: String,
        name: String,
        fixture: ModelFixture,
        recorder: Arc<Mutex<Recorder>>,
    }

    #[async_trait]
    impl ModelHandle for MockModel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn ssh_key_fingerprints(&self) -> Result<Vec<String>, ClientError> {
            if self.fixture.fail_fetch {
                return Err("key fetch failed".into());
            }
            Ok(self.fixture.fingerprints.clone())
        }

        async fn add_ssh_key(&self, username: &str, _pubkey: &str) -> Result<(), ClientError> {
            self.recorder.lock().unwrap().added.push((
                self.controller.clone(),
                self.name.clone(),
                username.to_string(),
            ));
            Ok(())
        }
    }

    fn accounts_for(controllers: &[&str]) -> BTreeMap<String, Account> {
        controllers
            .iter()
            .map(|c| {
                (
                    c.to_string(),
                    Account {
                        user: "admin".to_string(),
                        password: None,
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_push_skips_model_with_key_present() {
        let mut client = MockClient::default();
        client.controllers.insert(
            "lxd-a".to_string(),
            vec![(
                "default".to_string(),
                ModelFixture {
                    fingerprints: vec![PUBKEY_FP.to_string()],
                    ..Default::default()
                },
            )],
        );
        let recorder = client.recorder.clone();

        let report = push_ssh_keys(
            &client,
            &["lxd-a".to_string()],
            &accounts_for(&["lxd-a"]),
            PUBKEY,
        )
        .await
        .unwrap();

        assert!(recorder.lock().unwrap().added.is_empty());
        assert_eq!(report.skipped, vec!["lxd-a:default"]);
        assert!(report.added.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_push_adds_key_exactly_once_when_absent() {
        let mut client = MockClient::default();
        client.controllers.insert(
            "lxd-a".to_string(),
            vec![(
                "default".to_string(),
                ModelFixture {
                    fingerprints: vec!["aa:bb (someone@else)".to_string()],
                    ..Default::default()
                },
            )],
        );
        let recorder = client.recorder.clone();

        let report = push_ssh_keys(
            &client,
            &["lxd-a".to_string()],
            &accounts_for(&["lxd-a"]),
            PUBKEY,
        )
        .await
        .unwrap();

        let added = recorder.lock().unwrap().added.clone();
        assert_eq!(
            added,
            vec![(
                "lxd-a".to_string(),
                "default".to_string(),
                "admin".to_string()
            )]
        );
        assert_eq!(report.added, vec!["lxd-a:default"]);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_does_not_abort_siblings() {
        // controller A: model b fails, model c must still be processed;
        // controller D must still be processed afterwards.
        let mut client = MockClient::default();
        client.controllers.insert(
            "ctrl-a".to_string(),
            vec![
                (
                    "model-b".to_string(),
                    ModelFixture {
                        fail_fetch: true,
                        ..Default::default()
                    },
                ),
                ("model-c".to_string(), ModelFixture::default()),
            ],
        );
        client
            .controllers
            .insert("ctrl-d".to_string(), vec![("default".to_string(), ModelFixture::default())]);
        let recorder = client.recorder.clone();

        let report = push_ssh_keys(
            &client,
            &["ctrl-a".to_string(), "ctrl-d".to_string()],
            &accounts_for(&["ctrl-a", "ctrl-d"]),
            PUBKEY,
        )
        .await
        .unwrap();

        let added = recorder.lock().unwrap().added.clone();
        assert_eq!(added.len(), 2);
        assert_eq!(report.added, vec!["ctrl-a:model-c", "ctrl-d:default"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].controller, "ctrl-a");
        assert_eq!(report.errors[0].model.as_deref(), Some("model-b"));
    }

    #[tokio::test]
    async fn test_controller_failure_does_not_abort_siblings() {
        let mut client = MockClient::default();
        client.unreachable.push("ctrl-down".to_string());
        client
            .controllers
            .insert("ctrl-up".to_string(), vec![("default".to_string(), ModelFixture::default())]);
        let recorder = client.recorder.clone();

        let report = push_ssh_keys(
            &client,
            &["ctrl-down".to_string(), "ctrl-up".to_string()],
            &accounts_for(&["ctrl-down", "ctrl-up"]),
            PUBKEY,
        )
        .await
        .unwrap();

        assert_eq!(recorder.lock().unwrap().added.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].controller, "ctrl-down");
        assert!(report.errors[0].model.is_none());
    }

    #[tokio::test]
    async fn test_model_listing_failure_is_captured() {
        let mut client = MockClient::default();
        client.controllers.insert("ctrl-a".to_string(), vec![]);
        client.list_fails.push("ctrl-a".to_string());

        let report = push_ssh_keys(
            &client,
            &["ctrl-a".to_string()],
            &accounts_for(&["ctrl-a"]),
            PUBKEY,
        )
        .await
        .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].error.contains("model listing failed"));
    }

    #[tokio::test]
    async fn test_missing_account_is_per_model_error() {
        let mut client = MockClient::default();
        client
            .controllers
            .insert("ctrl-a".to_string(), vec![("default".to_string(), ModelFixture::default())]);
        let recorder = client.recorder.clone();

        let report = push_ssh_keys(
            &client,
            &["ctrl-a".to_string()],
            &BTreeMap::new(),
            PUBKEY,
        )
        .await
        .unwrap();

        assert!(recorder.lock().unwrap().added.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].error.contains("no account configured"));
    }

    #[tokio::test]
    async fn test_malformed_key_is_fatal() {
        let client = MockClient::default();
        let result = push_ssh_keys(
            &client,
            &["ctrl-a".to_string()],
            &BTreeMap::new(),
            "only-one-field",
        )
        .await;
        assert!(result.is_err());
    }
}
