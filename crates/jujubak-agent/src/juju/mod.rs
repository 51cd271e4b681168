/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Control-Plane Client Module
//!
//! Seam over the remote administration client. The agent only needs four
//! operations from the control plane: connect to a controller, list its
//! models, connect to a model, and read/add authorized ssh keys on it. The
//! traits below capture exactly that surface so the fan-out logic can be
//! exercised against a mock, while [`cli::JujuCliClient`] provides the
//! production implementation over the `juju` command-line client.
//!
//! Handles are owned, scoped resources: dropping one releases whatever the
//! implementation holds for that unit. Callers connect, use the handle within
//! one unit of work, and let it drop before moving to the next unit.

pub mod cli;

use async_trait::async_trait;

pub use cli::JujuCliClient;

/// Error type used across the client seam. `Send + Sync` so errors can cross
/// await points and land in per-unit reports.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Entry point into the control plane.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    /// Establishes a connection to the named controller.
    async fn connect_controller(
        &self,
        name: &str,
    ) -> Result<Box<dyn ControllerHandle>, ClientError>;
}

/// A live connection to one controller.
#[async_trait]
pub trait ControllerHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Lists the models hosted on this controller.
    async fn list_models(&self) -> Result<Vec<String>, ClientError>;

    /// Establishes a model-scoped connection.
    async fn connect_model(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, ClientError>;
}

/// A live connection to one model of a controller.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Fingerprints of the keys currently authorized on the model, in the
    /// control plane's own fingerprint convention. Empty when none.
    async fn ssh_key_fingerprints(&self) -> Result<Vec<String>, ClientError>;

    /// Registers `pubkey` as an authorized key under `username`.
    async fn add_ssh_key(&self, username: &str, pubkey: &str) -> Result<(), ClientError>;
}
