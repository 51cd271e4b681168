/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Results file written at the end of every scheduled run and consumed by the
//! `check-results` nagios plugin. Key-push failures are recorded here so the
//! monitoring side can distinguish "all keys propagated" from "some silently
//! failed" even though the run itself never aborts on them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::sshkeys::KeyPushError;

type ResultsError = Box<dyn std::error::Error + Send + Sync>;

/// Everything one scheduled run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub completed_at: DateTime<Utc>,
    /// Opaque per-controller results from the backup tool
    pub controllers: BTreeMap<String, serde_json::Value>,
    /// Fatal-to-the-run backup failures (tool errors)
    pub backup_errors: Vec<String>,
    /// Captured per-unit key propagation failures
    pub key_push_errors: Vec<KeyPushError>,
}

impl RunReport {
    pub fn new(
        controllers: BTreeMap<String, serde_json::Value>,
        backup_errors: Vec<String>,
        key_push_errors: Vec<KeyPushError>,
    ) -> Self {
        Self {
            completed_at: Utc::now(),
            controllers,
            backup_errors,
            key_push_errors,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ResultsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ResultsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn error_count(&self) -> usize {
        self.backup_errors.len() + self.key_push_errors.len()
    }
}

/// Nagios plugin states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CheckStatus::Ok => 0,
            CheckStatus::Warning => 1,
            CheckStatus::Critical => 2,
            CheckStatus::Unknown => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Critical => "CRITICAL",
            CheckStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Classifies the results file: missing/unparseable or any recorded error is
/// CRITICAL, a run older than `max_age_hours` is WARNING, otherwise OK.
pub fn evaluate(path: &Path, max_age_hours: i64, now: DateTime<Utc>) -> (CheckStatus, String) {
    let report = match RunReport::read(path) {
        Ok(report) => report,
        Err(e) => {
            return (
                CheckStatus::Critical,
                format!("cannot read results file {}: {}", path.display(), e),
            )
        }
    };

    if report.error_count() > 0 {
        return (
            CheckStatus::Critical,
            format!(
                "last run at {} recorded {} backup error(s) and {} key-push error(s)",
                report.completed_at.to_rfc3339(),
                report.backup_errors.len(),
                report.key_push_errors.len()
            ),
        );
    }

    let age = now - report.completed_at;
    if age > Duration::hours(max_age_hours) {
        return (
            CheckStatus::Warning,
            format!(
                "last successful run at {} is older than {} hours",
                report.completed_at.to_rfc3339(),
                max_age_hours
            ),
        );
    }

    (
        CheckStatus::Ok,
        format!(
            "last run at {} backed up {} controller(s)",
            report.completed_at.to_rfc3339(),
            report.controllers.len()
        ),
    )
}
