// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failures the Snapshot Manager can surface (§7: `SnapshotNotFound`,
/// `SnapshotError`, both non-retryable and reported straight to the
/// caller).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("snapshot storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for SnapshotError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
