// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for scriptexec-worker.

use scriptexec_core::ExecError;
use thiserror::Error;

use crate::content_store::ContentStoreError;

/// Errors raised while processing an event. Undecodable payloads never get
/// this far; they are dropped before processing starts.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Engine or request error.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Content store call failed.
    #[error(transparent)]
    ContentStore(#[from] ContentStoreError),
}

impl WorkerError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Exec(e) => e.error_code(),
            Self::ContentStore(e) => e.error_code(),
        }
    }

    /// Whether requeueing the event can never help.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Exec(e) => e.is_permanent(),
            Self::ContentStore(_) => false,
        }
    }
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
