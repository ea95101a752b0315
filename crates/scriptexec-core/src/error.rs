// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for scriptexec-core.
//!
//! [`ExecError`] is shared by the synchronous service paths and the stream
//! handlers. Structured engine failures carry the same [`Diagnostic`] shape that
//! validation and linting return, so callers can surface them unchanged.

use serde::Serialize;
use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Result type using [`ExecError`].
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors raised while dispatching work to an execution engine.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ExecError {
    /// No engine is registered for the requested language.
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage {
        /// The language that was requested.
        language: String,
    },

    /// The engine ran and rejected the program.
    #[error("{message}")]
    ExecutionFailed {
        /// Failure message reported by the engine.
        message: String,
        /// Source position of the failure, when the engine reports one.
        diagnostic: Option<Diagnostic>,
    },

    /// A request argument (config format, config text, version) is invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine could not be reached or produced an unreadable reply.
    #[error("Engine error: {0}")]
    Engine(String),
}

impl ExecError {
    /// Build an [`ExecError::ExecutionFailed`] from a diagnostic.
    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self::ExecutionFailed {
            message: diagnostic.message.clone(),
            diagnostic: Some(diagnostic),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage { .. } => "UNSUPPORTED_LANGUAGE",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Engine(_) => "ENGINE_ERROR",
        }
    }

    /// The diagnostic attached to a structured failure, if any.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::ExecutionFailed { diagnostic, .. } => diagnostic.as_ref(),
            _ => None,
        }
    }

    /// Whether retrying the same request can never succeed.
    ///
    /// Unknown languages and malformed arguments are configuration problems of
    /// the request itself; every other kind may succeed on a later attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage { .. } | Self::InvalidArgument(_)
        )
    }

    /// Convert into the error body returned to synchronous callers.
    pub fn to_api_error(&self) -> ApiError {
        let status = match self {
            Self::InvalidArgument(_) | Self::UnsupportedLanguage { .. } => ErrorStatus::BadRequest,
            Self::ExecutionFailed { .. } => ErrorStatus::Unprocessable,
            Self::Engine(_) => ErrorStatus::Internal,
        };
        ApiError {
            status,
            error: self.to_string(),
            diagnostic: self.diagnostic().cloned(),
        }
    }
}

/// Status class of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    /// The request was malformed (HTTP 400).
    BadRequest,
    /// The program could not be processed (HTTP 422).
    Unprocessable,
    /// The engine failed (HTTP 500).
    Internal,
}

impl ErrorStatus {
    /// HTTP status code for this class.
    pub fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unprocessable => 422,
            Self::Internal => 500,
        }
    }
}

/// Structured error body for synchronous callers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Status class.
    #[serde(skip)]
    pub status: ErrorStatus,
    /// Error message.
    pub error: String,
    /// Diagnostic for structured engine failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}
