// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Diagnostics produced by validation and linting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single finding reported by an engine against a source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Rule or error code that produced this finding (e.g. `PS-SYNTAX`).
    pub rule_id: String,
    /// Human-readable message.
    pub message: String,
    /// 1-based line of the finding.
    pub line: u32,
    /// 1-based column of the finding.
    #[serde(alias = "col")]
    pub column: u32,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}:{}",
            self.rule_id, self.message, self.line, self.column
        )
    }
}
