// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! "Rules updated" events consumed from the formatting and linting streams.
//!
//! Events are immutable. A retry never edits the delivered event; it publishes
//! a new value produced by [`RulesUpdatedEvent::with_next_attempt`], so the
//! retry count always travels inside the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::engine::Program;
use crate::error::Result;
use crate::options::{ConfigFormat, FormatterOptions};

/// Kind of work an event requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Re-format the subject with new formatting rules.
    Formatting,
    /// Re-lint the subject with new linting rules.
    Linting,
}

impl EventKind {
    /// Prefix used for synthesized correlation ids and log tags.
    pub fn topic_prefix(self) -> &'static str {
        match self {
            Self::Formatting => "format",
            Self::Linting => "lint",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic_prefix())
    }
}

/// A request to re-process a subject after its rules changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesUpdatedEvent {
    /// Request tracing key.
    #[serde(default, alias = "correlationalId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Snippet/program being processed.
    #[serde(alias = "snippetId")]
    pub subject_id: Uuid,
    /// Language identifier.
    pub language: String,
    /// Language version.
    pub version: String,
    /// Rules document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_text: Option<String>,
    /// Format of `config_text` as sent, see [`Self::resolved_config_format`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_format: Option<String>,
    /// Typed formatter overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FormatterOptions>,
    /// Number of times this event was requeued.
    #[serde(default)]
    pub attempt: u32,
    /// Creation time, epoch milliseconds on the wire.
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl RulesUpdatedEvent {
    /// Create a first-attempt event.
    pub fn new(
        subject_id: Uuid,
        language: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: None,
            subject_id,
            language: language.into(),
            version: version.into(),
            config_text: None,
            config_format: None,
            options: None,
            attempt: 0,
            created_at: Utc::now(),
        }
    }

    /// Correlation id, synthesized as `<prefix>-<subject_id>` when absent or blank.
    pub fn effective_correlation_id(&self, kind: EventKind) -> String {
        match self.correlation_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}-{}", kind.topic_prefix(), self.subject_id),
        }
    }

    /// A copy of this event with `attempt` incremented.
    pub fn with_next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Parsed `config_format`. An unknown format is an
    /// [`ExecError::InvalidArgument`](crate::ExecError::InvalidArgument), so the event fails like any other bad
    /// argument instead of being undecodable.
    pub fn resolved_config_format(&self) -> Result<Option<ConfigFormat>> {
        self.config_format.as_deref().map(str::parse).transpose()
    }

    /// The program to process, given the subject's current content.
    pub fn program(&self, content: String) -> Program {
        Program {
            language: self.language.clone(),
            version: self.version.clone(),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;

    const SUBJECT: &str = "6f1c2a52-8a3e-4a6f-9c1e-2b0b6f0f7d11";

    #[test]
    fn test_deserialize_legacy_field_names() {
        let json = format!(
            r#"{{"correlationalId":"corr-1","snippetId":"{SUBJECT}","language":"printscript","version":"1.1","configText":null,"configFormat":"yaml","attempt":2,"createdAt":1700000000000,"unknown":true}}"#
        );
        let ev: RulesUpdatedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(ev.subject_id.to_string(), SUBJECT);
        assert_eq!(ev.resolved_config_format().unwrap(), Some(ConfigFormat::Yaml));
        assert_eq!(ev.attempt, 2);
        assert_eq!(ev.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_unknown_config_format_decodes_but_does_not_resolve() {
        let json = format!(
            r#"{{"subjectId":"{SUBJECT}","language":"printscript","version":"1.1","configFormat":"toml"}}"#
        );
        let ev: RulesUpdatedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev.config_format.as_deref(), Some("toml"));
        assert!(matches!(
            ev.resolved_config_format(),
            Err(ExecError::InvalidArgument(_))
        ));

        // The raw value survives a requeue unchanged.
        let wire = serde_json::to_string(&ev.with_next_attempt()).unwrap();
        assert!(wire.contains(r#""configFormat":"toml""#));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let json = format!(r#"{{"subjectId":"{SUBJECT}","language":"printscript","version":"1.0"}}"#);
        let ev: RulesUpdatedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev.attempt, 0);
        assert!(ev.correlation_id.is_none());
        assert!(ev.options.is_none());
    }

    #[test]
    fn test_synthesized_correlation_id() {
        let mut ev = RulesUpdatedEvent::new(SUBJECT.parse().unwrap(), "printscript", "1.1");
        assert_eq!(
            ev.effective_correlation_id(EventKind::Linting),
            format!("lint-{SUBJECT}")
        );
        ev.correlation_id = Some("  ".into());
        assert_eq!(
            ev.effective_correlation_id(EventKind::Formatting),
            format!("format-{SUBJECT}")
        );
        ev.correlation_id = Some("req-9".into());
        assert_eq!(ev.effective_correlation_id(EventKind::Formatting), "req-9");
    }

    #[test]
    fn test_next_attempt_is_new_value() {
        let ev = RulesUpdatedEvent::new(SUBJECT.parse().unwrap(), "printscript", "1.1");
        let next = ev.with_next_attempt();
        assert_eq!(ev.attempt, 0);
        assert_eq!(next.attempt, 1);
        assert_eq!(next.subject_id, ev.subject_id);
        assert_eq!(next.created_at, ev.created_at);
    }

    #[test]
    fn test_wire_round_trip_keeps_millis() {
        let ev = RulesUpdatedEvent::new(SUBJECT.parse().unwrap(), "printscript", "1.1");
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json["createdAt"].is_i64());
        assert!(json.get("correlationId").is_none());
    }
}
