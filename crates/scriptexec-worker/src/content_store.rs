// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Content store client.
//!
//! The content store owns snippet sources. The worker fetches content by id and
//! writes back formatted content, lint violations, or a permanent-failure mark:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `get_content` | `GET {base}/internal/snippets/{id}/content` |
//! | `save_formatted` | `POST {base}/internal/snippets/{id}/format` |
//! | `save_lint` | `POST {base}/internal/snippets/{id}/lint` |
//! | `mark_failed` | `POST {base}/internal/snippets/{id}/{format,lint}/failed` |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use scriptexec_core::{Diagnostic, EventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::ContentStoreSettings;

/// Longest error body kept in [`ContentStoreError::Http`].
const ERROR_BODY_PREVIEW: usize = 500;

/// Content store errors.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    /// The store answered with a non-success status.
    #[error("Content store returned HTTP {status}: {body}")]
    Http {
        /// Response status
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The request could not be sent or the response not read.
    #[error("Content store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered without content.
    #[error("Content not found for snippet {0}")]
    MissingContent(Uuid),
}

impl ContentStoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Http { .. } => "CONTENT_STORE_HTTP",
            Self::Transport(_) => "CONTENT_STORE_TRANSPORT",
            Self::MissingContent(_) => "CONTENT_NOT_FOUND",
        }
    }
}

/// Source-of-truth for snippet content and processing results.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the current content of a snippet.
    async fn get_content(&self, subject_id: Uuid) -> Result<String, ContentStoreError>;

    /// Persist formatted content.
    async fn save_formatted(&self, subject_id: Uuid, content: &str)
    -> Result<(), ContentStoreError>;

    /// Persist lint violations.
    async fn save_lint(
        &self,
        subject_id: Uuid,
        violations: &[Diagnostic],
    ) -> Result<(), ContentStoreError>;

    /// Record that processing of `kind` failed permanently.
    async fn mark_failed(&self, subject_id: Uuid, kind: EventKind)
    -> Result<(), ContentStoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBody {
    content: Option<String>,
}

/// HTTP implementation of [`ContentStore`].
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpContentStore {
    /// Create a client with the configured timeouts.
    pub fn new(settings: &ContentStoreSettings) -> Result<Self, ContentStoreError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
        })
    }

    fn url(&self, subject_id: Uuid, suffix: &str) -> String {
        format!("{}/internal/snippets/{}/{}", self.base_url, subject_id, suffix)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ContentStoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ContentStoreError::Http {
            status: status.as_u16(),
            body: preview(&body, ERROR_BODY_PREVIEW),
        })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn get_content(&self, subject_id: Uuid) -> Result<String, ContentStoreError> {
        let url = self.url(subject_id, "content");
        debug!(url = %url, "Fetching snippet content");
        let body: ContentBody = self.send(self.client.get(&url)).await?.json().await?;
        body.content
            .ok_or(ContentStoreError::MissingContent(subject_id))
    }

    async fn save_formatted(
        &self,
        subject_id: Uuid,
        content: &str,
    ) -> Result<(), ContentStoreError> {
        let url = self.url(subject_id, "format");
        debug!(url = %url, content_len = content.len(), "Saving formatted content");
        self.send(self.client.post(&url).json(&ContentBody {
            content: Some(content.to_string()),
        }))
        .await?;
        Ok(())
    }

    async fn save_lint(
        &self,
        subject_id: Uuid,
        violations: &[Diagnostic],
    ) -> Result<(), ContentStoreError> {
        let url = self.url(subject_id, "lint");
        debug!(url = %url, violations = violations.len(), "Saving lint violations");
        self.send(self.client.post(&url).json(violations)).await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        subject_id: Uuid,
        kind: EventKind,
    ) -> Result<(), ContentStoreError> {
        let url = self.url(subject_id, &format!("{}/failed", kind.topic_prefix()));
        debug!(url = %url, "Marking processing as failed");
        self.send(self.client.post(&url)).await?;
        Ok(())
    }
}

/// Truncate `text` to at most `max` characters, marking the cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ñññññ", 2), "ññ...");
    }

    #[test]
    fn test_urls() {
        let store = HttpContentStore::new(&ContentStoreSettings::new("http://snippets/")).unwrap();
        let id: Uuid = "6f1c2a52-8a3e-4a6f-9c1e-2b0b6f0f7d11".parse().unwrap();
        assert_eq!(
            store.url(id, "lint/failed"),
            "http://snippets/internal/snippets/6f1c2a52-8a3e-4a6f-9c1e-2b0b6f0f7d11/lint/failed"
        );
    }
}
