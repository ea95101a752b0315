// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for scriptexec-worker.

use std::time::Duration;

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default requeue cap.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,
    /// Content store client settings
    pub content_store: ContentStoreSettings,
    /// Whether the stream consumers are started at all
    pub streams_enabled: bool,
    /// Formatting stream, group and dead-letter stream
    pub formatting: StreamSettings,
    /// Linting stream, group and dead-letter stream
    pub linting: StreamSettings,
    /// Requeue cap before an event is dead-lettered
    pub max_attempts: u32,
    /// Block timeout of each stream read
    pub poll_timeout: Duration,
    /// Engines to register, one per language
    pub engines: Vec<EngineSpec>,
    /// Per-invocation engine timeout
    pub engine_timeout: Duration,
}

/// Content store client settings.
#[derive(Debug, Clone)]
pub struct ContentStoreSettings {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Bearer token sent on every request, when set
    pub api_token: Option<String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Response read timeout
    pub read_timeout: Duration,
}

impl ContentStoreSettings {
    /// Settings for `base_url` with default timeouts and no token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Source stream, consumer group and dead-letter stream of one event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Source stream key
    pub key: String,
    /// Consumer group name
    pub group: String,
    /// Dead-letter stream key
    pub dlq_key: String,
}

impl StreamSettings {
    /// Settings with the dead-letter stream named `<key>.dlq`.
    pub fn new(key: impl Into<String>, group: impl Into<String>) -> Self {
        let key = key.into();
        let dlq_key = format!("{}.dlq", key);
        Self {
            key,
            group: group.into(),
            dlq_key,
        }
    }

    /// Override the dead-letter stream key.
    pub fn with_dlq(mut self, dlq_key: impl Into<String>) -> Self {
        self.dlq_key = dlq_key.into();
        self
    }
}

/// An engine command bound to a language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    /// Language served by the engine
    pub language: String,
    /// Executable to spawn
    pub command: String,
    /// Arguments placed before the operation name
    pub args: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_url = env_or("REDIS_URL", DEFAULT_REDIS_URL);

        let base_url = std::env::var("SNIPPETS_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("SNIPPETS_BASE_URL"))?;

        let content_store = ContentStoreSettings {
            api_token: std::env::var("SNIPPETS_API_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            connect_timeout: Duration::from_secs(parse_env("SNIPPETS_CONNECT_TIMEOUT_SECS", 5)?),
            read_timeout: Duration::from_secs(parse_env("SNIPPETS_READ_TIMEOUT_SECS", 10)?),
            ..ContentStoreSettings::new(base_url)
        };

        let streams_enabled = std::env::var("STREAMS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let formatting = stream_settings(
            "STREAM_FORMATTING_KEY",
            "snippets.formatting",
            "STREAM_FORMATTING_GROUP",
            "execution-formatting",
            "STREAM_DLQ_FORMATTING",
        );
        let linting = stream_settings(
            "STREAM_LINTING_KEY",
            "snippets.linting",
            "STREAM_LINTING_GROUP",
            "execution-linting",
            "STREAM_DLQ_LINTING",
        );

        let max_attempts = parse_env("STREAM_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let poll_timeout = Duration::from_secs(parse_env("STREAM_POLL_TIMEOUT_SECS", 3)?);

        let engines = parse_engines(&env_or("EXECUTION_ENGINES", "printscript=printscript-engine"))?;
        let engine_timeout = Duration::from_secs(parse_env("ENGINE_TIMEOUT_SECS", 30)?);

        Ok(Self {
            redis_url,
            content_store,
            streams_enabled,
            formatting,
            linting,
            max_attempts,
            poll_timeout,
            engines,
            engine_timeout,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

fn stream_settings(
    key_var: &str,
    key_default: &str,
    group_var: &str,
    group_default: &str,
    dlq_var: &str,
) -> StreamSettings {
    let settings = StreamSettings::new(env_or(key_var, key_default), env_or(group_var, group_default));
    match std::env::var(dlq_var) {
        Ok(dlq) if !dlq.trim().is_empty() => settings.with_dlq(dlq),
        _ => settings,
    }
}

/// Parse `lang=command [args..]` entries separated by commas.
pub fn parse_engines(raw: &str) -> Result<Vec<EngineSpec>, ConfigError> {
    let mut engines = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = || ConfigError::Invalid {
            key: "EXECUTION_ENGINES",
            value: entry.to_string(),
        };
        let (language, command_line) = entry.split_once('=').ok_or_else(invalid)?;
        let mut parts = command_line.split_whitespace();
        let command = parts.next().ok_or_else(invalid)?;
        let language = language.trim();
        if language.is_empty() {
            return Err(invalid());
        }
        engines.push(EngineSpec {
            language: language.to_string(),
            command: command.to_string(),
            args: parts.map(str::to_string).collect(),
        });
    }
    Ok(engines)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds a value that cannot be used.
    #[error("Invalid value for {key}: '{value}'")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },
}
