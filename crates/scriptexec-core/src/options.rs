// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolution of formatter and linter configuration.
//!
//! Configuration arrives as free text in JSON or YAML, optionally accompanied by
//! typed [`FormatterOptions`] overrides. Engines always receive a normalized JSON
//! document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExecError, Result};

/// Text format of a rules configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ConfigFormat {
    /// JSON document.
    #[default]
    Json,
    /// YAML document.
    Yaml,
}

impl FromStr for ConfigFormat {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ExecError::InvalidArgument(format!(
                "unknown config format '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ConfigFormat {
    type Error = ExecError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

/// Typed formatter overrides. Every field that is set replaces the key of the
/// same name in the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatterOptions {
    /// Space before `:` in declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_before_colon_in_decl: Option<bool>,
    /// Space after `:` in declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_after_colon_in_decl: Option<bool>,
    /// Spaces around `=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_around_assignment: Option<bool>,
    /// Blank lines emitted after each `println`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blank_lines_after_println: Option<u32>,
    /// Indentation width inside blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent_spaces: Option<u32>,
    /// Collapse runs of whitespace between tokens to one space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_single_space_separation: Option<bool>,
    /// Place the `if` opening brace on the next line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_brace_below_line: Option<bool>,
    /// Place the `if` opening brace on the same line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_brace_same_line: Option<bool>,
}

impl FormatterOptions {
    /// Whether no override is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a configuration document into a JSON object.
///
/// Blank text yields an empty object.
pub fn parse_config(text: Option<&str>, format: ConfigFormat) -> Result<Map<String, Value>> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(Map::new());
    };

    let value: Value = match format {
        ConfigFormat::Json => serde_json::from_str(text)
            .map_err(|e| ExecError::InvalidArgument(format!("invalid JSON config: {}", e)))?,
        ConfigFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|e| ExecError::InvalidArgument(format!("invalid YAML config: {}", e)))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ExecError::InvalidArgument(format!(
            "config must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Resolve the formatter configuration handed to an engine.
///
/// Returns `None` when neither config text nor overrides are present so the
/// engine applies its own defaults.
pub fn resolve_formatter_config(
    config_text: Option<&str>,
    config_format: Option<ConfigFormat>,
    options: Option<&FormatterOptions>,
) -> Result<Option<String>> {
    let has_text = config_text.is_some_and(|t| !t.trim().is_empty());
    let options = options.filter(|o| !o.is_empty());
    if !has_text && options.is_none() {
        return Ok(None);
    }

    let mut base = parse_config(config_text, config_format.unwrap_or_default())?;

    if let Some(options) = options
        && let Value::Object(overrides) = serde_json::to_value(options)
            .map_err(|e| ExecError::InvalidArgument(e.to_string()))?
    {
        base.extend(overrides);
    }

    Ok(Some(Value::Object(base).to_string()))
}

/// Resolve the linter configuration handed to an engine.
pub fn resolve_lint_config(
    config_text: Option<&str>,
    config_format: Option<ConfigFormat>,
) -> Result<Option<String>> {
    if !config_text.is_some_and(|t| !t.trim().is_empty()) {
        return Ok(None);
    }
    let map = parse_config(config_text, config_format.unwrap_or_default())?;
    Ok(Some(Value::Object(map).to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
