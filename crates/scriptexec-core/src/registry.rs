// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine lookup by language.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::ExecutionEngine;
use crate::error::{ExecError, Result};

/// Immutable map from language name to engine, built once at startup.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn ExecutionEngine>>,
}

impl EngineRegistry {
    /// Build a registry keyed by each engine's declared language (case-insensitive).
    ///
    /// When two engines declare the same language, the last one wins.
    pub fn new(engines: impl IntoIterator<Item = Arc<dyn ExecutionEngine>>) -> Self {
        let mut map: HashMap<String, Arc<dyn ExecutionEngine>> = HashMap::new();
        for engine in engines {
            let key = engine.language().to_lowercase();
            if map.insert(key.clone(), engine).is_some() {
                warn!(language = %key, "Duplicate engine registration; keeping the last one");
            }
        }

        let registry = Self { engines: map };
        info!(languages = ?registry.languages(), "Loaded language engines");
        registry
    }

    /// Look up the engine for `language`.
    pub fn runner_for(&self, language: &str) -> Result<Arc<dyn ExecutionEngine>> {
        self.engines
            .get(&language.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ExecError::UnsupportedLanguage {
                language: language.to_string(),
            })
    }

    /// Registered language keys, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.engines.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}
