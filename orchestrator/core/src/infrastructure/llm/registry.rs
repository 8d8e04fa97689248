// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Generator Registry - Model Reference Resolution
//
// Picks a backend for an agent's model reference:
// - `stub` / `stub:<anything>`       -> offline stub
// - `ollama:<name>` / bare `<name>`  -> Ollama at the configured endpoint
// - anything path-like              -> offline stub (no local weights loader)

use crate::domain::config::BackendConfig;
use crate::domain::llm::{Generator, GeneratorFactory};
use std::fmt;
use tracing::{info, warn};

use super::ollama::{is_ollama_ref, OllamaGenerator};
use super::stub::{StubGenerator, STUB_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    Stub,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ollama => f.write_str("ollama"),
            BackendKind::Stub => f.write_str("stub"),
        }
    }
}

/// Factory for per-agent generators
#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    ollama_endpoint: String,
}

impl GeneratorRegistry {
    pub fn new(ollama_endpoint: impl Into<String>) -> Self {
        Self {
            ollama_endpoint: ollama_endpoint.into(),
        }
    }

    /// Create registry from backend configuration
    pub fn from_config(config: &BackendConfig) -> Self {
        info!(endpoint = %config.ollama_endpoint, "Initializing generator registry");
        Self::new(config.ollama_endpoint.clone())
    }

    pub fn ollama_endpoint(&self) -> &str {
        &self.ollama_endpoint
    }

    pub fn resolve(model_ref: &str) -> BackendKind {
        if model_ref == STUB_PREFIX || model_ref.starts_with("stub:") {
            BackendKind::Stub
        } else if is_ollama_ref(model_ref) {
            BackendKind::Ollama
        } else {
            BackendKind::Stub
        }
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl GeneratorFactory for GeneratorRegistry {
    fn create(&self, model_ref: &str) -> Box<dyn Generator> {
        match Self::resolve(model_ref) {
            BackendKind::Ollama => Box::new(OllamaGenerator::new(self.ollama_endpoint.clone())),
            BackendKind::Stub => {
                if model_ref != STUB_PREFIX && !model_ref.starts_with("stub:") {
                    warn!(model_ref = %model_ref, "No loader for local model files, using stub backend");
                }
                Box::new(StubGenerator::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_backends() {
        assert_eq!(GeneratorRegistry::resolve("stub"), BackendKind::Stub);
        assert_eq!(GeneratorRegistry::resolve("stub:fast"), BackendKind::Stub);
        assert_eq!(GeneratorRegistry::resolve("ollama:llama3.2"), BackendKind::Ollama);
        assert_eq!(GeneratorRegistry::resolve("mistral"), BackendKind::Ollama);
        assert_eq!(GeneratorRegistry::resolve("models/default.bin"), BackendKind::Stub);
    }

    #[test]
    fn test_create_matches_resolution() {
        let registry = GeneratorRegistry::new("http://localhost:11434");
        assert_eq!(registry.create("stub").backend_name(), "stub");
        assert_eq!(registry.create("ollama:llama3.2").backend_name(), "ollama");
        assert_eq!(registry.create("weights.bin").backend_name(), "stub");
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let config = BackendConfig {
            ollama_endpoint: "http://ollama:11434".to_string(),
            default_model: "stub".to_string(),
        };
        assert_eq!(GeneratorRegistry::from_config(&config).ollama_endpoint(), "http://ollama:11434");
    }
}
