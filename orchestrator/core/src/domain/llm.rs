// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Text generation boundary used by the rumination pipeline.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Generator trait, sampling options and backend errors

// Generator Domain Interface (Anti-Corruption Layer)
//
// Isolates the agent pipeline from concrete backends (Ollama HTTP, offline stub).
// Implementations live in infrastructure/llm/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Domain interface for text generation backends.
///
/// `load_model` is called once per agent before any `generate` call; it may
/// mutate the backend (resolve names, select a model).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Prepare the backend for the given model reference
    async fn load_model(&mut self, model_ref: &str) -> Result<(), GeneratorError>;

    /// Generate a completion for `prompt`
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GeneratorError>;

    /// Short backend name used in logs (e.g. "ollama", "stub")
    fn backend_name(&self) -> &str;
}

/// Builds a fresh generator for an agent's model reference.
pub trait GeneratorFactory: Send + Sync {
    fn create(&self, model_ref: &str) -> Box<dyn Generator>;
}

/// Sampling options for a single generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    pub top_k: u32,

    pub top_p: f32,
}

impl GenerationOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
        }
    }
}

/// Errors that can occur at the generator boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model not loaded")]
    NotLoaded,

    #[error("Invalid model reference: {0}")]
    InvalidModelRef(String),

    #[error("Provider error: {0}")]
    Provider(String),
}
