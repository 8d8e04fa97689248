// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Offline Generator
//
// Deterministic backend used when no model server is configured. Every
// completion echoes the prompt inside a fixed marker.

use crate::domain::llm::{GenerationOptions, Generator, GeneratorError};
use async_trait::async_trait;

pub const STUB_PREFIX: &str = "stub";

#[derive(Debug, Default)]
pub struct StubGenerator {
    model_ref: Option<String>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_ref(&self) -> Option<&str> {
        self.model_ref.as_deref()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn load_model(&mut self, model_ref: &str) -> Result<(), GeneratorError> {
        if model_ref.trim().is_empty() {
            return Err(GeneratorError::InvalidModelRef(model_ref.to_string()));
        }
        self.model_ref = Some(model_ref.to_string());
        Ok(())
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GeneratorError> {
        if self.model_ref.is_none() {
            return Err(GeneratorError::NotLoaded);
        }
        Ok(format!("[LLM Generated Response for: {prompt}]"))
    }

    fn backend_name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_echoes_prompt() {
        let mut generator = StubGenerator::new();
        generator.load_model("stub").await.unwrap();

        let text = generator.generate("hello", &GenerationOptions::default()).await.unwrap();
        assert_eq!(text, "[LLM Generated Response for: hello]");
    }

    #[tokio::test]
    async fn test_stub_requires_load() {
        let generator = StubGenerator::new();
        let err = generator.generate("hello", &GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, GeneratorError::NotLoaded);
    }

    #[tokio::test]
    async fn test_stub_rejects_blank_ref() {
        let mut generator = StubGenerator::new();
        assert!(generator.load_model("  ").await.is_err());
        assert!(generator.model_ref().is_none());
    }
}
