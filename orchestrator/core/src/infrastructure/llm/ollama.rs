// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Generator Adapter
//
// Anti-Corruption Layer for local Ollama models. Supports air-gapped
// deployments: the only dependency is an HTTP endpoint on the local network.

use crate::domain::llm::{GenerationOptions, Generator, GeneratorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const OLLAMA_PREFIX: &str = "ollama:";

pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// `ollama:<name>` or a bare name without path separators or dots.
pub fn is_ollama_ref(model_ref: &str) -> bool {
    model_ref.starts_with(OLLAMA_PREFIX)
        || !(model_ref.contains('/') || model_ref.contains('\\') || model_ref.contains('.'))
}

pub fn ollama_model_name(model_ref: &str) -> &str {
    model_ref.strip_prefix(OLLAMA_PREFIX).unwrap_or(model_ref)
}

impl OllamaGenerator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Check if the Ollama server is running by listing models
    pub async fn health_check(&self) -> Result<(), GeneratorError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| {
                GeneratorError::Network(format!(
                    "Ollama server not reachable at {}: {}",
                    self.endpoint, e
                ))
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GeneratorError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn load_model(&mut self, model_ref: &str) -> Result<(), GeneratorError> {
        let name = ollama_model_name(model_ref);
        if name.is_empty() {
            return Err(GeneratorError::InvalidModelRef(model_ref.to_string()));
        }

        self.health_check().await?;

        info!(model = %name, endpoint = %self.endpoint, "Ollama model selected");
        self.model = Some(name.to_string());
        Ok(())
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GeneratorError> {
        let model = self.model.as_deref().ok_or(GeneratorError::NotLoaded)?;

        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                top_k: options.top_k,
                top_p: options.top_p,
            },
        };

        debug!(model = %model, prompt_chars = prompt.len(), "POST /api/generate");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                GeneratorError::ModelNotFound(model.to_string())
            } else {
                GeneratorError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Provider(format!("Failed to parse response: {}", e)))?;

        Ok(ollama_response.response)
    }

    fn backend_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_ref_detection() {
        assert!(is_ollama_ref("ollama:llama3.2"));
        assert!(is_ollama_ref("mistral"));
        assert!(!is_ollama_ref("models/default.bin"));
        assert!(!is_ollama_ref("llama3.2"));
        assert!(!is_ollama_ref("C:\\models\\m"));
    }

    #[test]
    fn test_model_name_strips_prefix() {
        assert_eq!(ollama_model_name("ollama:llama3.2"), "llama3.2");
        assert_eq!(ollama_model_name("mistral"), "mistral");
    }

    #[tokio::test]
    async fn test_generate_before_load_fails() {
        let generator = OllamaGenerator::new("http://127.0.0.1:9");
        let err = generator
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, GeneratorError::NotLoaded);
    }

    #[tokio::test]
    async fn test_load_empty_name_is_rejected() {
        let mut generator = OllamaGenerator::new("http://127.0.0.1:9");
        let err = generator.load_model("ollama:").await.unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidModelRef(_)));
    }

    #[test]
    fn test_request_shape() {
        let request = OllamaRequest {
            model: "llama3.2",
            prompt: "p",
            stream: false,
            options: OllamaOptions {
                num_predict: 512,
                temperature: 0.5,
                top_k: 40,
                top_p: 0.9,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 512);
        assert_eq!(json["options"]["top_k"], 40);
    }
}
