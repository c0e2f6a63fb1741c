use async_trait::async_trait;
use log::{error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::translation::prompt::TranslationPrompt;

use super::Translator;

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationOptions {
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: false,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options = Some(GenerationOptions {
            temperature: Some(temperature),
        });
        self
    }
}

/// Segment translator backed by a local Ollama server
#[derive(Debug)]
pub struct OllamaTranslator {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    model: String,
    temperature: f32,
    prompt: TranslationPrompt,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Optional rate limit in requests per minute
    rate_limit: Option<u32>,
}

impl OllamaTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        prompt: TranslationPrompt,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: endpoint.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            temperature: 0.3,
            prompt,
            max_retries: 3,
            backoff_base_ms: 1000,
            rate_limit: None,
        }
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit = requests_per_minute.filter(|r| *r > 0);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            if let (Some(rate_limit), true) = (self.rate_limit, attempt > 0) {
                let delay_ms = 60_000 / rate_limit as u64;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if status.is_success() {
                        return Self::parse_response(&body);
                    }
                    let api_error = ProviderError::ApiError {
                        status_code: status.as_u16(),
                        message: body,
                    };
                    if !status.is_server_error() {
                        // client errors will not get better on retry
                        error!("Ollama API error: {}", api_error);
                        return Err(api_error);
                    }
                    warn!("Ollama API error: {} - attempt {}/{}", api_error, attempt + 1, self.max_retries + 1);
                    last_error = Some(api_error);
                }
                Err(e) => {
                    let network_error = if e.is_timeout() {
                        ProviderError::ConnectionError(format!("request timed out: {}", e))
                    } else {
                        ProviderError::ConnectionError(e.to_string())
                    };
                    warn!("Ollama network error: {} - attempt {}/{}", network_error, attempt + 1, self.max_retries + 1);
                    last_error = Some(network_error);
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1).min(16));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!("Ollama request failed after {} attempts", self.max_retries + 1))
        }))
    }

    /// Parse a generate response, accepting both a single JSON object and
    /// streamed JSON lines
    pub fn parse_response(body: &str) -> Result<GenerationResponse, ProviderError> {
        if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
            return Ok(response);
        }

        let mut text = String::new();
        let mut done = false;
        let mut parsed_any = false;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                parsed_any = true;
                if let Some(part) = value.get("response").and_then(|v| v.as_str()) {
                    text.push_str(part);
                }
                done |= value.get("done").and_then(|v| v.as_bool()).unwrap_or(false);
            }
        }

        if !parsed_any {
            let preview: String = body.chars().take(200).collect();
            return Err(ProviderError::ParseError(format!("invalid Ollama response: {}", preview)));
        }
        Ok(GenerationResponse { response: text, done })
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let request = GenerationRequest::new(&self.model, self.prompt.user_message(text))
            .system(self.prompt.system_message(source_language, target_language))
            .temperature(self.temperature);

        let response = self.generate(&request).await?;
        Ok(TranslationPrompt::clean_response(&response.response))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
