//! # Completion Service Module
//!
//! ## Purpose
//! Narrow interface to the text-generation capability consumed by the
//! orchestrator, with bounded retry/backoff and per-call timeouts. The
//! pipeline depends only on `complete(prompt, options)`; model identity is a
//! configuration string.
//!
//! ## Input/Output Specification
//! - **Input**: Prompt text, completion options (model, temperature, max
//!   tokens, optional system prompt)
//! - **Output**: Completion text plus token usage, or a task-level error
//! - **Implementations**: OpenAI-compatible HTTP client; scripted in-process
//!   service for tests and offline runs
//!
//! ## Key Features
//! - `async_trait` service interface so tests can substitute a fake
//! - Per-call timeout treated as a retryable failure
//! - Exponential backoff up to a bounded attempt count, after which the
//!   failure becomes a permanent task-level error

use crate::config::CompletionConfig;
use crate::errors::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Options for one completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

/// Token usage reported by the completion service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Successful completion payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// The narrow text-generation interface the pipeline consumes
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion>;
}

/// Retry policy applied around every completion call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            call_timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Call the service with timeout, bounded retries and exponential backoff
///
/// Exhausting the attempt bound converts into a permanent task-level
/// `ExternalService` error; it never aborts the run.
pub async fn complete_with_retry(
    service: &dyn CompletionService,
    prompt: &str,
    options: &CompletionOptions,
    policy: &RetryPolicy,
) -> Result<Completion> {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let call = service.complete(prompt, options);
        let outcome = match tokio::time::timeout(policy.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::CompletionTimeout {
                timeout_ms: policy.call_timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(completion) => return Ok(completion),
            Err(e) if e.is_recoverable() && attempt < policy.max_attempts => {
                let delay = policy.base_delay * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    "Completion attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                last_error = e.to_string();
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(PipelineError::ExternalService {
                    details: e.to_string(),
                    attempts: attempt,
                });
            }
        }
    }

    Err(PipelineError::ExternalService {
        details: last_error,
        attempts: policy.max_attempts,
    })
}

/// OpenAI-compatible chat-completions HTTP client
pub struct HttpCompletionService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl HttpCompletionService {
    /// Create a client from the completion configuration
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ExternalService {
                details: format!("completion endpoint returned {}: {}", status, body),
                attempts: 1,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::ExternalService {
                details: "completion response contained no choices".to_string(),
                attempts: 1,
            })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

/// Scripted completion service for tests and offline runs
///
/// Responds with a canned text per kind keyword found in the system prompt,
/// falling back to a generic echo. Kinds listed in `failing` always error,
/// which exercises the per-task failure isolation path.
pub struct ScriptedCompletionService {
    responses: HashMap<String, String>,
    failing: Vec<String>,
}

impl ScriptedCompletionService {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failing: Vec::new(),
        }
    }

    /// Respond with `text` whenever `marker` occurs in the prompt
    pub fn with_response(mut self, marker: &str, text: &str) -> Self {
        self.responses.insert(marker.to_string(), text.to_string());
        self
    }

    /// Always fail prompts containing `marker`
    pub fn with_failure(mut self, marker: &str) -> Self {
        self.failing.push(marker.to_string());
        self
    }
}

impl Default for ScriptedCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion> {
        let haystack = format!(
            "{}\n{}",
            options.system_prompt.as_deref().unwrap_or(""),
            prompt
        );

        for marker in &self.failing {
            if haystack.contains(marker.as_str()) {
                return Err(PipelineError::ExternalService {
                    details: format!("scripted failure for '{}'", marker),
                    attempts: 1,
                });
            }
        }

        for (marker, text) in &self.responses {
            if haystack.contains(marker.as_str()) {
                return Ok(Completion {
                    text: text.clone(),
                    usage: TokenUsage {
                        prompt_tokens: (prompt.len() / 4) as u64,
                        completion_tokens: (text.len() / 4) as u64,
                        total_tokens: ((prompt.len() + text.len()) / 4) as u64,
                    },
                });
            }
        }

        Ok(Completion {
            text: format!("[análise indisponível offline para o modelo {}]", options.model),
            usage: TokenUsage::default(),
        })
    }
}
