// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use studybuddy_app::TransportError;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful study assistant. Provide clear, educational explanations.";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Blocking client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("llm.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("llm.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("llm.base_url must use http or https, got {:?}", parsed.scheme());
        }
        if model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.trim().to_owned(),
            timeout,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens;
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.system_prompt = prompt.to_owned();
    }

    /// The fixed two-message conversation sent for every turn.
    pub fn build_messages(&self, prompt: &str) -> Vec<Message> {
        vec![
            Message {
                role: Role::System,
                content: self.system_prompt.clone(),
            },
            Message {
                role: Role::User,
                content: prompt.to_owned(),
            },
        ]
    }

    /// Sends one single-turn completion and returns the first choice.
    pub fn complete(
        &self,
        credential: &SecretString,
        prompt: &str,
    ) -> Result<String, TransportError> {
        let messages = self.build_messages(prompt);
        let request = ChatRequest::new(self, &messages);
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            model = %self.model,
            messages = messages.len(),
            "sending chat completion"
        );

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(credential.expose_secret())
            .json(&request)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = clean_error_response(status, &body);
            tracing::warn!(status = status.as_u16(), "chat completion rejected");
            return Err(error);
        }

        let body = response
            .text()
            .map_err(|error| TransportError::Decode(format!("read response body: {error}")))?;
        parse_completion(&body)
    }
}

fn parse_completion(body: &str) -> Result<String, TransportError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|error| TransportError::Decode(format!("decode chat response: {error}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Decode("no choices in chat response".to_owned()))?;
    choice
        .message
        .content
        .ok_or_else(|| TransportError::Decode("no content in first choice".to_owned()))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> TransportError {
    let message = if error.is_timeout() {
        "request timed out".to_owned()
    } else {
        error.to_string()
    };
    TransportError::Connection {
        endpoint: base_url.to_owned(),
        message,
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> TransportError {
    let status = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return TransportError::Status {
            status,
            message: error.message,
        };
    }

    let trimmed = body.trim();
    let message = if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        trimmed.to_owned()
    } else {
        "request failed".to_owned()
    };
    TransportError::Status { status, message }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

impl<'a> ChatRequest<'a> {
    fn new(client: &'a Client, messages: &'a [Message]) -> Self {
        Self {
            model: &client.model,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            max_tokens: client.max_tokens,
            temperature: client.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}
