//! Completion providers.
//!
//! The composer only sees [`CompletionProvider`]; production wires in
//! [`OpenAiCompatProvider`] (any endpoint that speaks the OpenAI
//! `/chat/completions` shape, e.g. AI Pipe or OpenRouter) while tests plug in
//! fakes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// Sampling options passed with every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { max_tokens: 512, temperature: 0.2 }
    }
}

/// An image sent alongside the user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Decode a base64 payload (a `data:<mime>;base64,` prefix is tolerated).
    pub fn from_base64(encoded: &str, mime_type: &str) -> Result<Self, base64::DecodeError> {
        let encoded = encoded.trim();
        let payload = match encoded.split_once(";base64,") {
            Some((head, rest)) if head.starts_with("data:") => rest,
            _ => encoded,
        };
        let data = STANDARD.decode(payload)?;
        Ok(Self { mime_type: mime_type.trim().to_string(), data })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub image: Option<ImageAttachment>,
    pub options: CompletionOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
}

/// Failures talking to a completion backend. Display strings never contain
/// credentials; response bodies are cut down to a short snippet.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("completion provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("provider returned HTTP {status}: {snippet}")]
    HttpStatus { status: StatusCode, snippet: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("provider returned no choices")]
    EmptyChoices,
    #[error("no API key configured for the completion provider")]
    MissingApiKey,
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,
    #[error("invalid provider endpoint `{0}`: must start with http:// or https://")]
    InvalidEndpoint(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }

    /// Short description safe to hand back to API callers.
    pub fn redacted(&self) -> String {
        match self {
            ProviderError::Timeout(d) => format!("completion provider timed out after {}s", d.as_secs()),
            ProviderError::Transport(_) => "could not reach completion provider".into(),
            ProviderError::HttpStatus { status, .. } => format!("completion provider returned HTTP {}", status.as_u16()),
            ProviderError::Decode(_) | ProviderError::EmptyChoices => "completion provider returned an unusable response".into(),
            ProviderError::MissingApiKey | ProviderError::InvalidApiKey | ProviderError::InvalidEndpoint(_) => "completion provider is misconfigured".into(),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name used in logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}

/// Connection settings for [`OpenAiCompatProvider`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL, e.g. `https://aipipe.org/openrouter/v1`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Client for OpenAI-compatible chat completion APIs.
#[derive(Debug)]
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    model: String,
    timeout: Duration,
    url_chat: String,
}

impl OpenAiCompatProvider {
    /// Validates the endpoint and API key and builds an HTTP client with the
    /// bearer header and timeout baked in.
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        let endpoint = settings.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::InvalidEndpoint(settings.endpoint.clone()));
        }

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::InvalidApiKey)?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(ProviderError::Transport)?;

        let url_chat = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        info!(model = %settings.model, url = %url_chat, timeout_secs = settings.timeout.as_secs(), "completion provider initialized");

        Ok(Self { client, model: settings.model, timeout: settings.timeout, url_chat })
    }

    fn transport(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() { ProviderError::Timeout(self.timeout) } else { ProviderError::Transport(e) }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let started = Instant::now();
        let user = match &request.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text { text: &request.user },
                ContentPart::ImageUrl { image_url: ImageUrl { url: image.data_url() } },
            ]),
            None => MessageContent::Text(&request.user),
        };
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: MessageContent::Text(&request.system) },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
        };
        debug!(model = %self.model, user_len = request.user.len(), image = request.image.is_some(), "POST {}", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await.map_err(|e| self.transport(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, %snippet, model = %self.model, latency_ms = started.elapsed().as_millis(), "chat completion returned non-success status");
            return Err(ProviderError::HttpStatus { status, snippet });
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport(e)
            } else {
                ProviderError::Decode(format!("{e}; expected `choices[0].message.content`"))
            }
        })?;

        let text = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or(ProviderError::EmptyChoices)?;

        info!(model = %self.model, latency_ms = started.elapsed().as_millis(), "chat completion completed");
        Ok(Completion { text })
    }
}

const SNIPPET_CHARS: usize = 200;

fn make_snippet(body: &str) -> String {
    let trimmed = body.trim();
    let mut snippet: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    if trimmed.chars().count() > SNIPPET_CHARS {
        snippet.push('…');
    }
    snippet
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}
