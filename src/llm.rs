use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::prompt::{ContentBlock, PromptPayload};

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "news-summarizer-api/0.1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "v1/messages";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Transport failures, timeouts, throttling and 5xx may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout | UpstreamError::Request(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::InvalidResponse(_) => false,
        }
    }
}

// ── Generator seam ───────────────────────────────────────────────────────────

#[async_trait]
pub trait Generator: Send + Sync {
    /// Send one prompt and return the first text segment of the reply.
    async fn generate(&self, payload: &PromptPayload) -> Result<String, UpstreamError>;
}

// ── Anthropic Messages API ───────────────────────────────────────────────────

pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ResponseBlock>>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl AnthropicClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::ClientBuilder::new()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let endpoint = config
            .base_url
            .join(MESSAGES_PATH)
            .map_err(|e| UpstreamError::Request(format!("bad base URL: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, payload: &PromptPayload) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": payload.blocks.iter().map(block_json).collect::<Vec<_>>(),
            }],
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        first_text(&text)
    }
}

#[async_trait]
impl Generator for AnthropicClient {
    async fn generate(&self, payload: &PromptPayload) -> Result<String, UpstreamError> {
        let body = self.request_body(payload);
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt.min(5) - 1);
                    tracing::warn!(
                        purpose = payload.purpose.as_str(),
                        attempt,
                        error = %e,
                        "retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Wire helpers ─────────────────────────────────────────────────────────────

fn block_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text(text) => json!({ "type": "text", "text": text }),
        ContentBlock::Image { media_type, data } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media_type,
                "data": data,
            },
        }),
    }
}

fn first_text(body: &str) -> Result<String, UpstreamError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

    let first = parsed
        .content
        .ok_or_else(|| UpstreamError::InvalidResponse("missing content array".to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::InvalidResponse("empty content array".to_string()))?;

    match (first.kind.as_str(), first.text) {
        ("text", Some(text)) => Ok(text),
        (kind, _) => Err(UpstreamError::InvalidResponse(format!(
            "first content block is {}, not text",
            kind
        ))),
    }
}

fn classify(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else if e.is_connect() {
        UpstreamError::Request(format!("ConnectError: {}", e))
    } else {
        UpstreamError::Request(format!("RequestError: {}", e))
    }
}
