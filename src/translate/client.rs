use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TranslateConfig;
use crate::error::{CuesmithError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Body of an OpenAI-compatible chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Status and raw body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one chat request. `Err` means the exchange itself failed (network,
/// timeout); any HTTP status comes back as a reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest, timeout: Duration) -> Result<HttpReply>;
}

/// Bearer-authenticated transport for Groq and other OpenAI-compatible APIs.
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpChatTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, request: &ChatRequest, timeout: Duration) -> Result<HttpReply> {
        debug!("Sending chat request to: {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

fn non_negative_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Retry schedule for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// First wait after a 429; doubled for every further 429
    pub base_delay: Duration,
    /// Wait after any other failure
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TranslateConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: non_negative_secs(config.base_delay_secs),
            retry_delay: non_negative_secs(config.retry_delay_secs),
        }
    }

    /// Policy that retries without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }

    /// Wait before the next attempt, after `attempt` (1-based) failed.
    pub fn delay_after(&self, failure: &Failure, attempt: u32) -> Duration {
        match failure {
            Failure::RateLimited => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            Failure::Status { .. } | Failure::Transport(_) => self.retry_delay,
        }
    }
}

/// Why an attempt did not produce a usable reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    RateLimited,
    Status { status: u16, body: String },
    Transport(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::RateLimited => write!(f, "rate limited (429)"),
            Failure::Status { status, body } => write!(f, "API error {}: {}", status, body),
            Failure::Transport(e) => write!(f, "request failed: {}", e),
        }
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((at, _)) => format!("{}...", &body[..at]),
        None => body.to_string(),
    }
}

/// Pulls `choices[0].message.content` out of a 200 body. A body without
/// usable content yields `None`.
pub fn parse_content(body: &str) -> Option<String> {
    let response: ChatResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Unparseable chat completion body: {}", e);
            return None;
        }
    };

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Sends `request`, retrying per `policy`.
///
/// Returns `Ok(None)` when the service answered 200 without content. Once the
/// retries are spent, a 429 becomes [`CuesmithError::RateLimited`] and any
/// other failure [`CuesmithError::Translation`].
pub async fn request_with_retry(
    transport: &dyn ChatTransport,
    policy: &RetryPolicy,
    request: &ChatRequest,
    timeout: Duration,
) -> Result<Option<String>> {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let failure = match transport.send(request, timeout).await {
            Ok(reply) if reply.status == 200 => return Ok(parse_content(&reply.body)),
            Ok(reply) if reply.status == 429 => Failure::RateLimited,
            Ok(reply) => Failure::Status {
                status: reply.status,
                body: truncate(&reply.body),
            },
            Err(e) => Failure::Transport(e.to_string()),
        };

        if attempt > policy.max_retries {
            return Err(match failure {
                Failure::RateLimited => CuesmithError::RateLimited { attempts: attempt },
                other => CuesmithError::Translation(format!("{} (after {} attempts)", other, attempt)),
            });
        }

        let delay = policy.delay_after(&failure, attempt);
        warn!(
            "Translation attempt {}/{} failed: {}; retrying in {:.1}s",
            attempt,
            policy.max_retries + 1,
            failure,
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;
    }
}
