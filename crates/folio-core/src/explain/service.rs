//! Outbound explanation requests.
//!
//! The registry only sees the `ExplanationService` trait; `AnthropicClient` is
//! the production implementation speaking the Messages API over blocking
//! `reqwest`.

use super::types::ChatRole;
use crate::config::AppConfig;
use crate::context_window::ContextLine;
use crate::model::Ordinal;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PREAMBLE: &str = "You are a thoughtful Shakespeare tutor. Offer clear, grounded explanations that connect language, rhetoric, and dramatic stakes. Focus on the play text provided and avoid spoilers beyond the surrounding context unless asked.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExplainError {
    #[error("Add your Anthropic API key in the chat panel to start chatting.")]
    MissingCredential,
    #[error("Unable to reach the explanation service: {0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Unable to read the explanation response: {0}")]
    Parse(String),
    #[error("Claude did not return any text. Try asking again.")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Transcript plus the grounding fields of the anchored line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainRequest {
    pub session_id: String,
    pub api_key: String,
    pub play_name: String,
    pub act: Ordinal,
    pub scene: Ordinal,
    pub line_sentence: Ordinal,
    pub speaker: String,
    pub line_text: String,
    pub context: Vec<ContextLine>,
    pub messages: Vec<ExplainTurn>,
    pub follow_ups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainResponse {
    pub text: String,
    /// Replacement suggestions; empty keeps the session's current list.
    pub follow_ups: Vec<String>,
}

pub trait ExplanationService {
    fn explain(&self, request: &ExplainRequest) -> Result<ExplainResponse, ExplainError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicSettings {
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl From<&AppConfig> for AnthropicSettings {
    fn from(config: &AppConfig) -> Self {
        AnthropicSettings {
            base_url: config.explain_base_url.clone(),
            model: config.explain_model.clone(),
            api_version: config.explain_api_version.clone(),
            max_tokens: config.explain_max_tokens,
            temperature: config.explain_temperature,
            timeout: Duration::from_secs(config.explain_timeout_secs),
        }
    }
}

pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    settings: AnthropicSettings,
}

impl AnthropicClient {
    pub fn new(settings: AnthropicSettings) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, settings })
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, request: &ExplainRequest) -> MessagesBody {
        MessagesBody {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: build_system_prompt(request),
            messages: render_messages(&request.messages),
        }
    }
}

impl ExplanationService for AnthropicClient {
    fn explain(&self, request: &ExplainRequest) -> Result<ExplainResponse, ExplainError> {
        if request.api_key.trim().is_empty() {
            return Err(ExplainError::MissingCredential);
        }
        let url = self.messages_url();
        debug!(
            session = %request.session_id,
            turns = request.messages.len(),
            model = %self.settings.model,
            "Sending explanation request"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", request.api_key.trim())
            .header("anthropic-version", &self.settings.api_version)
            .json(&self.build_body(request))
            .send()
            .map_err(|err| ExplainError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(session = %request.session_id, status = status.as_u16(), "Explanation request rejected");
            return Err(ExplainError::Status {
                status: status.as_u16(),
                message: status_message(status.as_u16(), &body),
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .map_err(|err| ExplainError::Parse(err.to_string()))?;
        let text = join_text_blocks(&parsed.content)?;
        Ok(ExplainResponse {
            text,
            follow_ups: request.follow_ups.clone(),
        })
    }
}

/// Tutor preamble followed by the anchored line and its rendered neighborhood.
pub fn build_system_prompt(request: &ExplainRequest) -> String {
    let context = request
        .context
        .iter()
        .map(|line| {
            if line.character.is_empty() {
                format!("Line {}: {}", line.sentence, line.text)
            } else {
                format!("Line {} ({}): {}", line.sentence, line.character, line.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{SYSTEM_PREAMBLE}\n\nPlay: {}\nAct: {}\nScene: {}\nSpeaker: {}\nLine number: {}\nLine text: {}\n\nContext window:\n{context}",
        request.play_name,
        request.act,
        request.scene,
        request.speaker,
        request.line_sentence,
        request.line_text,
    )
}

fn render_messages(turns: &[ExplainTurn]) -> Vec<ApiMessage> {
    turns
        .iter()
        .map(|turn| ApiMessage {
            role: turn.role,
            content: vec![TextBlock {
                kind: "text",
                text: turn.text.clone(),
            }],
        })
        .collect()
}

fn join_text_blocks(blocks: &[ContentBlock]) -> Result<String, ExplainError> {
    let text = blocks
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if text.is_empty() {
        Err(ExplainError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn status_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Explanation request failed ({status})"))
}

#[derive(Debug, Serialize)]
struct MessagesBody {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: ChatRole,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
