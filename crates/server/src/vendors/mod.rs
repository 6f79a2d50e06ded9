//! AI vendor adapters
//!
//! Each adapter wraps exactly one vendor call. Traits sit at the seam so the
//! relay and resolvers can run against fakes in tests.

pub mod analysis;
pub mod elevenlabs;
pub mod openai;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use analysis::{ConversationAnalysis, ConversationAnalyzer, FlirtAnalysis, FlirtCoach};
pub use elevenlabs::ElevenLabsTts;
pub use openai::{OpenAiChat, OpenAiTranscriber};

pub type VendorResult<T> = std::result::Result<T, VendorError>;

/// Incremental text deltas from a chat completion
pub type TextStream = BoxStream<'static, VendorResult<String>>;

/// Incremental audio bytes from a speech synthesis stream
pub type AudioStream = BoxStream<'static, VendorResult<Bytes>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum VendorError {
    #[error("{vendor} API key not configured")]
    NotConfigured { vendor: &'static str },

    #[error("{vendor} request failed: {message}")]
    Transport { vendor: &'static str, message: String },

    #[error("{vendor} returned HTTP {status}: {body}")]
    Status {
        vendor: &'static str,
        status: u16,
        body: String,
    },

    #[error("{vendor} returned an unexpected payload: {message}")]
    Payload { vendor: &'static str, message: String },
}

impl VendorError {
    pub fn transport(vendor: &'static str, err: impl std::fmt::Display) -> Self {
        VendorError::Transport {
            vendor,
            message: err.to_string(),
        }
    }

    pub fn payload(vendor: &'static str, err: impl std::fmt::Display) -> Self {
        VendorError::Payload {
            vendor,
            message: err.to_string(),
        }
    }

    /// Response arrived but its shape was wrong
    pub fn is_payload(&self) -> bool {
        matches!(self, VendorError::Payload { .. })
    }
}

/// One chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    /// Ask the vendor for a JSON object response
    pub json: bool,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: prompts::CHAT_TEMPERATURE,
            json: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Full response text
    async fn complete(&self, prompt: ChatPrompt) -> VendorResult<String>;

    /// Response as incremental text deltas
    async fn stream(&self, prompt: ChatPrompt) -> VendorResult<TextStream>;
}

#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Whole audio clip for `text` spoken by `voice_id`
    async fn synthesize(&self, voice_id: &str, text: &str) -> VendorResult<Bytes>;

    /// Audio clip delivered as it is generated
    async fn synthesize_stream(&self, voice_id: &str, text: &str) -> VendorResult<AudioStream>;
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> VendorResult<String>;
}

/// The vendor adapters a server instance talks to
#[derive(Clone)]
pub struct Vendors {
    pub chat: Arc<dyn ChatCompletion>,
    pub speech: Arc<dyn SpeechSynthesis>,
    pub transcriber: Arc<dyn SpeechToText>,
}

impl Vendors {
    /// Live adapters built from config
    pub fn from_config(config: &crate::config::ServerConfig) -> Self {
        Self {
            chat: Arc::new(OpenAiChat::new(&config.openai)),
            speech: Arc::new(ElevenLabsTts::new(&config.elevenlabs)),
            transcriber: Arc::new(OpenAiTranscriber::new(&config.openai)),
        }
    }

    pub fn analyzer(&self) -> ConversationAnalyzer {
        ConversationAnalyzer::new(self.chat.clone())
    }

    pub fn flirt_coach(&self) -> FlirtCoach {
        FlirtCoach::new(self.chat.clone())
    }
}

/// Keep vendor error bodies short enough for logs and GraphQL messages
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Map a non-success HTTP response into a vendor error
pub(crate) async fn status_error(vendor: &'static str, response: reqwest::Response) -> VendorError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    VendorError::Status {
        vendor,
        status,
        body: truncate_body(&body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 303);
    }

    #[test]
    fn test_prompt_builder() {
        let prompt = ChatPrompt::new("sys", "hi").with_temperature(0.2).json();
        assert!(prompt.json);
        assert_eq!(prompt.temperature, 0.2);
    }
}
