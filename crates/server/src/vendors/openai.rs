//! OpenAI adapters: chat completion (through genai) and Whisper transcription.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatResponseFormat, ChatStreamEvent};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client as GenAIClient, ModelIden};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    status_error, ChatCompletion, ChatPrompt, SpeechToText, TextStream, VendorError, VendorResult,
};
use crate::config::OpenAiConfig;

const VENDOR: &str = "OpenAI";

/// Chat completion adapter
pub struct OpenAiChat {
    client: GenAIClient,
    model: String,
    configured: bool,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("model", &self.model)
            .field("configured", &self.configured)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: &OpenAiConfig) -> Self {
        let client = match &config.api_key {
            Some(key) => {
                let key = key.expose_secret().clone();
                let auth_resolver = AuthResolver::from_resolver_fn(
                    move |_model: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                        Ok(Some(AuthData::from_single(key.clone())))
                    },
                );
                GenAIClient::builder().with_auth_resolver(auth_resolver).build()
            }
            None => GenAIClient::default(),
        };

        info!("[Vendor] OpenAI chat using model {}", config.chat_model);

        Self {
            client,
            model: config.chat_model.clone(),
            configured: config.api_key.is_some(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    fn ensure_configured(&self) -> VendorResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(VendorError::NotConfigured { vendor: VENDOR })
        }
    }
}

/// Build the genai request for one prompt
fn build_request(prompt: &ChatPrompt) -> (ChatRequest, ChatOptions) {
    let request = ChatRequest::new(vec![
        ChatMessage::system(prompt.system.as_str()),
        ChatMessage::user(prompt.user.as_str()),
    ]);

    let mut options = ChatOptions::default().with_temperature(prompt.temperature);
    if prompt.json {
        options = options.with_response_format(ChatResponseFormat::JsonMode);
    }

    (request, options)
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, prompt: ChatPrompt) -> VendorResult<String> {
        self.ensure_configured()?;
        let (request, options) = build_request(&prompt);

        debug!("[Vendor] Calling {} for completion", self.model);
        let response = self
            .client
            .exec_chat(&self.model, request, Some(&options))
            .await
            .map_err(|e| VendorError::transport(VENDOR, e))?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| VendorError::payload(VENDOR, "response contained no text"))
    }

    async fn stream(&self, prompt: ChatPrompt) -> VendorResult<TextStream> {
        self.ensure_configured()?;
        let (request, options) = build_request(&prompt);

        debug!("[Vendor] Opening {} stream", self.model);
        let response = self
            .client
            .exec_chat_stream(&self.model, request, Some(&options))
            .await
            .map_err(|e| VendorError::transport(VENDOR, e))?;

        let deltas = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    Some(Ok(chunk.content))
                }
                Ok(_) => None,
                Err(e) => Some(Err(VendorError::transport(VENDOR, e))),
            }
        });

        Ok(deltas.boxed())
    }
}

/// Whisper speech-to-text adapter
#[derive(Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: Option<Secret<String>>,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTranscriber")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiTranscriber {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
        }
    }

    fn api_key(&self) -> VendorResult<&Secret<String>> {
        self.api_key
            .as_ref()
            .ok_or(VendorError::NotConfigured { vendor: VENDOR })
    }
}

/// Pick a mime type from the upload's extension
fn audio_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "audio/webm",
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> VendorResult<String> {
        let api_key = self.api_key()?;

        let file_part = Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(audio_mime(filename))
            .map_err(|e| VendorError::transport(VENDOR, e))?;
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!("[Vendor] Transcribing {} ({} bytes)", filename, audio.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| VendorError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            return Err(status_error(VENDOR, response).await);
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VendorError::payload(VENDOR, e))?;

        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: key.map(|k| Secret::new(k.to_string())),
            base_url: base_url.to_string(),
            ..OpenAiConfig::default()
        }
    }

    #[test]
    fn test_audio_mime() {
        assert_eq!(audio_mime("clip.MP3"), "audio/mpeg");
        assert_eq!(audio_mime("clip.wav"), "audio/wav");
        assert_eq!(audio_mime("recording"), "audio/webm");
    }

    #[tokio::test]
    async fn test_chat_without_key_is_not_configured() {
        let chat = OpenAiChat::new(&config("http://unused", None));
        assert!(!chat.is_configured());
        let err = chat.complete(ChatPrompt::new("sys", "hi")).await.unwrap_err();
        assert!(matches!(err, VendorError::NotConfigured { .. }));
        assert!(chat.stream(ChatPrompt::new("sys", "hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "um hello" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stt = OpenAiTranscriber::new(&config(&server.uri(), Some("sk-test")));
        let text = stt
            .transcribe(Bytes::from_static(b"RIFF"), "clip.wav")
            .await
            .unwrap();
        assert_eq!(text, "um hello");
    }

    #[tokio::test]
    async fn test_transcribe_http_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let stt = OpenAiTranscriber::new(&config(&server.uri(), Some("sk-test")));
        let err = stt
            .transcribe(Bytes::from_static(b"RIFF"), "clip.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, VendorError::Status { status: 429, .. }));
        assert!(!err.is_payload());
    }

    #[tokio::test]
    async fn test_transcribe_malformed_body_is_payload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nope": 1 })))
            .mount(&server)
            .await;

        let stt = OpenAiTranscriber::new(&config(&server.uri(), Some("sk-test")));
        let err = stt
            .transcribe(Bytes::from_static(b"RIFF"), "clip.wav")
            .await
            .unwrap_err();
        assert!(err.is_payload());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let stt = OpenAiTranscriber::new(&config("http://x", Some("sk-super-secret")));
        let debug = format!("{stt:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-super-secret"));
    }
}
