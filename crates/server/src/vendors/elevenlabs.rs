//! ElevenLabs text-to-speech adapter, whole-clip and streaming variants.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use tracing::debug;

use super::{status_error, AudioStream, SpeechSynthesis, VendorError, VendorResult};
use crate::config::ElevenLabsConfig;

const VENDOR: &str = "ElevenLabs";

/// ElevenLabs TTS provider
#[derive(Clone)]
pub struct ElevenLabsTts {
    client: reqwest::Client,
    api_key: Option<Secret<String>>,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for ElevenLabsTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsTts")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

impl ElevenLabsTts {
    pub fn new(config: &ElevenLabsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the synthesis request and check the status
    async fn send(&self, voice_id: &str, text: &str, streaming: bool) -> VendorResult<reqwest::Response> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(VendorError::NotConfigured { vendor: VENDOR })?;

        let suffix = if streaming { "/stream" } else { "" };
        let url = format!("{}/text-to-speech/{}{}", self.base_url, voice_id, suffix);

        debug!(
            "[Vendor] ElevenLabs synthesis voice={} chars={} stream={}",
            voice_id,
            text.chars().count(),
            streaming
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SynthesisBody {
                text,
                model_id: &self.model,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await
            .map_err(|e| VendorError::transport(VENDOR, e))?;

        if !response.status().is_success() {
            return Err(status_error(VENDOR, response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl SpeechSynthesis for ElevenLabsTts {
    async fn synthesize(&self, voice_id: &str, text: &str) -> VendorResult<Bytes> {
        let response = self.send(voice_id, text, false).await?;
        let audio = response
            .bytes()
            .await
            .map_err(|e| VendorError::transport(VENDOR, e))?;

        if audio.is_empty() {
            return Err(VendorError::payload(VENDOR, "empty audio body"));
        }
        Ok(audio)
    }

    async fn synthesize_stream(&self, voice_id: &str, text: &str) -> VendorResult<AudioStream> {
        let response = self.send(voice_id, text, true).await?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| VendorError::transport(VENDOR, e)));

        Ok(chunks.boxed())
    }
}
