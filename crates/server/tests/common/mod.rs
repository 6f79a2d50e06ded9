#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::{Request, Response, Variables};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use yapgpt_server::config::{AppState, ServerConfig};
use yapgpt_server::graphql::{build_schema, YapSchema};
use yapgpt_server::vendors::{
    AudioStream, ChatCompletion, ChatPrompt, SpeechSynthesis, SpeechToText, TextStream,
    VendorError, VendorResult, Vendors,
};

/// Chat fake: streams the scripted deltas for the user message, or the
/// default script. `complete` returns the concatenation.
#[derive(Default)]
pub struct FakeChat {
    scripts: HashMap<String, Vec<String>>,
    default: Vec<String>,
    json_reply: Option<String>,
}

impl FakeChat {
    pub fn replying(deltas: &[&str]) -> Self {
        Self {
            default: deltas.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn script(mut self, message: &str, deltas: &[&str]) -> Self {
        self.scripts.insert(
            message.to_string(),
            deltas.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    /// Reply used for JSON-mode prompts (analysis features)
    pub fn json(mut self, reply: &str) -> Self {
        self.json_reply = Some(reply.to_string());
        self
    }

    fn deltas_for(&self, prompt: &ChatPrompt) -> Vec<String> {
        self.scripts
            .get(&prompt.user)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, prompt: ChatPrompt) -> VendorResult<String> {
        if prompt.json {
            return self
                .json_reply
                .clone()
                .ok_or_else(|| VendorError::payload("Fake", "no json reply scripted"));
        }
        Ok(self.deltas_for(&prompt).concat())
    }

    async fn stream(&self, prompt: ChatPrompt) -> VendorResult<TextStream> {
        let deltas = self.deltas_for(&prompt);
        let stream = async_stream::stream! {
            for delta in deltas {
                // Let concurrent exchanges interleave
                tokio::task::yield_now().await;
                yield Ok(delta);
            }
        };
        Ok(stream.boxed())
    }
}

/// Speech fake: fixed audio chunks for every request
#[derive(Default)]
pub struct FakeSpeech {
    chunks: Vec<Bytes>,
}

impl FakeSpeech {
    pub fn chunks(chunks: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
        }
    }
}

#[async_trait]
impl SpeechSynthesis for FakeSpeech {
    async fn synthesize(&self, _voice_id: &str, _text: &str) -> VendorResult<Bytes> {
        if self.chunks.is_empty() {
            return Err(VendorError::payload("Fake", "empty audio body"));
        }
        Ok(self.chunks.concat().into())
    }

    async fn synthesize_stream(&self, _voice_id: &str, _text: &str) -> VendorResult<AudioStream> {
        let chunks: Vec<VendorResult<Bytes>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

pub struct FakeTranscriber(pub String);

#[async_trait]
impl SpeechToText for FakeTranscriber {
    async fn transcribe(&self, audio: Bytes, _filename: &str) -> VendorResult<String> {
        assert!(!audio.is_empty());
        Ok(self.0.clone())
    }
}

pub struct Harness {
    pub state: AppState,
    pub schema: YapSchema,
}

impl Harness {
    pub async fn new(chat: FakeChat, speech: FakeSpeech) -> Self {
        Self::with_transcript(chat, speech, "").await
    }

    pub async fn with_transcript(chat: FakeChat, speech: FakeSpeech, transcript: &str) -> Self {
        let config = ServerConfig {
            database_url: Some("sqlite::memory:".to_string()),
            bcrypt_cost: 4,
            ..ServerConfig::default()
        };
        let vendors = Vendors {
            chat: Arc::new(chat),
            speech: Arc::new(speech),
            transcriber: Arc::new(FakeTranscriber(transcript.to_string())),
        };
        let state = yapgpt_server::build_state(config, vendors).await.unwrap();
        let schema = build_schema(state.clone());
        Self { state, schema }
    }

    pub async fn execute(&self, query: &str, variables: serde_json::Value) -> Response {
        self.schema
            .execute(Request::new(query).variables(Variables::from_json(variables)))
            .await
    }

    /// Execute with the caller resolved from `token`
    pub async fn execute_as(&self, token: &str, query: &str, variables: serde_json::Value) -> Response {
        let caller = self
            .state
            .auth
            .caller_from_value(&format!("Bearer {token}"))
            .unwrap();
        self.schema
            .execute(
                Request::new(query)
                    .variables(Variables::from_json(variables))
                    .data(caller),
            )
            .await
    }

    /// Register a profile, returning `(id, token)`
    pub async fn register(&self, name: &str, email: &str, password: &str) -> (String, String) {
        let response = self
            .execute(
                r#"mutation($input: NewYapperInput!) {
                    addYapper(input: $input) { token yapper { _id } }
                }"#,
                serde_json::json!({
                    "input": { "name": name, "email": email, "password": password }
                }),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let data = response.data.into_json().unwrap();
        let id = data["addYapper"]["yapper"]["_id"].as_str().unwrap().to_string();
        let token = data["addYapper"]["token"].as_str().unwrap().to_string();
        (id, token)
    }
}

/// `extensions.code` of the first error
pub fn error_code(response: &Response) -> String {
    let error = response.errors.first().expect("expected an error");
    let extensions = serde_json::to_value(&error.extensions).unwrap();
    extensions["code"].as_str().unwrap_or_default().to_string()
}
