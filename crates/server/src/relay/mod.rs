//! Streaming chat/voice relay
//!
//! A mutation drives one upstream vendor stream and republishes every unit
//! on a shared topic tagged with its correlation key. Subscriptions filter
//! that topic down to their own key and end after the terminal frame.

pub mod pubsub;
pub mod sentence;

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::characters;
use crate::error::{Error, Result};
use crate::vendors::prompts::character_system_prompt;
use crate::vendors::{ChatCompletion, ChatPrompt, SpeechSynthesis, VendorError, VendorResult};

pub use pubsub::PubSub;
pub use sentence::first_sentence;

pub const CHAT_TOPIC: &str = "CHAT_RESPONSE_STREAM";
pub const VOICE_TOPIC: &str = "VOICE_RESPONSE_STREAM";

const CHAT_FEATURE: &str = "chat response";
const VOICE_FEATURE: &str = "voice response";

/// Fields that tie a subscription to the producer's events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    Chat { message: String, character_id: String },
    Voice { voice_id: String, text: String },
}

impl CorrelationKey {
    pub fn chat(message: impl Into<String>, character_id: impl Into<String>) -> Self {
        CorrelationKey::Chat {
            message: message.into(),
            character_id: character_id.into(),
        }
    }

    pub fn voice(voice_id: impl Into<String>, text: impl Into<String>) -> Self {
        CorrelationKey::Voice {
            voice_id: voice_id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Raw text delta (chat) or base64 audio (voice)
    Chunk(String),
    /// Final frame: truncated sentence (chat) or empty (voice)
    Complete(String),
    /// Exchange failed
    Failed { code: &'static str, message: String },
}

impl Frame {
    fn failed(err: &Error) -> Self {
        Frame::Failed {
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Chunk(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayEvent {
    pub key: CorrelationKey,
    pub frame: Frame,
}

pub type RelayStream = BoxStream<'static, RelayEvent>;

type InFlightKeys = Arc<Mutex<HashSet<CorrelationKey>>>;

/// Removes its key from the in-flight set when the exchange ends
struct InFlight {
    keys: InFlightKeys,
    key: CorrelationKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}

/// Exchanges run on their own task, so a dropped caller never leaves
/// subscribers without a terminal frame.
pub struct StreamingRelay {
    bus: PubSub<RelayEvent>,
    chat: Arc<dyn ChatCompletion>,
    speech: Arc<dyn SpeechSynthesis>,
    in_flight: InFlightKeys,
}

impl StreamingRelay {
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        speech: Arc<dyn SpeechSynthesis>,
        capacity: usize,
    ) -> Self {
        Self {
            bus: PubSub::new(capacity),
            chat,
            speech,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run one chat exchange: publish each delta, then the first sentence.
    /// Returns the first sentence.
    pub async fn stream_chat(self: &Arc<Self>, message: &str, character_id: &str) -> Result<String> {
        let character = characters::find(character_id)
            .ok_or_else(|| Error::Validation(format!("Unknown character: {character_id}")))?;
        if message.trim().is_empty() {
            return Err(Error::Validation("message is required".into()));
        }

        let key = CorrelationKey::chat(message, character_id);
        let guard = self.claim(&key)?;
        info!("[Relay] Chat exchange started for character {}", character.id);

        let relay = Arc::clone(self);
        let prompt = ChatPrompt::new(character_system_prompt(character.persona), message);
        join(tokio::spawn(async move {
            let _guard = guard;
            relay.chat_exchange(&key, prompt).await
        }))
        .await
    }

    /// Run one voice exchange: publish each audio chunk as base64, then an
    /// empty terminal frame. Returns base64 of the whole clip.
    pub async fn stream_voice(self: &Arc<Self>, voice_id: &str, text: &str) -> Result<String> {
        if voice_id.trim().is_empty() {
            return Err(Error::Validation("voiceId is required".into()));
        }
        if text.trim().is_empty() {
            return Err(Error::Validation("text is required".into()));
        }

        let key = CorrelationKey::voice(voice_id, text);
        let guard = self.claim(&key)?;
        info!("[Relay] Voice exchange started for voice {}", voice_id);

        let relay = Arc::clone(self);
        let (voice_id, text) = (voice_id.to_string(), text.to_string());
        join(tokio::spawn(async move {
            let _guard = guard;
            relay.voice_exchange(&key, &voice_id, &text).await
        }))
        .await
    }

    async fn chat_exchange(&self, key: &CorrelationKey, prompt: ChatPrompt) -> Result<String> {
        let upstream = self.chat.stream(prompt).await;
        let deltas = self
            .pump(CHAT_TOPIC, key, CHAT_FEATURE, upstream, |delta: &String| {
                delta.clone()
            })
            .await?;

        let full: String = deltas.concat();
        let sentence = first_sentence(&full);
        self.publish(CHAT_TOPIC, key, Frame::Complete(sentence.clone()))
            .await;

        info!(
            "[Relay] Chat exchange complete: {} chars streamed, {} kept",
            full.len(),
            sentence.len()
        );
        Ok(sentence)
    }

    async fn voice_exchange(&self, key: &CorrelationKey, voice_id: &str, text: &str) -> Result<String> {
        let upstream = self.speech.synthesize_stream(voice_id, text).await;
        let chunks = self
            .pump(VOICE_TOPIC, key, VOICE_FEATURE, upstream, |chunk: &bytes::Bytes| {
                BASE64.encode(chunk)
            })
            .await?;

        let audio = chunks.concat();
        self.publish(VOICE_TOPIC, key, Frame::Complete(String::new()))
            .await;

        info!("[Relay] Voice exchange complete: {} bytes", audio.len());
        Ok(BASE64.encode(&audio))
    }

    /// Subscriber side of `stream_chat`
    pub async fn chat_events(&self, message: &str, character_id: &str) -> RelayStream {
        self.events(CHAT_TOPIC, CorrelationKey::chat(message, character_id))
            .await
    }

    /// Subscriber side of `stream_voice`
    pub async fn voice_events(&self, voice_id: &str, text: &str) -> RelayStream {
        self.events(VOICE_TOPIC, CorrelationKey::voice(voice_id, text))
            .await
    }

    /// Live subscribers on a relay topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.bus.subscriber_count(topic).await
    }

    async fn events(&self, topic: &'static str, key: CorrelationKey) -> RelayStream {
        debug!("[Relay] Subscriber attached to {}: {:?}", topic, key);
        let mut events = self
            .bus
            .subscribe(topic, move |event: &RelayEvent| event.key == key)
            .await;

        async_stream::stream! {
            while let Some(event) = events.next().await {
                let terminal = event.frame.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        }
        .boxed()
    }

    fn claim(&self, key: &CorrelationKey) -> Result<InFlight> {
        let mut keys = self.in_flight.lock();
        if !keys.insert(key.clone()) {
            warn!("[Relay] Rejected duplicate exchange: {:?}", key);
            return Err(Error::Validation(
                "An identical stream is already in progress".into(),
            ));
        }
        Ok(InFlight {
            keys: Arc::clone(&self.in_flight),
            key: key.clone(),
        })
    }

    async fn publish(&self, topic: &str, key: &CorrelationKey, frame: Frame) {
        self.bus
            .publish(
                topic,
                RelayEvent {
                    key: key.clone(),
                    frame,
                },
            )
            .await;
    }

    /// Forward every upstream item as a chunk frame and collect the items.
    /// On upstream failure or an empty stream a failure frame is published
    /// instead of a completion.
    async fn pump<I, F>(
        &self,
        topic: &str,
        key: &CorrelationKey,
        feature: &'static str,
        upstream: VendorResult<BoxStream<'static, VendorResult<I>>>,
        encode: F,
    ) -> Result<Vec<I>>
    where
        I: AsRef<[u8]>,
        F: Fn(&I) -> String,
    {
        let mut upstream = match upstream {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail(topic, key, feature, err).await),
        };

        let mut items = Vec::new();
        while let Some(item) = upstream.next().await {
            match item {
                Ok(item) if item.as_ref().is_empty() => continue,
                Ok(item) => {
                    self.publish(topic, key, Frame::Chunk(encode(&item))).await;
                    items.push(item);
                }
                Err(err) => return Err(self.fail(topic, key, feature, err).await),
            }
        }

        if items.is_empty() {
            let err = Error::EmptyStream { feature };
            warn!("[Relay] {} stream closed without data", feature);
            self.publish(topic, key, Frame::failed(&err)).await;
            return Err(err);
        }

        Ok(items)
    }

    async fn fail(
        &self,
        topic: &str,
        key: &CorrelationKey,
        feature: &'static str,
        err: VendorError,
    ) -> Error {
        warn!("[Relay] {} stream failed: {}", feature, err);
        let err = Error::vendor(feature)(err);
        self.publish(topic, key, Frame::failed(&err)).await;
        err
    }
}

/// Wait for a spawned exchange. Dropping the returned future detaches the
/// task instead of cancelling it.
async fn join(task: JoinHandle<Result<String>>) -> Result<String> {
    task.await
        .map_err(|e| Error::Internal(format!("relay task failed: {e}")))?
}
