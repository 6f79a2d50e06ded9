use async_graphql::{Context, Subscription, ID};
use futures::{Stream, StreamExt};

use super::app_state;
use super::types::{frame_parts, ChatResponseChunk, VoiceResponseChunk};

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Chunks of the `streamChatResponse` exchange with the same message and
    /// character. Ends after the `isComplete` chunk or an error.
    async fn chat_response_stream(
        &self,
        ctx: &Context<'_>,
        message: String,
        character_id: ID,
    ) -> async_graphql::Result<impl Stream<Item = async_graphql::Result<ChatResponseChunk>>> {
        let events = app_state(ctx)?
            .relay
            .chat_events(&message, &character_id)
            .await;
        let character_id = character_id.to_string();

        Ok(events.map(move |event| -> async_graphql::Result<ChatResponseChunk> {
            let (chunk, is_complete) = frame_parts(event)?;
            Ok(ChatResponseChunk {
                chunk,
                is_complete,
                message: message.clone(),
                character_id: character_id.clone(),
            })
        }))
    }

    /// Base64 audio of the `streamVoiceResponse` exchange with the same voice
    /// and text
    async fn voice_response_stream(
        &self,
        ctx: &Context<'_>,
        voice_id: String,
        text: String,
    ) -> async_graphql::Result<impl Stream<Item = async_graphql::Result<VoiceResponseChunk>>> {
        let events = app_state(ctx)?.relay.voice_events(&voice_id, &text).await;

        Ok(events.map(move |event| -> async_graphql::Result<VoiceResponseChunk> {
            let (audio_chunk, is_complete) = frame_parts(event)?;
            Ok(VoiceResponseChunk {
                audio_chunk,
                is_complete,
                voice_id: voice_id.clone(),
                text: text.clone(),
            })
        }))
    }
}
