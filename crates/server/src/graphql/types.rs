//! GraphQL output types that only exist at the API layer

use async_graphql::{ComplexObject, Context, ErrorExtensions, SimpleObject};

use super::app_state;
use crate::error::GqlResultExt;
use crate::models::Yapper;
use crate::relay::{Frame, RelayEvent};
use crate::vendors::analysis::FillerCount;
use crate::vendors::ConversationAnalysis;

#[ComplexObject]
impl Yapper {
    async fn followers(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Yapper>> {
        app_state(ctx)?
            .profiles
            .get_many(&self.follower_ids)
            .await
            .extended()
    }

    async fn following(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Yapper>> {
        app_state(ctx)?
            .profiles
            .get_many(&self.following_ids)
            .await
            .extended()
    }

    async fn follower_count(&self) -> i32 {
        saturating_count(self.follower_ids.len())
    }

    async fn following_count(&self) -> i32 {
        saturating_count(self.following_ids.len())
    }
}

/// GraphQL `Int` is 32-bit
fn saturating_count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// One event of `chatResponseStream`
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct ChatResponseChunk {
    pub chunk: String,
    pub is_complete: bool,
    pub message: String,
    pub character_id: String,
}

/// One event of `voiceResponseStream`
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct VoiceResponseChunk {
    /// Base64 audio, empty on the final event
    pub audio_chunk: String,
    pub is_complete: bool,
    pub voice_id: String,
    pub text: String,
}

/// Split a relay event into its payload and completion flag, or the error
/// carried by a failure frame.
pub(crate) fn frame_parts(event: RelayEvent) -> async_graphql::Result<(String, bool)> {
    match event.frame {
        Frame::Chunk(payload) => Ok((payload, false)),
        Frame::Complete(payload) => Ok((payload, true)),
        Frame::Failed { code, message } => Err(async_graphql::Error::new(message)
            .extend_with(|_, e| e.set("code", code))),
    }
}

/// Whole synthesized clip
#[derive(Debug, Clone, SimpleObject)]
pub struct AudioPayload {
    /// Base64 audio
    pub audio: String,
    pub content_type: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Transcription {
    pub text: String,
}

/// Result of `uploadAudio`: the transcript and its analysis
#[derive(Debug, Clone, SimpleObject)]
pub struct AudioAnalysis {
    pub transcript: String,
    pub analysis: ConversationAnalysis,
}

/// Fill the optional analysis fields the model left out
pub(crate) fn with_upload_defaults(mut analysis: ConversationAnalysis) -> ConversationAnalysis {
    analysis.summary.get_or_insert_with(String::new);
    analysis.tone.get_or_insert_with(|| "neutral".to_string());
    analysis
        .filler_breakdown
        .get_or_insert_with(Vec::<FillerCount>::new);
    analysis
}
