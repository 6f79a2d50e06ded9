use std::io::Read;

use async_graphql::{Context, Object, Upload, ID};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use tracing::{info, warn};

use super::types::{with_upload_defaults, AudioAnalysis, AudioPayload, Transcription};
use super::{app_state, require_caller};
use crate::characters;
use crate::error::{Error, GqlResultExt, Result};
use crate::models::{Auth, NewYapperInput, ProgressInput, Yapper};
use crate::relay::first_sentence;
use crate::vendors::prompts::character_system_prompt;
use crate::vendors::{ChatPrompt, ConversationAnalysis, FlirtAnalysis};

#[derive(Default)]
pub struct MutationRoot;

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Read an uploaded file into memory
fn read_upload(ctx: &Context<'_>, file: &Upload) -> Result<(String, Bytes)> {
    let value = file
        .value(ctx)
        .map_err(|e| Error::Validation(format!("could not read upload: {e}")))?;
    let filename = value.filename.clone();

    let mut content = Vec::new();
    value
        .into_read()
        .read_to_end(&mut content)
        .map_err(|e| Error::Validation(format!("could not read upload: {e}")))?;

    if content.is_empty() {
        return Err(Error::Validation("uploaded audio is empty".into()));
    }
    Ok((filename, Bytes::from(content)))
}

#[Object]
impl MutationRoot {
    /// Register a profile and sign the caller in
    async fn add_yapper(
        &self,
        ctx: &Context<'_>,
        input: NewYapperInput,
    ) -> async_graphql::Result<Auth> {
        let state = app_state(ctx)?;
        async {
            input.validate().map_err(Error::Validation)?;
            let password_hash = state.auth.hash_password(&input.password)?;
            let yapper = Yapper::new(input.name.trim(), input.email.trim(), password_hash);
            let yapper = state.profiles.create(yapper).await?;
            let token = state.auth.sign_token(&yapper)?;
            Ok::<_, Error>(Auth { token, yapper })
        }
        .await
        .extended()
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<Auth> {
        let state = app_state(ctx)?;
        async {
            let yapper = state
                .profiles
                .find_by_email(email.trim())
                .await?
                .ok_or(Error::LoginFail)?;

            if !state.auth.verify_password(&password, &yapper.password_hash)? {
                warn!("[Auth] Failed login for {}", yapper.name);
                return Err(Error::LoginFail);
            }

            let token = state.auth.sign_token(&yapper)?;
            info!("[Auth] {} logged in", yapper.name);
            Ok::<_, Error>(Auth { token, yapper })
        }
        .await
        .extended()
    }

    /// Update the caller's level/hearts/streak counters
    async fn update_progress(
        &self,
        ctx: &Context<'_>,
        input: ProgressInput,
    ) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        let state = app_state(ctx)?;
        async {
            input.validate().map_err(Error::Validation)?;
            state.profiles.update_progress(caller.id(), &input).await
        }
        .await
        .extended()
    }

    async fn update_hearts_and_streak(
        &self,
        ctx: &Context<'_>,
        yapper_id: ID,
        hearts: i32,
        streak: i32,
    ) -> async_graphql::Result<Yapper> {
        let state = app_state(ctx)?;
        async {
            if hearts < 0 || streak < 0 {
                return Err(Error::Validation(
                    "hearts and streak cannot be negative".into(),
                ));
            }
            state
                .profiles
                .update_hearts_and_streak(&yapper_id, hearts, streak)
                .await
        }
        .await
        .extended()
    }

    async fn update_avatar(
        &self,
        ctx: &Context<'_>,
        yapper_id: ID,
        avatar: String,
    ) -> async_graphql::Result<Yapper> {
        let state = app_state(ctx)?;
        async {
            required("avatar", &avatar)?;
            state.profiles.update_avatar(&yapper_id, avatar.trim()).await
        }
        .await
        .extended()
    }

    async fn add_skill(
        &self,
        ctx: &Context<'_>,
        yapper_id: ID,
        skill: String,
    ) -> async_graphql::Result<Yapper> {
        let state = app_state(ctx)?;
        async {
            required("skill", &skill)?;
            state.profiles.add_skill(&yapper_id, skill.trim()).await
        }
        .await
        .extended()
    }

    async fn remove_skill(&self, ctx: &Context<'_>, skill: String) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?
            .profiles
            .remove_skill(caller.id(), skill.trim())
            .await
            .extended()
    }

    /// Delete the caller's own profile
    async fn remove_yapper(&self, ctx: &Context<'_>) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?.profiles.remove(caller.id()).await.extended()
    }

    async fn follow_user(&self, ctx: &Context<'_>, yapper_id: ID) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?
            .profiles
            .follow(caller.id(), &yapper_id)
            .await
            .extended()
    }

    async fn unfollow_user(&self, ctx: &Context<'_>, yapper_id: ID) -> async_graphql::Result<Yapper> {
        let caller = require_caller(ctx)?;
        app_state(ctx)?
            .profiles
            .unfollow(caller.id(), &yapper_id)
            .await
            .extended()
    }

    /// Transcribe a recording and score it
    async fn upload_audio(&self, ctx: &Context<'_>, file: Upload) -> async_graphql::Result<AudioAnalysis> {
        let state = app_state(ctx)?;
        let upload = read_upload(ctx, &file);
        async {
            let (filename, audio) = upload?;
            let transcript = state
                .vendors
                .transcriber
                .transcribe(audio, &filename)
                .await
                .map_err(Error::vendor("speech to text"))?;

            let analysis = state
                .vendors
                .analyzer()
                .analyze_transcript(&transcript)
                .await
                .map_err(Error::vendor("conversation analysis"))?;

            Ok::<_, Error>(AudioAnalysis {
                transcript,
                analysis: with_upload_defaults(analysis),
            })
        }
        .await
        .extended()
    }

    async fn convert_speech_to_text(
        &self,
        ctx: &Context<'_>,
        file: Upload,
    ) -> async_graphql::Result<Transcription> {
        let state = app_state(ctx)?;
        let upload = read_upload(ctx, &file);
        async {
            let (filename, audio) = upload?;
            let text = state
                .vendors
                .transcriber
                .transcribe(audio, &filename)
                .await
                .map_err(Error::vendor("speech to text"))?;
            Ok::<_, Error>(Transcription { text })
        }
        .await
        .extended()
    }

    async fn analyze_conversation(
        &self,
        ctx: &Context<'_>,
        transcript: String,
    ) -> async_graphql::Result<ConversationAnalysis> {
        let state = app_state(ctx)?;
        async {
            required("transcript", &transcript)?;
            state
                .vendors
                .analyzer()
                .analyze_transcript(&transcript)
                .await
                .map_err(Error::vendor("conversation analysis"))
        }
        .await
        .extended()
    }

    async fn analyze_flirting(
        &self,
        ctx: &Context<'_>,
        message: String,
    ) -> async_graphql::Result<FlirtAnalysis> {
        let state = app_state(ctx)?;
        async {
            required("message", &message)?;
            state
                .vendors
                .flirt_coach()
                .analyze(&message)
                .await
                .map_err(Error::vendor("flirting analysis"))
        }
        .await
        .extended()
    }

    /// Whole-clip speech synthesis
    async fn generate_voice_response(
        &self,
        ctx: &Context<'_>,
        voice_id: String,
        text: String,
    ) -> async_graphql::Result<AudioPayload> {
        let state = app_state(ctx)?;
        async {
            required("voiceId", &voice_id)?;
            required("text", &text)?;
            let audio = state
                .vendors
                .speech
                .synthesize(&voice_id, &text)
                .await
                .map_err(Error::vendor("voice response"))?;

            Ok::<_, Error>(AudioPayload {
                audio: BASE64.encode(&audio),
                content_type: "audio/mpeg".to_string(),
            })
        }
        .await
        .extended()
    }

    /// One-sentence in-character reply, without streaming
    async fn generate_chat_response(
        &self,
        ctx: &Context<'_>,
        message: String,
        character_id: ID,
    ) -> async_graphql::Result<String> {
        let state = app_state(ctx)?;
        async {
            let character = characters::find(&character_id)
                .ok_or_else(|| Error::Validation(format!("Unknown character: {}", *character_id)))?;
            required("message", &message)?;

            let prompt = ChatPrompt::new(character_system_prompt(character.persona), message);
            let reply = state
                .vendors
                .chat
                .complete(prompt)
                .await
                .map_err(Error::vendor("chat response"))?;
            Ok::<_, Error>(first_sentence(&reply))
        }
        .await
        .extended()
    }

    /// Stream a chat reply to `chatResponseStream` subscribers, returning the
    /// first sentence
    async fn stream_chat_response(
        &self,
        ctx: &Context<'_>,
        message: String,
        character_id: ID,
    ) -> async_graphql::Result<String> {
        app_state(ctx)?
            .relay
            .stream_chat(&message, &character_id)
            .await
            .extended()
    }

    /// Stream synthesized audio to `voiceResponseStream` subscribers,
    /// returning the whole clip as base64
    async fn stream_voice_response(
        &self,
        ctx: &Context<'_>,
        voice_id: String,
        text: String,
    ) -> async_graphql::Result<String> {
        app_state(ctx)?
            .relay
            .stream_voice(&voice_id, &text)
            .await
            .extended()
    }
}
