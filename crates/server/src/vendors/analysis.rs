//! LLM-backed analysis features and the decoders for their JSON replies.
//!
//! Decoders are strict: a required key that is missing or has the wrong
//! primitive type is a payload failure. Optional keys stay `None` here;
//! callers decide on defaults.

use std::sync::Arc;

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompts::{ANALYSIS_TEMPERATURE, CONVERSATION_ANALYSIS, FLIRT_ANALYSIS};
use super::{ChatCompletion, ChatPrompt, VendorError, VendorResult};

const VENDOR: &str = "OpenAI";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct WordSentenceCounts {
    pub words: i32,
    pub sentences: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct FillerCount {
    pub word: String,
    pub count: i32,
}

/// Transcript analysis as returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAnalysis {
    pub filler_word_count: i32,
    pub filler_words: Vec<String>,
    pub grammar_score: f64,
    pub charisma_score: f64,
    pub counts: WordSentenceCounts,
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub filler_breakdown: Option<Vec<FillerCount>>,
}

/// Message rating for `analyzeFlirting`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct FlirtAnalysis {
    pub score: i32,
    pub feedback: String,
    pub suggestion: String,
}

/// Pull the JSON object out of a model reply, tolerating code fences and
/// stray prose around it.
fn json_object(raw: &str) -> VendorResult<&str> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(VendorError::payload(VENDOR, "reply did not contain a JSON object")),
    }
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> VendorResult<T> {
    let object = json_object(raw)?;
    serde_json::from_str(object).map_err(|e| {
        warn!("[Vendor] Rejected analysis payload: {}", e);
        VendorError::payload(VENDOR, e)
    })
}

/// Decode and validate a transcript analysis reply
pub fn decode_analysis(raw: &str) -> VendorResult<ConversationAnalysis> {
    let analysis: ConversationAnalysis = decode(raw)?;
    for (name, score) in [
        ("grammarScore", analysis.grammar_score),
        ("charismaScore", analysis.charisma_score),
    ] {
        if !(0.0..=100.0).contains(&score) {
            return Err(VendorError::payload(
                VENDOR,
                format!("{name} out of range: {score}"),
            ));
        }
    }
    Ok(analysis)
}

/// Decode and validate a flirting analysis reply
pub fn decode_flirt(raw: &str) -> VendorResult<FlirtAnalysis> {
    let analysis: FlirtAnalysis = decode(raw)?;
    if !(0..=100).contains(&analysis.score) {
        return Err(VendorError::payload(
            VENDOR,
            format!("score out of range: {}", analysis.score),
        ));
    }
    Ok(analysis)
}

/// Filler-word, grammar and charisma scoring of a transcript
#[derive(Clone)]
pub struct ConversationAnalyzer {
    chat: Arc<dyn ChatCompletion>,
}

impl ConversationAnalyzer {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    pub async fn analyze_transcript(&self, transcript: &str) -> VendorResult<ConversationAnalysis> {
        let prompt = ChatPrompt::new(CONVERSATION_ANALYSIS, transcript)
            .with_temperature(ANALYSIS_TEMPERATURE)
            .json();
        let reply = self.chat.complete(prompt).await?;
        debug!("[Vendor] Analysis reply: {} chars", reply.len());
        decode_analysis(&reply)
    }
}

/// Rates a message someone wants to send to a crush
#[derive(Clone)]
pub struct FlirtCoach {
    chat: Arc<dyn ChatCompletion>,
}

impl FlirtCoach {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }

    pub async fn analyze(&self, message: &str) -> VendorResult<FlirtAnalysis> {
        let prompt = ChatPrompt::new(FLIRT_ANALYSIS, message)
            .with_temperature(ANALYSIS_TEMPERATURE)
            .json();
        let reply = self.chat.complete(prompt).await?;
        decode_flirt(&reply)
    }
}
