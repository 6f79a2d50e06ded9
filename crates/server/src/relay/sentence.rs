use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]").unwrap());

/// First sentence of `text`, trimmed. Falls back to the whole trimmed text
/// when there is no terminator.
///
/// Heuristic only: "Dr. Smith" or "3.5" end the sentence early.
pub fn first_sentence(text: &str) -> String {
    match SENTENCE.find(text) {
        Some(m) => m.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}
