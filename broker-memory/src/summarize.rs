//! Turns one exchange into the compact text that gets indexed (spec §4.9).

use broker_types::CompactedTurn;

const MAX_SUMMARY_CHARS: usize = 4000;

/// Produces the text stored and indexed for one tool exchange.
///
/// The broker never asks a model to summarize itself (that would cost
/// another round-trip on the hot path); this is a cheap, deterministic
/// concatenation truncated to a bound generous enough for similarity
/// search to still work, matching spec §4.9's requirement that memory
/// writes "never... delay the response".
pub trait Summarizer: Send + Sync {
    /// Build the summary text for one exchange.
    fn summarize(&self, tool_name: &str, messages: &[CompactedTurn], response: &str) -> String;
}

/// Default summarizer: concatenate role-tagged turns plus the final
/// response, truncated from the front so the most recent content (most
/// relevant to future search) survives.
#[derive(Debug, Default)]
pub struct ConcatSummarizer;

impl Summarizer for ConcatSummarizer {
    fn summarize(&self, tool_name: &str, messages: &[CompactedTurn], response: &str) -> String {
        let mut text = format!("[{tool_name}]\n");
        for turn in messages {
            text.push_str(&turn.role);
            text.push_str(": ");
            text.push_str(&turn.text);
            text.push('\n');
        }
        text.push_str("assistant: ");
        text.push_str(response);

        if text.chars().count() > MAX_SUMMARY_CHARS {
            let skip = text.chars().count() - MAX_SUMMARY_CHARS;
            text.chars().skip(skip).collect()
        } else {
            text
        }
    }
}
