//! Turns fetched channel history into model input text.

use banterbot_core::message::HistoricalMessage;

/// Placeholder for messages without an author.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Renders history as one `author: text` line per message, oldest first.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context text.
    ///
    /// Input order does not matter: messages are stably sorted by timestamp,
    /// so equal timestamps keep their relative input order.
    pub fn build(messages: &[HistoricalMessage]) -> String {
        let mut sorted: Vec<&HistoricalMessage> = messages.iter().collect();
        sorted.sort_by_key(|m| m.timestamp);

        sorted
            .into_iter()
            .map(|m| {
                format!(
                    "{}: {}",
                    m.author.as_deref().unwrap_or(UNKNOWN_AUTHOR),
                    m.text.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
