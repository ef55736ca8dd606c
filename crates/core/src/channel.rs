//! Channel trait — the abstraction over chat platforms.
//!
//! A Channel connects Banterbot to a messaging platform (Slack today). It
//! delivers inbound message events, fetches recent channel history, and
//! posts replies back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::message::HistoricalMessage;

/// Identifier of a conversation channel on the platform (e.g. Slack `C0123`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message event received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Platform that produced the event (e.g., "slack")
    pub source: String,

    /// The channel this event belongs to, if the platform supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,

    /// Sender identifier (platform-specific user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// The text content
    #[serde(default)]
    pub text: String,

    /// When the platform says the message was posted
    pub timestamp: DateTime<Utc>,

    /// Echo of a message the bot itself posted
    #[serde(default)]
    pub is_self: bool,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelEvent {
    /// Build a user message event for `channel_id`, stamped now.
    pub fn message(
        source: impl Into<String>,
        channel_id: impl Into<ChannelId>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            channel_id: Some(channel_id.into()),
            author: Some(author.into()),
            text: text.into(),
            timestamp: Utc::now(),
            is_self: false,
            metadata: serde_json::Map::new(),
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, payload
/// parsing, and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "slack").
    fn name(&self) -> &str;

    /// Start listening for incoming message events.
    ///
    /// Returns a receiver that yields events (or per-event transport errors).
    /// The implementation handles websocket connections and reconnects
    /// internally.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelEvent, ChannelError>>,
        ChannelError,
    >;

    /// Post a new message to a channel.
    async fn send(&self, channel_id: &ChannelId, text: &str)
    -> std::result::Result<(), ChannelError>;

    /// Fetch up to `limit` of the most recent messages in a channel.
    ///
    /// May return fewer than `limit`, in any order.
    async fn fetch_recent(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> std::result::Result<Vec<HistoricalMessage>, ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check — is the channel connected and authenticated?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
