//! Shared test helpers for responder tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use banterbot_core::channel::{Channel, ChannelEvent, ChannelId};
use banterbot_core::error::{ChannelError, ProviderError};
use banterbot_core::message::HistoricalMessage;
use banterbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

/// A fixed UTC instant `secs` seconds after an arbitrary epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn event(channel: &str) -> ChannelEvent {
    ChannelEvent::message("mock", channel, "U1", "hello")
}

/// A provider that always answers with the same text, or always fails.
pub struct MockProvider {
    reply: Result<String, ProviderError>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers with `text` after sleeping for `delay`.
    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(text)
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            reply: Err(err),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map(|text| ProviderResponse {
            text,
            usage: None,
            model: request.model,
        })
    }
}

/// An in-memory channel that records posted messages.
pub struct MockChannel {
    history: Vec<HistoricalMessage>,
    fail_history: bool,
    fail_send: bool,
    pub sent: Mutex<Vec<(ChannelId, String)>>,
}

impl MockChannel {
    pub fn with_history(history: Vec<HistoricalMessage>) -> Self {
        Self {
            history,
            fail_history: false,
            fail_send: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn chatty() -> Self {
        Self::with_history(vec![
            HistoricalMessage::new("U2", "second", at(-10)),
            HistoricalMessage::new("U1", "first", at(-20)),
        ])
    }

    pub fn failing_history() -> Self {
        Self {
            fail_history: true,
            ..Self::chatty()
        }
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Self::chatty()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), ChannelError> {
        if self.fail_send {
            return Err(ChannelError::DeliveryFailed {
                channel: channel_id.to_string(),
                reason: "not_in_channel".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.clone(), text.to_string()));
        Ok(())
    }

    async fn fetch_recent(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<HistoricalMessage>, ChannelError> {
        if self.fail_history {
            return Err(ChannelError::HistoryFailed {
                channel: channel_id.to_string(),
                reason: "ratelimited".into(),
            });
        }
        Ok(self.history.iter().take(limit).cloned().collect())
    }
}
