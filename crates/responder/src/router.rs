//! Channel event router — the per-channel reply state machine.
//!
//! For every inbound message event:
//! 1. drop self-echoes and events without a channel
//! 2. record the arrival and prune the window
//! 3. cooling down → suppressed
//! 4. below threshold → accumulating
//! 5. otherwise fetch context, generate, post, arm the cooldown
//!
//! The channel's state lock is held from step 2 through step 5, so a reply
//! and the cooldown it arms are atomic with respect to other events on the
//! same channel.

use std::sync::Arc;

use banterbot_config::ResponderConfig;
use banterbot_core::channel::{Channel, ChannelEvent};
use banterbot_core::error::Result;
use banterbot_core::event::{DomainEvent, EventBus};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::generator::ResponseGenerator;
use crate::prompt::PromptBuilder;
use crate::state::ChannelStates;

/// Why an event was dropped without touching channel state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Echo of the bot's own message
    SelfMessage,
    /// The platform sent no channel identifier
    MissingChannel,
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// Cooldown active
    Suppressed { remaining_secs: u64 },
    /// Not enough messages in the window yet
    Accumulating { count: usize, threshold: usize },
    /// Ready to fire but no history came back
    NoContext,
    /// A reply was posted and the cooldown armed
    Replied { text: String },
    /// Handling failed; logged and otherwise a no-op
    Failed { error: String },
}

/// Routes inbound events through the window and cooldown checks and fires replies.
pub struct ChannelEventRouter {
    config: ResponderConfig,
    channel: Arc<dyn Channel>,
    generator: ResponseGenerator,
    states: ChannelStates,
    events: Arc<EventBus>,
}

impl ChannelEventRouter {
    pub fn new(
        config: ResponderConfig,
        channel: Arc<dyn Channel>,
        generator: ResponseGenerator,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            states: ChannelStates::new(config.clone(), events.clone()),
            config,
            channel,
            generator,
            events,
        }
    }

    pub fn states(&self) -> &ChannelStates {
        &self.states
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Handle an event at the current wall-clock time.
    pub async fn handle(&self, event: ChannelEvent) -> Outcome {
        self.handle_at(event, Utc::now()).await
    }

    /// Handle an event as if it arrived at `now`.
    ///
    /// Errors never escape: they are logged and reported as `Outcome::Failed`.
    pub async fn handle_at(&self, event: ChannelEvent, now: DateTime<Utc>) -> Outcome {
        let channel = event.channel_id.clone();
        match self.process(event, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(channel = ?channel, error = %e, "Event handling failed");
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: format!("handle_event {}", channel.map(|c| c.0).unwrap_or_default()),
                    error_message: e.to_string(),
                    timestamp: now,
                });
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn process(&self, event: ChannelEvent, now: DateTime<Utc>) -> Result<Outcome> {
        if event.is_self {
            debug!("Skipping self message");
            return Ok(Outcome::Ignored(IgnoreReason::SelfMessage));
        }
        let Some(channel_id) = event.channel_id else {
            debug!("Skipping event without channel id");
            return Ok(Outcome::Ignored(IgnoreReason::MissingChannel));
        };

        let entry = self.states.entry(&channel_id).await;
        let mut state = entry.lock().await;

        state.window.record(now);
        state.window.prune(now);
        let count = state.window.count();
        self.events.publish(DomainEvent::MessageReceived {
            channel: channel_id.to_string(),
            window_count: count,
            timestamp: now,
        });

        if !state.cooldown.is_open(now) {
            let elapsed = state
                .cooldown
                .elapsed(now)
                .map(|d| d.num_seconds())
                .unwrap_or_default();
            let remaining_secs = state.cooldown.remaining_secs(now);
            debug!(
                channel = %channel_id,
                elapsed_secs = elapsed,
                remaining_secs,
                "Cooldown active, reply suppressed"
            );
            self.events.publish(DomainEvent::ReplySuppressed {
                channel: channel_id.to_string(),
                remaining_secs,
                timestamp: now,
            });
            return Ok(Outcome::Suppressed { remaining_secs });
        }

        if !state.window.threshold_met() {
            let threshold = state.window.threshold();
            debug!(channel = %channel_id, count, threshold, "Threshold not met");
            return Ok(Outcome::Accumulating { count, threshold });
        }

        info!(channel = %channel_id, count, "Threshold met, fetching conversation history");
        let history = match self
            .channel
            .fetch_recent(&channel_id, self.config.max_context_messages)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "History fetch failed");
                Vec::new()
            }
        };
        if history.is_empty() {
            debug!(channel = %channel_id, "No history returned, nothing to reply to");
            return Ok(Outcome::NoContext);
        }

        let context = PromptBuilder::build(&history);
        let reply = self.generator.generate(&context).await;

        self.channel.send(&channel_id, &reply).await?;
        state.cooldown.arm(now).await;

        info!(
            channel = %channel_id,
            context_messages = history.len(),
            reply_len = reply.len(),
            "Reply sent, cooldown armed"
        );
        self.events.publish(DomainEvent::ReplyEmitted {
            channel: channel_id.to_string(),
            reply_len: reply.len(),
            context_messages: history.len(),
            timestamp: now,
        });

        Ok(Outcome::Replied { text: reply })
    }
}
