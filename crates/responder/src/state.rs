//! Per-channel state and the registry that owns it.

use std::collections::HashMap;
use std::sync::Arc;

use banterbot_config::ResponderConfig;
use banterbot_core::channel::ChannelId;
use banterbot_core::event::EventBus;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::cooldown::CooldownGate;
use crate::window::SlidingWindowTracker;

/// Everything the router tracks for one channel.
pub struct ChannelState {
    pub window: SlidingWindowTracker,
    pub cooldown: CooldownGate,
}

impl ChannelState {
    pub fn new(channel: &ChannelId, config: &ResponderConfig, events: Arc<EventBus>) -> Self {
        Self {
            window: SlidingWindowTracker::from_config(config),
            cooldown: CooldownGate::new(channel.clone(), config.cooldown_secs, events),
        }
    }
}

/// Registry of channel states, keyed by channel id.
///
/// Entries are created on first use and live for the process lifetime.
/// Each entry has its own lock so channels never contend with each other.
pub struct ChannelStates {
    config: ResponderConfig,
    events: Arc<EventBus>,
    entries: RwLock<HashMap<ChannelId, Arc<Mutex<ChannelState>>>>,
}

impl ChannelStates {
    pub fn new(config: ResponderConfig, events: Arc<EventBus>) -> Self {
        Self {
            config,
            events,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the state for `channel`, creating it if needed.
    pub async fn entry(&self, channel: &ChannelId) -> Arc<Mutex<ChannelState>> {
        if let Some(state) = self.entries.read().await.get(channel) {
            return state.clone();
        }

        let mut entries = self.entries.write().await;
        entries
            .entry(channel.clone())
            .or_insert_with(|| {
                debug!(channel = %channel, "Tracking new channel");
                Arc::new(Mutex::new(ChannelState::new(
                    channel,
                    &self.config,
                    self.events.clone(),
                )))
            })
            .clone()
    }

    pub async fn get(&self, channel: &ChannelId) -> Option<Arc<Mutex<ChannelState>>> {
        self.entries.read().await.get(channel).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
