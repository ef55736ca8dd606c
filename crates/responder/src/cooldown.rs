//! Cooldown gate and countdown notifier.
//!
//! The gate decides suppression purely from elapsed time since the last
//! reply. The countdown is a diagnostic background task that ticks the
//! remaining seconds down to zero; it never feeds back into the gate.

use std::sync::Arc;
use std::time::Duration;

use banterbot_core::channel::ChannelId;
use banterbot_core::event::{DomainEvent, EventBus};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::window::seconds_delta;

/// A running once-per-second countdown for one channel.
///
/// Stopped through an explicit `watch` signal; dropping the countdown also
/// stops the task because the signal's sender goes away.
pub struct Countdown {
    channel: ChannelId,
    generation: u64,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    events: Arc<EventBus>,
}

impl Countdown {
    /// Spawn a countdown from `duration_secs` to zero.
    pub fn start(
        channel: ChannelId,
        generation: u64,
        duration_secs: u64,
        events: Arc<EventBus>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(Self::run(
            channel.clone(),
            generation,
            duration_secs,
            stop_rx,
            events.clone(),
        ));

        Self {
            channel,
            generation,
            stop_tx,
            handle: Some(handle),
            events,
        }
    }

    async fn run(
        channel: ChannelId,
        generation: u64,
        duration_secs: u64,
        mut stop_rx: watch::Receiver<bool>,
        events: Arc<EventBus>,
    ) {
        for remaining in (1..=duration_secs).rev() {
            if *stop_rx.borrow() {
                return;
            }
            debug!(channel = %channel, remaining_secs = remaining, "Cooldown countdown");
            events.publish(DomainEvent::CooldownTick {
                channel: channel.to_string(),
                generation,
                remaining_secs: remaining,
            });

            tokio::select! {
                // Err means the Countdown was dropped; stop either way
                _ = stop_rx.changed() => return,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }

        if !*stop_rx.borrow() {
            info!(channel = %channel, "Cooldown over, channel ready");
            events.publish(DomainEvent::CooldownReady {
                channel: channel.to_string(),
                generation,
            });
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the background task is still counting.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn cancel(&mut self) {
        let was_running = self.is_running();
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }

        if was_running {
            debug!(channel = %self.channel, generation = self.generation, "Cooldown countdown cancelled");
            self.events.publish(DomainEvent::CooldownCancelled {
                channel: self.channel.to_string(),
                generation: self.generation,
            });
        }
    }
}

/// Per-channel reply cooldown.
pub struct CooldownGate {
    channel: ChannelId,
    cooldown_secs: u64,
    last_reply: Option<DateTime<Utc>>,
    countdown: Option<Countdown>,
    generation: u64,
    events: Arc<EventBus>,
}

impl CooldownGate {
    pub fn new(channel: ChannelId, cooldown_secs: u64, events: Arc<EventBus>) -> Self {
        Self {
            channel,
            cooldown_secs,
            last_reply: None,
            countdown: None,
            generation: 0,
            events,
        }
    }

    fn cooldown(&self) -> TimeDelta {
        seconds_delta(self.cooldown_secs)
    }

    /// Open when the channel never replied or the cooldown has fully elapsed.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self.last_reply {
            None => true,
            Some(last) => now - last >= self.cooldown(),
        }
    }

    /// Time since the last reply, if any.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.last_reply.map(|last| now - last)
    }

    /// Whole seconds until the gate opens (0 when open).
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.elapsed(now) {
            None => 0,
            Some(elapsed) => self
                .cooldown_secs
                .saturating_sub(elapsed.num_seconds().max(0) as u64),
        }
    }

    pub fn last_reply(&self) -> Option<DateTime<Utc>> {
        self.last_reply
    }

    /// Record a reply at `now` and restart the countdown.
    ///
    /// Any countdown still running is cancelled and joined first, so at most
    /// one countdown per channel exists at a time.
    pub async fn arm(&mut self, now: DateTime<Utc>) {
        self.last_reply = Some(now);

        if let Some(mut previous) = self.countdown.take() {
            previous.cancel().await;
        }

        self.generation += 1;
        self.countdown = Some(Countdown::start(
            self.channel.clone(),
            self.generation,
            self.cooldown_secs,
            self.events.clone(),
        ));
    }

    pub fn has_active_countdown(&self) -> bool {
        self.countdown.as_ref().is_some_and(Countdown::is_running)
    }

    /// Generation of the most recently started countdown (0 = never armed).
    pub fn countdown_generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::at;
    use tokio::sync::broadcast;

    fn gate(cooldown_secs: u64) -> (CooldownGate, broadcast::Receiver<Arc<DomainEvent>>) {
        let events = Arc::new(EventBus::new(1024));
        let rx = events.subscribe();
        (CooldownGate::new(ChannelId("C1".into()), cooldown_secs, events), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Arc<DomainEvent>>) -> Vec<DomainEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.as_ref().clone());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn never_replied_is_open() {
        let (gate, _rx) = gate(120);
        assert!(gate.is_open(at(0)));
        assert_eq!(gate.remaining_secs(at(0)), 0);
        assert!(!gate.has_active_countdown());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_until_cooldown_elapses() {
        let (mut gate, _rx) = gate(120);
        gate.arm(at(90)).await;

        assert!(!gate.is_open(at(95)));
        assert_eq!(gate.remaining_secs(at(95)), 115);
        assert!(!gate.is_open(at(209)));
        assert!(gate.is_open(at(210)));
        assert_eq!(gate.remaining_secs(at(210)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_to_ready() {
        let (mut gate, mut rx) = gate(3);
        gate.arm(at(0)).await;
        assert!(gate.has_active_countdown());

        tokio::time::sleep(Duration::from_secs(5)).await;

        let ticks: Vec<u64> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                DomainEvent::CooldownTick { remaining_secs, .. } => Some(remaining_secs),
                DomainEvent::CooldownReady { .. } => Some(0),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![3, 2, 1, 0]);
        assert!(!gate.has_active_countdown());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_countdown() {
        let (mut gate, mut rx) = gate(120);
        gate.arm(at(0)).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        gate.arm(at(1)).await;

        assert_eq!(gate.countdown_generation(), 2);
        assert!(gate.has_active_countdown());

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            DomainEvent::CooldownCancelled { generation: 1, .. }
        )));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let later = drain(&mut rx);
        assert!(!later.is_empty());
        assert!(later.iter().all(|e| matches!(
            e,
            DomainEvent::CooldownTick { generation: 2, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_task() {
        let events = Arc::new(EventBus::new(64));
        let mut countdown = Countdown::start(ChannelId("C9".into()), 1, 60, events);
        tokio::task::yield_now().await;
        assert!(countdown.is_running());

        countdown.cancel().await;
        assert!(!countdown.is_running());
        assert_eq!(countdown.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_cooldown_stays_closed() {
        let (mut gate, _rx) = gate(u64::MAX);
        gate.last_reply = Some(at(0));
        assert!(!gate.is_open(at(10_000_000)));
        assert!(gate.remaining_secs(at(10_000_000)) > 0);
    }
}
