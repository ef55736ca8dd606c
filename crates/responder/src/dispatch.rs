//! Per-channel worker queues in front of the router.
//!
//! Each channel gets its own bounded queue and worker task, spawned on the
//! first event for that channel. Events for one channel are handled strictly
//! in arrival order; a slow reply in one channel never delays another.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use banterbot_core::channel::{ChannelEvent, ChannelId};
use banterbot_core::error::ChannelError;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::router::ChannelEventRouter;

struct Worker {
    tx: mpsc::Sender<ChannelEvent>,
    handle: JoinHandle<()>,
}

/// Fans inbound events out to per-channel workers.
pub struct Dispatcher {
    router: Arc<ChannelEventRouter>,
    queue_capacity: usize,
    workers: HashMap<ChannelId, Worker>,
}

impl Dispatcher {
    pub fn new(router: Arc<ChannelEventRouter>, queue_capacity: usize) -> Self {
        Self {
            router,
            queue_capacity: queue_capacity.max(1),
            workers: HashMap::new(),
        }
    }

    pub fn router(&self) -> &Arc<ChannelEventRouter> {
        &self.router
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue an event on its channel's worker.
    ///
    /// Returns false when the event was dropped: self-echoes, events without
    /// a channel, and events for a channel whose queue is full.
    pub fn dispatch(&mut self, event: ChannelEvent) -> bool {
        if event.is_self {
            debug!("Skipping self message");
            return false;
        }
        let Some(channel) = event.channel_id.clone() else {
            debug!("Skipping event without channel id");
            return false;
        };

        let worker = self
            .workers
            .entry(channel.clone())
            .or_insert_with(|| spawn_worker(self.router.clone(), channel.clone(), self.queue_capacity));

        match worker.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(channel = %channel, "Channel queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(channel = %channel, "Channel worker gone, respawning");
                let worker = spawn_worker(self.router.clone(), channel.clone(), self.queue_capacity);
                let queued = worker.tx.try_send(event).is_ok();
                self.workers.insert(channel, worker);
                queued
            }
        }
    }

    /// Dispatch everything from a transport stream until it closes, then
    /// drain the workers.
    pub async fn run(mut self, mut events: mpsc::Receiver<Result<ChannelEvent, ChannelError>>) {
        info!("Dispatcher started");
        while let Some(next) = events.recv().await {
            match next {
                Ok(event) => {
                    self.dispatch(event);
                }
                Err(e) => warn!(error = %e, "Transport error"),
            }
        }
        info!("Event stream closed, draining channel workers");
        self.shutdown().await;
    }

    /// Close every queue and wait for the workers to finish what they hold.
    pub async fn shutdown(self) {
        for (channel, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                error!(channel = %channel, error = %e, "Channel worker ended abnormally");
            }
        }
    }
}

fn spawn_worker(router: Arc<ChannelEventRouter>, channel: ChannelId, capacity: usize) -> Worker {
    debug!(channel = %channel, "Spawning channel worker");
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(work(router, channel, rx));
    Worker { tx, handle }
}

async fn work(router: Arc<ChannelEventRouter>, channel: ChannelId, mut rx: mpsc::Receiver<ChannelEvent>) {
    while let Some(event) = rx.recv().await {
        match AssertUnwindSafe(router.handle(event)).catch_unwind().await {
            Ok(outcome) => debug!(channel = %channel, ?outcome, "Event handled"),
            Err(panic) => error!(
                channel = %channel,
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked"
            ),
        }
    }
    debug!(channel = %channel, "Channel worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ResponseGenerator;
    use crate::test_helpers::{MockChannel, MockProvider, event};
    use async_trait::async_trait;
    use banterbot_config::{GeminiConfig, ResponderConfig};
    use banterbot_core::channel::Channel;
    use banterbot_core::event::{DomainEvent, EventBus};
    use banterbot_core::message::HistoricalMessage;
    use tokio::sync::broadcast;

    /// Panics while fetching history for one specific channel.
    struct PanickyChannel {
        inner: MockChannel,
        poisoned: &'static str,
    }

    #[async_trait]
    impl Channel for PanickyChannel {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
            self.inner.start().await
        }

        async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), ChannelError> {
            self.inner.send(channel_id, text).await
        }

        async fn fetch_recent(
            &self,
            channel_id: &ChannelId,
            limit: usize,
        ) -> Result<Vec<HistoricalMessage>, ChannelError> {
            if channel_id.as_str() == self.poisoned {
                panic!("history parser blew up");
            }
            self.inner.fetch_recent(channel_id, limit).await
        }
    }

    fn eager_config() -> ResponderConfig {
        ResponderConfig {
            threshold_messages: 1,
            ..ResponderConfig::default()
        }
    }

    fn dispatcher(channel: Arc<dyn Channel>, config: ResponderConfig) -> Dispatcher {
        dispatcher_with(channel, Arc::new(MockProvider::replying("hey")), config)
    }

    fn dispatcher_with(
        channel: Arc<dyn Channel>,
        provider: Arc<MockProvider>,
        config: ResponderConfig,
    ) -> Dispatcher {
        let generator = ResponseGenerator::new(provider, &config, &GeminiConfig::default());
        let capacity = config.queue_capacity;
        let router = ChannelEventRouter::new(config, channel, generator, Arc::new(EventBus::new(1024)));
        Dispatcher::new(Arc::new(router), capacity)
    }

    fn received_per_channel(rx: &mut broadcast::Receiver<Arc<DomainEvent>>) -> HashMap<String, Vec<usize>> {
        let mut seen: HashMap<String, Vec<usize>> = HashMap::new();
        while let Ok(e) = rx.try_recv() {
            if let DomainEvent::MessageReceived {
                channel,
                window_count,
                ..
            } = e.as_ref()
            {
                seen.entry(channel.clone()).or_default().push(*window_count);
            }
        }
        seen
    }

    #[tokio::test]
    async fn skips_events_that_cannot_be_routed() {
        let mut dispatcher = dispatcher(Arc::new(MockChannel::chatty()), eager_config());

        let mut own = event("C1");
        own.is_self = true;
        let mut orphan = event("C1");
        orphan.channel_id = None;

        assert!(!dispatcher.dispatch(own));
        assert!(!dispatcher.dispatch(orphan));
        assert_eq!(dispatcher.worker_count(), 0);
    }

    #[tokio::test]
    async fn one_worker_per_channel() {
        let mut dispatcher = dispatcher(Arc::new(MockChannel::chatty()), ResponderConfig::default());

        assert!(dispatcher.dispatch(event("C1")));
        assert!(dispatcher.dispatch(event("C2")));
        assert!(dispatcher.dispatch(event("C1")));
        assert_eq!(dispatcher.worker_count(), 2);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn events_for_a_channel_are_handled_sequentially() {
        let mut dispatcher = dispatcher(Arc::new(MockChannel::chatty()), ResponderConfig::default());
        let mut rx = dispatcher.router().events().subscribe();

        for _ in 0..5 {
            dispatcher.dispatch(event("C1"));
            dispatcher.dispatch(event("C2"));
        }
        dispatcher.shutdown().await;

        let seen = received_per_channel(&mut rx);
        assert_eq!(seen["C1"], vec![1, 2, 3, 4, 5]);
        assert_eq!(seen["C2"], vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn panic_in_one_channel_does_not_stop_others() {
        let channel = Arc::new(PanickyChannel {
            inner: MockChannel::chatty(),
            poisoned: "BOOM",
        });
        let mut dispatcher = dispatcher(channel.clone(), eager_config());
        let mut rx = dispatcher.router().events().subscribe();

        dispatcher.dispatch(event("BOOM"));
        dispatcher.dispatch(event("C1"));
        dispatcher.dispatch(event("BOOM"));
        dispatcher.shutdown().await;

        // C1 replied; BOOM's worker survived its first panic
        assert_eq!(channel.inner.sent_count(), 1);
        let seen = received_per_channel(&mut rx);
        assert_eq!(seen["BOOM"].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_events() {
        let channel = Arc::new(MockChannel::chatty());
        let provider = Arc::new(MockProvider::slow("hey", std::time::Duration::from_secs(3600)));
        let config = ResponderConfig {
            queue_capacity: 1,
            ..eager_config()
        };
        let mut dispatcher = dispatcher_with(channel.clone(), provider.clone(), config);
        let mut rx = dispatcher.router().events().subscribe();

        assert!(dispatcher.dispatch(event("C1")));
        // Let the worker pick it up and block inside the provider
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.calls(), 1);

        assert!(dispatcher.dispatch(event("C1")));
        assert!(!dispatcher.dispatch(event("C1")));
        dispatcher.shutdown().await;

        assert_eq!(channel.sent_count(), 1);
        let seen = received_per_channel(&mut rx);
        assert_eq!(seen["C1"].len(), 2);
    }

    #[tokio::test]
    async fn run_drains_transport_stream() {
        let dispatcher = dispatcher(Arc::new(MockChannel::chatty()), eager_config());
        let router = dispatcher.router().clone();
        let (tx, rx) = mpsc::channel(8);

        tx.send(Err(ChannelError::ConnectionLost("reset".into())))
            .await
            .unwrap();
        tx.send(Ok(event("C1"))).await.unwrap();
        drop(tx);

        dispatcher.run(rx).await;
        assert_eq!(router.states().len().await, 1);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
