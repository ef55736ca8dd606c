//! `banterbot run` — Connect to Slack and respond until interrupted.

use std::sync::Arc;

use banterbot_channels::{SlackChannel, SlackConfig};
use banterbot_config::AppConfig;
use banterbot_core::channel::Channel;
use banterbot_core::event::EventBus;
use banterbot_providers::GeminiProvider;
use banterbot_responder::{ChannelEventRouter, Dispatcher, ResponseGenerator};
use tracing::{error, info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Missing secrets are fatal before any connection is attempted
    let credentials = config.credentials().map_err(|e| {
        error!(error = %e, "Cannot start without credentials");
        format!("{e}")
    })?;

    let responder = &config.responder;
    info!(
        model = %config.gemini.model,
        window_secs = responder.window_secs,
        threshold = responder.threshold_messages,
        cooldown_secs = responder.cooldown_secs,
        max_context = responder.max_context_messages,
        "Starting Banterbot"
    );

    let channel = Arc::new(SlackChannel::new(SlackConfig::from_app_config(
        &config.slack,
        credentials.slack_bot_token.clone(),
        credentials.slack_app_token.clone(),
    )));
    let provider = Arc::new(GeminiProvider::from_config(
        &config.gemini,
        credentials.gemini_api_key.clone(),
    ));

    let events = Arc::new(EventBus::default());
    let generator = ResponseGenerator::new(provider, responder, &config.gemini);
    let router = Arc::new(ChannelEventRouter::new(
        responder.clone(),
        channel.clone(),
        generator,
        events,
    ));
    let dispatcher = Dispatcher::new(router, responder.queue_capacity);

    let inbound = channel.start().await?;
    info!("Listening for channel messages (Ctrl-C to stop)");

    tokio::select! {
        _ = dispatcher.run(inbound) => warn!("Event stream ended"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    channel.stop().await?;
    info!("Banterbot stopped");
    Ok(())
}
