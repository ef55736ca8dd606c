//! Slack channel adapter.
//!
//! Implements the Channel trait for Slack:
//! - inbound message events via Socket Mode (`apps.connections.open` + WebSocket)
//! - outbound messages via `chat.postMessage`
//! - history via `conversations.history`
//! - health via `auth.test`

use std::time::Duration;

use async_trait::async_trait;
use banterbot_core::channel::{Channel, ChannelEvent, ChannelId};
use banterbot_core::error::ChannelError;
use banterbot_core::message::{HistoricalMessage, timestamp_from_epoch_secs};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// Default Slack Web API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";
const RECONNECT_DELAY_SECS: u64 = 2;
const INBOUND_BUFFER: usize = 256;

/// Slack channel configuration.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot token (xoxb-...).
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode.
    pub app_token: String,
    /// Web API base URL.
    pub api_url: String,
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            app_token: app_token.into(),
            api_url: DEFAULT_API_URL.into(),
        }
    }

    /// Build from the `[slack]` config table and resolved tokens.
    pub fn from_app_config(
        config: &banterbot_config::SlackConfig,
        bot_token: impl Into<String>,
        app_token: impl Into<String>,
    ) -> Self {
        Self {
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.into()),
            ..Self::new(bot_token, app_token)
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

// --- Socket Mode payloads ---

#[derive(Debug, Deserialize)]
struct SocketOpenResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Option<SocketPayload>,
}

#[derive(Debug, Deserialize)]
struct SocketPayload {
    #[serde(default)]
    event: Option<SlackEvent>,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

struct ParsedSocketMessage {
    ack: Option<String>,
    event: Option<ChannelEvent>,
}

// --- Web API payloads ---

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Parse a Slack `ts` string (`"1700000000.000100"`).
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    ts.trim()
        .parse::<f64>()
        .ok()
        .and_then(timestamp_from_epoch_secs)
}

/// Slack channel adapter.
pub struct SlackChannel {
    config: SlackConfig,
    client: reqwest::Client,
    shutdown_tx: tokio::sync::Mutex<Option<watch::Sender<bool>>>,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            config,
            client,
            shutdown_tx: tokio::sync::Mutex::new(None),
        }
    }

    fn api(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), method)
    }

    /// Check an HTTP response from the Web API: non-2xx or `ok: false` is an error.
    async fn read_api_response(
        method: &str,
        response: reqwest::Response,
    ) -> Result<Value, ChannelError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| ChannelError::Api {
            method: method.into(),
            error: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(ChannelError::Api {
                method: method.into(),
                error: format!("HTTP {status}: {body}"),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| ChannelError::Api {
            method: method.into(),
            error: format!("invalid JSON: {e}"),
        })?;

        if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(ChannelError::Api {
                method: method.into(),
                error: error.into(),
            });
        }

        Ok(value)
    }

    async fn open_socket_url(
        client: &reqwest::Client,
        url: &str,
        app_token: &str,
    ) -> Result<String, ChannelError> {
        let response = client
            .post(url)
            .bearer_auth(app_token)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("apps.connections.open: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| ChannelError::ConnectionLost(format!("apps.connections.open: {e}")))?;

        let parsed: SocketOpenResponse = serde_json::from_str(&body)
            .map_err(|e| ChannelError::InvalidPayload(format!("apps.connections.open: {e}")))?;

        if !parsed.ok {
            return Err(ChannelError::Api {
                method: "apps.connections.open".into(),
                error: parsed.error.unwrap_or_else(|| "unknown_error".into()),
            });
        }

        parsed
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ChannelError::InvalidPayload("Socket Mode response missing URL".into()))
    }

    fn parse_socket_message(raw: &str) -> Result<ParsedSocketMessage, ChannelError> {
        let envelope: SocketEnvelope = serde_json::from_str(raw)
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;

        let ack = envelope
            .envelope_id
            .as_deref()
            .map(|id| json!({ "envelope_id": id }).to_string());

        Ok(ParsedSocketMessage {
            ack,
            event: Self::extract_event(&envelope),
        })
    }

    fn extract_event(envelope: &SocketEnvelope) -> Option<ChannelEvent> {
        if envelope.envelope_type != "events_api" {
            return None;
        }

        let event = envelope.payload.as_ref()?.event.as_ref()?;
        if event.event_type != "message" {
            return None;
        }

        let is_self =
            event.subtype.as_deref() == Some("bot_message") || event.bot_id.is_some();

        let channel_id = event
            .channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ChannelId::from);

        let timestamp = event
            .ts
            .as_deref()
            .and_then(parse_slack_ts)
            .unwrap_or_else(Utc::now);

        let mut metadata = serde_json::Map::new();
        if let Some(ts) = &event.ts {
            metadata.insert("slack_ts".into(), Value::String(ts.clone()));
        }
        if let Some(subtype) = &event.subtype {
            metadata.insert("slack_subtype".into(), Value::String(subtype.clone()));
        }

        Some(ChannelEvent {
            source: "slack".into(),
            channel_id,
            author: event.user.clone(),
            text: event.text.clone().unwrap_or_default(),
            timestamp,
            is_self,
            metadata,
        })
    }

    fn parse_history(value: Value) -> Result<Vec<HistoricalMessage>, ChannelError> {
        let history: HistoryResponse = serde_json::from_value(value)
            .map_err(|e| ChannelError::InvalidPayload(format!("conversations.history: {e}")))?;

        Ok(history
            .messages
            .into_iter()
            .filter_map(|m| {
                let timestamp = m.ts.as_deref().and_then(parse_slack_ts)?;
                Some(HistoricalMessage {
                    author: m.user,
                    text: m.text,
                    timestamp,
                })
            })
            .collect())
    }

    /// Returns true when shutdown was requested during the wait.
    async fn wait_for_reconnect_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => true,
            _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => false,
        }
    }

    async fn run_socket_mode_loop(
        client: reqwest::Client,
        open_url: String,
        app_token: String,
        tx: mpsc::Sender<Result<ChannelEvent, ChannelError>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let socket_url = tokio::select! {
                _ = shutdown_rx.changed() => return,
                opened = Self::open_socket_url(&client, &open_url, &app_token) => match opened {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(error = %e, "Slack Socket Mode open failed");
                        if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                            return;
                        }
                        continue;
                    }
                },
            };

            let ws_stream = tokio::select! {
                _ = shutdown_rx.changed() => return,
                connected = connect_async(socket_url.as_str()) => match connected {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!(error = %e, "Slack Socket Mode websocket connect failed");
                        if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                            return;
                        }
                        continue;
                    }
                },
            };

            info!("Slack Socket Mode connected");
            let (mut writer, mut reader) = ws_stream.split();

            loop {
                let next = tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Slack Socket Mode shutdown requested");
                        return;
                    }
                    frame = reader.next() => frame,
                };

                match next {
                    Some(Ok(WsMessage::Text(raw))) => match Self::parse_socket_message(raw.as_str()) {
                        Ok(parsed) => {
                            if let Some(ack) = parsed.ack
                                && let Err(e) = writer.send(WsMessage::Text(ack.into())).await
                            {
                                warn!(error = %e, "Slack Socket Mode ack failed");
                                break;
                            }
                            if let Some(event) = parsed.event
                                && tx.send(Ok(event)).await.is_err()
                            {
                                // Receiver dropped; nobody is listening anymore
                                return;
                            }
                        }
                        Err(e) => debug!(error = %e, "Ignoring Slack socket payload"),
                    },
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if let Err(e) = writer.send(WsMessage::Pong(payload)).await {
                            warn!(error = %e, "Slack Socket Mode pong failed");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Slack Socket Mode closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Slack Socket Mode stream error");
                        break;
                    }
                    None => {
                        warn!("Slack Socket Mode stream ended");
                        break;
                    }
                }
            }

            if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                return;
            }
            info!("Reconnecting Slack Socket Mode");
        }
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        let app_token = self.config.app_token.trim().to_string();
        if app_token.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Slack app token is required for Socket Mode".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        info!("Slack channel starting (Socket Mode)");
        tokio::spawn(Self::run_socket_mode_loop(
            self.client.clone(),
            self.api("apps.connections.open"),
            app_token,
            tx,
            shutdown_rx,
        ));

        Ok(rx)
    }

    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.api("chat.postMessage"))
            .bearer_auth(&self.config.bot_token)
            .json(&json!({ "channel": channel_id.as_str(), "text": text }))
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: channel_id.to_string(),
                reason: e.to_string(),
            })?;

        Self::read_api_response("chat.postMessage", response).await?;
        debug!(channel = %channel_id, text_len = text.len(), "Slack message posted");
        Ok(())
    }

    async fn fetch_recent(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<HistoricalMessage>, ChannelError> {
        let response = self
            .client
            .get(self.api("conversations.history"))
            .bearer_auth(&self.config.bot_token)
            .query(&[
                ("channel", channel_id.as_str().to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ChannelError::HistoryFailed {
                channel: channel_id.to_string(),
                reason: e.to_string(),
            })?;

        let value = Self::read_api_response("conversations.history", response).await?;
        Self::parse_history(value)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Slack channel stopping");
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.trim().is_empty() {
            return Ok(false);
        }
        let response = self
            .client
            .post(self.api("auth.test"))
            .bearer_auth(&self.config.bot_token)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;

        match Self::read_api_response("auth.test", response).await {
            Ok(_) => Ok(true),
            Err(ChannelError::Api { error, .. }) => {
                warn!(%error, "Slack auth.test rejected the bot token");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
