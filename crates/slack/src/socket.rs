use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex, task::JoinSet};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    commands::SlashCommandPayload,
    events::{EventContext, EventDispatcher, HandlerResult, MessageEvent, SlackEnvelope, SlackEvent},
    web::{ReplySink, SlackWebClient},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack requested disconnect: {0}")]
    Disconnected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// One decoded Socket Mode frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a websocket opened with `apps.connections.open`.
pub struct SlackSocketTransport {
    web: SlackWebClient,
    app_token: SecretString,
    stream: Mutex<Option<WsStream>>,
}

impl SlackSocketTransport {
    pub fn new(web: SlackWebClient, app_token: SecretString) -> Self {
        Self { web, app_token, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_socket_url(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Receive("socket is not connected".to_owned()))?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("socket stream ended".to_owned())),
            };

            match message {
                Message::Text(text) => match read_text_frame(&text) {
                    TextFrame::Frame(SocketFrame::Hello) => debug!("socket mode hello received"),
                    TextFrame::Frame(SocketFrame::Disconnect { reason }) => {
                        return Err(TransportError::Disconnected(reason))
                    }
                    TextFrame::Frame(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                    TextFrame::Malformed { envelope_id, error } => {
                        warn!(
                            envelope_id = envelope_id.as_deref().unwrap_or("unknown"),
                            error = %error,
                            "skipping malformed socket frame"
                        );
                        let Some(envelope_id) = envelope_id else {
                            continue;
                        };
                        if let Err(error) = stream.send(ack_message(&envelope_id)).await {
                            warn!(
                                event_name = "ingress.slack.ack_sent",
                                envelope_id = %envelope_id,
                                error = %error,
                                "failed to acknowledge malformed envelope"
                            );
                        }
                    }
                },
                Message::Close(frame) => {
                    let reason = frame.map(|frame| frame.reason.to_string()).unwrap_or_default();
                    return Err(TransportError::Disconnected(format!("socket closed {reason}")));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        stream
            .send(ack_message(envelope_id))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

fn ack_message(envelope_id: &str) -> Message {
    Message::Text(json!({ "envelope_id": envelope_id }).to_string())
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    replies: Arc<dyn ReplySink>,
    reconnect_policy: ReconnectPolicy,
}

struct ConnectionOutcome {
    connected: bool,
    result: Result<(), TransportError>,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        replies: Arc<dyn ReplySink>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), replies, reconnect_policy }
    }

    /// Pumps envelopes until the transport closes cleanly or reconnects are
    /// exhausted. Handlers still running at that point are awaited.
    pub async fn start(&self) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut attempt = 0_u32;

        loop {
            let outcome = self.connect_and_pump(attempt, &mut in_flight).await;
            let transport_error = match outcome.result {
                Ok(()) => break,
                Err(error) => error,
            };
            // Only consecutive connect failures count against the budget.
            if outcome.connected {
                attempt = 0;
            }

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "socket mode transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; continuing process without crash"
                );
                break;
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }

        while in_flight.join_next().await.is_some() {}
        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32, in_flight: &mut JoinSet<()>) -> ConnectionOutcome {
        let mut connected = false;
        let result = self.pump(attempt, in_flight, &mut connected).await;
        ConnectionOutcome { connected, result }
    }

    async fn pump(
        &self,
        attempt: u32,
        in_flight: &mut JoinSet<()>,
        connected: &mut bool,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        *connected = true;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (channel_id, user_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                user_id = user_id.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            let replies = Arc::clone(&self.replies);
            in_flight.spawn(handle_envelope(dispatcher, replies, envelope));

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(error) = joined {
                    warn!(error = %error, "envelope handler task failed");
                }
            }
        }
    }
}

async fn handle_envelope(
    dispatcher: Arc<EventDispatcher>,
    replies: Arc<dyn ReplySink>,
    envelope: SlackEnvelope,
) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    let reply = match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Responded(reply)) => reply,
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
        Err(error) => {
            warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %context.correlation_id,
                error = %error,
                "event dispatch failed; continuing socket loop"
            );
            return;
        }
    };

    match replies.deliver(&reply).await {
        Ok(()) => info!(
            event_name = "egress.slack.reply_sent",
            correlation_id = %context.correlation_id,
            channel_id = %reply.channel_id,
            "reply delivered"
        ),
        Err(error) => warn!(
            event_name = "egress.slack.reply_sent",
            correlation_id = %context.correlation_id,
            channel_id = %reply.channel_id,
            error = %error,
            "failed to deliver reply"
        ),
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => {
            (Some(payload.channel_id.as_str()), Some(payload.user_id.as_str()))
        }
        SlackEvent::Message(event) => (Some(event.channel_id.as_str()), event.user_id.as_deref()),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    reason: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawSlashCommand {
    command: String,
    text: String,
    channel_id: String,
    user_id: String,
    trigger_id: String,
}

#[derive(Deserialize)]
struct RawEventCallback {
    event: RawEvent,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    channel: String,
    user: Option<String>,
    text: Option<String>,
    bot_id: Option<String>,
    subtype: Option<String>,
}

/// A text frame read off the socket. Frames that do not decode are skipped
/// rather than dropping the connection; their envelope id, when present, is
/// still acknowledged so Slack does not redeliver them.
#[derive(Debug, PartialEq, Eq)]
pub enum TextFrame {
    Frame(SocketFrame),
    Malformed { envelope_id: Option<String>, error: TransportError },
}

pub fn read_text_frame(raw: &str) -> TextFrame {
    match parse_socket_frame(raw) {
        Ok(frame) => TextFrame::Frame(frame),
        Err(error) => {
            let envelope_id = serde_json::from_str::<Value>(raw).ok().and_then(|value| {
                value.get("envelope_id").and_then(Value::as_str).map(str::to_owned)
            });
            TextFrame::Malformed { envelope_id, error }
        }
    }
}

pub fn parse_socket_frame(raw: &str) -> Result<SocketFrame, TransportError> {
    let frame = serde_json::from_str::<RawFrame>(raw)
        .map_err(|error| TransportError::Receive(format!("malformed socket frame: {error}")))?;

    match frame.frame_type.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            return Ok(SocketFrame::Disconnect {
                reason: frame.reason.unwrap_or_else(|| "unspecified".to_owned()),
            })
        }
        _ => {}
    }

    let envelope_id = frame.envelope_id.ok_or_else(|| {
        TransportError::Receive(format!("`{}` frame has no envelope_id", frame.frame_type))
    })?;
    let event = match frame.frame_type.as_str() {
        "slash_commands" => {
            let command = serde_json::from_value::<RawSlashCommand>(frame.payload)
                .map_err(|error| TransportError::Receive(format!("malformed slash command: {error}")))?;
            SlackEvent::SlashCommand(SlashCommandPayload {
                command: command.command,
                text: command.text,
                channel_id: command.channel_id,
                user_id: command.user_id,
                trigger_id: command.trigger_id,
            })
        }
        "events_api" => {
            let callback = serde_json::from_value::<RawEventCallback>(frame.payload)
                .map_err(|error| TransportError::Receive(format!("malformed event callback: {error}")))?;
            let event = callback.event;
            if event.event_type == "message" {
                SlackEvent::Message(MessageEvent {
                    channel_id: event.channel,
                    user_id: event.user,
                    text: event.text,
                    bot_id: event.bot_id,
                    subtype: event.subtype,
                })
            } else {
                SlackEvent::Unsupported { event_type: event.event_type }
            }
        }
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use databot_core::{FixedClock, TimestampZone};
    use databot_sheets::{InMemorySpreadsheet, SheetError, SpreadsheetClient};
    use tokio::sync::{Mutex, Notify};
    use tokio::time::timeout;

    use super::{
        parse_socket_frame, read_text_frame, ReconnectPolicy, SocketFrame, SocketModeRunner,
        SocketTransport, TextFrame, TransportError,
    };
    use crate::commands::{CommandRouter, SlashCommandPayload};
    use crate::events::{databot_dispatcher, EventDispatcher, Reply, SlackEnvelope, SlackEvent};
    use crate::web::{ReplySink, WebApiError};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Reply>>,
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn deliver(&self, reply: &Reply) -> Result<(), WebApiError> {
            self.delivered.lock().await.push(reply.clone());
            Ok(())
        }
    }

    /// Sheet whose appends park until the test releases them.
    #[derive(Default)]
    struct GatedSheet {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SpreadsheetClient for GatedSheet {
        async fn append_row(&self, _fields: Vec<String>) -> Result<u64, SheetError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(1)
        }

        async fn read_last_n(&self, _n: usize) -> Result<Vec<Vec<String>>, SheetError> {
            Ok(Vec::new())
        }
    }

    async fn delivered_texts(sink: &RecordingSink) -> Vec<String> {
        sink.delivered.lock().await.iter().map(|reply| reply.text.clone()).collect()
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn command(envelope_id: &str, command: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: command.to_owned(),
                text: text.to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U123".to_owned(),
                trigger_id: format!("trig-{envelope_id}"),
            }),
        }
    }

    fn dispatcher<S>(sheet: S) -> EventDispatcher
    where
        S: SpreadsheetClient + 'static,
    {
        let instant = Utc.with_ymd_and_hms(2024, 11, 28, 12, 0, 0).single().expect("instant");
        databot_dispatcher(
            CommandRouter::new(sheet, TimestampZone::Utc).with_clock(Arc::new(FixedClock(instant))),
        )
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-1".to_owned(),
                    event: SlackEvent::Unsupported { event_type: "test".to_owned() },
                })),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingSink::default()),
            no_delay(2),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingSink::default()),
            no_delay(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn slack_disconnect_after_traffic_resets_retry_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(command("env-1", "/databot-help", ""))),
                Err(TransportError::Disconnected("refresh_requested".to_owned())),
                Ok(Some(command("env-2", "/databot-help", ""))),
                Err(TransportError::Disconnected("refresh_requested".to_owned())),
                Ok(None),
            ],
        ));
        let sink = Arc::new(RecordingSink::default());

        let runner = SocketModeRunner::new(
            transport.clone(),
            dispatcher(Arc::new(InMemorySpreadsheet::new())),
            sink.clone(),
            no_delay(1),
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 3);
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
        assert_eq!(sink.delivered.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn idle_refreshes_keep_the_runner_reconnecting() {
        let mut envelopes = (0..10)
            .map(|_| Err(TransportError::Disconnected("refresh_requested".to_owned())))
            .collect::<Vec<_>>();
        envelopes.push(Ok(None));
        let transport = Arc::new(ScriptedTransport::with_script(vec![], envelopes));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            Arc::new(RecordingSink::default()),
            no_delay(5),
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 11);
        assert!(transport.acknowledgements().await.is_empty());
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn slow_store_does_not_hold_back_later_acknowledgements() {
        let sheet = Arc::new(GatedSheet::default());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(command("env-1", "/store", "lunch break"))),
                Ok(Some(command("env-2", "/databot-help", ""))),
                Ok(None),
            ],
        ));
        let sink = Arc::new(RecordingSink::default());
        let runner =
            SocketModeRunner::new(transport.clone(), dispatcher(sheet.clone()), sink.clone(), no_delay(0));
        let running = tokio::spawn(async move { runner.start().await });

        timeout(Duration::from_secs(5), sheet.entered.notified())
            .await
            .expect("store handler should reach the sheet");
        assert_eq!(
            transport.acknowledgements().await.first().map(String::as_str),
            Some("env-1"),
            "envelope must be acknowledged before its handler runs"
        );

        timeout(Duration::from_secs(5), async {
            while delivered_texts(&sink).await.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("help reply should be delivered while the store is blocked");
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
        let before_release = delivered_texts(&sink).await;
        assert_eq!(before_release.len(), 1);
        assert!(before_release[0].starts_with("*Available Commands:*"));

        sheet.release.notify_one();
        timeout(Duration::from_secs(5), running)
            .await
            .expect("runner should drain after release")
            .expect("runner task")
            .expect("runner");

        let texts = delivered_texts(&sink).await;
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], "Data stored successfully! Entry added to row 1");
    }

    #[tokio::test]
    async fn store_failure_is_replied_and_next_envelope_still_handled() {
        let sheet = Arc::new(InMemorySpreadsheet::new());
        sheet.fail_writes("transport error: connection refused").await;
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(command("env-1", "/store", "lunch break"))),
                Ok(Some(command("env-2", "/databot-help", ""))),
                Ok(None),
            ],
        ));
        let sink = Arc::new(RecordingSink::default());

        let runner =
            SocketModeRunner::new(transport.clone(), dispatcher(sheet), sink.clone(), no_delay(0));
        runner.start().await.expect("runner");

        let mut texts =
            sink.delivered.lock().await.iter().map(|reply| reply.text.clone()).collect::<Vec<_>>();
        texts.sort();
        assert_eq!(texts.len(), 2);
        assert!(texts.contains(&"Error storing data: transport error: connection refused".to_owned()));
        assert!(texts.iter().any(|text| text.starts_with("*Available Commands:*")));
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
    }

    #[test]
    fn parses_hello_and_disconnect_frames() {
        assert_eq!(
            parse_socket_frame(r#"{"type":"hello","num_connections":1}"#),
            Ok(SocketFrame::Hello)
        );
        assert_eq!(
            parse_socket_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#),
            Ok(SocketFrame::Disconnect { reason: "refresh_requested".to_owned() })
        );
    }

    #[test]
    fn parses_slash_command_envelope() {
        let frame = parse_socket_frame(
            r#"{
                "envelope_id": "57d6a792",
                "type": "slash_commands",
                "accepts_response_payload": true,
                "payload": {
                    "command": "/store",
                    "text": "lunch break",
                    "user_id": "U123",
                    "channel_id": "C456",
                    "trigger_id": "t-1",
                    "team_id": "T1"
                }
            }"#,
        )
        .expect("frame");

        assert_eq!(
            frame,
            SocketFrame::Envelope(SlackEnvelope {
                envelope_id: "57d6a792".to_owned(),
                event: SlackEvent::SlashCommand(SlashCommandPayload {
                    command: "/store".to_owned(),
                    text: "lunch break".to_owned(),
                    channel_id: "C456".to_owned(),
                    user_id: "U123".to_owned(),
                    trigger_id: "t-1".to_owned(),
                }),
            })
        );
    }

    #[test]
    fn parses_message_and_unsupported_events() {
        let message = parse_socket_frame(
            r#"{"envelope_id":"e-1","type":"events_api","payload":{"event":{"type":"message","text":"hello","user":"U1","channel":"D1"}}}"#,
        )
        .expect("message");
        let SocketFrame::Envelope(envelope) = message else {
            panic!("expected envelope");
        };
        let SlackEvent::Message(event) = envelope.event else {
            panic!("expected message event");
        };
        assert_eq!(event.text.as_deref(), Some("hello"));
        assert_eq!(event.channel_id, "D1");
        assert!(event.is_conversational());

        let mention = parse_socket_frame(
            r#"{"envelope_id":"e-2","type":"events_api","payload":{"event":{"type":"app_mention","text":"hi","channel":"C1"}}}"#,
        )
        .expect("mention");
        assert!(matches!(
            mention,
            SocketFrame::Envelope(SlackEnvelope { event: SlackEvent::Unsupported { ref event_type }, .. })
                if event_type == "app_mention"
        ));

        let interactive = parse_socket_frame(r#"{"envelope_id":"e-3","type":"interactive","payload":{}}"#)
            .expect("interactive");
        assert!(matches!(
            interactive,
            SocketFrame::Envelope(SlackEnvelope { event: SlackEvent::Unsupported { .. }, .. })
        ));
    }

    #[test]
    fn malformed_frames_are_skipped_keeping_recoverable_envelope_id() {
        let broken = read_text_frame(
            r#"{"envelope_id":"e-9","type":"events_api","payload":{"event":"oops"}}"#,
        );
        assert!(matches!(
            broken,
            TextFrame::Malformed { envelope_id: Some(ref id), error: TransportError::Receive(_) }
                if id == "e-9"
        ));

        assert!(matches!(
            read_text_frame("not json"),
            TextFrame::Malformed { envelope_id: None, .. }
        ));
        assert_eq!(read_text_frame(r#"{"type":"hello"}"#), TextFrame::Frame(SocketFrame::Hello));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(parse_socket_frame("not json"), Err(TransportError::Receive(_))));
        assert!(matches!(
            parse_socket_frame(r#"{"type":"slash_commands","payload":{}}"#),
            Err(TransportError::Receive(ref message)) if message.contains("envelope_id")
        ));
    }
}
