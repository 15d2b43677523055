use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use databot_sheets::SpreadsheetClient;
use thiserror::Error;

use crate::{
    commands::{CommandRouter, SlashCommandPayload},
    responder,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    Message,
    Unsupported,
}

/// A plain chat message from the `message` event subscription.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Bot posts (ours included) and edit/join/delete notices carry a
    /// `bot_id` or a `subtype`.
    pub fn is_conversational(&self) -> bool {
        self.bot_id.is_none() && self.subtype.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Text to post back into the channel an event came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Reply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("{event_type:?} event has no channel to reply into")]
    MissingChannel { event_type: SlackEventType },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Slash commands go to the command router, plain messages to the keyword
/// responder.
pub fn databot_dispatcher<S>(router: CommandRouter<S>) -> EventDispatcher
where
    S: SpreadsheetClient + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(router));
    dispatcher.register(MessageHandler);
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: SpreadsheetClient,
{
    pub fn new(router: CommandRouter<S>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: SpreadsheetClient + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if payload.channel_id.is_empty() {
            return Err(EventHandlerError::MissingChannel {
                event_type: SlackEventType::SlashCommand,
            });
        }

        let text = self.router.route(payload, ctx).await;
        Ok(HandlerResult::Responded(Reply { channel_id: payload.channel_id.clone(), text }))
    }
}

pub struct MessageHandler;

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(text) = event.text.as_deref().filter(|_| event.is_conversational()) else {
            return Ok(HandlerResult::Processed);
        };
        if event.channel_id.is_empty() {
            return Err(EventHandlerError::MissingChannel { event_type: SlackEventType::Message });
        }

        Ok(HandlerResult::Responded(Reply {
            channel_id: event.channel_id.clone(),
            text: responder::respond(text).to_owned(),
        }))
    }
}
