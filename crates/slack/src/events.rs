use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use refbot_core::matcher::PhraseMatcher;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::commands::{CommandDispatcher, OutboundMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

impl SlackEnvelope {
    /// Envelopes without an id (such as `hello`) are never acknowledged.
    pub fn needs_ack(&self) -> bool {
        !self.envelope_id.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    Hello,
    Disconnect { reason: Option<String> },
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::Hello => SlackEventType::Hello,
            Self::Disconnect { .. } => SlackEventType::Disconnect,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    Hello,
    Disconnect,
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    pub subtype: Option<String>,
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Plain messages from people; edits, joins, bot posts and our own replies are skipped.
    pub fn is_actionable(&self, bot_user_id: Option<&str>) -> bool {
        if self.subtype.as_deref().is_some_and(|subtype| !subtype.is_empty()) {
            return false;
        }
        if self.bot_id.is_some() {
            return false;
        }
        match (self.user_id.as_deref(), bot_user_id) {
            (None, _) => false,
            (Some(user), Some(bot)) => user != bot,
            (Some(_), None) => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed socket envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("events_api envelope `{envelope_id}` has no event payload")]
    MissingEvent { envelope_id: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
    reason: Option<String>,
}

/// Parses one Socket Mode frame into a typed envelope.
pub fn parse_envelope(raw: &str) -> Result<SlackEnvelope, EnvelopeError> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;
    let event = match envelope.envelope_type.as_str() {
        "hello" => SlackEvent::Hello,
        "disconnect" => SlackEvent::Disconnect { reason: envelope.reason },
        "events_api" => {
            let event = envelope.payload.get("event").ok_or_else(|| {
                EnvelopeError::MissingEvent { envelope_id: envelope.envelope_id.clone() }
            })?;
            match event.get("type").and_then(Value::as_str) {
                Some("message") => SlackEvent::Message(MessageEvent::deserialize(event)?),
                Some(other) => SlackEvent::Unsupported { event_type: other.to_owned() },
                None => SlackEvent::Unsupported { event_type: "events_api".to_owned() },
            }
        }
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SlackEnvelope { envelope_id: envelope.envelope_id, event })
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

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> HandlerResult;
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
    ) -> HandlerResult {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return HandlerResult::Ignored;
        };

        handler.handle(envelope, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Classifies channel messages and hands recognised commands to the dispatcher.
pub struct MessageHandler {
    matcher: Arc<PhraseMatcher>,
    commands: Arc<CommandDispatcher>,
    bot_user_id: Option<String>,
}

impl MessageHandler {
    pub fn new(
        matcher: Arc<PhraseMatcher>,
        commands: Arc<CommandDispatcher>,
        bot_user_id: Option<String>,
    ) -> Self {
        Self { matcher, commands, bot_user_id }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> HandlerResult {
        let SlackEvent::Message(event) = &envelope.event else {
            return HandlerResult::Ignored;
        };
        if !event.is_actionable(self.bot_user_id.as_deref()) {
            return HandlerResult::Ignored;
        }

        let Some(command) = self.matcher.classify(&event.text, &event.channel_id) else {
            return HandlerResult::Ignored;
        };
        debug!(
            event_name = "ingress.slack.command_classified",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            category = ?command.category(),
            "classified channel message"
        );

        match self.commands.dispatch(&command).await {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        }
    }
}

pub fn message_dispatcher(handler: MessageHandler) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(handler);
    dispatcher
}
