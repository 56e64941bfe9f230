use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};
use crate::web::MessageSink;

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
    /// `Ok(None)` means the transport was shut down and will not produce more envelopes.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

enum SessionEnd {
    Closed,
    Reconnect,
}

/// Reads envelopes serially and runs their handlers on a bounded task set.
///
/// A handler permit is taken before each spawn, so a full set stalls the read
/// loop rather than queueing unbounded work. In-flight handlers are drained
/// whenever a session ends.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    sink: Arc<dyn MessageSink>,
    reconnect_policy: ReconnectPolicy,
    permits: Arc<Semaphore>,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        sink: Arc<dyn MessageSink>,
        reconnect_policy: ReconnectPolicy,
        max_in_flight: usize,
    ) -> Self {
        Self {
            transport,
            dispatcher: Arc::new(dispatcher),
            sink,
            reconnect_policy,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(&mut attempt).await {
                Ok(SessionEnd::Closed) => return Ok(()),
                Ok(SessionEnd::Reconnect) => continue,
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.slack.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "ingress.slack.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; stopping runner"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: &mut u32) -> Result<SessionEnd, TransportError> {
        info!(event_name = "ingress.slack.connecting", attempt = *attempt, "opening socket mode connection");
        self.transport.connect().await?;
        info!(event_name = "ingress.slack.connected", attempt = *attempt, "socket mode transport connected");
        *attempt = 0;

        let mut tasks = JoinSet::new();
        let outcome = self.pump(&mut tasks).await;
        drain(&mut tasks).await;
        outcome
    }

    async fn pump(&self, tasks: &mut JoinSet<()>) -> Result<SessionEnd, TransportError> {
        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join_result(joined);
            }

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(event_name = "ingress.slack.stream_closed", "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(SessionEnd::Closed);
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            if envelope.needs_ack() {
                self.acknowledge(&envelope.envelope_id).await;
            }

            match &envelope.event {
                SlackEvent::Hello => continue,
                SlackEvent::Disconnect { reason } => {
                    info!(
                        event_name = "ingress.slack.disconnect_requested",
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "slack requested a reconnect"
                    );
                    self.transport.disconnect().await?;
                    return Ok(SessionEnd::Reconnect);
                }
                SlackEvent::Message(_) | SlackEvent::Unsupported { .. } => {}
            }

            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| TransportError::Receive("handler permits closed".to_owned()))?;
            let dispatcher = self.dispatcher.clone();
            let sink = self.sink.clone();
            tasks.spawn(async move {
                let _permit = permit;
                handle_envelope(&dispatcher, sink.as_ref(), envelope).await;
            });
        }
    }

    async fn acknowledge(&self, envelope_id: &str) {
        if let Err(error) = self.transport.acknowledge(envelope_id).await {
            warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope_id,
                correlation_id = %envelope_id,
                error = %error,
                "failed to acknowledge slack envelope"
            );
        } else {
            debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope_id,
                correlation_id = %envelope_id,
                "acknowledged slack envelope"
            );
        }
    }
}

async fn handle_envelope(
    dispatcher: &EventDispatcher,
    sink: &dyn MessageSink,
    envelope: SlackEnvelope,
) {
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    match dispatcher.dispatch(&envelope, &context).await {
        HandlerResult::Responded(message) => match sink.send(&message).await {
            Ok(()) => debug!(
                event_name = "egress.slack.message_sent",
                correlation_id = %context.correlation_id,
                channel_id = %message.channel,
                "posted reply"
            ),
            Err(error) => warn!(
                event_name = "egress.slack.send_failed",
                correlation_id = %context.correlation_id,
                channel_id = %message.channel,
                error = %error,
                "failed to post reply"
            ),
        },
        HandlerResult::Processed | HandlerResult::Ignored => {}
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    if !tasks.is_empty() {
        debug!(in_flight = tasks.len(), "draining in-flight handlers");
    }
    while let Some(joined) = tasks.join_next().await {
        log_join_result(joined);
    }
}

fn log_join_result(joined: Result<(), JoinError>) {
    if let Err(error) = joined {
        warn!(error = %error, "event handler task failed");
    }
}
