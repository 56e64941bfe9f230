use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::events::{parse_envelope, EnvelopeError, SlackEnvelope};
use crate::socket::{SocketTransport, TransportError};
use crate::web::SlackWebClient;

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
enum Frame {
    Envelope(SlackEnvelope),
    Control,
    Closed,
}

fn decode_frame(message: WsMessage) -> Result<Frame, EnvelopeError> {
    match message {
        WsMessage::Text(text) => parse_envelope(text.as_str()).map(Frame::Envelope),
        WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => parse_envelope(text).map(Frame::Envelope),
            Err(_) => Ok(Frame::Control),
        },
        WsMessage::Close(_) => Ok(Frame::Closed),
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => Ok(Frame::Control),
    }
}

/// Socket Mode over a live WebSocket, with a fresh URL from `apps.connections.open`
/// on every connect.
///
/// Reads wake at least once per poll interval; an idle tick sends a ping so a
/// dead peer surfaces as a send failure instead of a silent hang.
pub struct WebSocketTransport {
    web: SlackWebClient,
    poll_interval: Duration,
    stream: Mutex<Option<SocketStream>>,
}

impl WebSocketTransport {
    pub fn new(web: SlackWebClient, poll_interval: Duration) -> Self {
        Self {
            web,
            poll_interval: poll_interval.max(Duration::from_millis(10)),
            stream: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_socket_connection()
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
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let next = match tokio::time::timeout(self.poll_interval, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    stream
                        .send(WsMessage::Ping(Vec::new().into()))
                        .await
                        .map_err(|error| TransportError::Receive(format!("keepalive ping failed: {error}")))?;
                    continue;
                }
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("websocket stream ended".to_owned())),
            };

            match decode_frame(message) {
                Ok(Frame::Envelope(envelope)) => return Ok(Some(envelope)),
                Ok(Frame::Control) => continue,
                Ok(Frame::Closed) => {
                    return Err(TransportError::Receive("websocket closed by peer".to_owned()))
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.slack.envelope_rejected",
                        error = %error,
                        "skipping undecodable socket frame"
                    );
                }
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(WsMessage::Text(ack.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        if let Err(error) = stream.close(None).await {
            debug!(error = %error, "websocket close handshake did not complete");
        }
        Ok(())
    }
}
