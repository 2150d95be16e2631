use crate::error::TransportError;
use crate::events::InboundEvent;
use crate::transport::config::Config;
use crate::transport::consts::{EVENT_CHANNEL_DEPTH, OUTBOUND_QUEUE_DEPTH};
use crate::transport::{OutboundQueue, SessionTransport, TransportHandle, TransportStreams};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use nimbus_live_types::messages::{ClientMessage, RealtimeInput, Setup};
use nimbus_live_types::{MediaChunk, ServerMessage, SessionConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// WebSocket implementation of the session transport, speaking the live
/// bidi protocol of `nimbus-live-types`.
pub struct WsTransport {
    config: Config,
}

impl WsTransport {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn open(&self, session: SessionConfig) -> Result<TransportStreams, TransportError> {
        let request = self
            .config
            .build_request()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let setup = ClientMessage::Setup(Setup::new(self.config.model(), &session));
        let text = serde_json::to_string(&setup)
            .map_err(|e| TransportError::ConnectFailed(format!("setup serialization: {}", e)))?;
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        // The session counts as open only once the remote side acknowledges
        // the setup.
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) if message.is_setup_complete() => break,
                        Ok(_) => {
                            tracing::warn!("ignoring server content received before setup ack")
                        }
                        Err(e) => tracing::warn!("failed to deserialize setup response: {}", e),
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    return Err(TransportError::ConnectFailed(format!(
                        "connection closed during setup: {:?}",
                        reason
                    )));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::ConnectFailed(e.to_string())),
                None => {
                    return Err(TransportError::ConnectFailed(
                        "connection ended during setup".to_string(),
                    ));
                }
            }
        }
        tracing::info!(model = self.config.model(), "live session established");

        let queue = OutboundQueue::new(OUTBOUND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);

        let writer_queue = queue.clone();
        let send_handle = tokio::spawn(async move {
            while let Some(chunk) = writer_queue.pop().await {
                let message = ClientMessage::RealtimeInput(RealtimeInput::new(chunk));
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize outbound frame: {}", e);
                    }
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        let fallback_rate = session.output_sample_rate();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = event_tx
                            .send(InboundEvent::TransportError(e.to_string()))
                            .await;
                        return;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server) => {
                            if let Some(content) = server.server_content() {
                                for event in InboundEvent::fan_out(content, fallback_rate) {
                                    if event_tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!("failed to deserialize server message: {}", e);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            let _ = event_tx.send(InboundEvent::TransportClosed).await;
        });

        Ok(TransportStreams {
            handle: Box::new(WsHandle {
                queue,
                send_handle: Some(send_handle),
                recv_handle: Some(recv_handle),
                closed: false,
            }),
            events: event_rx,
        })
    }
}

pub struct WsHandle {
    queue: Arc<OutboundQueue>,
    send_handle: Option<tokio::task::JoinHandle<()>>,
    recv_handle: Option<tokio::task::JoinHandle<()>>,
    closed: bool,
}

impl TransportHandle for WsHandle {
    fn send(&self, chunk: MediaChunk) {
        self.queue.push(chunk);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Closing the queue lets the writer drain, send a Close frame and
        // end on its own. The reader is stopped here so a caller-initiated
        // close never surfaces as a TransportClosed event.
        self.queue.close();
        if let Some(recv_handle) = self.recv_handle.take() {
            recv_handle.abort();
        }
        self.send_handle.take();
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.close();
    }
}
