//! TzKT events hub WebSocket transport.
//!
//! Connects to the hub (default wss://api.tzkt.io/v1/ws), forwards raw text
//! to the event loop and writes whatever frames the session hands back.
//! The connection is single-shot: once it closes, a `Closed` event is sent
//! and the task ends.

use crate::ws::frame::encode_frame;
use crate::ws::message::Ping;
use crate::ws::WsError;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// Raw transport events, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Closed { reason: Option<String> },
}

/// WebSocket client for the TzKT events hub.
pub struct TzktWsClient {
    ws_url: String,
    keepalive: Option<Duration>,
}

impl TzktWsClient {
    pub fn new(ws_url: String, keepalive: Option<Duration>) -> Self {
        Self { ws_url, keepalive }
    }

    /// Spawn the connection task. Returns the sender for outbound frames;
    /// dropping it closes the socket.
    pub fn connect(
        &self,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> mpsc::UnboundedSender<String> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let url = self.ws_url.clone();
        let keepalive = self.keepalive;

        tokio::spawn(async move {
            run_connection(url, keepalive, event_tx, outbound_rx).await;
        });

        outbound_tx
    }
}

async fn run_connection(
    ws_url: String,
    keepalive: Option<Duration>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    info!(url = %ws_url, "connecting to TzKT hub");

    let reason = match connect_and_stream(&ws_url, keepalive, &event_tx, outbound_rx).await {
        Ok(reason) => {
            info!(reason = ?reason, "TzKT hub connection closed");
            reason
        }
        Err(e) => {
            error!(error = %e, "TzKT hub connection error");
            Some(e.to_string())
        }
    };

    let _ = event_tx.send(TransportEvent::Closed { reason });
}

async fn connect_and_stream(
    ws_url: &str,
    keepalive: Option<Duration>,
    event_tx: &mpsc::UnboundedSender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) -> Result<Option<String>, WsError> {
    let url = Url::parse(ws_url)?;
    let (ws_stream, _response) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    info!("TzKT hub connected");
    let _ = event_tx.send(TransportEvent::Opened);

    // The first tick is one full period out so no ping precedes the handshake.
    let period = keepalive.unwrap_or(Duration::from_secs(3600));
    let mut ping_interval = interval_at(Instant::now() + period, period);
    let ping_frame = encode_frame(&Ping::default())?;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx.send(TransportEvent::Text(text)).is_err() {
                            return Ok(Some("event loop gone".to_string()));
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        if event_tx.send(TransportEvent::Text(text)).is_err() {
                            return Ok(Some("event loop gone".to_string()));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "TzKT hub sent close frame");
                        return Ok(frame.map(|f| f.reason.to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(WsError::Closed),
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        debug!(len = frame.len(), "sending frame");
                        write.send(Message::Text(frame)).await?;
                    }
                    None => {
                        let _ = write.close().await;
                        return Ok(Some("client shutdown".to_string()));
                    }
                }
            }
            _ = ping_interval.tick(), if keepalive.is_some() => {
                if let Err(e) = write.send(Message::Text(ping_frame.clone())).await {
                    warn!(error = %e, "failed to send hub keep-alive");
                    return Err(e.into());
                }
            }
        }
    }
}
