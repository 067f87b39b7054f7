//! Socket transport behind the connection.
//!
//! The connection only needs two things from a transport: send a text
//! frame, and close. Inbound frames arrive over a channel handed out at
//! connect time. Keeping this behind a trait lets tests drive a page
//! against an in-memory host, and is where an external reconnecting
//! transport would plug in.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Inbound frame channel depth.
const CHANNEL_CAPACITY: usize = 64;

/// Errors surfaced by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket: {0}")]
    WebSocket(String),

    #[error("transport closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connected socket able to send text frames.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Queue one outbound frame.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Tear the connection down. Idempotent.
    async fn close(&self);
}

/// WebSocket transport over tokio-tungstenite.
///
/// The socket is split into a writer task fed by an mpsc channel and a
/// reader task that forwards text frames into the inbound channel.
/// Dropping of the inbound sender is how consumers observe the
/// connection ending.
pub struct WsTransport {
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl WsTransport {
    /// Connect to `url` and return the transport plus the inbound frame
    /// stream.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<String>), TransportError> {
        tracing::info!(url = %url, "connecting to host");
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = outbound_rx.recv() => match frame {
                        Some(frame) => {
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        let reader_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_shutdown.cancelled() => break,
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("host closed connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "websocket read failed");
                            break;
                        }
                    }
                }
            }
            // inbound_tx drops here, ending the consumer's stream
        });

        Ok((
            Self {
                outbound: outbound_tx,
                shutdown,
            },
            inbound_rx,
        ))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}
