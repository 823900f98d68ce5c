// ABOUTME: TCP connector to the external WhatsApp bridge - newline-delimited JSON frames both ways.
// ABOUTME: A reader task feeds an ordered event queue; media downloads are correlated by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::channel::{
    ChannelConnector, ChannelEvent, Connection, ConnectionState, DisconnectReason, InboundMessage,
    OutboundChannel,
};

const EVENT_QUEUE_DEPTH: usize = 64;
const MEDIA_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Frames we write to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OutboundFrame<'a> {
    /// First frame on every connection: hands the bridge its credentials
    Init { creds: &'a Value },
    SendText { chat_id: &'a str, text: &'a str },
    DownloadMedia { media_id: &'a str, request_id: u64 },
}

/// Frames the bridge writes to us: the channel events plus media replies.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum GatewayFrame {
    ConnectionUpdate {
        #[serde(default)]
        state: Option<ConnectionState>,
        #[serde(default)]
        pairing_code: Option<String>,
        #[serde(default)]
        disconnect_reason: Option<DisconnectReason>,
    },
    CredentialsUpdate {
        creds: Value,
    },
    Message {
        message: InboundMessage,
    },
    Media {
        request_id: u64,
        /// base64-encoded payload
        data: String,
    },
    MediaError {
        request_id: u64,
        error: String,
    },
}

type PendingMedia = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Vec<u8>>>>>>;

/// Connects to the bridge over TCP. One call to `connect` is one session.
pub struct GatewayConnector {
    addr: String,
}

impl GatewayConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl ChannelConnector for GatewayConnector {
    async fn connect(&self, creds: &Value) -> Result<Connection> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.addr))?;
        let (read_half, write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (writer_tx, writer_rx) = mpsc::channel::<String>(EVENT_QUEUE_DEPTH);
        let pending: PendingMedia = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(write_loop(write_half, writer_rx));
        tokio::spawn(read_loop(read_half, event_tx, Arc::clone(&pending)));

        let handle = GatewayHandle {
            writer: writer_tx,
            pending,
            next_request_id: AtomicU64::new(1),
        };
        handle
            .send_frame(&OutboundFrame::Init { creds })
            .await
            .context("Failed to send init frame to gateway")?;

        Ok(Connection {
            events: event_rx,
            outbound: Arc::new(handle),
        })
    }
}

/// Outbound half of one gateway connection.
pub struct GatewayHandle {
    writer: mpsc::Sender<String>,
    pending: PendingMedia,
    next_request_id: AtomicU64,
}

impl GatewayHandle {
    async fn send_frame(&self, frame: &OutboundFrame<'_>) -> Result<()> {
        let line = serde_json::to_string(frame).context("Failed to encode gateway frame")?;
        self.writer
            .send(line)
            .await
            .map_err(|_| anyhow::anyhow!("Gateway writer closed"))
    }
}

#[async_trait]
impl OutboundChannel for GatewayHandle {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.send_frame(&OutboundFrame::SendText { chat_id, text }).await
    }

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id, tx);

        if let Err(e) = self
            .send_frame(&OutboundFrame::DownloadMedia { media_id, request_id })
            .await
        {
            self.pending
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(MEDIA_DOWNLOAD_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => bail!("Gateway connection dropped during media download"),
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .remove(&request_id);
                bail!("Media download timed out for id {media_id}")
            }
        }
    }
}

async fn write_loop(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            tracing::warn!(error = %e, "Gateway write failed");
            break;
        }
    }
}

async fn read_loop(
    read_half: tokio::net::tcp::OwnedReadHalf,
    event_tx: mpsc::Sender<ChannelEvent>,
    pending: PendingMedia,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let frame = match serde_json::from_str::<GatewayFrame>(&line) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed gateway frame");
                        continue;
                    }
                };
                match frame {
                    GatewayFrame::Media { request_id, data } => {
                        resolve_media(&pending, request_id, decode_media(&data));
                    }
                    GatewayFrame::MediaError { request_id, error } => {
                        resolve_media(&pending, request_id, Err(anyhow::anyhow!(error)));
                    }
                    GatewayFrame::ConnectionUpdate {
                        state,
                        pairing_code,
                        disconnect_reason,
                    } => {
                        let event = ChannelEvent::ConnectionUpdate {
                            state,
                            pairing_code,
                            disconnect_reason,
                        };
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    GatewayFrame::CredentialsUpdate { creds } => {
                        if event_tx
                            .send(ChannelEvent::CredentialsUpdate { creds })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    GatewayFrame::Message { message } => {
                        if event_tx.send(ChannelEvent::Message { message }).await.is_err() {
                            return;
                        }
                    }
                }
            }
            // EOF or socket error: surface as a non-terminal disconnect so
            // the supervisor schedules a reconnect
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Gateway read failed");
                break;
            }
        }
    }

    let _ = event_tx
        .send(ChannelEvent::ConnectionUpdate {
            state: Some(ConnectionState::Close),
            pairing_code: None,
            disconnect_reason: Some(DisconnectReason::ConnectionLost),
        })
        .await;
}

fn decode_media(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Gateway sent media that is not valid base64")
}

fn resolve_media(pending: &PendingMedia, request_id: u64, result: Result<Vec<u8>>) {
    let tx = pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&request_id);
    match tx {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => tracing::warn!(request_id, "Media reply with no pending request"),
    }
}
