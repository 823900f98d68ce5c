// ABOUTME: Typed events and capability traits for the messaging channel.
// ABOUTME: The concrete transport lives in an external gateway process; the bot only sees these shapes.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Connection state reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Reason code attached to a close signal. Only a logout is terminal;
/// every other reason triggers reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    LoggedOut,
    ConnectionLost,
    ConnectionClosed,
    RestartRequired,
    #[serde(other)]
    Unknown,
}

impl DisconnectReason {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// An image attachment reference carried by a message. Actual bytes are
/// fetched on demand through [`OutboundChannel::download_media`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub media_id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// One inbound message event, consumed exactly once by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Chat the message arrived in (direct contact or group)
    pub chat_id: String,
    /// Actual author for group chats
    #[serde(default)]
    pub participant: Option<String>,
    /// Whether the bot itself sent this message
    #[serde(default)]
    pub from_me: bool,
    /// Plain text body
    #[serde(default)]
    pub body: Option<String>,
    /// Extended/quoted text body
    #[serde(default)]
    pub quoted_body: Option<String>,
    /// Attached image, if any
    #[serde(default)]
    pub image: Option<ImageAttachment>,
}

impl InboundMessage {
    /// Broadcast/status traffic is never processed.
    pub fn is_broadcast(&self) -> bool {
        self.chat_id.ends_with("@broadcast")
    }

    pub fn is_group(&self) -> bool {
        self.chat_id.ends_with("@g.us")
    }

    /// Canonical sender identity: group messages resolve to the
    /// participant, not the group id.
    pub fn sender(&self) -> &str {
        if self.is_group() {
            self.participant.as_deref().unwrap_or(&self.chat_id)
        } else {
            &self.chat_id
        }
    }

    /// Extract text: plain body, else quoted body, else image caption.
    /// First non-empty match wins.
    pub fn text(&self) -> Option<&str> {
        [
            self.body.as_deref(),
            self.quoted_body.as_deref(),
            self.image.as_ref().and_then(|i| i.caption.as_deref()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
    }

    /// A message with neither text nor an image carries nothing to process.
    pub fn has_payload(&self) -> bool {
        self.text().is_some() || self.image.is_some()
    }
}

/// Typed events emitted by the channel, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Connection lifecycle signal. A pairing code may arrive on its own,
    /// without a state change.
    ConnectionUpdate {
        #[serde(default)]
        state: Option<ConnectionState>,
        #[serde(default)]
        pairing_code: Option<String>,
        #[serde(default)]
        disconnect_reason: Option<DisconnectReason>,
    },
    /// The credential blob changed and must be persisted durably.
    CredentialsUpdate { creds: serde_json::Value },
    /// A new inbound message.
    Message { message: InboundMessage },
}

/// Outbound operations available while a session is live.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Send a plain text reply to a chat.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Download the media payload referenced by a message.
    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>>;
}

/// One live connection: an ordered event feed plus the outbound handle.
pub struct Connection {
    pub events: mpsc::Receiver<ChannelEvent>,
    pub outbound: Arc<dyn OutboundChannel>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// A single connection attempt against the messaging network. The session
/// supervisor calls this once per (re)connect cycle.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, creds: &serde_json::Value) -> Result<Connection>;
}

// =============================================================================
// Mock channel for tests
// =============================================================================

/// Records outbound traffic instead of sending it; serves fixed media bytes.
pub struct MockChannel {
    sent: Mutex<Vec<(String, String)>>,
    media: Vec<u8>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            media: b"\xff\xd8\xff\xe0jpeg-bytes".to_vec(),
        }
    }

    pub fn with_media(media: Vec<u8>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            media,
        }
    }

    /// Messages sent so far as (chat_id, text) pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundChannel for MockChannel {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn download_media(&self, _media_id: &str) -> Result<Vec<u8>> {
        Ok(self.media.clone())
    }
}
