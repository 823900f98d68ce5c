// ABOUTME: Message intake pipeline - trigger filtering, text/image extraction, routing, reply, transcript.
// ABOUTME: The reply is always observed sent before the transcript write is attempted.

use anyhow::Result;
use yatta_provider::FallbackRouter;

use crate::channel::{InboundMessage, OutboundChannel};
use crate::transcript::TranscriptStore;
use crate::trigger::Trigger;

/// Stands in for raw image bytes in transcript rows.
pub const IMAGE_PLACEHOLDER: &str = "[image]";

/// Prompt used when a text trigger carries nothing after stripping.
const DEFAULT_TEXT_PROMPT: &str = "Halo";
/// Prompt used when an image caption carries nothing after stripping.
const DEFAULT_VISION_PROMPT: &str = "describe this image";

/// Per-message processing: filter, extract, route, reply, record.
pub struct Pipeline {
    router: FallbackRouter,
    trigger: Trigger,
    transcript: TranscriptStore,
}

impl Pipeline {
    pub fn new(router: FallbackRouter, trigger: Trigger, transcript: TranscriptStore) -> Self {
        Self {
            router,
            trigger,
            transcript,
        }
    }

    /// Handle one inbound message to completion. Returns `Ok(())` for
    /// messages that are filtered out; errors only surface from the
    /// outbound send or media download.
    pub async fn handle_message(
        &self,
        msg: &InboundMessage,
        outbound: &dyn OutboundChannel,
    ) -> Result<()> {
        if !msg.has_payload() || msg.is_broadcast() {
            return Ok(());
        }

        let text = msg.text().unwrap_or("").to_string();

        // Loop prevention: never react to our own output unless it was
        // itself a trigger (operators may re-trigger manually)
        if msg.from_me && !self.trigger.matches(&text) {
            return Ok(());
        }

        // Not every message is a command
        let Some(stripped) = self.trigger.strip(&text) else {
            return Ok(());
        };

        let sender = msg.sender().to_string();
        let preview: String = text.chars().take(50).collect();
        tracing::info!(sender = %sender, chat = %msg.chat_id, preview, "Processing triggered message");

        if let Some(image) = &msg.image {
            let prompt = non_empty_or(stripped, DEFAULT_VISION_PROMPT);
            let bytes = outbound.download_media(&image.media_id).await?;
            let reply = self.router.route_vision(&prompt, &bytes).await;
            outbound.send_text(&msg.chat_id, &reply).await?;
            self.record(&sender, IMAGE_PLACEHOLDER, &reply).await;
            return Ok(());
        }

        let prompt = non_empty_or(stripped, DEFAULT_TEXT_PROMPT);
        let reply = self.router.route(&prompt).await;
        outbound.send_text(&msg.chat_id, &reply).await?;
        self.record(&sender, &text, &reply).await;
        Ok(())
    }

    /// Transcript failures are isolated here: the reply is already out.
    async fn record(&self, sender: &str, message: &str, reply: &str) {
        if let Err(e) = self.transcript.append(sender, message, reply).await {
            tracing::warn!(error = %e, sender = %sender, "Failed to record transcript row");
        }
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }
}

fn non_empty_or(stripped: String, default: &str) -> String {
    if stripped.is_empty() {
        default.to_string()
    } else {
        stripped
    }
}
