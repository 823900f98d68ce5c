// ABOUTME: Trigger-prefix matching and stripping for inbound messages.
// ABOUTME: A message is a command only if it starts with the trigger word (case-insensitive).

use anyhow::{Context, Result};
use regex::Regex;

/// Default trigger word.
pub const DEFAULT_TRIGGER_WORD: &str = "halo";

/// Matches the trigger word at the start of a message, optionally followed
/// by a run of punctuation/whitespace, and strips exactly that one prefix.
pub struct Trigger {
    pattern: Regex,
}

impl Trigger {
    pub fn new(word: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"(?i)^\s*{}[\s,!?.:]*", regex::escape(word)))
            .with_context(|| format!("Invalid trigger word: {word}"))?;
        Ok(Self { pattern })
    }

    /// Whether the text starts with the trigger prefix.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Strip the trigger prefix and return the remaining text, trimmed.
    /// `None` when the text is not a trigger at all; `Some("")` when the
    /// message was only the trigger word (the caller supplies a default).
    pub fn strip(&self, text: &str) -> Option<String> {
        let m = self.pattern.find(text)?;
        Some(text[m.end()..].trim().to_string())
    }
}
