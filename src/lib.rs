// ABOUTME: Library crate for the yatta WhatsApp AI relay bot.
// ABOUTME: Config, channel abstraction, gateway connector, session lifecycle, intake pipeline, transcript.

pub mod channel;
pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod session;
pub mod transcript;
pub mod trigger;
