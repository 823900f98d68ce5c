// ABOUTME: Session lifecycle state machine and supervised reconnect driver.
// ABOUTME: Pure transitions are unit-testable; the supervisor owns credential persistence and retry policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::channel::{
    ChannelConnector, ChannelEvent, Connection, ConnectionState, DisconnectReason,
};
use crate::pipeline::Pipeline;

// =============================================================================
// State machine
// =============================================================================

/// Connection lifecycle states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Open,
    Closed,
}

/// What the driver must do after applying a connection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Recreate the session after the reconnect delay
    Reconnect,
    /// Terminal logout: stop retrying, credentials are invalid
    Shutdown,
}

/// Apply one connection update to the state machine.
///
/// A close whose reason is a logout is terminal; any other close (or a
/// missing reason) schedules a reconnect. Updates without a state change
/// (e.g. pairing-code-only signals) leave the machine untouched.
pub fn apply(
    state: SessionState,
    new_state: Option<ConnectionState>,
    reason: Option<DisconnectReason>,
) -> (SessionState, Action) {
    match new_state {
        Some(ConnectionState::Connecting) => (SessionState::Connecting, Action::None),
        Some(ConnectionState::Open) => (SessionState::Open, Action::None),
        Some(ConnectionState::Close) => {
            if reason.is_some_and(DisconnectReason::is_terminal) {
                (SessionState::Closed, Action::Shutdown)
            } else {
                (SessionState::Connecting, Action::Reconnect)
            }
        }
        None => (state, Action::None),
    }
}

// =============================================================================
// Reconnect policy
// =============================================================================

/// Reconnect delay policy. The stock setup retries forever on a fixed 3 s
/// delay; multiplier, cap, and attempt limit are the hardening knobs.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// 0 = unlimited
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(3),
            multiplier: 1,
            max_attempts: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt, or `None` once attempts are
    /// exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts > 0 && attempt > self.max_attempts {
            return None;
        }
        // Exponent capped so Duration multiplication cannot overflow
        let exp = attempt.saturating_sub(1).min(16);
        let grown = self.initial_delay * self.multiplier.max(1).saturating_pow(exp);
        Some(grown.min(self.max_delay))
    }
}

// =============================================================================
// Credential store
// =============================================================================

/// Opaque credential blob persisted as JSON under the auth directory.
/// Losing a write risks forcing re-pairing on the next start, so writes go
/// through a temp file and rename.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: AsRef<Path>>(auth_dir: P) -> Self {
        Self {
            path: auth_dir.as_ref().join("creds.json"),
        }
    }

    /// Load the persisted blob, or an empty one for a fresh pairing.
    pub fn load_or_create(&self) -> Result<Value> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Corrupt credential file {}", self.path.display()))
        } else {
            Ok(Value::Object(serde_json::Map::new()))
        }
    }

    pub fn persist(&self, creds: &Value) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create auth dir {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(creds)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Drop the blob after a logout; the server has invalidated it.
    pub fn invalidate(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// How one session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOutcome {
    /// Non-terminal drop; the supervisor recreates the session
    Dropped,
    /// Explicit logout; no further attempts
    LoggedOut,
}

/// Owns the connect/drive/reconnect loop. One connection attempt per
/// iteration; the policy decides the delay between them.
pub struct SessionSupervisor<C> {
    connector: C,
    creds: CredentialStore,
    policy: ReconnectPolicy,
}

impl<C: ChannelConnector> SessionSupervisor<C> {
    pub fn new(connector: C, creds: CredentialStore, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            creds,
            policy,
        }
    }

    /// Run until an explicit logout or until reconnect attempts are
    /// exhausted. Every other failure mode is retried.
    pub async fn run(&self, pipeline: Arc<Pipeline>) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            let creds = self.creds.load_or_create()?;
            match self.connector.connect(&creds).await {
                Ok(conn) => {
                    attempt = 0;
                    match self.drive(conn, &pipeline).await {
                        SessionOutcome::LoggedOut => {
                            if let Err(e) = self.creds.invalidate() {
                                tracing::warn!(error = %e, "Failed to drop invalidated credentials");
                            }
                            tracing::info!("Logged out; shutting down");
                            return Ok(());
                        }
                        SessionOutcome::Dropped => {
                            tracing::warn!("Session dropped");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection attempt failed");
                }
            }

            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                anyhow::bail!("Reconnect attempts exhausted after {} tries", attempt - 1);
            };
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Consume one session's event feed until it ends or a close signal
    /// arrives. Messages are handled as independent spawned tasks so a slow
    /// provider call never blocks intake.
    async fn drive(&self, mut conn: Connection, pipeline: &Arc<Pipeline>) -> SessionOutcome {
        let mut state = SessionState::Connecting;

        while let Some(event) = conn.events.recv().await {
            match event {
                ChannelEvent::CredentialsUpdate { creds } => {
                    if let Err(e) = self.creds.persist(&creds) {
                        tracing::error!(error = %e, "Failed to persist credentials");
                    }
                }
                ChannelEvent::ConnectionUpdate {
                    state: new_state,
                    pairing_code,
                    disconnect_reason,
                } => {
                    if let Some(code) = pairing_code {
                        render_pairing(&code);
                    }
                    let (next, action) = apply(state, new_state, disconnect_reason);
                    if next == SessionState::Open && state != SessionState::Open {
                        tracing::info!("Connected");
                    }
                    state = next;
                    match action {
                        Action::None => {}
                        Action::Reconnect => return SessionOutcome::Dropped,
                        Action::Shutdown => return SessionOutcome::LoggedOut,
                    }
                }
                ChannelEvent::Message { message } => {
                    let pipeline = Arc::clone(pipeline);
                    let outbound = Arc::clone(&conn.outbound);
                    tokio::spawn(async move {
                        if let Err(e) = pipeline.handle_message(&message, outbound.as_ref()).await {
                            tracing::error!(error = %e, chat = %message.chat_id, "Error handling message");
                        }
                    });
                }
            }
        }

        // Event feed ended without a close signal: treat as a drop
        SessionOutcome::Dropped
    }
}

/// Auxiliary pairing signal during connection: surface the code for the
/// out-of-band link step. Not a state change.
///
/// The gateway process owns the terminal QR; what reaches us is the
/// phone-pairing code, printed here so it is visible even with logging
/// filtered down.
fn render_pairing(code: &str) {
    eprintln!("{}", pairing_banner(code));
    tracing::warn!(code = %code, "Pairing required - enter this code under Linked Devices on the phone");
}

fn pairing_banner(code: &str) -> String {
    format!(
        "\n╔══════════════════════════════════════════════════════════╗\n\
         ║ PAIRING REQUIRED                                         ║\n\
         ╚══════════════════════════════════════════════════════════╝\n\
         Enter this code on the phone (Linked Devices > Link with\n\
         phone number): {code}\n"
    )
}

// =============================================================================
// Tests
// =============================================================================
