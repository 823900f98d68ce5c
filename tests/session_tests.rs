// ABOUTME: Supervisor integration tests with a scripted connector.
// ABOUTME: Covers terminal logout, reconnection after drops, credential persistence, and attempt limits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use yatta::channel::{
    ChannelConnector, ChannelEvent, Connection, ConnectionState, DisconnectReason, MockChannel,
    OutboundChannel,
};
use yatta::pipeline::Pipeline;
use yatta::session::{CredentialStore, ReconnectPolicy, SessionSupervisor};
use yatta::transcript::TranscriptStore;
use yatta::trigger::Trigger;
use yatta_provider::mock::MockProvider;
use yatta_provider::{FallbackRouter, Provider};

/// Replays one pre-scripted event sequence per connect call and records
/// the credentials each attempt was handed.
struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<ChannelEvent>>>,
    connects: AtomicUsize,
    seen_creds: Mutex<Vec<Value>>,
    channel: Arc<MockChannel>,
}

impl ScriptedConnector {
    fn new(scripts: Vec<Vec<ChannelEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
            seen_creds: Mutex::new(Vec::new()),
            channel: Arc::new(MockChannel::new()),
        }
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn seen_creds(&self) -> Vec<Value> {
        self.seen_creds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelConnector for &ScriptedConnector {
    async fn connect(&self, creds: &Value) -> Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_creds.lock().unwrap().push(creds.clone());

        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .context("no scripted session left")?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(Connection {
            events: rx,
            outbound: Arc::clone(&self.channel) as Arc<dyn OutboundChannel>,
        })
    }
}

fn close(reason: DisconnectReason) -> ChannelEvent {
    ChannelEvent::ConnectionUpdate {
        state: Some(ConnectionState::Close),
        pairing_code: None,
        disconnect_reason: Some(reason),
    }
}

fn open() -> ChannelEvent {
    ChannelEvent::ConnectionUpdate {
        state: Some(ConnectionState::Open),
        pairing_code: None,
        disconnect_reason: None,
    }
}

fn test_pipeline() -> Arc<Pipeline> {
    let providers: Vec<Arc<dyn Provider>> =
        vec![Arc::new(MockProvider::succeeding("primary", "ok"))];
    Arc::new(Pipeline::new(
        FallbackRouter::new(providers),
        Trigger::new("halo").expect("trigger"),
        TranscriptStore::in_memory().expect("store"),
    ))
}

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(5),
        multiplier: 1,
        max_attempts: 0,
    }
}

#[tokio::test]
async fn test_logout_shuts_down_and_drops_credentials() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = CredentialStore::new(dir.path());
    store.persist(&json!({"noiseKey": "abc"})).expect("persist");

    let connector =
        ScriptedConnector::new(vec![vec![open(), close(DisconnectReason::LoggedOut)]]);
    let supervisor = SessionSupervisor::new(&connector, store, fast_policy());

    supervisor.run(test_pipeline()).await.expect("clean shutdown");

    assert_eq!(connector.connects(), 1);
    // Logout invalidates the persisted blob
    assert!(!dir.path().join("creds.json").exists());
}

#[tokio::test]
async fn test_dropped_session_reconnects() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let connector = ScriptedConnector::new(vec![
        vec![open(), close(DisconnectReason::ConnectionLost)],
        vec![open(), close(DisconnectReason::LoggedOut)],
    ]);
    let supervisor =
        SessionSupervisor::new(&connector, CredentialStore::new(dir.path()), fast_policy());

    supervisor.run(test_pipeline()).await.expect("clean shutdown");

    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_updated_credentials_reach_the_next_connect() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let updated = json!({"noiseKey": "rotated", "registered": true});
    let connector = ScriptedConnector::new(vec![
        vec![
            ChannelEvent::CredentialsUpdate {
                creds: updated.clone(),
            },
            close(DisconnectReason::ConnectionLost),
        ],
        vec![close(DisconnectReason::LoggedOut)],
    ]);
    let supervisor =
        SessionSupervisor::new(&connector, CredentialStore::new(dir.path()), fast_policy());

    supervisor.run(test_pipeline()).await.expect("clean shutdown");

    let seen = connector.seen_creds();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], json!({}));
    assert_eq!(seen[1], updated);
}

#[tokio::test]
async fn test_reconnect_attempts_exhaust() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    // No scripts: every connect attempt fails
    let connector = ScriptedConnector::new(vec![]);
    let policy = ReconnectPolicy {
        max_attempts: 2,
        ..fast_policy()
    };
    let supervisor =
        SessionSupervisor::new(&connector, CredentialStore::new(dir.path()), policy);

    let err = supervisor
        .run(test_pipeline())
        .await
        .expect_err("should give up");
    assert!(err.to_string().contains("exhausted"));
    assert_eq!(connector.connects(), 3);
}
