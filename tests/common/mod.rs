#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for session client integration tests.
//!
//! Provides a scriptable [`MockProxy`], a [`RecordingSurface`], and event
//! drain helpers. Both mocks are built as `Arc`s; the library's forwarding
//! impls on `Arc<_>` let a test keep a handle for inspection after giving
//! the session its own clone.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use spotify_session_client::model::{ArtistPayload, TrackPayload};
use spotify_session_client::{
    AuthorizationSurface, PlayerProxy, PlayerSnapshot, SessionError, SessionEvent,
    TransportCommand,
};

// ── Snapshot builders ───────────────────────────────────────────────

/// Snapshot with a playing track.
pub fn playing_snapshot(name: &str, progress_ms: u64) -> PlayerSnapshot {
    PlayerSnapshot {
        connected: None,
        is_playing: true,
        item: Some(TrackPayload {
            id: Some("track-1".into()),
            name: name.into(),
            artists: vec![ArtistPayload {
                name: "Test Artist".into(),
            }],
            album: None,
            duration_ms: 200_000,
        }),
        progress_ms: Some(progress_ms),
    }
}

/// Snapshot with a paused track.
pub fn paused_snapshot(name: &str, progress_ms: u64) -> PlayerSnapshot {
    let mut snapshot = playing_snapshot(name, progress_ms);
    snapshot.is_playing = false;
    snapshot
}

/// Explicit `{ "connected": false }` body.
pub fn disconnected_snapshot() -> PlayerSnapshot {
    PlayerSnapshot {
        connected: Some(false),
        is_playing: false,
        item: None,
        progress_ms: None,
    }
}

// ── MockProxy ───────────────────────────────────────────────────────

/// One scripted answer for [`PlayerProxy::player_snapshot`].
#[derive(Debug, Clone)]
pub enum SnapshotScript {
    /// Empty proxy body — connected but idle.
    Idle,
    /// Explicit `{ "connected": false }` body.
    NotConnected,
    /// Full snapshot body.
    Snapshot(PlayerSnapshot),
    /// Transient probe failure.
    Fail,
}

impl SnapshotScript {
    fn materialize(self) -> Result<Option<PlayerSnapshot>, SessionError> {
        match self {
            Self::Idle => Ok(None),
            Self::NotConnected => Ok(Some(disconnected_snapshot())),
            Self::Snapshot(snapshot) => Ok(Some(snapshot)),
            Self::Fail => Err(SessionError::Request("mock probe failure".into())),
        }
    }
}

/// A scriptable mock proxy.
///
/// Snapshot probes consume scripted answers in order; once the script is
/// drained every further probe answers with the fallback (default:
/// [`SnapshotScript::NotConnected`], which keeps a login poll polling).
/// All transport commands and exchanged codes are recorded.
pub struct MockProxy {
    /// Scripted snapshot answers (consumed in order).
    script: StdMutex<VecDeque<SnapshotScript>>,
    /// Answer used once the script is drained.
    fallback: StdMutex<SnapshotScript>,
    /// Number of snapshot probes issued.
    snapshot_calls: AtomicUsize,
    /// Number of login URL fetches issued.
    login_calls: AtomicUsize,
    /// When set, `login_url` fails.
    fail_login: AtomicBool,
    /// When set, `transport` answers `CommandRejected`.
    reject_transport: AtomicBool,
    /// When set, `exchange_code` answers `CommandRejected`.
    reject_exchange: AtomicBool,
    /// Recorded transport commands.
    commands: StdMutex<Vec<TransportCommand>>,
    /// Recorded authorization codes.
    codes: StdMutex<Vec<String>>,
}

impl MockProxy {
    /// Authorization URL handed out by `login_url`.
    pub const LOGIN_URL: &'static str = "https://accounts.example.com/authorize?client_id=test";

    pub fn new(script: Vec<SnapshotScript>) -> Arc<Self> {
        Arc::new(Self {
            script: StdMutex::new(VecDeque::from(script)),
            fallback: StdMutex::new(SnapshotScript::NotConnected),
            snapshot_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            fail_login: AtomicBool::new(false),
            reject_transport: AtomicBool::new(false),
            reject_exchange: AtomicBool::new(false),
            commands: StdMutex::new(Vec::new()),
            codes: StdMutex::new(Vec::new()),
        })
    }

    /// Append an answer to the snapshot script mid-test.
    pub fn push_snapshot(&self, entry: SnapshotScript) {
        self.script.lock().unwrap().push_back(entry);
    }

    /// Replace the drained-script fallback answer.
    pub fn set_fallback(&self, entry: SnapshotScript) {
        *self.fallback.lock().unwrap() = entry;
    }

    pub fn fail_login(&self) {
        self.fail_login.store(true, Ordering::Relaxed);
    }

    pub fn reject_transport(&self) {
        self.reject_transport.store(true, Ordering::Relaxed);
    }

    pub fn reject_exchange(&self) {
        self.reject_exchange.store(true, Ordering::Relaxed);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshot_calls.load(Ordering::Relaxed)
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::Relaxed)
    }

    pub fn recorded_commands(&self) -> Vec<TransportCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn recorded_codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerProxy for MockProxy {
    async fn login_url(&self) -> Result<String, SessionError> {
        self.login_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_login.load(Ordering::Relaxed) {
            return Err(SessionError::Request("mock login outage".into()));
        }
        Ok(Self::LOGIN_URL.to_string())
    }

    async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
        self.snapshot_calls.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        entry.materialize()
    }

    async fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
        self.commands.lock().unwrap().push(command);
        if self.reject_transport.load(Ordering::Relaxed) {
            return Err(SessionError::CommandRejected("No active device".into()));
        }
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<(), SessionError> {
        self.codes.lock().unwrap().push(code.to_string());
        if self.reject_exchange.load(Ordering::Relaxed) {
            return Err(SessionError::CommandRejected("invalid code".into()));
        }
        Ok(())
    }
}

// ── RecordingSurface ────────────────────────────────────────────────

/// An authorization surface that records every interaction.
pub struct RecordingSurface {
    opened: AtomicUsize,
    dismissed: AtomicUsize,
    /// When set, `open` fails (popup-blocked analogue).
    fail_open: AtomicBool,
    navigated: StdMutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: AtomicUsize::new(0),
            dismissed: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            navigated: StdMutex::new(Vec::new()),
        })
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::Relaxed);
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn dismiss_count(&self) -> usize {
        self.dismissed.load(Ordering::Relaxed)
    }

    pub fn navigated_urls(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }
}

impl AuthorizationSurface for RecordingSurface {
    fn open(&self) -> Result<(), SessionError> {
        self.opened.fetch_add(1, Ordering::Relaxed);
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(SessionError::Request("surface blocked".into()));
        }
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.navigated.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn dismiss(&self) {
        self.dismissed.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Event helpers ───────────────────────────────────────────────────

/// Receive the next event, letting pending tasks run. Panics after a
/// short grace period so a missing event fails the test instead of
/// hanging it.
pub async fn next_event(events: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_millis(50), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Assert that no event is currently queued or imminently produced.
pub async fn expect_no_event(events: &mut mpsc::Receiver<SessionEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(10), events.recv()).await;
    assert!(
        outcome.is_err(),
        "expected no event, got {:?}",
        outcome.unwrap()
    );
}
