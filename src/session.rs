//! Async session controller for the playback proxy.
//!
//! [`SpotifySession`] is a thin handle over a background engine task that
//! owns every timer in the protocol: the connection poll that follows a
//! login attempt and the playback synchronizer that runs while connected.
//! Events are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<SessionEvent>`]) returned from
//! [`SpotifySession::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let proxy = HttpProxy::new("http://localhost:4000/api")?;
//! let config = SessionConfig::new();
//! let (mut session, mut events) = SpotifySession::start(proxy, SystemBrowser, config);
//!
//! session.initiate_login()?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Connected => { /* … */ }
//!         SessionEvent::PlaybackChanged(state) => { /* … */ }
//!         SessionEvent::Closed => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::event::SessionEvent;
use crate::model::{ConnectionStatus, PlaybackState, PlayerSnapshot, TransportCommand};
use crate::proxy::PlayerProxy;
use crate::store::{ApplyOutcome, SessionStore};
use crate::surface::AuthorizationSurface;

/// Default period between connection poll probes.
const DEFAULT_CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default hard timeout for a login attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default period between playback snapshot fetches while connected.
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Smallest accepted timer period; the tokio interval constructors panic
/// on zero.
const MIN_TIMER_INTERVAL: Duration = Duration::from_millis(1);

/// Largest accepted timer duration; deadline arithmetic
/// (`Instant + Duration`) overflows for unbounded periods.
const MAX_TIMER_DURATION: Duration = Duration::from_secs(60 * 60 * 24 * 30);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`SpotifySession`].
///
/// Every field has a sensible default; construct with [`SessionConfig::new`]
/// and override selectively.
///
/// # Example
///
/// ```
/// use spotify_session_client::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new()
///     .with_sync_interval(Duration::from_secs(10))
///     .with_event_channel_capacity(512);
/// assert_eq!(config.sync_interval, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period between connection poll probes after `initiate_login`.
    ///
    /// Defaults to **2 seconds**. Clamped between 1 ms and 30 days.
    pub connect_poll_interval: Duration,
    /// Hard timeout for a login attempt. When it elapses the poll timer is
    /// dropped and a `ConnectTimedOut` event is emitted.
    ///
    /// Defaults to **5 minutes**. Capped at 30 days.
    pub connect_timeout: Duration,
    /// Period between playback snapshot fetches while connected.
    ///
    /// Defaults to **5 seconds**. Clamped between 1 ms and 30 days.
    pub sync_interval: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) to avoid blocking the engine. The final `Closed` event is
    /// always delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`SpotifySession::shutdown`] is called, the engine is given
    /// this much time to exit and emit the final `Closed` event. If the
    /// timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the engine
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            connect_poll_interval: DEFAULT_CONNECT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the period between connection poll probes.
    ///
    /// Defaults to **2 seconds**. Clamped between 1 ms and 30 days.
    #[must_use]
    pub fn with_connect_poll_interval(mut self, interval: Duration) -> Self {
        self.connect_poll_interval = interval.clamp(MIN_TIMER_INTERVAL, MAX_TIMER_DURATION);
        self
    }

    /// Set the hard timeout for a login attempt.
    ///
    /// Defaults to **5 minutes**. Capped at 30 days.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.min(MAX_TIMER_DURATION);
        self
    }

    /// Set the period between playback snapshot fetches.
    ///
    /// Defaults to **5 seconds**. Clamped between 1 ms and 30 days.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval.clamp(MIN_TIMER_INTERVAL, MAX_TIMER_DURATION);
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the engine
    /// immediately without waiting for graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Engine commands ─────────────────────────────────────────────────

/// Commands queued from the handle to the engine task.
#[derive(Debug)]
enum ControlCommand {
    /// Start (or restart) a login attempt: fetch the authorization URL and
    /// arm the connection poll timer.
    InitiateLogin,
    /// Probe the proxy once and derive connection status from the answer.
    CheckConnection,
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to a running playback session.
///
/// Created via [`SpotifySession::start`], which spawns the background
/// engine and returns this handle together with an event receiver.
///
/// Timer-driven work (polling, synchronization) happens on the engine
/// task. Commands that must report an error to the caller
/// ([`play_pause`](Self::play_pause), [`exchange_code`](Self::exchange_code))
/// run on the caller's task against the shared store.
pub struct SpotifySession {
    /// Sender half of the command channel to the engine.
    cmd_tx: mpsc::UnboundedSender<ControlCommand>,
    /// Shared state, written by the engine and by acknowledged commands.
    store: Arc<SessionStore>,
    proxy: Arc<dyn PlayerProxy>,
    surface: Arc<dyn AuthorizationSurface>,
    /// Event sender used for acknowledged play/pause toggles.
    event_tx: mpsc::Sender<SessionEvent>,
    /// Handle to the background engine task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the engine to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl SpotifySession {
    /// Start the session engine and return a handle plus event receiver.
    ///
    /// # Arguments
    ///
    /// * `proxy` — Access to the backend proxy (see
    ///   [`HttpProxy`](crate::proxies::http::HttpProxy) for the bundled
    ///   REST implementation).
    /// * `surface` — Where the user completes the consent flow
    ///   ([`SystemBrowser`](crate::surface::SystemBrowser) by default).
    /// * `config` — Timer periods and channel sizing.
    ///
    /// # Returns
    ///
    /// A tuple of `(session_handle, event_receiver)`. The receiver yields
    /// [`SessionEvent`]s, ending with [`SessionEvent::Closed`] when the
    /// engine exits; it yields `None` once the handle is also dropped.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        proxy: impl PlayerProxy,
        surface: impl AuthorizationSurface,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControlCommand>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let store = SessionStore::new();
        let proxy: Arc<dyn PlayerProxy> = Arc::new(proxy);
        let surface: Arc<dyn AuthorizationSurface> = Arc::new(surface);

        let engine = Engine {
            proxy: Arc::clone(&proxy),
            surface: Arc::clone(&surface),
            store: Arc::clone(&store),
            event_tx: event_tx.clone(),
            // Config fields are public, so clamp here too: a zero period
            // panics the tokio interval constructors and an unbounded one
            // overflows the deadline arithmetic.
            connect_poll_interval: config
                .connect_poll_interval
                .clamp(MIN_TIMER_INTERVAL, MAX_TIMER_DURATION),
            connect_timeout: config.connect_timeout.min(MAX_TIMER_DURATION),
            sync_interval: config.sync_interval.clamp(MIN_TIMER_INTERVAL, MAX_TIMER_DURATION),
            login: None,
            sync: None,
        };
        let task = tokio::spawn(engine.run(cmd_rx, shutdown_rx));

        let session = Self {
            cmd_tx,
            store,
            proxy,
            surface,
            event_tx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (session, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Start (or restart) the login handshake.
    ///
    /// The authorization surface is opened here, synchronously, before any
    /// await point, so gesture-bound surfaces (popups) can satisfy their
    /// opening rules. A surface that fails to open is logged and the flow
    /// continues — the surface is a convenience, polling is the protocol.
    ///
    /// The engine then fetches the authorization URL in the background,
    /// navigates the surface to it, and polls the proxy until the vendor
    /// session appears or the configured timeout elapses. A second call
    /// while an attempt is live supersedes it: the prior poll timer is
    /// cancelled before the new one is armed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has been shut down.
    pub fn initiate_login(&self) -> Result<()> {
        if self.store.is_closed() {
            return Err(SessionError::Closed);
        }
        if let Err(e) = self.surface.open() {
            warn!("authorization surface failed to open: {e}");
        }
        self.send(ControlCommand::InitiateLogin)
    }

    /// Probe the proxy once and derive connection status from the answer.
    ///
    /// Intended for mount time: connection truth is never persisted, it is
    /// re-derived from the backend. A successful probe transitions to
    /// connected and starts the synchronizer exactly like a successful
    /// login poll; a failed or negative probe sets
    /// [`ConnectionStatus::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has been shut down.
    pub fn check_connection(&self) -> Result<()> {
        self.send(ControlCommand::CheckConnection)
    }

    /// Toggle playback based on the locally cached `is_playing` flag.
    ///
    /// Issues `play` when the cache says paused, `pause` when it says
    /// playing. Only an acknowledged command flips the local flag; the flip
    /// is sequence-gated so a fresher snapshot that landed while the
    /// command was in flight is not clobbered. The next synchronizer tick
    /// re-establishes the remote truth either way.
    ///
    /// Returns the playback state after the toggle was applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CommandRejected`] when the vendor refuses
    /// the command (no active device, no premium entitlement), a
    /// request/status error when the proxy is unreachable, or
    /// [`SessionError::Closed`] after shutdown. The cached flag is
    /// unchanged on every error path.
    pub async fn play_pause(&self) -> Result<PlaybackState> {
        if self.store.is_closed() {
            return Err(SessionError::Closed);
        }
        let was_playing = self.store.is_playing().await;
        let command = if was_playing {
            TransportCommand::Pause
        } else {
            TransportCommand::Play
        };
        // Reserve the sequence number at issue time: a snapshot fetch
        // issued after this command outranks the optimistic flip.
        let seq = self.store.next_seq();

        self.proxy.transport(command).await?;

        match self.store.apply_optimistic(seq, !was_playing).await {
            ApplyOutcome::Applied(state) => {
                emit_event(&self.event_tx, SessionEvent::PlaybackChanged(state.clone())).await;
                Ok(state)
            }
            // A fresher fetch landed while the command was in flight; its
            // state is the authoritative answer.
            _ => Ok(self.store.playback_state().await),
        }
    }

    /// Skip to the next track. Fire-and-forget.
    ///
    /// The command is spawned and its result ignored (failures are logged
    /// at debug level). The following synchronizer tick is the sole
    /// mechanism that reflects the track change, so the cached state can
    /// lag by up to one sync period. Rapid calls issue one command each,
    /// concurrently, with no debouncing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has been shut down.
    pub fn next_track(&self) -> Result<()> {
        self.skip(TransportCommand::Next)
    }

    /// Skip to the previous track. Fire-and-forget, like
    /// [`next_track`](Self::next_track).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has been shut down.
    pub fn previous_track(&self) -> Result<()> {
        self.skip(TransportCommand::Previous)
    }

    /// Exchange an authorization code for a backend-held vendor session.
    ///
    /// Forwards the code from the consent redirect to the proxy. On
    /// success the backend holds the session; observe it with
    /// [`check_connection`](Self::check_connection) or let a live login
    /// poll pick it up.
    ///
    /// # Errors
    ///
    /// Returns the proxy's rejection when the code is missing, expired, or
    /// already used, or [`SessionError::Closed`] after shutdown.
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        if self.store.is_closed() {
            return Err(SessionError::Closed);
        }
        self.proxy.exchange_code(code).await
    }

    /// Shut down the session, stopping all timers and the engine task.
    ///
    /// The store is closed first, so any in-flight fetch that resolves
    /// during teardown is discarded. The event receiver then yields the
    /// final [`SessionEvent::Closed`].
    pub async fn shutdown(&mut self) {
        debug!("SpotifySession: shutdown requested");

        // Close the store before signalling: from here on, late results
        // are discarded no matter how the engine winds down.
        self.store.close();

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the engine with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session engine terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session engine did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session engine aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Connection status as last observed.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.store.status()
    }

    /// Returns `true` if the proxy reported a usable vendor session at the
    /// last probe.
    pub fn is_connected(&self) -> bool {
        self.store.status() == ConnectionStatus::Connected
    }

    /// Watch receiver for connection status transitions.
    ///
    /// Lets embedders await status changes instead of polling accessors.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.store.subscribe()
    }

    /// The locally cached playback snapshot.
    pub async fn playback_state(&self) -> PlaybackState {
        self.store.playback_state().await
    }

    /// The locally cached `is_playing` flag.
    pub async fn is_playing(&self) -> bool {
        self.store.is_playing().await
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a command to the engine.
    fn send(&self, command: ControlCommand) -> Result<()> {
        if self.store.is_closed() {
            return Err(SessionError::Closed);
        }
        self.cmd_tx
            .send(command)
            .map_err(|_| SessionError::Closed)
    }

    /// Spawn a detached fire-and-forget skip command.
    fn skip(&self, command: TransportCommand) -> Result<()> {
        if self.store.is_closed() {
            return Err(SessionError::Closed);
        }
        let proxy = Arc::clone(&self.proxy);
        tokio::spawn(async move {
            if let Err(e) = proxy.transport(command).await {
                debug!(%command, "skip command failed: {e}");
            }
        });
        Ok(())
    }
}

impl std::fmt::Debug for SpotifySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifySession")
            .field("status", &self.store.status())
            .field("closed", &self.store.is_closed())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for SpotifySession {
    fn drop(&mut self) {
        // `Drop` is synchronous so the graceful path cannot run here.
        // Close the store so late fetch results become no-ops, then abort
        // the engine task, which takes its timers down with it. The
        // `shutdown_tx` oneshot is intentionally *not* sent: there is no
        // executor context to drive the graceful path inside `Drop`.
        self.store.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// A live login attempt: poll timer plus hard deadline.
struct LoginAttempt {
    /// Poll timer; first tick one full period after initiation.
    poll: Interval,
    /// Instant after which the attempt is abandoned.
    deadline: Instant,
}

/// Background engine owning all timers and timer-driven store writes.
///
/// Exits when:
/// - The shutdown oneshot fires (graceful `shutdown()`)
/// - The command channel closes (handle dropped)
struct Engine {
    proxy: Arc<dyn PlayerProxy>,
    surface: Arc<dyn AuthorizationSurface>,
    store: Arc<SessionStore>,
    event_tx: mpsc::Sender<SessionEvent>,
    connect_poll_interval: Duration,
    connect_timeout: Duration,
    sync_interval: Duration,
    /// Live login attempt, if any. At most one per session.
    login: Option<LoginAttempt>,
    /// Synchronizer timer, armed while connected.
    sync: Option<Interval>,
}

impl Engine {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<ControlCommand>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!("session engine started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ControlCommand::InitiateLogin) => self.begin_login(),
                        Some(ControlCommand::CheckConnection) => self.probe_connection().await,
                        // Command channel closed — handle dropped.
                        None => {
                            debug!("command channel closed, stopping session engine");
                            break;
                        }
                    }
                }

                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    break;
                }

                _ = poll_tick(&mut self.login) => {
                    self.poll_once().await;
                }

                _ = sync_tick(&mut self.sync) => {
                    self.sync_once().await;
                }
            }
        }

        // Drop both timers before the final event so nothing can fire
        // between `Closed` and task exit.
        self.login = None;
        self.sync = None;
        emit_closed(&self.event_tx).await;
        debug!("session engine exited");
    }

    /// Start a login attempt: spawn the authorization URL fetch and arm
    /// the connection poll timer.
    fn begin_login(&mut self) {
        // A fresh attempt supersedes a live one; its timer stops here so
        // two poll timers never run for the same session.
        if self.login.take().is_some() {
            debug!("superseding previous login attempt");
        }
        // The synchronizer stops too. Poll and sync timers are mutually
        // exclusive; the poll re-derives connection state from scratch.
        self.sync = None;

        let started = Instant::now();
        let mut poll = interval_at(
            started + self.connect_poll_interval,
            self.connect_poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.login = Some(LoginAttempt {
            poll,
            deadline: started + self.connect_timeout,
        });

        // Fetch the URL off the engine task so a slow backend cannot
        // stall polling.
        let proxy = Arc::clone(&self.proxy);
        let surface = Arc::clone(&self.surface);
        let store = Arc::clone(&self.store);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            match proxy.login_url().await {
                Ok(url) => {
                    if store.is_closed() {
                        return;
                    }
                    if let Err(e) = surface.navigate(&url) {
                        // The surface is a convenience; polling remains
                        // the source of connection truth.
                        debug!("authorization surface navigation failed: {e}");
                    }
                }
                Err(e) => {
                    warn!("login URL fetch failed: {e}");
                    surface.dismiss();
                    if store.is_closed() {
                        return;
                    }
                    emit_event(
                        &event_tx,
                        SessionEvent::LoginFailed {
                            reason: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        });
    }

    /// One connection poll tick: enforce the deadline, then probe.
    async fn poll_once(&mut self) {
        let Some(attempt) = self.login.as_ref() else {
            return;
        };
        // The deadline is checked at tick time so a timer that fired late
        // still abandons the attempt.
        if Instant::now() >= attempt.deadline {
            self.login = None;
            warn!("login attempt abandoned: connect timeout elapsed");
            emit_event(&self.event_tx, SessionEvent::ConnectTimedOut).await;
            return;
        }

        let seq = self.store.next_seq();
        match self.proxy.player_snapshot().await {
            Ok(snapshot) => {
                if snapshot.as_ref().is_some_and(PlayerSnapshot::is_disconnected) {
                    // Not connected yet; keep polling.
                    return;
                }
                self.connect(seq, snapshot).await;
            }
            Err(e) => {
                // Transient; the next tick retries.
                debug!("connection poll failed: {e}");
            }
        }
    }

    /// One-shot probe for `check_connection`.
    async fn probe_connection(&mut self) {
        let seq = self.store.next_seq();
        match self.proxy.player_snapshot().await {
            Ok(snapshot) => {
                if snapshot.as_ref().is_some_and(PlayerSnapshot::is_disconnected) {
                    self.disconnect().await;
                    return;
                }
                self.connect(seq, snapshot).await;
            }
            Err(e) => {
                debug!("connection check failed: {e}");
                self.disconnect().await;
            }
        }
    }

    /// Transition to disconnected: stop the synchronizer and publish the
    /// status. `Disconnected` is emitted only when the session was
    /// connected, so a probe that merely confirms the status quo stays
    /// silent.
    async fn disconnect(&mut self) {
        self.sync = None;
        let previous = self.store.set_status(ConnectionStatus::Disconnected);
        if previous == ConnectionStatus::Connected {
            emit_event(&self.event_tx, SessionEvent::Disconnected).await;
        }
    }

    /// Transition to connected: stop polling, seed the snapshot when the
    /// probe carried a track, and arm the synchronizer.
    async fn connect(&mut self, seq: u64, snapshot: Option<PlayerSnapshot>) {
        // Success ends any live login attempt.
        self.login = None;

        let previous = self.store.set_status(ConnectionStatus::Connected);
        if previous != ConnectionStatus::Connected {
            emit_event(&self.event_tx, SessionEvent::Connected).await;
        }

        if snapshot.as_ref().is_some_and(|s| s.item.is_some()) {
            if let ApplyOutcome::Applied(state) = self.store.apply_snapshot(seq, snapshot).await {
                emit_event(&self.event_tx, SessionEvent::PlaybackChanged(state)).await;
            }
        }

        // Immediate first fetch, then the fixed period.
        let mut sync = interval(self.sync_interval);
        sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.sync = Some(sync);
    }

    /// One synchronizer tick: fetch a snapshot and offer it to the store.
    async fn sync_once(&mut self) {
        let seq = self.store.next_seq();
        match self.proxy.player_snapshot().await {
            Ok(snapshot) => match self.store.apply_snapshot(seq, snapshot).await {
                ApplyOutcome::Applied(state) => {
                    emit_event(&self.event_tx, SessionEvent::PlaybackChanged(state)).await;
                }
                ApplyOutcome::Stale => {}
                ApplyOutcome::Disconnected => {
                    // Authoritative: stop synchronizing until a new login.
                    self.sync = None;
                    emit_event(&self.event_tx, SessionEvent::Disconnected).await;
                }
            },
            Err(e) => {
                // Transient; the next tick retries.
                debug!("playback sync failed: {e}");
            }
        }
    }
}

/// Tick helper for the optional poll timer. Pends forever while no login
/// attempt is live so its `select!` branch never fires.
async fn poll_tick(login: &mut Option<LoginAttempt>) -> Instant {
    match login {
        Some(attempt) => attempt.poll.tick().await,
        None => std::future::pending().await,
    }
}

/// Tick helper for the optional synchronizer timer.
async fn sync_tick(sync: &mut Option<Interval>) -> Instant {
    match sync {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

/// Emit an event to the event channel. If the channel is full, log a
/// warning and drop the event to avoid blocking the engine.
async fn emit_event(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final [`Closed`](SessionEvent::Closed) event.
///
/// Uses `send().await` (blocking) instead of `try_send` because `Closed`
/// is always the last event on the channel and must never be silently
/// dropped.
async fn emit_closed(event_tx: &mpsc::Sender<SessionEvent>) {
    if event_tx.send(SessionEvent::Closed).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Proxy that fails every call, for handle-level plumbing tests.
    struct UnreachableProxy;

    #[async_trait]
    impl PlayerProxy for UnreachableProxy {
        async fn login_url(&self) -> Result<String> {
            Err(SessionError::Request("unreachable".into()))
        }

        async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>> {
            Err(SessionError::Request("unreachable".into()))
        }

        async fn transport(&self, _command: TransportCommand) -> Result<()> {
            Err(SessionError::Request("unreachable".into()))
        }

        async fn exchange_code(&self, _code: &str) -> Result<()> {
            Err(SessionError::Request("unreachable".into()))
        }
    }

    /// Surface that does nothing.
    struct NullSurface;

    impl AuthorizationSurface for NullSurface {
        fn open(&self) -> Result<()> {
            Ok(())
        }

        fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn dismiss(&self) {}
    }

    // ── Config ──────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.connect_poll_interval, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(300));
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = SessionConfig::new()
            .with_connect_poll_interval(Duration::from_secs(1))
            .with_connect_timeout(Duration::from_secs(60))
            .with_sync_interval(Duration::from_secs(10))
            .with_event_channel_capacity(8)
            .with_shutdown_timeout(Duration::from_secs(3));
        assert_eq!(config.connect_poll_interval, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(60));
        assert_eq!(config.sync_interval, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 8);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn config_clamps_zero_values() {
        let config = SessionConfig::new()
            .with_connect_poll_interval(Duration::ZERO)
            .with_sync_interval(Duration::ZERO)
            .with_event_channel_capacity(0);
        assert_eq!(config.connect_poll_interval, Duration::from_millis(1));
        assert_eq!(config.sync_interval, Duration::from_millis(1));
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn config_clamps_oversized_durations() {
        let config = SessionConfig::new()
            .with_connect_poll_interval(Duration::MAX)
            .with_connect_timeout(Duration::MAX)
            .with_sync_interval(Duration::MAX);
        assert_eq!(config.connect_poll_interval, MAX_TIMER_DURATION);
        assert_eq!(config.connect_timeout, MAX_TIMER_DURATION);
        assert_eq!(config.sync_interval, MAX_TIMER_DURATION);
    }

    #[test]
    fn config_default_matches_new() {
        let a = SessionConfig::default();
        let b = SessionConfig::new();
        assert_eq!(a.connect_poll_interval, b.connect_poll_interval);
        assert_eq!(a.event_channel_capacity, b.event_channel_capacity);
    }

    // ── Handle plumbing ─────────────────────────────────────────────

    #[tokio::test]
    async fn initial_status_is_unknown() {
        let (session, _events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());
        assert_eq!(session.connection_status(), ConnectionStatus::Unknown);
        assert!(!session.is_connected());
        assert!(session.playback_state().await.current_track.is_none());
    }

    #[tokio::test]
    async fn shutdown_emits_closed_as_last_event() {
        let (mut session, mut events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());

        session.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::Closed));
    }

    #[tokio::test]
    async fn methods_after_shutdown_return_closed() {
        let (mut session, _events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());
        session.shutdown().await;

        assert!(matches!(
            session.initiate_login(),
            Err(SessionError::Closed)
        ));
        assert!(matches!(
            session.check_connection(),
            Err(SessionError::Closed)
        ));
        assert!(matches!(session.next_track(), Err(SessionError::Closed)));
        assert!(matches!(
            session.previous_track(),
            Err(SessionError::Closed)
        ));
        assert!(matches!(
            session.play_pause().await,
            Err(SessionError::Closed)
        ));
        assert!(matches!(
            session.exchange_code("abc").await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (mut session, _events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());
        session.shutdown().await;
        session.shutdown().await;
    }

    #[tokio::test]
    async fn play_pause_error_leaves_flag_unchanged() {
        let (session, _events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());

        let result = session.play_pause().await;

        assert!(result.is_err());
        assert!(!session.is_playing().await);
    }

    #[tokio::test]
    async fn debug_includes_status() {
        let (session, _events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());
        let rendered = format!("{session:?}");
        assert!(rendered.contains("SpotifySession"));
        assert!(rendered.contains("Unknown"));
    }

    #[tokio::test]
    async fn drop_aborts_engine() {
        let (session, mut events) =
            SpotifySession::start(UnreachableProxy, NullSurface, SessionConfig::new());
        drop(session);

        // Aborted engine never emits Closed; the channel just closes once
        // every sender is gone.
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn oversized_config_fields_do_not_panic_the_engine() {
        // The builder clamps, but the fields are public; the engine must
        // survive a config assembled by hand.
        let mut config = SessionConfig::new();
        config.connect_poll_interval = Duration::MAX;
        config.connect_timeout = Duration::MAX;
        config.sync_interval = Duration::MAX;

        let (mut session, mut events) =
            SpotifySession::start(UnreachableProxy, NullSurface, config);
        session.initiate_login().unwrap();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        session.shutdown().await;

        // An engine that panicked arming its timers never reaches the
        // final event.
        loop {
            match tokio::time::timeout(Duration::from_millis(500), events.recv())
                .await
                .expect("engine emitted no Closed event")
            {
                Some(SessionEvent::Closed) => break,
                Some(_) => {}
                None => panic!("event channel closed before Closed"),
            }
        }
    }
}
