//! # Custom Proxy Example
//!
//! Shows how to implement the [`PlayerProxy`] trait with a small
//! in-process fake instead of a REST backend. This is useful for:
//!
//! - **Testing** — drive the session engine without a server or a vendor account
//! - **Custom backends** — adapt any credential-holding layer (gRPC, IPC, embedded)
//!
//! It also swaps the authorization surface for a silent one, so running
//! the example never opens a real browser.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_proxy
//! ```

use async_trait::async_trait;
use tokio::sync::Mutex;

use spotify_session_client::model::{ArtistPayload, TrackPayload};
use spotify_session_client::{
    AuthorizationSurface, PlayerProxy, PlayerSnapshot, SessionConfig, SessionError, SessionEvent,
    SpotifySession, TransportCommand,
};

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define an in-process "vendor player"
// ─────────────────────────────────────────────────────────────────────

/// Tracks our fake vendor rotates through.
const PLAYLIST: &[(&str, &str)] = &[
    ("Midnight Drive", "The Examples"),
    ("Borrowed Time", "Stub & The Mocks"),
    ("Loopback Blues", "In Process"),
];

/// The mutable state a real vendor would keep on its side.
struct FakePlayer {
    connected: bool,
    is_playing: bool,
    track_index: usize,
    progress_ms: u64,
}

/// A [`PlayerProxy`] backed by the fake player instead of REST calls.
///
/// The engine cannot tell the difference: snapshots, transport commands,
/// and the code exchange all behave like the HTTP implementation.
struct InProcessProxy {
    player: Mutex<FakePlayer>,
}

impl InProcessProxy {
    fn new() -> Self {
        Self {
            player: Mutex::new(FakePlayer {
                connected: false,
                is_playing: false,
                track_index: 0,
                progress_ms: 0,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the PlayerProxy trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl PlayerProxy for InProcessProxy {
    /// A real proxy builds this URL from its vendor app registration.
    async fn login_url(&self) -> Result<String, SessionError> {
        Ok("https://accounts.example.com/authorize?demo=1".to_string())
    }

    /// Answer like the REST endpoint: a `connected: false` body before
    /// login, a full snapshot after.
    async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
        let mut player = self.player.lock().await;
        if !player.connected {
            return Ok(Some(PlayerSnapshot {
                connected: Some(false),
                is_playing: false,
                item: None,
                progress_ms: None,
            }));
        }

        // Pretend playback advances between fetches.
        if player.is_playing {
            player.progress_ms += 1_000;
        }

        let (name, artist) = PLAYLIST
            .get(player.track_index % PLAYLIST.len())
            .copied()
            .unwrap_or(("Untitled", "Unknown"));
        Ok(Some(PlayerSnapshot {
            connected: None,
            is_playing: player.is_playing,
            item: Some(TrackPayload {
                id: Some(format!("demo-{}", player.track_index)),
                name: name.to_string(),
                artists: vec![ArtistPayload {
                    name: artist.to_string(),
                }],
                album: None,
                duration_ms: 180_000,
            }),
            progress_ms: Some(player.progress_ms),
        }))
    }

    async fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
        let mut player = self.player.lock().await;
        match command {
            TransportCommand::Play => player.is_playing = true,
            TransportCommand::Pause => player.is_playing = false,
            TransportCommand::Next => {
                player.track_index += 1;
                player.progress_ms = 0;
            }
            TransportCommand::Previous => {
                player.track_index = player.track_index.saturating_sub(1);
                player.progress_ms = 0;
            }
        }
        Ok(())
    }

    /// The "consent flow": any code establishes the vendor session.
    async fn exchange_code(&self, code: &str) -> Result<(), SessionError> {
        tracing::info!("Exchanging authorization code {code:?}");
        self.player.lock().await.connected = true;
        Ok(())
    }
}

/// A surface that logs instead of opening windows. Handy wherever a
/// browser popup would be wrong: tests, daemons, CI.
struct SilentSurface;

impl AuthorizationSurface for SilentSurface {
    fn open(&self) -> Result<(), SessionError> {
        tracing::info!("(surface) would open a consent popup here");
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<(), SessionError> {
        tracing::info!("(surface) would navigate to {url}");
        Ok(())
    }

    fn dismiss(&self) {
        tracing::info!("(surface) dismissed");
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire the session engine to the fake
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Tighten the poll period so the demo connects quickly.
    let config = SessionConfig::new()
        .with_connect_poll_interval(std::time::Duration::from_millis(200))
        .with_sync_interval(std::time::Duration::from_millis(500));

    let (mut session, mut event_rx) =
        SpotifySession::start(InProcessProxy::new(), SilentSurface, config);

    // Kick off the handshake, then complete the "consent flow" ourselves
    // by handing the proxy an authorization code.
    session.initiate_login()?;
    session.exchange_code("demo-code").await?;

    // ── Read events until playback has visibly moved ────────────────
    let mut playback_updates = 0;
    while let Some(event) = event_rx.recv().await {
        match &event {
            SessionEvent::Connected => {
                tracing::info!("Event: Connected");
                // Start playback through the same API a UI would use.
                let state = session.play_pause().await?;
                tracing::info!("Toggled playback, now playing: {}", state.is_playing);
                session.next_track()?;
            }
            SessionEvent::PlaybackChanged(state) => {
                match &state.current_track {
                    Some(track) => tracing::info!(
                        "Event: PlaybackChanged — {} by {} at {} ms",
                        track.name,
                        track.artist_line(),
                        state.progress_ms
                    ),
                    None => tracing::info!("Event: PlaybackChanged — nothing loaded"),
                }
                playback_updates += 1;
                if playback_updates >= 5 {
                    break;
                }
            }
            SessionEvent::Disconnected => {
                tracing::warn!("Event: Disconnected");
                break;
            }
            other => {
                tracing::info!("Event: {other:?}");
            }
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    session.shutdown().await;
    tracing::info!("Done — saw {playback_updates} playback update(s). Custom proxy works!");
    Ok(())
}
