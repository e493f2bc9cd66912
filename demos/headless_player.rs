//! # Headless Player Example
//!
//! Demonstrates a complete playback session lifecycle:
//!
//! 1. Probe the backend proxy for an existing Spotify session
//! 2. Start the login handshake when there is none (opens your browser)
//! 3. React to connection and playback events as they arrive
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the backend proxy on localhost:4000, then:
//! cargo run --example headless_player
//!
//! # Override the proxy URL:
//! SPOTIFY_PROXY_URL=http://my-host:4000/api cargo run --example headless_player
//! ```

use spotify_session_client::{
    ConnectionStatus, HttpProxy, SessionConfig, SessionEvent, SpotifySession, SystemBrowser,
};

/// Default proxy URL when `SPOTIFY_PROXY_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:4000/api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("SPOTIFY_PROXY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Using playback proxy at {url}");

    // ── Start ───────────────────────────────────────────────────────
    // The proxy holds the vendor credentials in its cookie-backed
    // session; this client never sees a token.
    let proxy = HttpProxy::new(&url)?;
    let config = SessionConfig::new();
    let (mut session, mut event_rx) = SpotifySession::start(proxy, SystemBrowser, config);

    // ── Probe, then log in if needed ────────────────────────────────
    // Connection truth lives on the backend; ask it instead of assuming.
    let mut status = session.subscribe_status();
    session.check_connection()?;
    status.changed().await?;

    match *status.borrow_and_update() {
        ConnectionStatus::Connected => {
            tracing::info!("Backend already holds a Spotify session");
        }
        _ => {
            tracing::info!("No Spotify session yet; opening the consent page…");
            session.initiate_login()?;
        }
    }

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            // Branch 1: Session events (connection and playback).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    SessionEvent::Connected => {
                        tracing::info!("Connected — playback state will follow");
                    }

                    SessionEvent::PlaybackChanged(state) => {
                        let marker = if state.is_playing { "playing" } else { "paused" };
                        match &state.current_track {
                            Some(track) => tracing::info!(
                                "{marker}: {} — {} ({} ms / {} ms)",
                                track.name,
                                track.artist_line(),
                                state.progress_ms,
                                track.duration_ms
                            ),
                            None => tracing::info!("{marker}: nothing loaded"),
                        }
                    }

                    SessionEvent::LoginFailed { reason } => {
                        // Recoverable: the poll is still running, and
                        // `initiate_login` can be called again.
                        tracing::error!("Login handshake failed: {reason}");
                    }

                    SessionEvent::ConnectTimedOut => {
                        tracing::error!("Gave up waiting for the Spotify session");
                        break;
                    }

                    SessionEvent::Disconnected => {
                        tracing::warn!("Spotify session ended on the backend");
                        break;
                    }

                    SessionEvent::Closed => break,
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    session.shutdown().await;
    tracing::info!("Session shut down. Goodbye!");
    Ok(())
}
