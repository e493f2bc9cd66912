//! # Spotify Session Client
//!
//! Async session client for a Spotify playback proxy: OAuth handshake,
//! connection polling, and playback state synchronization.
//!
//! This crate owns the connect-and-poll logic for a playback integration
//! that reaches the vendor through a thin backend proxy. It initiates the
//! consent flow in an external authorization surface, polls the proxy until
//! the vendor session appears, then keeps a local playback snapshot in sync
//! on a fixed period and dispatches transport commands with optimistic
//! updates.
//!
//! ## Features
//!
//! - **Proxy-agnostic** — implement the [`PlayerProxy`] trait for any backend
//! - **HTTP built-in** — default `proxy-http` feature provides [`HttpProxy`]
//!   with cookie-carried credentials
//! - **Event-driven** — receive typed [`SessionEvent`]s via a channel, or
//!   await [`ConnectionStatus`] transitions on a watch receiver
//! - **No dangling timers** — the engine owns every timer; teardown cancels
//!   them all and discards in-flight results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spotify_session_client::{
//!     HttpProxy, SessionConfig, SessionEvent, SpotifySession, SystemBrowser,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = HttpProxy::new("http://localhost:4000/api")?;
//!     let (mut session, mut events) =
//!         SpotifySession::start(proxy, SystemBrowser, SessionConfig::new());
//!
//!     session.initiate_login()?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Connected => println!("connected"),
//!             SessionEvent::PlaybackChanged(state) => {
//!                 if let Some(track) = &state.current_track {
//!                     println!("{} — {}", track.artist_line(), track.name);
//!                 }
//!             }
//!             SessionEvent::Closed => break,
//!             _ => {}
//!         }
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod model;
pub mod proxies;
pub mod proxy;
pub mod session;
mod store;
pub mod surface;

// Re-export primary types for ergonomic imports.
pub use error::SessionError;
pub use event::SessionEvent;
pub use model::{
    Album, ConnectionStatus, PlaybackState, PlayerSnapshot, Track, TransportCommand,
};
pub use proxy::PlayerProxy;
pub use session::{SessionConfig, SpotifySession};
pub use surface::{AuthorizationSurface, SystemBrowser};

#[cfg(feature = "proxy-http")]
pub use proxies::http::HttpProxy;
