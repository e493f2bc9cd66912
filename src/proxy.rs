//! Backend-proxy abstraction for the playback session protocol.
//!
//! The [`PlayerProxy`] trait covers the five proxy operations the session
//! engine needs: fetching an authorization URL, probing the player state,
//! issuing transport commands, and exchanging an authorization code. The
//! bundled [`HttpProxy`](crate::proxies::http::HttpProxy) speaks the REST
//! shape of the FocusMaster backend; embedders with a different proxy (or a
//! test harness) implement this trait instead.
//!
//! # Credentials
//!
//! Credential handling is intentionally NOT part of this trait — the
//! reference proxy identifies the user by session cookie, others may use
//! headers or mTLS. Construct an authenticated proxy externally, then pass
//! it to `SpotifySession::start`.
//!
//! # Implementing a Custom Proxy
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use spotify_session_client::error::SessionError;
//! use spotify_session_client::model::{PlayerSnapshot, TransportCommand};
//! use spotify_session_client::proxy::PlayerProxy;
//!
//! struct MyProxy { /* ... */ }
//!
//! #[async_trait]
//! impl PlayerProxy for MyProxy {
//!     async fn login_url(&self) -> Result<String, SessionError> {
//!         // Ask your backend for the vendor authorization URL
//!         todo!()
//!     }
//!
//!     async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
//!         // Probe the player; None means connected but idle
//!         todo!()
//!     }
//!
//!     async fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
//!         // Issue play/pause/next/previous
//!         todo!()
//!     }
//!
//!     async fn exchange_code(&self, code: &str) -> Result<(), SessionError> {
//!         // Forward the authorization code to your backend
//!         todo!()
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::model::{PlayerSnapshot, TransportCommand};

/// Access to the backend proxy that fronts the vendor's playback API.
///
/// Methods take `&self` because one proxy instance is shared between the
/// engine task and detached command sends. Implementations must be
/// internally synchronized (HTTP clients already are).
///
/// # Object Safety
///
/// This trait is object-safe, so `Arc<dyn PlayerProxy>` works for dynamic
/// dispatch. `SpotifySession::start` accepts `impl PlayerProxy`
/// (monomorphized) for the common case.
#[async_trait]
pub trait PlayerProxy: Send + Sync + 'static {
    /// Fetch the vendor authorization URL for a new login attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Request`] or [`SessionError::Status`] when
    /// the proxy or the vendor behind it is unreachable. The caller surfaces
    /// this as a recoverable login failure.
    async fn login_url(&self) -> Result<String, SessionError>;

    /// Probe the player for connection state and a playback snapshot.
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` — the proxy answered with a body; check
    ///   [`PlayerSnapshot::is_disconnected`] before reading playback fields
    /// - `Ok(None)` — the proxy answered with an empty body: the session is
    ///   connected but no device is active ("connected but idle")
    /// - `Err(e)` — the probe itself failed; callers on a poll timer treat
    ///   this as transient and retry on the next tick
    async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError>;

    /// Issue a playback transport command.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CommandRejected`] when the proxy reaches the
    /// vendor but the command is refused (no active device, no premium
    /// entitlement), or a request/status error when the proxy is
    /// unreachable.
    async fn transport(&self, command: TransportCommand) -> Result<(), SessionError>;

    /// Exchange an authorization code for a backend-held vendor session.
    ///
    /// # Errors
    ///
    /// Returns an error when the code is missing, expired, or already used.
    /// The session itself is unaffected; connection truth is re-derived by
    /// the poller or a fresh status probe.
    async fn exchange_code(&self, code: &str) -> Result<(), SessionError>;
}

/// A shared handle is itself a proxy.
///
/// Hand `SpotifySession::start` a clone of an `Arc`'d implementation and
/// keep the original for direct calls. Also makes `Arc<dyn PlayerProxy>`
/// usable wherever `impl PlayerProxy` is expected.
#[async_trait]
impl<P: PlayerProxy + ?Sized> PlayerProxy for Arc<P> {
    async fn login_url(&self) -> Result<String, SessionError> {
        (**self).login_url().await
    }

    async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
        (**self).player_snapshot().await
    }

    async fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
        (**self).transport(command).await
    }

    async fn exchange_code(&self, code: &str) -> Result<(), SessionError> {
        (**self).exchange_code(code).await
    }
}

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

    struct CannedProxy;

    #[async_trait]
    impl PlayerProxy for CannedProxy {
        async fn login_url(&self) -> Result<String, SessionError> {
            Ok("https://accounts.example.com/authorize".into())
        }

        async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
            Ok(None)
        }

        async fn transport(&self, _command: TransportCommand) -> Result<(), SessionError> {
            Ok(())
        }

        async fn exchange_code(&self, _code: &str) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn assert_proxy<P: PlayerProxy>(_proxy: &P) {}

    #[tokio::test]
    async fn shared_handle_forwards_to_inner_proxy() {
        let shared = Arc::new(CannedProxy);
        assert_proxy(&shared);

        let url = shared.login_url().await.unwrap();
        assert_eq!(url, "https://accounts.example.com/authorize");
        assert!(shared.player_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dynamic_handle_is_a_proxy() {
        let dynamic: Arc<dyn PlayerProxy> = Arc::new(CannedProxy);
        assert_proxy(&dynamic);
        dynamic.exchange_code("auth-code").await.unwrap();
    }
}
