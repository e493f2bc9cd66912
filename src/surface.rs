//! External authorization surface abstraction.
//!
//! The vendor's consent flow runs in a surface the crate does not control:
//! a browser tab, a webview, an embedded popup. The protocol only ever
//! opens the surface, hands it a URL, and optionally dismisses it — it
//! never observes whether the user closed it. The poll timeout in the
//! session engine is the safety net for an abandoned consent flow, so
//! implementations are free to be fire-and-forget.

use std::sync::Arc;

use crate::error::Result;

/// An opaque surface where the user completes the vendor consent flow.
///
/// [`open`](AuthorizationSurface::open) is called synchronously inside
/// `SpotifySession::initiate_login`, before any await point, so
/// implementations backed by popup-style surfaces can satisfy
/// gesture-bound opening rules. [`navigate`](AuthorizationSurface::navigate)
/// arrives later, once the authorization URL has been fetched.
///
/// Methods must not block for long; they run on the runtime's worker
/// threads.
pub trait AuthorizationSurface: Send + Sync + 'static {
    /// Open the surface, blank, ahead of knowing the authorization URL.
    ///
    /// Implementations with nothing to pre-open (a system browser) return
    /// `Ok(())` and defer all work to `navigate`.
    ///
    /// # Errors
    ///
    /// Returns an error when the surface cannot be created (e.g. a popup
    /// was blocked). The login flow continues regardless; the error is
    /// logged, not propagated.
    fn open(&self) -> Result<()>;

    /// Point the surface at the vendor authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the surface is gone or navigation fails. The
    /// caller treats this as non-fatal; polling proceeds either way.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Tear the surface down, if it is still up.
    ///
    /// Called when the login URL fetch fails. Best effort; implementations
    /// that cannot close their surface do nothing.
    fn dismiss(&self);
}

/// A shared handle is itself a surface, so a caller can keep one for
/// inspection while the session owns a clone.
impl<S: AuthorizationSurface + ?Sized> AuthorizationSurface for Arc<S> {
    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn navigate(&self, url: &str) -> Result<()> {
        (**self).navigate(url)
    }

    fn dismiss(&self) {
        (**self).dismiss();
    }
}

/// Default surface: the user's system browser.
///
/// A browser tab cannot be pre-opened blank or programmatically closed, so
/// [`open`](AuthorizationSurface::open) and
/// [`dismiss`](AuthorizationSurface::dismiss) are no-ops and all the work
/// happens in [`navigate`](AuthorizationSurface::navigate).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl AuthorizationSurface for SystemBrowser {
    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<()> {
        open::that(url)?;
        Ok(())
    }

    fn dismiss(&self) {}
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

    fn assert_surface<S: AuthorizationSurface>(_surface: &S) {}

    #[test]
    fn shared_handle_is_a_surface() {
        let shared = Arc::new(SystemBrowser);
        assert_surface(&shared);
        shared.open().unwrap();
        shared.dismiss();
    }

    #[test]
    fn dynamic_handle_is_a_surface() {
        let dynamic: Arc<dyn AuthorizationSurface> = Arc::new(SystemBrowser);
        assert_surface(&dynamic);
        dynamic.open().unwrap();
        dynamic.dismiss();
    }
}
