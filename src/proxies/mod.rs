//! Proxy implementations for the playback session protocol.
//!
//! This module provides concrete [`PlayerProxy`](crate::PlayerProxy)
//! implementations behind feature gates. Enable the corresponding Cargo
//! feature to pull in a proxy:
//!
//! | Feature      | Proxy         |
//! |--------------|---------------|
//! | `proxy-http` | [`HttpProxy`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), spotify_session_client::SessionError> {
//! use spotify_session_client::{HttpProxy, PlayerProxy};
//!
//! let proxy = HttpProxy::new("http://localhost:4000/api")?;
//! let url = proxy.login_url().await?;
//! println!("authorize at: {url}");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "proxy-http")]
pub mod http;

#[cfg(feature = "proxy-http")]
pub use http::HttpProxy;
