//! Events emitted by the session engine.
//!
//! Events arrive on the bounded receiver returned by
//! `SpotifySession::start`. When the consumer falls behind, events are
//! dropped (with a warning logged) rather than blocking the engine; the
//! final [`Closed`](SessionEvent::Closed) event is always delivered.

use crate::model::PlaybackState;

/// Notifications from the background session engine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A status probe observed a usable vendor session. Emitted by the
    /// connection poller on success and by an explicit connection check.
    Connected,

    /// The proxy reported `connected: false` while the session was
    /// synchronizing. The synchronizer has stopped; a new login attempt is
    /// required to resume. This is a state transition, not an error.
    Disconnected,

    /// A login attempt polled for the full timeout window without the
    /// vendor session appearing. Connection status is left at its last
    /// value. Diagnosable abandonment, not a user-facing failure.
    ConnectTimedOut,

    /// A write reached the playback snapshot: a synchronizer fetch, a
    /// poller seed, or an acknowledged play/pause toggle.
    PlaybackChanged(PlaybackState),

    /// Fetching the vendor authorization URL failed. The authorization
    /// surface has been dismissed; connection polling continues until the
    /// timeout in case the user completes consent by other means.
    LoginFailed {
        /// Human-readable failure detail.
        reason: String,
    },

    /// The engine is exiting. Always the last event on the channel.
    Closed,
}
