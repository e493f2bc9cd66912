//! Domain and wire types for the playback session.
//!
//! The wire payload structs in this module deserialize the JSON shapes
//! produced by the backend proxy's `/spotify/*` endpoints. Key tolerances:
//!
//! - Missing or empty `images` arrays degrade to "no artwork", never an error
//! - `{ "connected": false }` bodies carry none of the snapshot fields
//! - An entirely empty body (no active device) is handled above this layer
//!   as "connected but idle" and never reaches the deserializer

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// ── Domain types ────────────────────────────────────────────────────

/// Connection state of the playback session as last observed.
///
/// Transitions move forward (`Unknown` → `Connected`) except when a status
/// probe fails or the proxy reports an authoritative disconnect, which
/// reverts to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No probe has completed yet.
    #[default]
    Unknown,
    /// The proxy reported no usable vendor session.
    Disconnected,
    /// The proxy holds a usable vendor session.
    Connected,
}

/// Locally cached snapshot of the externally-owned playback session.
///
/// `progress_ms` is clamped to the track duration on ingest; the raw wire
/// value is available in [`PlayerSnapshot`] for callers that need it.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    /// Whether playback was running at last observation.
    pub is_playing: bool,
    /// Last observed track. Retained across idle polls so a momentary
    /// empty response does not blank the display.
    pub current_track: Option<Track>,
    /// Playback position in milliseconds at last observation.
    pub progress_ms: u64,
    /// When this snapshot was applied, on the tokio clock.
    pub observed_at: Option<Instant>,
}

/// Immutable track metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Vendor track identifier, when the vendor supplies one.
    pub id: Option<String>,
    pub name: String,
    /// Artist names in the vendor's billing order.
    pub artists: Vec<String>,
    pub album: Option<Album>,
    pub duration_ms: u64,
}

impl Track {
    /// All artist names joined with `", "`, in billing order.
    #[must_use]
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// URL of the highest-resolution album art, if any.
    ///
    /// The vendor orders album images by descending resolution, so the
    /// first entry is the largest.
    #[must_use]
    pub fn artwork_url(&self) -> Option<&str> {
        self.album
            .as_ref()
            .and_then(|album| album.art.first())
            .map(String::as_str)
    }
}

/// Album metadata attached to a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub name: String,
    /// Artwork URLs ordered by descending resolution.
    pub art: Vec<String>,
}

/// Playback transport commands accepted by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    /// Skip to the next track. Fire-and-forget; the outcome is observed
    /// by the next synchronizer tick, not by the command response.
    Next,
    /// Skip to the previous track. Fire-and-forget, like [`Next`](Self::Next).
    Previous,
}

impl TransportCommand {
    /// Stable lowercase name, matching the proxy's path segments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::Previous => "prev",
        }
    }
}

impl std::fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Wire payloads ───────────────────────────────────────────────────

/// Body of `GET spotify/player`.
///
/// Three shapes share this struct: an explicit `{ "connected": false }`
/// rejection, a full playback snapshot, and (rare) a snapshot without a
/// track. An empty body never reaches deserialization; the proxy layer
/// maps it to `None` before parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Present and `false` only when the proxy holds no vendor session.
    /// Absence means connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default)]
    pub is_playing: bool,
    /// Currently loaded track, absent when nothing is queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<TrackPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_ms: Option<u64>,
}

impl PlayerSnapshot {
    /// Whether this body is the explicit not-connected rejection.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.connected == Some(false)
    }
}

/// Track object inside a player snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumPayload>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Artist object inside a track payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistPayload {
    pub name: String,
}

/// Album object inside a track payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumPayload {
    pub name: String,
    /// Ordered by descending resolution. A missing or empty array is valid.
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

/// Album art entry. Only `url` is guaranteed by the vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

/// Body of `GET spotify/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUrlResponse {
    /// Vendor authorization URL the user must visit.
    pub url: String,
}

/// Body of the transport and callback endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub success: bool,
    /// Human-readable failure detail, when the proxy supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST spotify/callback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// Authorization code returned by the vendor's consent redirect.
    pub code: String,
}

// ── Wire → domain mapping ───────────────────────────────────────────

impl From<TrackPayload> for Track {
    fn from(payload: TrackPayload) -> Self {
        let album = payload.album.map(|album| Album {
            name: album.name,
            art: album.images.into_iter().map(|image| image.url).collect(),
        });
        Self {
            id: payload.id,
            name: payload.name,
            artists: payload
                .artists
                .into_iter()
                .map(|artist| artist.name)
                .collect(),
            album,
            duration_ms: payload.duration_ms,
        }
    }
}
