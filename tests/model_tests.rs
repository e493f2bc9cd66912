#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire payload tests for the backend proxy JSON shapes.
//!
//! Raw JSON fixtures mirror real proxy responses: the three
//! `GET spotify/player` body shapes, vendor payload quirks (multiple
//! artists, missing artwork, extra fields), and the small login,
//! acknowledgement, and callback bodies.

use spotify_session_client::model::{CallbackRequest, CommandAck, LoginUrlResponse};
use spotify_session_client::{ConnectionStatus, PlayerSnapshot, Track};

// ════════════════════════════════════════════════════════════════════
// Player snapshot fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_playing_snapshot_from_proxy() {
    let raw = r#"{
        "is_playing": true,
        "item": {
            "name": "Test Song",
            "artists": [{ "name": "Test Artist" }],
            "album": {
                "name": "Test Album",
                "images": [{ "url": "http://x/art.jpg" }]
            },
            "duration_ms": 200000,
            "id": "123"
        },
        "progress_ms": 12000
    }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");

    assert!(!snapshot.is_disconnected());
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.progress_ms, Some(12_000));

    let track = Track::from(snapshot.item.expect("item"));
    assert_eq!(track.id.as_deref(), Some("123"));
    assert_eq!(track.name, "Test Song");
    assert_eq!(track.artist_line(), "Test Artist");
    assert_eq!(track.duration_ms, 200_000);
    let album = track.album.as_ref().expect("album");
    assert_eq!(album.name, "Test Album");
    assert_eq!(track.artwork_url(), Some("http://x/art.jpg"));
}

#[test]
fn fixture_disconnected_body_from_proxy() {
    let raw = r#"{ "connected": false }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");

    assert!(snapshot.is_disconnected());
    assert!(!snapshot.is_playing);
    assert!(snapshot.item.is_none());
    assert!(snapshot.progress_ms.is_none());
}

#[test]
fn fixture_snapshot_without_track() {
    // Playback fields but no item: connected, nothing loaded.
    let raw = r#"{ "is_playing": false, "progress_ms": 0 }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");

    assert!(!snapshot.is_disconnected());
    assert!(snapshot.item.is_none());
    assert_eq!(snapshot.progress_ms, Some(0));
}

#[test]
fn connected_true_body_is_not_disconnected() {
    // The proxy signals connection by *absence* of the flag, but a
    // literal `true` must parse the same way.
    let raw = r#"{ "connected": true, "is_playing": false }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");

    assert!(!snapshot.is_disconnected());
}

#[test]
fn snapshot_ignores_unknown_vendor_fields() {
    let raw = r#"{
        "is_playing": true,
        "shuffle_state": true,
        "repeat_state": "off",
        "device": { "id": "abc", "volume_percent": 70 },
        "item": {
            "name": "Test Song",
            "duration_ms": 1000,
            "uri": "spotify:track:123"
        },
        "progress_ms": 500
    }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");

    assert!(snapshot.is_playing);
    assert_eq!(snapshot.item.expect("item").name, "Test Song");
}

// ════════════════════════════════════════════════════════════════════
// Track mapping tolerances
// ════════════════════════════════════════════════════════════════════

#[test]
fn track_tolerates_missing_artists_and_album() {
    let raw = r#"{ "item": { "name": "Bare Track", "duration_ms": 90000 } }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");
    let track = Track::from(snapshot.item.expect("item"));

    assert!(track.id.is_none());
    assert_eq!(track.artist_line(), "");
    assert!(track.album.is_none());
    assert!(track.artwork_url().is_none());
}

#[test]
fn track_joins_artists_in_billing_order() {
    let raw = r#"{
        "item": {
            "name": "Duet",
            "artists": [{ "name": "First Artist" }, { "name": "Second Artist" }],
            "duration_ms": 180000
        }
    }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");
    let track = Track::from(snapshot.item.expect("item"));

    assert_eq!(track.artist_line(), "First Artist, Second Artist");
}

#[test]
fn artwork_prefers_first_image() {
    // The vendor orders images by descending resolution.
    let raw = r#"{
        "item": {
            "name": "Arted",
            "album": {
                "name": "Album",
                "images": [
                    { "url": "http://x/640.jpg", "height": 640, "width": 640 },
                    { "url": "http://x/300.jpg", "height": 300, "width": 300 },
                    { "url": "http://x/64.jpg", "height": 64, "width": 64 }
                ]
            },
            "duration_ms": 60000
        }
    }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");
    let track = Track::from(snapshot.item.expect("item"));

    assert_eq!(track.artwork_url(), Some("http://x/640.jpg"));
}

#[test]
fn empty_images_array_means_no_artwork() {
    let raw = r#"{
        "item": {
            "name": "Artless",
            "album": { "name": "Album", "images": [] },
            "duration_ms": 60000
        }
    }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");
    let track = Track::from(snapshot.item.expect("item"));

    assert!(track.album.is_some());
    assert!(track.artwork_url().is_none());
}

#[test]
fn missing_duration_defaults_to_zero() {
    let raw = r#"{ "item": { "name": "No Duration" } }"#;

    let snapshot: PlayerSnapshot = serde_json::from_str(raw).expect("parse snapshot");
    let track = Track::from(snapshot.item.expect("item"));

    assert_eq!(track.duration_ms, 0);
}

// ════════════════════════════════════════════════════════════════════
// Login, acknowledgement, and callback bodies
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_login_url_from_proxy() {
    let raw = r#"{ "url": "https://accounts.spotify.com/authorize?client_id=abc&scope=user-read-playback-state" }"#;

    let response: LoginUrlResponse = serde_json::from_str(raw).expect("parse login response");

    assert!(response.url.starts_with("https://accounts.spotify.com/authorize"));
}

#[test]
fn command_ack_success_parses() {
    let raw = r#"{ "success": true }"#;

    let ack: CommandAck = serde_json::from_str(raw).expect("parse ack");

    assert!(ack.success);
    assert!(ack.message.is_none());
}

#[test]
fn command_ack_rejection_carries_message() {
    let raw = r#"{ "success": false, "message": "No active device" }"#;

    let ack: CommandAck = serde_json::from_str(raw).expect("parse ack");

    assert!(!ack.success);
    assert_eq!(ack.message.as_deref(), Some("No active device"));
}

#[test]
fn empty_ack_defaults_to_failure() {
    let ack: CommandAck = serde_json::from_str("{}").expect("parse ack");

    assert!(!ack.success);
}

#[test]
fn callback_request_serializes_code_field() {
    let request = CallbackRequest {
        code: "AQDy8...redacted".into(),
    };

    let value = serde_json::to_value(&request).expect("serialize callback");

    assert_eq!(value, serde_json::json!({ "code": "AQDy8...redacted" }));
}

// ════════════════════════════════════════════════════════════════════
// Domain defaults
// ════════════════════════════════════════════════════════════════════

#[test]
fn connection_status_defaults_to_unknown() {
    assert_eq!(ConnectionStatus::default(), ConnectionStatus::Unknown);
}
