#![no_main]

use libfuzzer_sys::fuzz_target;

use spotify_session_client::{PlayerSnapshot, Track};

fuzz_target!(|data: &[u8]| {
    // Exercise the raw-byte deserialization path (includes serde_json's
    // own UTF-8 validation and error handling for invalid sequences).
    if let Ok(snapshot) = serde_json::from_slice::<PlayerSnapshot>(data) {
        // A parsed body must map into the domain without panicking,
        // whatever the vendor put in the nested payloads.
        let _ = snapshot.is_disconnected();
        if let Some(item) = snapshot.item {
            let track = Track::from(item);
            let _ = track.artist_line();
            let _ = track.artwork_url();
        }
    }

    // Also exercise the str-based path for valid UTF-8 input.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<PlayerSnapshot>(s);
    }
});
