//! Shared session store: the single source of truth for connection status
//! and the playback snapshot.
//!
//! Snapshot fetches complete in arbitrary order, so every write carries a
//! sequence number taken at issue time and the store refuses anything older
//! than the last applied write. A `closed` flag set during teardown makes
//! late results no-ops without awaiting in-flight requests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::model::{ConnectionStatus, PlaybackState, PlayerSnapshot, Track};

/// Result of offering a write to the store.
#[derive(Debug)]
pub(crate) enum ApplyOutcome {
    /// The write was applied; carries the resulting state.
    Applied(PlaybackState),
    /// The write was older than the last applied one, or the store is
    /// closed. Nothing changed.
    Stale,
    /// The proxy reported an authoritative disconnect. Status is now
    /// [`ConnectionStatus::Disconnected`]; the snapshot is untouched.
    Disconnected,
}

/// Playback snapshot plus the sequence number of the write that produced it.
struct PlaybackSlot {
    state: PlaybackState,
    last_applied: u64,
}

/// Internal shared state between the session handle and the engine task.
pub(crate) struct SessionStore {
    /// Publishes every connection status transition.
    status_tx: watch::Sender<ConnectionStatus>,
    playback: Mutex<PlaybackSlot>,
    /// Issues sequence numbers for fetches and optimistic writes.
    seq: AtomicU64,
    /// Set once on teardown. Checked before every write.
    closed: AtomicBool,
}

impl SessionStore {
    pub(crate) fn new() -> Arc<Self> {
        let (status_tx, _) = watch::channel(ConnectionStatus::Unknown);
        Arc::new(Self {
            status_tx,
            playback: Mutex::new(PlaybackSlot {
                state: PlaybackState::default(),
                last_applied: 0,
            }),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Reserve the sequence number for an outgoing fetch or command.
    ///
    /// Numbers start at 1; 0 is the "nothing applied yet" sentinel.
    pub(crate) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark the store closed. All subsequent writes report [`ApplyOutcome::Stale`].
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Transition the connection status, returning the previous value.
    pub(crate) fn set_status(&self, status: ConnectionStatus) -> ConnectionStatus {
        self.status_tx.send_replace(status)
    }

    /// Watch receiver for connection status transitions.
    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub(crate) async fn playback_state(&self) -> PlaybackState {
        self.playback.lock().await.state.clone()
    }

    pub(crate) async fn is_playing(&self) -> bool {
        self.playback.lock().await.state.is_playing
    }

    /// Offer a snapshot fetch result to the store.
    ///
    /// `snapshot` is `None` when the proxy answered with an empty body
    /// (connected but idle). Handling order:
    ///
    /// 1. A closed store discards everything.
    /// 2. An explicit `connected: false` body flips status to
    ///    `Disconnected` regardless of sequence order — disconnects are
    ///    authoritative, not positional.
    /// 3. Results at or below the last applied sequence are discarded.
    /// 4. A body with a track overwrites the snapshot completely; a body
    ///    without one (or no body) keeps the last track and forces
    ///    `is_playing` to `false`.
    pub(crate) async fn apply_snapshot(
        &self,
        seq: u64,
        snapshot: Option<PlayerSnapshot>,
    ) -> ApplyOutcome {
        if self.is_closed() {
            debug!(seq, "store closed, discarding snapshot");
            return ApplyOutcome::Stale;
        }

        if snapshot.as_ref().is_some_and(PlayerSnapshot::is_disconnected) {
            self.set_status(ConnectionStatus::Disconnected);
            return ApplyOutcome::Disconnected;
        }

        let mut slot = self.playback.lock().await;
        if seq <= slot.last_applied {
            debug!(
                seq,
                last_applied = slot.last_applied,
                "stale snapshot discarded"
            );
            return ApplyOutcome::Stale;
        }
        slot.last_applied = seq;

        match snapshot.and_then(|snapshot| {
            let progress_ms = snapshot.progress_ms;
            let is_playing = snapshot.is_playing;
            snapshot
                .item
                .map(|item| (Track::from(item), is_playing, progress_ms))
        }) {
            Some((track, is_playing, progress_ms)) => {
                // Authoritative refresh: overwrite every field. The proxy
                // does not clamp progress to the track duration, so do it
                // here when the duration is known.
                let mut progress_ms = progress_ms.unwrap_or(0);
                if track.duration_ms > 0 {
                    progress_ms = progress_ms.min(track.duration_ms);
                }
                slot.state = PlaybackState {
                    is_playing,
                    current_track: Some(track),
                    progress_ms,
                    observed_at: Some(Instant::now()),
                };
            }
            None => {
                // Nothing active on the remote end. Keep the last track so
                // the display does not flicker back to a connect prompt on
                // a momentary empty poll.
                slot.state.is_playing = false;
                slot.state.observed_at = Some(Instant::now());
            }
        }

        ApplyOutcome::Applied(slot.state.clone())
    }

    /// Offer an optimistic `is_playing` flip after an acknowledged
    /// play/pause command. Sequence-gated like a fetch so a fresher
    /// snapshot that has already landed is not clobbered.
    pub(crate) async fn apply_optimistic(&self, seq: u64, is_playing: bool) -> ApplyOutcome {
        if self.is_closed() {
            debug!(seq, "store closed, discarding optimistic update");
            return ApplyOutcome::Stale;
        }

        let mut slot = self.playback.lock().await;
        if seq <= slot.last_applied {
            debug!(
                seq,
                last_applied = slot.last_applied,
                "stale optimistic update discarded"
            );
            return ApplyOutcome::Stale;
        }
        slot.last_applied = seq;
        slot.state.is_playing = is_playing;
        slot.state.observed_at = Some(Instant::now());

        ApplyOutcome::Applied(slot.state.clone())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::model::TrackPayload;

    fn playing_snapshot(name: &str, progress_ms: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            connected: None,
            is_playing: true,
            item: Some(TrackPayload {
                id: Some("id-1".into()),
                name: name.into(),
                artists: vec![],
                album: None,
                duration_ms: 200_000,
            }),
            progress_ms: Some(progress_ms),
        }
    }

    fn disconnected_snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            connected: Some(false),
            is_playing: false,
            item: None,
            progress_ms: None,
        }
    }

    #[tokio::test]
    async fn applies_snapshot_and_reports_state() {
        let store = SessionStore::new();
        let seq = store.next_seq();

        let outcome = store
            .apply_snapshot(seq, Some(playing_snapshot("Song A", 1_000)))
            .await;

        match outcome {
            ApplyOutcome::Applied(state) => {
                assert!(state.is_playing);
                assert_eq!(state.current_track.unwrap().name, "Song A");
                assert_eq!(state.progress_ms, 1_000);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn idle_body_keeps_track_and_pauses() {
        let store = SessionStore::new();
        let seq = store.next_seq();
        store
            .apply_snapshot(seq, Some(playing_snapshot("Song A", 1_000)))
            .await;

        let seq = store.next_seq();
        let outcome = store.apply_snapshot(seq, None).await;

        match outcome {
            ApplyOutcome::Applied(state) => {
                assert!(!state.is_playing);
                assert_eq!(state.current_track.unwrap().name, "Song A");
                assert_eq!(state.progress_ms, 1_000);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_without_track_keeps_previous_track() {
        let store = SessionStore::new();
        let seq = store.next_seq();
        store
            .apply_snapshot(seq, Some(playing_snapshot("Song A", 1_000)))
            .await;

        // A body with playback fields but no item gets the same idle
        // treatment as an empty body.
        let seq = store.next_seq();
        let snapshot = PlayerSnapshot {
            connected: None,
            is_playing: true,
            item: None,
            progress_ms: Some(5_000),
        };
        let outcome = store.apply_snapshot(seq, Some(snapshot)).await;

        match outcome {
            ApplyOutcome::Applied(state) => {
                assert!(!state.is_playing);
                assert_eq!(state.current_track.unwrap().name, "Song A");
                assert_eq!(state.progress_ms, 1_000);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn older_fetch_is_discarded_after_newer_applied() {
        let store = SessionStore::new();
        let old_seq = store.next_seq();
        let new_seq = store.next_seq();

        store
            .apply_snapshot(new_seq, Some(playing_snapshot("Fresh", 2_000)))
            .await;
        let outcome = store
            .apply_snapshot(old_seq, Some(playing_snapshot("Stale", 9_000)))
            .await;

        assert!(matches!(outcome, ApplyOutcome::Stale));
        let state = store.playback_state().await;
        assert_eq!(state.current_track.unwrap().name, "Fresh");
        assert_eq!(state.progress_ms, 2_000);
    }

    #[tokio::test]
    async fn disconnect_wins_even_with_stale_sequence() {
        let store = SessionStore::new();
        store.set_status(ConnectionStatus::Connected);

        let old_seq = store.next_seq();
        let new_seq = store.next_seq();
        store
            .apply_snapshot(new_seq, Some(playing_snapshot("Fresh", 2_000)))
            .await;

        let outcome = store
            .apply_snapshot(old_seq, Some(disconnected_snapshot()))
            .await;

        assert!(matches!(outcome, ApplyOutcome::Disconnected));
        assert_eq!(store.status(), ConnectionStatus::Disconnected);
        // The snapshot itself survives; only the status transitioned.
        let state = store.playback_state().await;
        assert_eq!(state.current_track.unwrap().name, "Fresh");
    }

    #[tokio::test]
    async fn progress_clamped_to_duration() {
        let store = SessionStore::new();
        let seq = store.next_seq();

        let outcome = store
            .apply_snapshot(seq, Some(playing_snapshot("Song A", 999_999)))
            .await;

        match outcome {
            ApplyOutcome::Applied(state) => assert_eq!(state.progress_ms, 200_000),
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn progress_unclamped_when_duration_unknown() {
        let store = SessionStore::new();
        let seq = store.next_seq();
        let snapshot = PlayerSnapshot {
            connected: None,
            is_playing: true,
            item: Some(TrackPayload {
                id: None,
                name: "No Duration".into(),
                artists: vec![],
                album: None,
                duration_ms: 0,
            }),
            progress_ms: Some(42_000),
        };

        let outcome = store.apply_snapshot(seq, Some(snapshot)).await;

        match outcome {
            ApplyOutcome::Applied(state) => assert_eq!(state.progress_ms, 42_000),
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn optimistic_update_is_sequence_gated() {
        let store = SessionStore::new();
        let cmd_seq = store.next_seq();
        let fetch_seq = store.next_seq();

        // The fetch issued after the command lands first.
        store
            .apply_snapshot(fetch_seq, Some(playing_snapshot("Fresh", 1_000)))
            .await;
        let outcome = store.apply_optimistic(cmd_seq, false).await;

        assert!(matches!(outcome, ApplyOutcome::Stale));
        assert!(store.is_playing().await);
    }

    #[tokio::test]
    async fn optimistic_update_applies_in_order() {
        let store = SessionStore::new();
        let fetch_seq = store.next_seq();
        store
            .apply_snapshot(fetch_seq, Some(playing_snapshot("Song", 1_000)))
            .await;

        let cmd_seq = store.next_seq();
        let outcome = store.apply_optimistic(cmd_seq, false).await;

        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
        assert!(!store.is_playing().await);
    }

    #[tokio::test]
    async fn closed_store_discards_all_writes() {
        let store = SessionStore::new();
        let seq = store.next_seq();
        store.close();

        let snapshot_outcome = store
            .apply_snapshot(seq, Some(playing_snapshot("Late", 1_000)))
            .await;
        let optimistic_outcome = store.apply_optimistic(store.next_seq(), true).await;

        assert!(matches!(snapshot_outcome, ApplyOutcome::Stale));
        assert!(matches!(optimistic_outcome, ApplyOutcome::Stale));
        assert!(store.playback_state().await.current_track.is_none());
    }

    #[tokio::test]
    async fn closed_store_ignores_disconnect_bodies() {
        let store = SessionStore::new();
        store.set_status(ConnectionStatus::Connected);
        store.close();

        let outcome = store
            .apply_snapshot(store.next_seq(), Some(disconnected_snapshot()))
            .await;

        assert!(matches!(outcome, ApplyOutcome::Stale));
        assert_eq!(store.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn status_watch_publishes_transitions() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Unknown);

        store.set_status(ConnectionStatus::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Connected);
    }

    #[test]
    fn sequence_numbers_are_monotonic_from_one() {
        let store = SessionStore::new();
        assert_eq!(store.next_seq(), 1);
        assert_eq!(store.next_seq(), 2);
        assert_eq!(store.next_seq(), 3);
    }
}
