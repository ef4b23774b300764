//! Media track handle.
//!
//! [`MediaTrack`] stands in for the platform media source/sink a flow is
//! bound to. The embedding environment owns the underlying media; the handle
//! is a cheap clone over shared state, so Producer/Consumer hold non-owning
//! references and must only detach their `ended` listener on close — never
//! assume they may destroy the track outright.
//!
//! The handle exposes exactly what the lifecycle machinery needs: the kind,
//! an `enabled` flag mirroring pause state, an idempotent `stop()`, and a
//! cancelable `ended` notification. [`fire_ended`](MediaTrack::fire_ended)
//! simulates an external end of the media source, which is also how the
//! reference handler fabricates received tracks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::RngExt;

use crate::events::{EventEmitter, ListenerId};
use crate::rtp::MediaKind;

struct Inner {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
    ended: AtomicBool,
    ended_events: EventEmitter<()>,
}

/// Cheaply-cloneable handle to a local media source/sink.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<Inner>,
}

impl MediaTrack {
    /// Create an enabled track of the given kind with a random id.
    pub fn new(kind: MediaKind) -> Self {
        let id = format!("track-{:08x}", rand::rng().random::<u32>());
        tracing::debug!(track_id = %id, %kind, "track created");
        Self {
            inner: Arc::new(Inner {
                id,
                kind,
                enabled: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
                ended: AtomicBool::new(false),
                ended_events: EventEmitter::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Toggle media delivery without tearing the track down.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Stop the underlying media. Idempotent; stopping an already-stopped or
    /// ended track has no effect and never fails.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(track_id = %self.inner.id, "track stopped");
    }

    /// Register a listener for the external "ended" notification.
    pub fn on_ended<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut() + Send + 'static,
    {
        let mut listener = listener;
        self.inner.ended_events.on("ended", move |()| {
            listener();
            Ok(())
        })
    }

    /// Cancel a previously registered "ended" listener.
    pub fn remove_ended_listener(&self, id: ListenerId) -> bool {
        self.inner.ended_events.off("ended", id)
    }

    /// Simulate the media source ending externally. Fires each registered
    /// listener once; repeated calls are ignored.
    pub fn fire_ended(&self) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(track_id = %self.inner.id, "track ended");
        self.inner.ended_events.safe_emit("ended", &());
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("enabled", &self.enabled())
            .field("stopped", &self.stopped())
            .field("ended", &self.ended())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn enabled_toggles() {
        let track = MediaTrack::new(MediaKind::Audio);
        assert!(track.enabled());
        track.set_enabled(false);
        assert!(!track.enabled());
        track.set_enabled(true);
        assert!(track.enabled());
    }

    #[test]
    fn stop_is_idempotent() {
        let track = MediaTrack::new(MediaKind::Video);
        assert!(!track.stopped());
        track.stop();
        track.stop();
        assert!(track.stopped());
    }

    #[test]
    fn ended_fires_listeners_once() {
        let track = MediaTrack::new(MediaKind::Audio);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        track.on_ended(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        track.fire_ended();
        track.fire_ended();
        assert!(track.ended());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_does_not_fire() {
        let track = MediaTrack::new(MediaKind::Audio);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let id = track.on_ended(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(track.remove_ended_listener(id));
        track.fire_ended();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_state() {
        let track = MediaTrack::new(MediaKind::Video);
        let clone = track.clone();
        clone.set_enabled(false);
        assert!(!track.enabled());
        assert_eq!(track.id(), clone.id());
    }
}
