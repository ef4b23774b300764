//! Outbound media flow (producer) state machine.
//!
//! A [`Producer`] wraps a local track together with its negotiated RTP
//! parameters and a pause/close state machine. Public API calls never reach
//! the handler directly: they surface as control events (`"@close"`,
//! `"@pause"`, `"@resume"`, `"@getstats"`) that the owning session layer
//! consumes and translates into handler operations.
//!
//! ## Lifecycle
//!
//! ```text
//! Open(active) <--pause/resume--> Open(paused)
//!      |                                |
//!      +---- close() / transport_closed() ----> Closed   (terminal)
//! ```
//!
//! `close()` and `transport_closed()` are idempotent and mutually exclusive:
//! whichever fires first wins, total of exactly one terminal event. Pause
//! and resume degrade to logged no-ops on a closed producer, since the
//! embedding application commonly issues them racily during teardown.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::app_data::AppData;
use crate::error::{Error, Result};
use crate::events::{Completion, EventEmitter, ListenerId, ObserverEvent};
use crate::rtp::{MediaKind, RtpParameters};
use crate::stats::StatsReport;
use crate::track::MediaTrack;

/// Payload of the producer's public events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerEvent {
    /// `"transportclose"` — the transport backing this producer went away.
    TransportClose,
    /// `"trackended"` — the local track ended externally.
    TrackEnded,
}

/// Payload of the producer's private control channel, consumed exclusively
/// by the owning session layer.
#[derive(Debug, Clone)]
pub enum ProducerControlEvent {
    /// `"@close"` — tell the handler to stop sending this flow.
    Close,
    /// `"@pause"` — the flow was paused locally.
    Pause,
    /// `"@resume"` — the flow was resumed locally.
    Resume,
    /// `"@getstats"` — the session layer must proxy the handler's sender
    /// stats into the completion.
    GetStats(Completion<StatsReport>),
}

struct Flags {
    closed: bool,
    paused: bool,
}

struct Inner {
    id: String,
    local_id: String,
    track: MediaTrack,
    rtp_parameters: RtpParameters,
    app_data: AppData,
    flags: Mutex<Flags>,
    ended_listener: Mutex<Option<ListenerId>>,
    events: EventEmitter<ProducerEvent>,
    control: EventEmitter<ProducerControlEvent>,
    observer: EventEmitter<ObserverEvent>,
}

impl Inner {
    /// Detach the `ended` listener and stop the track.
    fn release_track(&self) {
        if let Some(listener_id) = self.ended_listener.lock().take() {
            self.track.remove_ended_listener(listener_id);
        }
        self.track.stop();
    }
}

/// Client-side handle for one outbound logical media flow.
#[derive(Clone)]
pub struct Producer {
    inner: Arc<Inner>,
}

impl Producer {
    /// Create a producer over a track and its negotiated parameters.
    ///
    /// `id` is assigned by the owning session, `local_id` by the handler.
    /// The initial pause state mirrors the track's enabled flag.
    pub fn new(
        id: impl Into<String>,
        local_id: impl Into<String>,
        track: MediaTrack,
        rtp_parameters: RtpParameters,
        app_data: AppData,
    ) -> Self {
        let id = id.into();
        let local_id = local_id.into();
        tracing::debug!(producer_id = %id, local_id = %local_id, "producer created");

        let paused = !track.enabled();
        let inner = Arc::new(Inner {
            id,
            local_id,
            track,
            rtp_parameters,
            app_data,
            flags: Mutex::new(Flags {
                closed: false,
                paused,
            }),
            ended_listener: Mutex::new(None),
            events: EventEmitter::new(),
            control: EventEmitter::new(),
            observer: EventEmitter::new(),
        });

        let weak = Arc::downgrade(&inner);
        let listener_id = inner.track.on_ended(move || {
            if let Some(inner) = weak.upgrade() {
                tracing::debug!(producer_id = %inner.id, "track ended");
                inner.events.safe_emit("trackended", &ProducerEvent::TrackEnded);
                inner.observer.safe_emit("trackended", &ObserverEvent::TrackEnded);
            }
        });
        *inner.ended_listener.lock() = Some(listener_id);

        Self { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Handler-local id of this flow.
    pub fn local_id(&self) -> &str {
        &self.inner.local_id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.track.kind()
    }

    pub fn track(&self) -> &MediaTrack {
        &self.inner.track
    }

    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.inner.rtp_parameters
    }

    pub fn closed(&self) -> bool {
        self.inner.flags.lock().closed
    }

    pub fn paused(&self) -> bool {
        self.inner.flags.lock().paused
    }

    /// Application metadata, fixed at construction.
    pub fn app_data(&self) -> &AppData {
        &self.inner.app_data
    }

    /// Observer channel (`"close"`, `"pause"`, `"resume"`, `"trackended"`).
    /// Passive monitoring only.
    pub fn observer(&self) -> &EventEmitter<ObserverEvent> {
        &self.inner.observer
    }

    /// Private control channel. Only the owning session layer may subscribe;
    /// it translates control events into handler operations.
    pub fn control_events(&self) -> &EventEmitter<ProducerControlEvent> {
        &self.inner.control
    }

    /// Register a listener for a public event
    /// (`"transportclose"`, `"trackended"`).
    pub fn on<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&ProducerEvent) -> Result<()> + Send + 'static,
    {
        self.inner.events.on(event, listener)
    }

    pub fn off(&self, event: &'static str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }

    /// Close the producer. Idempotent; terminal.
    pub fn close(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                return;
            }
            flags.closed = true;
        }
        tracing::debug!(producer_id = %self.inner.id, "close()");
        self.inner.release_track();
        self.inner
            .control
            .safe_emit("@close", &ProducerControlEvent::Close);
        self.inner.observer.safe_emit("close", &ObserverEvent::Close);
    }

    /// The transport backing this producer was closed. Idempotent; terminal;
    /// mutually exclusive with [`close`](Self::close). No control event is
    /// emitted since the handler side is already gone.
    pub fn transport_closed(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                return;
            }
            flags.closed = true;
        }
        tracing::debug!(producer_id = %self.inner.id, "transport_closed()");
        self.inner.release_track();
        self.inner
            .events
            .safe_emit("transportclose", &ProducerEvent::TransportClose);
        self.inner.observer.safe_emit("close", &ObserverEvent::Close);
    }

    /// Pause sending. Logged no-op when closed or already paused.
    pub fn pause(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                tracing::error!(producer_id = %self.inner.id, "pause() on closed producer");
                return;
            }
            if flags.paused {
                tracing::debug!(producer_id = %self.inner.id, "pause() while already paused");
                return;
            }
            flags.paused = true;
        }
        self.inner.track.set_enabled(false);
        tracing::debug!(producer_id = %self.inner.id, "pause()");
        self.inner
            .control
            .safe_emit("@pause", &ProducerControlEvent::Pause);
        self.inner.observer.safe_emit("pause", &ObserverEvent::Pause);
    }

    /// Resume sending. Logged no-op when closed or not paused.
    pub fn resume(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                tracing::error!(producer_id = %self.inner.id, "resume() on closed producer");
                return;
            }
            if !flags.paused {
                tracing::debug!(producer_id = %self.inner.id, "resume() while not paused");
                return;
            }
            flags.paused = false;
        }
        self.inner.track.set_enabled(true);
        tracing::debug!(producer_id = %self.inner.id, "resume()");
        self.inner
            .control
            .safe_emit("@resume", &ProducerControlEvent::Resume);
        self.inner.observer.safe_emit("resume", &ObserverEvent::Resume);
    }

    /// Fetch sender statistics through the owning session layer.
    ///
    /// Fails with an invalid-state error when closed, before any
    /// suspension; otherwise blocks until the session layer settles the
    /// completion it receives in `"@getstats"`.
    pub fn get_stats(&self) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::InvalidState("producer closed"));
        }
        let completion: Completion<StatsReport> = Completion::new();
        let had_listener = self.inner.control.safe_emit(
            "@getstats",
            &ProducerControlEvent::GetStats(completion.clone()),
        );
        if !had_listener {
            return Err(Error::Programming("no @getstats listener registered"));
        }
        completion.wait()
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("id", &self.inner.id)
            .field("local_id", &self.inner.local_id)
            .field("kind", &self.kind())
            .field("closed", &self.closed())
            .field("paused", &self.paused())
            .finish()
    }
}
