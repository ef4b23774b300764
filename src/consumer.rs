//! Inbound media flow (consumer) state machine.
//!
//! The symmetric counterpart of [`Producer`](crate::producer::Producer) for
//! the receiving direction: a [`Consumer`] wraps the track the handler
//! fabricated for a remote flow, the negotiated RTP parameters, and the
//! same pause/close state machine. It additionally records the id of the
//! remote producer it consumes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::app_data::AppData;
use crate::error::{Error, Result};
use crate::events::{Completion, EventEmitter, ListenerId, ObserverEvent};
use crate::rtp::{MediaKind, RtpParameters};
use crate::stats::StatsReport;
use crate::track::MediaTrack;

/// Payload of the consumer's public events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// `"transportclose"` — the transport backing this consumer went away.
    TransportClose,
    /// `"trackended"` — the received track ended externally.
    TrackEnded,
}

/// Payload of the consumer's private control channel, consumed exclusively
/// by the owning session layer.
#[derive(Debug, Clone)]
pub enum ConsumerControlEvent {
    /// `"@close"` — tell the handler to stop receiving this flow.
    Close,
    /// `"@pause"` — the flow was paused locally.
    Pause,
    /// `"@resume"` — the flow was resumed locally.
    Resume,
    /// `"@getstats"` — the session layer must proxy the handler's receiver
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
    producer_id: String,
    track: MediaTrack,
    rtp_parameters: RtpParameters,
    app_data: AppData,
    flags: Mutex<Flags>,
    ended_listener: Mutex<Option<ListenerId>>,
    events: EventEmitter<ConsumerEvent>,
    control: EventEmitter<ConsumerControlEvent>,
    observer: EventEmitter<ObserverEvent>,
}

impl Inner {
    fn release_track(&self) {
        if let Some(listener_id) = self.ended_listener.lock().take() {
            self.track.remove_ended_listener(listener_id);
        }
        // Best-effort: the track belongs to the embedding environment.
        self.track.stop();
    }
}

/// Client-side handle for one inbound logical media flow.
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<Inner>,
}

impl Consumer {
    /// Create a consumer over a received track and its negotiated
    /// parameters. `id` is assigned by the owning session, `local_id` by the
    /// handler, `producer_id` identifies the remote flow being consumed.
    pub fn new(
        id: impl Into<String>,
        local_id: impl Into<String>,
        producer_id: impl Into<String>,
        track: MediaTrack,
        rtp_parameters: RtpParameters,
        app_data: AppData,
    ) -> Self {
        let id = id.into();
        let local_id = local_id.into();
        let producer_id = producer_id.into();
        tracing::debug!(consumer_id = %id, local_id = %local_id, producer_id = %producer_id, "consumer created");

        let paused = !track.enabled();
        let inner = Arc::new(Inner {
            id,
            local_id,
            producer_id,
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
                tracing::debug!(consumer_id = %inner.id, "track ended");
                inner.events.safe_emit("trackended", &ConsumerEvent::TrackEnded);
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

    /// Id of the remote producer this consumer receives.
    pub fn producer_id(&self) -> &str {
        &self.inner.producer_id
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

    /// Observer channel; passive monitoring only.
    pub fn observer(&self) -> &EventEmitter<ObserverEvent> {
        &self.inner.observer
    }

    /// Private control channel for the owning session layer.
    pub fn control_events(&self) -> &EventEmitter<ConsumerControlEvent> {
        &self.inner.control
    }

    /// Register a listener for a public event
    /// (`"transportclose"`, `"trackended"`).
    pub fn on<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&ConsumerEvent) -> Result<()> + Send + 'static,
    {
        self.inner.events.on(event, listener)
    }

    pub fn off(&self, event: &'static str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }

    /// Close the consumer. Idempotent; terminal.
    pub fn close(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                return;
            }
            flags.closed = true;
        }
        tracing::debug!(consumer_id = %self.inner.id, "close()");
        self.inner.release_track();
        self.inner
            .control
            .safe_emit("@close", &ConsumerControlEvent::Close);
        self.inner.observer.safe_emit("close", &ObserverEvent::Close);
    }

    /// The transport backing this consumer was closed. Terminal, mutually
    /// exclusive with [`close`](Self::close); emits the public
    /// `"transportclose"` instead of a control event.
    pub fn transport_closed(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                return;
            }
            flags.closed = true;
        }
        tracing::debug!(consumer_id = %self.inner.id, "transport_closed()");
        self.inner.release_track();
        self.inner
            .events
            .safe_emit("transportclose", &ConsumerEvent::TransportClose);
        self.inner.observer.safe_emit("close", &ObserverEvent::Close);
    }

    /// Pause receiving. Logged no-op when closed or already paused.
    pub fn pause(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                tracing::error!(consumer_id = %self.inner.id, "pause() on closed consumer");
                return;
            }
            if flags.paused {
                tracing::debug!(consumer_id = %self.inner.id, "pause() while already paused");
                return;
            }
            flags.paused = true;
        }
        self.inner.track.set_enabled(false);
        tracing::debug!(consumer_id = %self.inner.id, "pause()");
        self.inner
            .control
            .safe_emit("@pause", &ConsumerControlEvent::Pause);
        self.inner.observer.safe_emit("pause", &ObserverEvent::Pause);
    }

    /// Resume receiving. Logged no-op when closed or not paused.
    pub fn resume(&self) {
        {
            let mut flags = self.inner.flags.lock();
            if flags.closed {
                tracing::error!(consumer_id = %self.inner.id, "resume() on closed consumer");
                return;
            }
            if !flags.paused {
                tracing::debug!(consumer_id = %self.inner.id, "resume() while not paused");
                return;
            }
            flags.paused = false;
        }
        self.inner.track.set_enabled(true);
        tracing::debug!(consumer_id = %self.inner.id, "resume()");
        self.inner
            .control
            .safe_emit("@resume", &ConsumerControlEvent::Resume);
        self.inner.observer.safe_emit("resume", &ObserverEvent::Resume);
    }

    /// Fetch receiver statistics through the owning session layer. Fails
    /// with an invalid-state error when closed, before any suspension.
    pub fn get_stats(&self) -> Result<StatsReport> {
        if self.closed() {
            return Err(Error::InvalidState("consumer closed"));
        }
        let completion: Completion<StatsReport> = Completion::new();
        let had_listener = self.inner.control.safe_emit(
            "@getstats",
            &ConsumerControlEvent::GetStats(completion.clone()),
        );
        if !had_listener {
            return Err(Error::Programming("no @getstats listener registered"));
        }
        completion.wait()
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.inner.id)
            .field("local_id", &self.inner.local_id)
            .field("producer_id", &self.inner.producer_id)
            .field("kind", &self.kind())
            .field("closed", &self.closed())
            .field("paused", &self.paused())
            .finish()
    }
}
