//! Data-channel object produced by the handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::{EventEmitter, ListenerId};

/// Payload of data-channel events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChannelEvent {
    /// `"message"` — data delivered on the channel.
    Message(Vec<u8>),
    /// `"close"` — the channel was closed.
    Close,
}

struct Inner {
    id: u16,
    ordered: bool,
    max_packet_life_time: Option<u16>,
    max_retransmits: Option<u16>,
    label: String,
    protocol: String,
    closed: AtomicBool,
    events: EventEmitter<DataChannelEvent>,
}

/// SCTP data channel handle, emitting `"message"` and `"close"`.
///
/// The reference handler loops `send()` straight back as a `"message"`
/// emission, which is what makes it usable as an in-memory wire.
#[derive(Clone)]
pub struct DataChannel {
    inner: Arc<Inner>,
}

impl DataChannel {
    pub(crate) fn new(
        id: u16,
        ordered: bool,
        max_packet_life_time: Option<u16>,
        max_retransmits: Option<u16>,
        label: String,
        protocol: String,
    ) -> Self {
        tracing::debug!(id, ordered, %label, "data channel created");
        Self {
            inner: Arc::new(Inner {
                id,
                ordered,
                max_packet_life_time,
                max_retransmits,
                label,
                protocol,
                closed: AtomicBool::new(false),
                events: EventEmitter::new(),
            }),
        }
    }

    /// SCTP stream id.
    pub fn id(&self) -> u16 {
        self.inner.id
    }

    pub fn ordered(&self) -> bool {
        self.inner.ordered
    }

    pub fn max_packet_life_time(&self) -> Option<u16> {
        self.inner.max_packet_life_time
    }

    pub fn max_retransmits(&self) -> Option<u16> {
        self.inner.max_retransmits
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Register a listener for `"message"` or `"close"`.
    pub fn on<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&DataChannelEvent) -> crate::error::Result<()> + Send + 'static,
    {
        self.inner.events.on(event, listener)
    }

    pub fn off(&self, event: &'static str, id: ListenerId) -> bool {
        self.inner.events.off(event, id)
    }

    /// Send data on the channel. Dropped silently once closed.
    pub fn send(&self, data: &[u8]) {
        if self.closed() {
            tracing::error!(id = self.inner.id, "send() on closed data channel");
            return;
        }
        self.inner
            .events
            .safe_emit("message", &DataChannelEvent::Message(data.to_vec()));
    }

    /// Close the channel. Idempotent; only the first call emits `"close"`.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(id = self.inner.id, "data channel closed");
        self.inner.events.safe_emit("close", &DataChannelEvent::Close);
    }
}

impl std::fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannel")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("ordered", &self.inner.ordered)
            .field("closed", &self.closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn make_channel() -> DataChannel {
        DataChannel::new(0, true, None, None, "chat".to_string(), String::new())
    }

    #[test]
    fn send_emits_message() {
        let channel = make_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        channel.on("message", move |event| {
            if let DataChannelEvent::Message(data) = event {
                r.lock().push(data.clone());
            }
            Ok(())
        });

        channel.send(b"hello");
        assert_eq!(received.lock().as_slice(), &[b"hello".to_vec()]);
    }

    #[test]
    fn close_emits_once() {
        let channel = make_channel();
        let closes = Arc::new(Mutex::new(0u32));
        let c = closes.clone();
        channel.on("close", move |_| {
            *c.lock() += 1;
            Ok(())
        });

        channel.close();
        channel.close();
        assert!(channel.closed());
        assert_eq!(*closes.lock(), 1);
    }

    #[test]
    fn send_after_close_is_dropped() {
        let channel = make_channel();
        let received = Arc::new(Mutex::new(0u32));
        let r = received.clone();
        channel.on("message", move |_| {
            *r.lock() += 1;
            Ok(())
        });

        channel.close();
        channel.send(b"late");
        assert_eq!(*received.lock(), 0);
    }
}
