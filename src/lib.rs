//! Client-side media-session negotiation and lifecycle core.
//!
//! This library turns locally available media tracks and transport
//! capabilities into negotiated wire parameters and supervises the resulting
//! logical flows (outbound [`Producer`]s, inbound [`Consumer`]s) across
//! their lifetime. Media transport itself — encoding, ICE, DTLS, SRTP — is
//! delegated to a pluggable engine behind the [`Handler`](handler::Handler)
//! trait; the in-memory [`FakeHandler`](handler::fake::FakeHandler) drives
//! the full contract without networking.
//!
//! The owning session layer creates one handler, runs capability discovery
//! and [`run`](handler::Handler::run), then constructs a Producer or
//! Consumer per flow. Public calls on those objects surface as control
//! events the session layer consumes and translates back into handler
//! operations; handler state changes propagate upward the same way.

pub mod app_data;
pub mod consumer;
pub mod data_channel;
pub mod error;
pub mod events;
pub mod handler;
pub mod producer;
pub mod rtp;
pub mod scalability;
pub mod stats;
pub mod track;

pub use app_data::AppData;
pub use consumer::{Consumer, ConsumerControlEvent, ConsumerEvent};
pub use data_channel::{DataChannel, DataChannelEvent};
pub use error::{Error, Result};
pub use events::{Completion, EventEmitter, ListenerId, ObserverEvent};
pub use handler::{Handler, HandlerControlEvent, TransportSetupState};
pub use producer::{Producer, ProducerControlEvent, ProducerEvent};
pub use rtp::{MediaKind, RtpCapabilities, RtpParameters};
pub use scalability::{ScalabilityMode, parse as parse_scalability_mode};
pub use stats::StatsReport;
pub use track::MediaTrack;
