//! Handler Interface Protocol.
//!
//! This module provides the [`Handler`] trait and codec-agnostic option and
//! result structs that let one session layer drive interchangeable native
//! transport engines. A handler owns everything transport-local: the
//! handler-local id space, the per-kind generic outbound parameter
//! templates, the SCTP stream-id counter, and the transport-setup handshake
//! state machine.
//!
//! ## Transport-setup handshake
//!
//! The first transport-touching operation (`send`, `receive`,
//! `send_data_channel`, `receive_data_channel`) triggers a one-time
//! handshake: the handler clones its local DTLS parameters, overrides the
//! DTLS role per its [`DtlsRolePolicy`], emits `"@connectionstatechange"`
//! with [`ConnectionState::Connecting`], then emits `"@connect"` carrying
//! the DTLS parameters and a [`Completion`] and blocks until the owning
//! session layer settles it. States:
//!
//! ```text
//! NotReady --first op--> Connecting --resolve--> Ready     (terminal)
//!     ^                      |
//!     +------reject----------+        (next op re-attempts)
//! ```
//!
//! The `NotReady → Connecting` transition is serialized: concurrent first
//! operations wait for the in-flight handshake instead of racing into a
//! second one, and the handshake succeeds at most once per handler instance.
//!
//! ## Implementations
//!
//! One implementation exists per supported native transport engine; the
//! in-memory [`FakeHandler`](fake::FakeHandler) exercises the full contract
//! without networking and doubles as the executable reference for correct
//! handler behavior.

pub mod fake;

use serde::{Deserialize, Serialize};

use crate::data_channel::DataChannel;
use crate::error::Result;
use crate::events::{Completion, EventEmitter};
use crate::rtp::{
    ConnectionState, DtlsParameters, DtlsRole, ExtendedRtpCapabilities, IceCandidate,
    IceParameters, IceServer, MediaKind, RtpCapabilities, RtpEncodingParameters, RtpParameters,
    SctpCapabilities, SctpParameters, SctpStreamParameters,
};
use crate::stats::StatsReport;
use crate::track::MediaTrack;

/// Transport-setup handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSetupState {
    NotReady,
    Connecting,
    Ready,
}

/// Direction a handler instance was set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerDirection {
    Send,
    Recv,
}

/// DTLS role chosen when the handshake is triggered, per direction of the
/// triggering operation.
///
/// Server-on-first-send / client-on-first-receive is a convention, not a
/// protocol necessity, so it is carried as configurable policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsRolePolicy {
    pub send: DtlsRole,
    pub receive: DtlsRole,
}

impl Default for DtlsRolePolicy {
    fn default() -> Self {
        Self {
            send: DtlsRole::Server,
            receive: DtlsRole::Client,
        }
    }
}

/// One-time initialization options for [`Handler::run`].
#[derive(Debug, Clone, Default)]
pub struct HandlerRunOptions {
    pub direction: Option<HandlerDirection>,
    pub ice_parameters: Option<IceParameters>,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: Option<DtlsParameters>,
    pub sctp_parameters: Option<SctpParameters>,
    pub ice_servers: Vec<IceServer>,
    /// Negotiated local+remote capability intersection; the handler derives
    /// its per-kind generic outbound templates from it.
    pub extended_rtp_capabilities: ExtendedRtpCapabilities,
}

/// Per-codec tuning knobs an application may request when producing.
///
/// Advisory: handlers apply what their engine supports and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecOptions {
    pub opus_stereo: Option<bool>,
    pub opus_dtx: Option<bool>,
    pub opus_fec: Option<bool>,
    pub video_google_start_bitrate: Option<u32>,
}

/// Options for [`Handler::send`].
#[derive(Debug, Clone)]
pub struct HandlerSendOptions {
    pub track: MediaTrack,
    /// Requested encoding layers; when empty the handler creates a single
    /// generic encoding.
    pub encodings: Vec<RtpEncodingParameters>,
    pub codec_options: Option<CodecOptions>,
    /// Preferred codec MIME type; advisory.
    pub codec: Option<String>,
}

/// Result of [`Handler::send`].
#[derive(Debug, Clone)]
pub struct HandlerSendResult {
    pub local_id: String,
    pub rtp_parameters: RtpParameters,
}

/// One entry passed to [`Handler::receive`].
#[derive(Debug, Clone)]
pub struct HandlerReceiveOptions {
    /// Track id announced by the remote side.
    pub track_id: String,
    pub kind: MediaKind,
}

/// One entry returned by [`Handler::receive`].
#[derive(Debug, Clone)]
pub struct HandlerReceiveResult {
    pub local_id: String,
    pub track: MediaTrack,
}

/// Options for [`Handler::send_data_channel`].
#[derive(Debug, Clone, Default)]
pub struct DataChannelOptions {
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub label: String,
    pub protocol: String,
}

/// Result of [`Handler::send_data_channel`].
#[derive(Debug, Clone)]
pub struct SendDataChannelResult {
    pub data_channel: DataChannel,
    pub sctp_stream_parameters: SctpStreamParameters,
}

/// Options for [`Handler::receive_data_channel`].
#[derive(Debug, Clone, Default)]
pub struct ReceiveDataChannelOptions {
    pub sctp_stream_parameters: SctpStreamParameters,
    pub label: String,
    pub protocol: String,
}

/// Payload of the handler's private control channel, consumed by the owning
/// session layer only.
#[derive(Debug, Clone)]
pub enum HandlerControlEvent {
    /// `"@connectionstatechange"` — transport connection state changed.
    ConnectionStateChange(ConnectionState),
    /// `"@connect"` — transport-setup handshake: the session layer must
    /// signal the DTLS parameters to the remote end and settle the
    /// completion.
    Connect {
        dtls_parameters: DtlsParameters,
        completion: Completion<()>,
    },
}

/// Contract every pluggable transport engine implements.
///
/// Capability discovery (`native_rtp_capabilities`,
/// `native_sctp_capabilities`) is pure and callable before [`run`](Self::run);
/// every send/receive operation requires `run` to have been called exactly
/// once. Stats getters are read-only and report missing metrics as an empty
/// [`StatsReport`], never as an error. `close()` is idempotent and never
/// fails.
pub trait Handler: Send {
    /// Implementation name, e.g. `"FakeHandler"`.
    fn name(&self) -> &'static str;

    /// Private control channel (`"@connect"`, `"@connectionstatechange"`).
    /// Only the owning session layer may subscribe.
    fn control_events(&self) -> &EventEmitter<HandlerControlEvent>;

    /// Pure discovery of the engine's RTP capabilities.
    fn native_rtp_capabilities(&self) -> RtpCapabilities;

    /// Pure discovery of the engine's SCTP capabilities.
    fn native_sctp_capabilities(&self) -> SctpCapabilities;

    /// One-time initialization with the negotiated transport and capability
    /// parameters. Calling it twice, or any send/receive operation before
    /// it, is a programming error.
    fn run(&self, options: HandlerRunOptions) -> Result<()>;

    /// Best-effort update of the ICE server list on the live transport.
    fn update_ice_servers(&self, ice_servers: Vec<IceServer>) -> Result<()>;

    /// Best-effort ICE restart with fresh remote parameters.
    fn restart_ice(&self, ice_parameters: IceParameters) -> Result<()>;

    /// Start sending the given track; allocates a handler-local id and the
    /// flow's negotiated RTP parameters. Triggers the transport-setup
    /// handshake on first use.
    fn send(&self, options: HandlerSendOptions) -> Result<HandlerSendResult>;

    /// Stop sending and release the local id.
    fn stop_sending(&self, local_id: &str) -> Result<()>;

    /// Atomically swap the track bound to a local id without changing the
    /// id or the negotiated parameters. `None` detaches the current track.
    fn replace_track(&self, local_id: &str, track: Option<MediaTrack>) -> Result<()>;

    /// Cap the number of active spatial layers; advisory.
    fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()>;

    /// Update encoding-layer parameters without renegotiation; advisory.
    fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()>;

    fn get_sender_stats(&self, local_id: &str) -> Result<StatsReport>;

    fn get_receiver_stats(&self, local_id: &str) -> Result<StatsReport>;

    fn get_transport_stats(&self) -> Result<StatsReport>;

    /// Create an outbound data channel with a fresh, monotonically
    /// increasing stream id. Triggers the transport-setup handshake on
    /// first use.
    fn send_data_channel(&self, options: DataChannelOptions) -> Result<SendDataChannelResult>;

    /// Create the receiving end of a remotely announced data channel.
    /// Triggers the transport-setup handshake on first use.
    fn receive_data_channel(&self, options: ReceiveDataChannelOptions) -> Result<DataChannel>;

    /// Start receiving the listed remote tracks; one local id and track per
    /// entry. Each entry triggers the transport-setup handshake on first
    /// use.
    fn receive(&self, options: Vec<HandlerReceiveOptions>) -> Result<Vec<HandlerReceiveResult>>;

    /// Stop receiving and release the local id.
    fn stop_receiving(&self, local_id: &str) -> Result<()>;

    /// Advisory pause of the listed receiving flows.
    fn pause_receiving(&self, local_ids: &[String]) -> Result<()>;

    /// Advisory resume of the listed receiving flows.
    fn resume_receiving(&self, local_ids: &[String]) -> Result<()>;

    /// Release all handler resources. Idempotent, never fails.
    fn close(&self);
}
