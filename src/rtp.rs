//! Negotiated wire-parameter data model.
//!
//! These types describe how a media flow is packetized and identified on the
//! wire once negotiation has finished: codecs, header extensions, encoding
//! layers (each identified by an SSRC, optionally paired with an RTX SSRC),
//! and RTCP settings. Capability types describe what an endpoint *can* do;
//! [`ExtendedRtpCapabilities`] is the already-intersected local+remote set
//! the capability-negotiation step (out of scope here) produces, and is what
//! [`Handler::run`](crate::handler::Handler::run) consumes to precompute
//! generic outbound parameters per kind.
//!
//! All types serialize with serde: negotiated parameters travel over the
//! application's signaling channel as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Media kind of a track or flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// RTCP feedback mechanism supported/negotiated for a codec (e.g.
/// `nack`, `nack pli`, `ccm fir`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Codec settings in a negotiated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// Codec MIME type, e.g. `audio/opus`, `video/VP8`, `video/rtx`.
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific FMTP-style parameters (e.g. `apt` for RTX).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    /// Whether this codec is a retransmission codec
    /// (case-insensitive `…/rtx` MIME subtype).
    pub fn is_rtx(&self) -> bool {
        self.mime_type
            .rsplit('/')
            .next()
            .is_some_and(|subtype| subtype.eq_ignore_ascii_case("rtx"))
    }
}

/// Negotiated RTP header extension for one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    pub uri: String,
    pub id: u16,
    #[serde(default)]
    pub encrypt: bool,
}

/// RTX companion stream descriptor for one encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxParameters {
    pub ssrc: u32,
}

fn default_true() -> bool {
    true
}

/// One encoding layer of a flow (one simulcast/SVC variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtx: Option<RtxParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtx: Option<bool>,
    /// Scalability descriptor, parsed with [`crate::scalability::parse`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_framerate: Option<f64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Default for RtpEncodingParameters {
    fn default() -> Self {
        Self {
            ssrc: None,
            rtx: None,
            dtx: None,
            scalability_mode: None,
            max_bitrate: None,
            max_framerate: None,
            active: true,
        }
    }
}

/// RTCP settings of a negotiated flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    /// Canonical name grouping related streams, stable per handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(default)]
    pub reduced_size: bool,
    #[serde(default)]
    pub mux: bool,
}

/// Complete negotiated wire parameters of one media flow.
///
/// Immutable once negotiated; `Clone` yields the deep copy a caller may
/// mutate freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// Media-identification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default)]
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    #[serde(default)]
    pub encodings: Vec<RtpEncodingParameters>,
    #[serde(default)]
    pub rtcp: RtcpParameters,
}

/// Codec an endpoint is able to send or receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// Header extension an endpoint supports for a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub preferred_id: u16,
}

/// Full RTP capability set of an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

/// One codec surviving the local/remote capability intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCodec {
    pub kind: MediaKind,
    pub mime_type: String,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    pub local_payload_type: u8,
    pub remote_payload_type: u8,
    /// RTX payload type negotiated for this codec, when both sides support
    /// retransmission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_rtx_payload_type: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

/// One header extension surviving the capability intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpHeaderExtension {
    pub kind: MediaKind,
    pub uri: String,
    pub send_id: u16,
}

/// Local+remote capability intersection, produced by the negotiation step
/// and consumed by [`Handler::run`](crate::handler::Handler::run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<ExtendedRtpCodec>,
    #[serde(default)]
    pub header_extensions: Vec<ExtendedRtpHeaderExtension>,
}

/// Derive the generic outbound parameter template for one kind from the
/// extended capability set.
///
/// The template carries the codec list (including a synthesized `…/rtx`
/// entry with an `apt` parameter for each codec that negotiated an RTX
/// payload type) and the kind's header extensions. Encodings, MID, SSRCs and
/// the RTCP descriptor are filled per flow by the handler at send time.
pub fn sending_rtp_parameters(
    kind: MediaKind,
    extended: &ExtendedRtpCapabilities,
) -> RtpParameters {
    let mut params = RtpParameters::default();

    for codec in extended.codecs.iter().filter(|codec| codec.kind == kind) {
        params.codecs.push(RtpCodecParameters {
            mime_type: codec.mime_type.clone(),
            payload_type: codec.local_payload_type,
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            parameters: codec.parameters.clone(),
            rtcp_feedback: codec.rtcp_feedback.clone(),
        });

        if let Some(rtx_payload_type) = codec.local_rtx_payload_type {
            let mut rtx_parameters = BTreeMap::new();
            rtx_parameters.insert(
                "apt".to_string(),
                serde_json::Value::from(codec.local_payload_type),
            );
            params.codecs.push(RtpCodecParameters {
                mime_type: format!("{kind}/rtx"),
                payload_type: rtx_payload_type,
                clock_rate: codec.clock_rate,
                channels: None,
                parameters: rtx_parameters,
                rtcp_feedback: Vec::new(),
            });
        }
    }

    for ext in extended
        .header_extensions
        .iter()
        .filter(|ext| ext.kind == kind)
    {
        params.header_extensions.push(RtpHeaderExtensionParameters {
            uri: ext.uri.clone(),
            id: ext.send_id,
            encrypt: false,
        });
    }

    params
}

/// DTLS role of the local transport endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    #[default]
    Auto,
    Client,
    Server,
}

/// Certificate fingerprint advertised during DTLS negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

/// DTLS negotiation parameters of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsParameters {
    #[serde(default)]
    pub role: DtlsRole,
    #[serde(default)]
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// ICE username fragment/password pair of one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
    #[serde(default)]
    pub ice_lite: bool,
}

/// One ICE candidate of the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub ip: String,
    pub protocol: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: String,
}

/// STUN/TURN server entry for [`Handler::update_ice_servers`](crate::handler::Handler::update_ice_servers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Initially requested number of outgoing/incoming SCTP streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct NumSctpStreams {
    pub os: u16,
    pub mis: u16,
}

impl Default for NumSctpStreams {
    fn default() -> Self {
        Self { os: 1024, mis: 1024 }
    }
}

/// SCTP capability set of an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpCapabilities {
    pub num_streams: NumSctpStreams,
}

/// Negotiated SCTP association parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct SctpParameters {
    pub port: u16,
    pub os: u16,
    pub mis: u16,
    #[serde(rename = "maxMessageSize")]
    pub max_message_size: u32,
}

/// Stream-level parameters of one SCTP data channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SctpStreamParameters {
    pub stream_id: u16,
    #[serde(default = "default_true")]
    pub ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packet_life_time: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retransmits: Option<u16>,
}

/// Transport connection state reported via `@connectionstatechange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Failed,
    Disconnected,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extended_caps(with_rtx: bool) -> ExtendedRtpCapabilities {
        ExtendedRtpCapabilities {
            codecs: vec![
                ExtendedRtpCodec {
                    kind: MediaKind::Audio,
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: Some(2),
                    local_payload_type: 111,
                    remote_payload_type: 100,
                    local_rtx_payload_type: None,
                    parameters: BTreeMap::new(),
                    rtcp_feedback: Vec::new(),
                },
                ExtendedRtpCodec {
                    kind: MediaKind::Video,
                    mime_type: "video/VP8".to_string(),
                    clock_rate: 90000,
                    channels: None,
                    local_payload_type: 96,
                    remote_payload_type: 101,
                    local_rtx_payload_type: with_rtx.then_some(97),
                    parameters: BTreeMap::new(),
                    rtcp_feedback: vec![RtcpFeedback {
                        kind: "nack".to_string(),
                        parameter: None,
                    }],
                },
            ],
            header_extensions: vec![
                ExtendedRtpHeaderExtension {
                    kind: MediaKind::Audio,
                    uri: "urn:ietf:params:rtp-hdrext:ssrc-audio-level".to_string(),
                    send_id: 1,
                },
                ExtendedRtpHeaderExtension {
                    kind: MediaKind::Video,
                    uri: "urn:3gpp:video-orientation".to_string(),
                    send_id: 4,
                },
            ],
        }
    }

    #[test]
    fn template_filters_by_kind() {
        let params = sending_rtp_parameters(MediaKind::Audio, &extended_caps(true));
        assert_eq!(params.codecs.len(), 1);
        assert_eq!(params.codecs[0].mime_type, "audio/opus");
        assert_eq!(params.codecs[0].payload_type, 111);
        assert_eq!(params.header_extensions.len(), 1);
        assert_eq!(params.header_extensions[0].id, 1);
        assert!(params.encodings.is_empty());
        assert!(params.mid.is_none());
    }

    #[test]
    fn template_synthesizes_rtx_codec() {
        let params = sending_rtp_parameters(MediaKind::Video, &extended_caps(true));
        assert_eq!(params.codecs.len(), 2);
        let rtx = &params.codecs[1];
        assert_eq!(rtx.mime_type, "video/rtx");
        assert_eq!(rtx.payload_type, 97);
        assert!(rtx.is_rtx());
        assert_eq!(rtx.parameters.get("apt"), Some(&serde_json::Value::from(96)));
    }

    #[test]
    fn template_without_rtx() {
        let params = sending_rtp_parameters(MediaKind::Video, &extended_caps(false));
        assert_eq!(params.codecs.len(), 1);
        assert!(!params.codecs.iter().any(RtpCodecParameters::is_rtx));
    }

    #[test]
    fn rtx_detection_is_case_insensitive() {
        let mut codec = RtpCodecParameters {
            mime_type: "video/RTX".to_string(),
            payload_type: 97,
            clock_rate: 90000,
            channels: None,
            parameters: BTreeMap::new(),
            rtcp_feedback: Vec::new(),
        };
        assert!(codec.is_rtx());
        codec.mime_type = "video/VP8".to_string();
        assert!(!codec.is_rtx());
    }

    #[test]
    fn parameters_roundtrip_as_json() {
        let params = sending_rtp_parameters(MediaKind::Video, &extended_caps(true));
        let json = serde_json::to_string(&params).expect("serialize");
        let back: RtpParameters = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, params);
    }

    #[test]
    fn encoding_defaults_to_active() {
        let encoding: RtpEncodingParameters = serde_json::from_str("{}").expect("deserialize");
        assert!(encoding.active);
        assert!(encoding.ssrc.is_none());
        assert!(encoding.rtx.is_none());
    }
}
