//! Deterministic in-memory reference handler.
//!
//! [`FakeHandler`] exercises the whole Handler Interface Protocol without
//! touching the network: the transport-setup handshake is real (emitted on
//! the control channel and settled by the session layer), the id counters,
//! template cloning and SSRC assignment are real, and only the media path
//! itself is absent. It is both the test double for the session layer and
//! the executable reference for what a native handler must do.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};
use rand::RngExt;

use crate::data_channel::DataChannel;
use crate::error::{Error, Result};
use crate::events::{Completion, EventEmitter};
use crate::rtp::{
    ConnectionState, DtlsFingerprint, DtlsParameters, DtlsRole, IceParameters, IceServer,
    MediaKind, RtcpFeedback, RtcpParameters, RtpCapabilities, RtpCodecCapability,
    RtpCodecParameters, RtpEncodingParameters, RtpHeaderExtension, RtpParameters, RtxParameters,
    SctpCapabilities, SctpStreamParameters, sending_rtp_parameters,
};
use crate::stats::StatsReport;
use crate::track::MediaTrack;

use super::{
    DataChannelOptions, DtlsRolePolicy, Handler, HandlerControlEvent, HandlerReceiveOptions,
    HandlerReceiveResult, HandlerRunOptions, HandlerSendOptions, HandlerSendResult,
    ReceiveDataChannelOptions, SendDataChannelResult, TransportSetupState,
};

/// Static parameters a [`FakeHandler`] reports as its native engine
/// capabilities and local DTLS identity.
#[derive(Debug, Clone)]
pub struct FakeParameters {
    pub native_rtp_capabilities: RtpCapabilities,
    pub native_sctp_capabilities: SctpCapabilities,
    pub local_dtls_parameters: DtlsParameters,
}

impl Default for FakeParameters {
    /// Opus + VP8 capability fixture with a placeholder DTLS fingerprint.
    fn default() -> Self {
        Self {
            native_rtp_capabilities: RtpCapabilities {
                codecs: vec![
                    RtpCodecCapability {
                        kind: MediaKind::Audio,
                        mime_type: "audio/opus".to_string(),
                        preferred_payload_type: Some(111),
                        clock_rate: 48000,
                        channels: Some(2),
                        parameters: Default::default(),
                        rtcp_feedback: Vec::new(),
                    },
                    RtpCodecCapability {
                        kind: MediaKind::Video,
                        mime_type: "video/VP8".to_string(),
                        preferred_payload_type: Some(96),
                        clock_rate: 90000,
                        channels: None,
                        parameters: Default::default(),
                        rtcp_feedback: vec![RtcpFeedback {
                            kind: "nack".to_string(),
                            parameter: None,
                        }],
                    },
                    RtpCodecCapability {
                        kind: MediaKind::Video,
                        mime_type: "video/rtx".to_string(),
                        preferred_payload_type: Some(97),
                        clock_rate: 90000,
                        channels: None,
                        parameters: Default::default(),
                        rtcp_feedback: Vec::new(),
                    },
                ],
                header_extensions: vec![
                    RtpHeaderExtension {
                        kind: MediaKind::Audio,
                        uri: "urn:ietf:params:rtp-hdrext:ssrc-audio-level".to_string(),
                        preferred_id: 1,
                    },
                    RtpHeaderExtension {
                        kind: MediaKind::Video,
                        uri: "urn:3gpp:video-orientation".to_string(),
                        preferred_id: 4,
                    },
                ],
            },
            native_sctp_capabilities: SctpCapabilities::default(),
            local_dtls_parameters: DtlsParameters {
                role: DtlsRole::Auto,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: "00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF".to_string(),
                }],
            },
        }
    }
}

struct State {
    setup: TransportSetupState,
    run_called: bool,
    closed: bool,
    // Per-kind generic outbound templates, computed once by run().
    send_templates: HashMap<MediaKind, RtpParameters>,
    next_local_id: u64,
    next_sctp_stream_id: u16,
    // None = local id still allocated but track detached via replace_track.
    tracks: HashMap<String, Option<MediaTrack>>,
}

/// In-memory reference implementation of [`Handler`].
pub struct FakeHandler {
    parameters: FakeParameters,
    role_policy: DtlsRolePolicy,
    // Locally generated RTCP CNAME, stable for the handler's lifetime.
    cname: String,
    control: EventEmitter<HandlerControlEvent>,
    state: Mutex<State>,
    setup_changed: Condvar,
}

impl FakeHandler {
    pub fn new(parameters: FakeParameters) -> Self {
        Self::with_role_policy(parameters, DtlsRolePolicy::default())
    }

    /// Create a handler with a non-default DTLS role policy.
    pub fn with_role_policy(parameters: FakeParameters, role_policy: DtlsRolePolicy) -> Self {
        let cname = format!("CNAME-{}", rand::rng().random::<u32>());
        tracing::debug!(%cname, "fake handler created");
        Self {
            parameters,
            role_policy,
            cname,
            control: EventEmitter::new(),
            state: Mutex::new(State {
                setup: TransportSetupState::NotReady,
                run_called: false,
                closed: false,
                send_templates: HashMap::new(),
                next_local_id: 1,
                next_sctp_stream_id: 0,
                tracks: HashMap::new(),
            }),
            setup_changed: Condvar::new(),
        }
    }

    /// RTCP canonical name this handler stamps into outbound parameters.
    pub fn cname(&self) -> &str {
        &self.cname
    }

    /// Current transport-setup handshake state.
    pub fn transport_setup_state(&self) -> TransportSetupState {
        self.state.lock().setup
    }

    /// Simulate a transport connection-state change (test hook).
    pub fn set_connection_state(&self, connection_state: ConnectionState) {
        self.control.safe_emit(
            "@connectionstatechange",
            &HandlerControlEvent::ConnectionStateChange(connection_state),
        );
    }

    fn check_open_and_run(&self) -> Result<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::InvalidState("handler closed"));
        }
        if !state.run_called {
            return Err(Error::Programming("run() has not been called"));
        }
        Ok(())
    }

    /// Perform the one-time transport-setup handshake, serializing
    /// concurrent first operations on the `NotReady -> Connecting`
    /// transition. On rejection the state returns to `NotReady` and a
    /// blocked waiter (or the next operation) re-attempts.
    fn ensure_transport(&self, role: DtlsRole) -> Result<()> {
        {
            let mut state = self.state.lock();
            loop {
                match state.setup {
                    TransportSetupState::Ready => return Ok(()),
                    TransportSetupState::NotReady => {
                        state.setup = TransportSetupState::Connecting;
                        break;
                    }
                    TransportSetupState::Connecting => {
                        self.setup_changed.wait(&mut state);
                    }
                }
            }
        }

        let mut dtls_parameters = self.parameters.local_dtls_parameters.clone();
        dtls_parameters.role = role;
        tracing::debug!(?role, "transport setup handshake starting");

        self.control.safe_emit(
            "@connectionstatechange",
            &HandlerControlEvent::ConnectionStateChange(ConnectionState::Connecting),
        );

        let completion: Completion<()> = Completion::new();
        let had_listener = self.control.safe_emit(
            "@connect",
            &HandlerControlEvent::Connect {
                dtls_parameters,
                completion: completion.clone(),
            },
        );

        let outcome = if had_listener {
            completion.wait()
        } else {
            // Nobody to settle the completion; waiting would hang forever.
            Err(Error::ConnectionRejected(
                "no @connect listener registered".to_string(),
            ))
        };

        let mut state = self.state.lock();
        match &outcome {
            Ok(()) => {
                state.setup = TransportSetupState::Ready;
                tracing::debug!("transport setup complete");
            }
            Err(error) => {
                state.setup = TransportSetupState::NotReady;
                tracing::debug!(%error, "transport setup rejected");
            }
        }
        self.setup_changed.notify_all();
        outcome
    }

    fn known_id(state: &State, local_id: &str) -> Result<()> {
        if state.tracks.contains_key(local_id) {
            Ok(())
        } else {
            Err(Error::NotFound(local_id.to_string()))
        }
    }
}

impl Handler for FakeHandler {
    fn name(&self) -> &'static str {
        "FakeHandler"
    }

    fn control_events(&self) -> &EventEmitter<HandlerControlEvent> {
        &self.control
    }

    fn native_rtp_capabilities(&self) -> RtpCapabilities {
        self.parameters.native_rtp_capabilities.clone()
    }

    fn native_sctp_capabilities(&self) -> SctpCapabilities {
        self.parameters.native_sctp_capabilities
    }

    fn run(&self, options: HandlerRunOptions) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::InvalidState("handler closed"));
        }
        if state.run_called {
            return Err(Error::Programming("run() already called"));
        }
        state.run_called = true;
        for kind in [MediaKind::Audio, MediaKind::Video] {
            state.send_templates.insert(
                kind,
                sending_rtp_parameters(kind, &options.extended_rtp_capabilities),
            );
        }
        tracing::debug!(direction = ?options.direction, "handler running");
        Ok(())
    }

    fn update_ice_servers(&self, ice_servers: Vec<IceServer>) -> Result<()> {
        tracing::debug!(count = ice_servers.len(), "update_ice_servers()");
        Ok(())
    }

    fn restart_ice(&self, _ice_parameters: IceParameters) -> Result<()> {
        tracing::debug!("restart_ice()");
        Ok(())
    }

    fn send(&self, options: HandlerSendOptions) -> Result<HandlerSendResult> {
        self.check_open_and_run()?;
        self.ensure_transport(self.role_policy.send)?;

        let mut state = self.state.lock();
        let kind = options.track.kind();
        let template = state
            .send_templates
            .get(&kind)
            .cloned()
            .ok_or(Error::Programming("no send template for kind"))?;

        let mut rtp_parameters = template;
        let use_rtx = rtp_parameters.codecs.iter().any(RtpCodecParameters::is_rtx);

        rtp_parameters.mid = Some(format!("mid-{}", rand::rng().random::<u32>()));

        let mut encodings = if options.encodings.is_empty() {
            vec![RtpEncodingParameters::default()]
        } else {
            options.encodings
        };
        for encoding in &mut encodings {
            encoding.ssrc = Some(rand::rng().random::<u32>());
            if use_rtx {
                encoding.rtx = Some(RtxParameters {
                    ssrc: rand::rng().random::<u32>(),
                });
            }
        }
        rtp_parameters.encodings = encodings;
        rtp_parameters.rtcp = RtcpParameters {
            cname: Some(self.cname.clone()),
            reduced_size: true,
            mux: true,
        };

        let local_id = state.next_local_id.to_string();
        state.next_local_id += 1;
        state.tracks.insert(local_id.clone(), Some(options.track));

        tracing::debug!(local_id = %local_id, %kind, use_rtx, "send flow created");
        Ok(HandlerSendResult {
            local_id,
            rtp_parameters,
        })
    }

    fn stop_sending(&self, local_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.tracks.remove(local_id).is_none() {
            return Err(Error::NotFound(local_id.to_string()));
        }
        tracing::debug!(local_id, "send flow stopped");
        Ok(())
    }

    fn replace_track(&self, local_id: &str, track: Option<MediaTrack>) -> Result<()> {
        let mut state = self.state.lock();
        Self::known_id(&state, local_id)?;
        tracing::debug!(
            local_id,
            has_track = track.is_some(),
            "track replaced"
        );
        state.tracks.insert(local_id.to_string(), track);
        Ok(())
    }

    fn set_max_spatial_layer(&self, local_id: &str, spatial_layer: u8) -> Result<()> {
        let state = self.state.lock();
        Self::known_id(&state, local_id)?;
        tracing::debug!(local_id, spatial_layer, "set_max_spatial_layer()");
        Ok(())
    }

    fn set_rtp_encoding_parameters(
        &self,
        local_id: &str,
        params: RtpEncodingParameters,
    ) -> Result<()> {
        let state = self.state.lock();
        Self::known_id(&state, local_id)?;
        tracing::debug!(local_id, ?params, "set_rtp_encoding_parameters()");
        Ok(())
    }

    fn get_sender_stats(&self, _local_id: &str) -> Result<StatsReport> {
        Ok(StatsReport::new())
    }

    fn get_receiver_stats(&self, _local_id: &str) -> Result<StatsReport> {
        Ok(StatsReport::new())
    }

    fn get_transport_stats(&self) -> Result<StatsReport> {
        Ok(StatsReport::new())
    }

    fn send_data_channel(&self, options: DataChannelOptions) -> Result<SendDataChannelResult> {
        self.check_open_and_run()?;
        self.ensure_transport(self.role_policy.send)?;

        let stream_id = {
            let mut state = self.state.lock();
            let id = state.next_sctp_stream_id;
            state.next_sctp_stream_id += 1;
            id
        };

        tracing::debug!(stream_id, label = %options.label, "send data channel created");
        let data_channel = DataChannel::new(
            stream_id,
            options.ordered,
            options.max_packet_life_time,
            options.max_retransmits,
            options.label,
            options.protocol,
        );
        Ok(SendDataChannelResult {
            data_channel,
            sctp_stream_parameters: SctpStreamParameters {
                stream_id,
                ordered: options.ordered,
                max_packet_life_time: options.max_packet_life_time,
                max_retransmits: options.max_retransmits,
            },
        })
    }

    fn receive_data_channel(&self, options: ReceiveDataChannelOptions) -> Result<DataChannel> {
        self.check_open_and_run()?;
        self.ensure_transport(self.role_policy.receive)?;

        let params = options.sctp_stream_parameters;
        tracing::debug!(stream_id = params.stream_id, label = %options.label, "receive data channel created");
        Ok(DataChannel::new(
            params.stream_id,
            params.ordered,
            params.max_packet_life_time,
            params.max_retransmits,
            options.label,
            options.protocol,
        ))
    }

    fn receive(&self, options: Vec<HandlerReceiveOptions>) -> Result<Vec<HandlerReceiveResult>> {
        self.check_open_and_run()?;

        let mut results = Vec::with_capacity(options.len());
        for entry in options {
            self.ensure_transport(self.role_policy.receive)?;

            let mut state = self.state.lock();
            let local_id = state.next_local_id.to_string();
            state.next_local_id += 1;
            let track = MediaTrack::new(entry.kind);
            state.tracks.insert(local_id.clone(), Some(track.clone()));
            tracing::debug!(local_id = %local_id, remote_track_id = %entry.track_id, kind = %entry.kind, "receive flow created");
            results.push(HandlerReceiveResult { local_id, track });
        }
        Ok(results)
    }

    fn stop_receiving(&self, local_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.tracks.remove(local_id).is_none() {
            return Err(Error::NotFound(local_id.to_string()));
        }
        tracing::debug!(local_id, "receive flow stopped");
        Ok(())
    }

    fn pause_receiving(&self, local_ids: &[String]) -> Result<()> {
        let state = self.state.lock();
        for local_id in local_ids {
            Self::known_id(&state, local_id)?;
        }
        tracing::debug!(?local_ids, "pause_receiving()");
        Ok(())
    }

    fn resume_receiving(&self, local_ids: &[String]) -> Result<()> {
        let state = self.state.lock();
        for local_id in local_ids {
            Self::known_id(&state, local_id)?;
        }
        tracing::debug!(?local_ids, "resume_receiving()");
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.tracks.clear();
        tracing::debug!("handler closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::rtp::{ExtendedRtpCapabilities, ExtendedRtpCodec, ExtendedRtpHeaderExtension};

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
                    parameters: Default::default(),
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
                    parameters: Default::default(),
                    rtcp_feedback: Vec::new(),
                },
            ],
            header_extensions: vec![ExtendedRtpHeaderExtension {
                kind: MediaKind::Video,
                uri: "urn:3gpp:video-orientation".to_string(),
                send_id: 4,
            }],
        }
    }

    /// Handler with a session-layer stand-in that resolves every handshake
    /// and counts `@connect` emissions.
    fn running_handler(with_rtx: bool) -> (FakeHandler, Arc<AtomicUsize>) {
        let handler = FakeHandler::new(FakeParameters::default());
        let connects = Arc::new(AtomicUsize::new(0));
        let c = connects.clone();
        handler.control_events().on("@connect", move |event| {
            if let HandlerControlEvent::Connect { completion, .. } = event {
                c.fetch_add(1, Ordering::SeqCst);
                completion.resolve(());
            }
            Ok(())
        });
        handler
            .run(HandlerRunOptions {
                extended_rtp_capabilities: extended_caps(with_rtx),
                ..Default::default()
            })
            .expect("run");
        (handler, connects)
    }

    fn send_track(handler: &FakeHandler, kind: MediaKind) -> HandlerSendResult {
        handler
            .send(HandlerSendOptions {
                track: MediaTrack::new(kind),
                encodings: Vec::new(),
                codec_options: None,
                codec: None,
            })
            .expect("send")
    }

    #[test]
    fn send_before_run_is_programming_error() {
        let handler = FakeHandler::new(FakeParameters::default());
        let result = handler.send(HandlerSendOptions {
            track: MediaTrack::new(MediaKind::Audio),
            encodings: Vec::new(),
            codec_options: None,
            codec: None,
        });
        assert!(matches!(result, Err(Error::Programming(_))));
    }

    #[test]
    fn run_twice_is_programming_error() {
        let (handler, _) = running_handler(false);
        let result = handler.run(HandlerRunOptions::default());
        assert!(matches!(result, Err(Error::Programming(_))));
    }

    #[test]
    fn send_allocates_monotonic_ids_and_unique_ssrcs() {
        let (handler, _) = running_handler(false);

        let first = send_track(&handler, MediaKind::Audio);
        let second = send_track(&handler, MediaKind::Audio);

        assert_eq!(first.local_id, "1");
        assert_eq!(second.local_id, "2");
        assert_eq!(first.rtp_parameters.encodings.len(), 1);
        assert_eq!(second.rtp_parameters.encodings.len(), 1);
        assert_ne!(
            first.rtp_parameters.encodings[0].ssrc,
            second.rtp_parameters.encodings[0].ssrc
        );
        assert!(first.rtp_parameters.encodings[0].rtx.is_none());
        assert!(second.rtp_parameters.encodings[0].rtx.is_none());
    }

    #[test]
    fn send_with_rtx_codec_assigns_rtx_ssrcs() {
        let (handler, _) = running_handler(true);

        let result = handler
            .send(HandlerSendOptions {
                track: MediaTrack::new(MediaKind::Video),
                encodings: vec![
                    RtpEncodingParameters::default(),
                    RtpEncodingParameters::default(),
                ],
                codec_options: None,
                codec: None,
            })
            .expect("send");

        let encodings = &result.rtp_parameters.encodings;
        assert_eq!(encodings.len(), 2);
        let rtx_a = encodings[0].rtx.expect("rtx on first encoding");
        let rtx_b = encodings[1].rtx.expect("rtx on second encoding");
        assert_ne!(rtx_a.ssrc, rtx_b.ssrc);
        assert_ne!(Some(rtx_a.ssrc), encodings[0].ssrc);
    }

    #[test]
    fn send_fills_rtcp_and_mid() {
        let (handler, _) = running_handler(false);
        let result = send_track(&handler, MediaKind::Audio);
        let rtcp = &result.rtp_parameters.rtcp;
        assert_eq!(rtcp.cname.as_deref(), Some(handler.cname()));
        assert!(rtcp.reduced_size);
        assert!(rtcp.mux);
        assert!(
            result
                .rtp_parameters
                .mid
                .as_deref()
                .is_some_and(|mid| mid.starts_with("mid-"))
        );
    }

    #[test]
    fn handshake_runs_once_and_picks_direction_role() {
        let handler = FakeHandler::new(FakeParameters::default());
        let roles = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let r = roles.clone();
        handler.control_events().on("@connect", move |event| {
            if let HandlerControlEvent::Connect {
                dtls_parameters,
                completion,
            } = event
            {
                r.lock().push(dtls_parameters.role);
                completion.resolve(());
            }
            Ok(())
        });
        handler
            .run(HandlerRunOptions {
                extended_rtp_capabilities: extended_caps(false),
                ..Default::default()
            })
            .expect("run");

        send_track(&handler, MediaKind::Audio);
        send_track(&handler, MediaKind::Video);
        handler
            .receive(vec![HandlerReceiveOptions {
                track_id: "remote-1".to_string(),
                kind: MediaKind::Audio,
            }])
            .expect("receive");

        // First outbound use wins: one handshake, server role.
        assert_eq!(roles.lock().as_slice(), &[DtlsRole::Server]);
        assert_eq!(handler.transport_setup_state(), TransportSetupState::Ready);
    }

    #[test]
    fn first_receive_uses_client_role() {
        let (handler, _) = running_handler(false);
        let roles = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let r = roles.clone();
        handler.control_events().prepend("@connect", move |event| {
            if let HandlerControlEvent::Connect { dtls_parameters, .. } = event {
                r.lock().push(dtls_parameters.role);
            }
            Ok(())
        });

        handler
            .receive(vec![HandlerReceiveOptions {
                track_id: "remote-1".to_string(),
                kind: MediaKind::Video,
            }])
            .expect("receive");

        assert_eq!(roles.lock().as_slice(), &[DtlsRole::Client]);
    }

    #[test]
    fn rejected_handshake_fails_send_and_allows_retry() {
        let handler = FakeHandler::new(FakeParameters::default());
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        handler.control_events().on("@connect", move |event| {
            if let HandlerControlEvent::Connect { completion, .. } = event {
                // Reject the first attempt only.
                if a.fetch_add(1, Ordering::SeqCst) == 0 {
                    completion.reject(Error::ConnectionRejected("remote refused".to_string()));
                } else {
                    completion.resolve(());
                }
            }
            Ok(())
        });
        handler
            .run(HandlerRunOptions {
                extended_rtp_capabilities: extended_caps(false),
                ..Default::default()
            })
            .expect("run");

        let failed = handler.send(HandlerSendOptions {
            track: MediaTrack::new(MediaKind::Audio),
            encodings: Vec::new(),
            codec_options: None,
            codec: None,
        });
        assert!(matches!(failed, Err(Error::ConnectionRejected(_))));
        assert_eq!(
            handler.transport_setup_state(),
            TransportSetupState::NotReady
        );

        send_track(&handler, MediaKind::Audio);
        assert_eq!(handler.transport_setup_state(), TransportSetupState::Ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_first_operations_share_one_handshake() {
        let (handler, connects) = running_handler(false);
        let handler = Arc::new(handler);

        let mut workers = Vec::new();
        for _ in 0..4 {
            let handler = handler.clone();
            workers.push(std::thread::spawn(move || {
                send_track(&handler, MediaKind::Audio);
            }));
        }
        for worker in workers {
            worker.join().expect("worker");
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_instances_are_independent() {
        let (first, first_connects) = running_handler(false);
        let (second, second_connects) = running_handler(false);

        assert_ne!(first.cname(), second.cname());
        assert_eq!(send_track(&first, MediaKind::Audio).local_id, "1");
        assert_eq!(send_track(&second, MediaKind::Audio).local_id, "1");
        assert_eq!(first_connects.load(Ordering::SeqCst), 1);
        assert_eq!(second_connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_sending_unknown_id_is_not_found() {
        let (handler, _) = running_handler(false);
        assert!(matches!(
            handler.stop_sending("999"),
            Err(Error::NotFound(_))
        ));

        let result = send_track(&handler, MediaKind::Audio);
        handler.stop_sending(&result.local_id).expect("stop");
        // Stopping twice hits the same not-found path.
        assert!(matches!(
            handler.stop_sending(&result.local_id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn replace_track_keeps_id_alive() {
        let (handler, _) = running_handler(false);
        let result = send_track(&handler, MediaKind::Video);

        handler
            .replace_track(&result.local_id, Some(MediaTrack::new(MediaKind::Video)))
            .expect("replace");
        handler.replace_track(&result.local_id, None).expect("detach");
        // Id still allocated after detaching the track.
        handler
            .set_max_spatial_layer(&result.local_id, 1)
            .expect("spatial layer");
        assert!(matches!(
            handler.replace_track("999", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn receive_creates_tracks_and_ids() {
        let (handler, _) = running_handler(false);
        let results = handler
            .receive(vec![
                HandlerReceiveOptions {
                    track_id: "remote-audio".to_string(),
                    kind: MediaKind::Audio,
                },
                HandlerReceiveOptions {
                    track_id: "remote-video".to_string(),
                    kind: MediaKind::Video,
                },
            ])
            .expect("receive");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].local_id, "1");
        assert_eq!(results[1].local_id, "2");
        assert_eq!(results[0].track.kind(), MediaKind::Audio);
        assert_eq!(results[1].track.kind(), MediaKind::Video);

        let ids = vec![results[0].local_id.clone(), results[1].local_id.clone()];
        handler.pause_receiving(&ids).expect("pause");
        handler.resume_receiving(&ids).expect("resume");
        handler.stop_receiving(&results[0].local_id).expect("stop");
        assert!(matches!(
            handler.stop_receiving(&results[0].local_id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn stats_are_empty_reports() {
        let (handler, _) = running_handler(false);
        assert!(handler.get_transport_stats().expect("transport").is_empty());
        assert!(handler.get_sender_stats("1").expect("sender").is_empty());
        assert!(handler.get_receiver_stats("1").expect("receiver").is_empty());
    }

    #[test]
    fn data_channel_stream_ids_increase() {
        let (handler, _) = running_handler(false);

        let first = handler
            .send_data_channel(DataChannelOptions {
                ordered: true,
                label: "chat".to_string(),
                ..Default::default()
            })
            .expect("first channel");
        let second = handler
            .send_data_channel(DataChannelOptions {
                ordered: false,
                max_retransmits: Some(3),
                label: "file".to_string(),
                ..Default::default()
            })
            .expect("second channel");

        assert_eq!(first.data_channel.id(), 0);
        assert_eq!(first.sctp_stream_parameters.stream_id, 0);
        assert_eq!(second.data_channel.id(), 1);
        assert_eq!(second.sctp_stream_parameters.stream_id, 1);
        assert!(!second.sctp_stream_parameters.ordered);
        assert_eq!(second.sctp_stream_parameters.max_retransmits, Some(3));

        let received = handler
            .receive_data_channel(ReceiveDataChannelOptions {
                sctp_stream_parameters: second.sctp_stream_parameters,
                label: "file".to_string(),
                protocol: String::new(),
            })
            .expect("receive channel");
        assert_eq!(received.id(), 1);
    }

    #[test]
    fn close_is_idempotent_and_blocks_operations() {
        let (handler, _) = running_handler(false);
        handler.close();
        handler.close();
        let result = handler.send(HandlerSendOptions {
            track: MediaTrack::new(MediaKind::Audio),
            encodings: Vec::new(),
            codec_options: None,
            codec: None,
        });
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn no_connect_listener_fails_instead_of_hanging() {
        let handler = FakeHandler::new(FakeParameters::default());
        handler
            .run(HandlerRunOptions {
                extended_rtp_capabilities: extended_caps(false),
                ..Default::default()
            })
            .expect("run");

        let result = handler.send(HandlerSendOptions {
            track: MediaTrack::new(MediaKind::Audio),
            encodings: Vec::new(),
            codec_options: None,
            codec: None,
        });
        assert!(matches!(result, Err(Error::ConnectionRejected(_))));
        assert_eq!(
            handler.transport_setup_state(),
            TransportSetupState::NotReady
        );
    }
}
