//! Seam to the delegated WebRTC engine.
//!
//! The session core never touches SDP or ICE internals; it shuttles
//! opaque byte blobs between the signaling channel and an engine living
//! behind [`RtcController`]. The engine reports its side of the world
//! (found candidates, transport state, data-channel traffic, inbound
//! track frames) on a bounded [`RtcEvent`] channel the core selects on.

use tokio::sync::mpsc;

use crate::config::{IceServer, VideoCodec};
use crate::error::RtcError;

/// Capacity of the engine → core event channel. Bounded so a bursty
/// engine gets backpressure instead of unbounded buffering.
pub const RTC_EVENT_BUFFER: usize = 32;

/// Events the engine feeds back into the session core.
#[derive(Debug)]
pub enum RtcEvent {
    /// A local ICE candidate was gathered (JSON bytes, opaque).
    Candidate(Vec<u8>),

    /// The peer transport reached the connected state.
    TransportConnected,

    /// The peer transport failed or closed underneath us.
    TransportClosed { reason: String },

    /// Remote side opened the input data channel (host side observes
    /// this; remote side observes its own channel opening).
    ChannelOpen,

    /// A payload arrived on the data channel (host side: serialized
    /// input events).
    ChannelMessage(Vec<u8>),

    /// The remote video track started (remote side). Carries what
    /// playback needs to configure itself.
    TrackStarted { payload_type: u8, codec: VideoCodec },

    /// One depacketized frame buffer from the remote track.
    TrackFrame(Vec<u8>),
}

/// An opaque sample sink the capture pipeline writes encoded video
/// into. On a real engine this wraps the outbound video track.
pub trait SampleSink: Send {
    fn write_sample(&mut self, sample: &[u8]) -> Result<(), RtcError>;
}

/// Handle to one live peer connection inside the engine.
pub trait RtcController: Send + Sync {
    /// Create an offer and set it as the local description; returns the
    /// serialized SDP to put on the wire.
    fn create_offer(&mut self) -> Result<Vec<u8>, RtcError>;

    /// Create an answer and set it as the local description; returns
    /// the serialized SDP to put on the wire.
    fn create_answer(&mut self) -> Result<Vec<u8>, RtcError>;

    fn set_remote_description(&mut self, sdp: &[u8]) -> Result<(), RtcError>;

    fn has_remote_description(&self) -> bool;

    fn add_ice_candidate(&mut self, candidate: &[u8]) -> Result<(), RtcError>;

    /// True once local candidate gathering has completed; the outbound
    /// drain stops when this flips.
    fn gathering_complete(&self) -> bool;

    /// Send a payload over the input data channel (remote side).
    fn send_input(&mut self, payload: &[u8]) -> Result<(), RtcError>;

    fn close(&mut self);
}

/// A host-side connection: the controller plus the video track the
/// capture pipeline feeds.
pub struct HostSession {
    pub controller: Box<dyn RtcController>,
    pub video_track: Box<dyn SampleSink>,
}

/// Builds peer connections. One factory per peer process; the core asks
/// for a host or remote session when negotiation starts.
pub trait RtcFactory: Send + Sync {
    /// Send-only video session for the host role.
    fn host_session(
        &mut self,
        ice: &IceServer,
        codec: VideoCodec,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<HostSession, RtcError>;

    /// Recv-only video session with an input data channel, for the
    /// remote role.
    fn remote_session(
        &mut self,
        ice: &IceServer,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<Box<dyn RtcController>, RtcError>;
}
