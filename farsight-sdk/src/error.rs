//! Error taxonomy shared across the SDK and the hub.

use thiserror::Error;

/// A frame that could not be decoded, or a message that arrived in a
/// state where it makes no sense. The offending frame is dropped; the
/// connection stays up.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown {kind} tag {value}")]
    UnknownTag { kind: &'static str, value: u8 },

    #[error("unexpected {0} in the current state")]
    Unexpected(&'static str),

    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },
}

/// Errors surfaced by the peer session core to its embedder.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("signaling transport: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub answered with `Info.Error` (invalid token, busy host,
    /// denied join). Ends the session from the peer's point of view.
    #[error("hub rejected the request: {0}")]
    Policy(String),

    #[error(transparent)]
    Rtc(#[from] RtcError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("session core is shut down")]
    Closed,
}

/// Errors from the delegated WebRTC engine.
#[derive(Debug, Error)]
pub enum RtcError {
    #[error("rtc engine: {0}")]
    Engine(String),

    #[error("no active peer connection")]
    NoConnection,
}

/// Errors from the media capture/playback collaborators.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media pipeline: {0}")]
    Pipeline(String),

    #[error("pipeline is not running")]
    NotRunning,
}

/// Startup-only configuration failures. These terminate startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported codec {0:?} (expected video/H264, video/VP8 or video/VP9)")]
    UnsupportedCodec(String),

    #[error("ICE server URL must use a stun: or turn: scheme, got {0:?}")]
    BadIceScheme(String),

    #[error("TURN URLs require credentials in the form user:pass (--creds)")]
    MissingTurnCreds,

    #[error("TURN credentials must be in the form user:pass")]
    MalformedTurnCreds,

    #[error("STUN URLs take no credentials, but --creds was given")]
    UnexpectedCreds,

    #[error("signaling hub URL must use ws:// or wss://, got {0:?}")]
    BadHubUrl(String),
}
