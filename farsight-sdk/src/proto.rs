//! Wire format for the signaling channel.
//!
//! Every frame is a self-describing JSON object with three fields:
//! `event` (the outer type tag), `from` (set by the hub when relaying,
//! ignored on ingress from clients) and `data` (a nested envelope with
//! its own `event` tag). Decoders reject unknown tags instead of
//! defaulting; see [`ProtocolError`].
//!
//! Frames larger than [`MAX_FRAME_LEN`] are refused outright so a
//! misbehaving endpoint cannot balloon the peer's memory. SDP blobs are
//! the largest legitimate payload and stay well under the cap.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Upper bound on an encoded frame, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

macro_rules! wire_tag {
    ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                v as u8
            }
        }
        impl TryFrom<u8> for $name {
            type Error = ProtocolError;
            fn try_from(v: u8) -> Result<Self, ProtocolError> {
                match v {
                    $($value => Ok($name::$variant),)+
                    value => Err(ProtocolError::UnknownTag { kind: stringify!($name), value }),
                }
            }
        }
    };
}

/// Outer frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FrameKind {
    Session = 0,
    Signal = 1,
    Command = 2,
    Info = 3,
    /// Reserved for a future control surface; carried opaquely.
    Api = 4,
}

wire_tag!(FrameKind { Session = 0, Signal = 1, Command = 2, Info = 3, Api = 4 });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SessionKind {
    JoinRequest = 0,
    JoinResponse = 1,
    Leave = 2,
}

wire_tag!(SessionKind { JoinRequest = 0, JoinResponse = 1, Leave = 2 });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SignalKind {
    Ice = 0,
    Offer = 1,
    Answer = 2,
}

wire_tag!(SignalKind { Ice = 0, Offer = 1, Answer = 2 });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CommandKind {
    InitiateSession = 0,
    TerminateSession = 1,
}

wire_tag!(CommandKind { InitiateSession = 0, TerminateSession = 1 });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum InfoKind {
    Token = 0,
    Register = 1,
    Renew = 2,
    Ack = 3,
    Error = 4,
}

wire_tag!(InfoKind { Token = 0, Register = 1, Renew = 2, Ack = 3, Error = 4 });

/// Host's verdict on a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum JoinAnswer {
    Allow = 0,
    Deny = 1,
}

wire_tag!(JoinAnswer { Allow = 0, Deny = 1 });

/// `Session` envelope: the join-request handshake and room departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMsg {
    #[serde(rename = "event")]
    pub kind: SessionKind,
    /// Session token of the room concerned. Empty on `Leave`.
    #[serde(default)]
    pub token: String,
    /// Only meaningful on `JoinResponse`. Absent on the wire means
    /// `Allow` to legacy readers; the typed model keeps the option so
    /// encoding round-trips exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JoinAnswer>,
}

/// `Signal` envelope: ICE candidates and SDP blobs, opaque to the core.
/// The payload bytes ride as base64 inside the JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMsg {
    #[serde(rename = "event")]
    pub kind: SignalKind,
    #[serde(with = "b64")]
    pub data: Vec<u8>,
}

/// `Command` envelope: hub-issued session directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMsg {
    #[serde(rename = "event")]
    pub kind: CommandKind,
}

/// `Info` envelope: registration, token hand-out and renewal, acks and
/// errors. `user_id`/`device_id` ride only on `Register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMsg {
    #[serde(rename = "event")]
    pub kind: InfoKind,
    #[serde(default)]
    pub data: String,
    #[serde(rename = "userID", default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(rename = "deviceID", default, skip_serializing_if = "String::is_empty")]
    pub device_id: String,
}

/// Decoded inner envelope of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Session(SessionMsg),
    Signal(SignalMsg),
    Command(CommandMsg),
    Info(InfoMsg),
    /// Reserved tag 4; the payload is kept verbatim.
    Api(serde_json::Value),
}

/// One frame on the signaling channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Originating peer id, annotated by the hub when relaying.
    pub from: Option<String>,
    pub payload: Payload,
}

#[derive(Serialize, Deserialize)]
struct WireFrame {
    event: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    data: serde_json::Value,
}

impl Frame {
    pub fn session(kind: SessionKind, token: impl Into<String>, response: Option<JoinAnswer>) -> Self {
        Self {
            from: None,
            payload: Payload::Session(SessionMsg { kind, token: token.into(), response }),
        }
    }

    pub fn signal(kind: SignalKind, data: Vec<u8>) -> Self {
        Self { from: None, payload: Payload::Signal(SignalMsg { kind, data }) }
    }

    pub fn command(kind: CommandKind) -> Self {
        Self { from: None, payload: Payload::Command(CommandMsg { kind }) }
    }

    pub fn info(kind: InfoKind, data: impl Into<String>) -> Self {
        Self {
            from: None,
            payload: Payload::Info(InfoMsg {
                kind,
                data: data.into(),
                user_id: String::new(),
                device_id: String::new(),
            }),
        }
    }

    /// The registration frame a peer sends right after connecting.
    pub fn register(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            from: None,
            payload: Payload::Info(InfoMsg {
                kind: InfoKind::Register,
                data: String::new(),
                user_id: user_id.into(),
                device_id: device_id.into(),
            }),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match &self.payload {
            Payload::Session(_) => FrameKind::Session,
            Payload::Signal(_) => FrameKind::Signal,
            Payload::Command(_) => FrameKind::Command,
            Payload::Info(_) => FrameKind::Info,
            Payload::Api(_) => FrameKind::Api,
        }
    }

    /// Short outer/inner tag description for log lines.
    pub fn describe(&self) -> &'static str {
        match &self.payload {
            Payload::Session(m) => match m.kind {
                SessionKind::JoinRequest => "Session/JoinRequest",
                SessionKind::JoinResponse => "Session/JoinResponse",
                SessionKind::Leave => "Session/Leave",
            },
            Payload::Signal(m) => match m.kind {
                SignalKind::Ice => "Signal/ICE",
                SignalKind::Offer => "Signal/Offer",
                SignalKind::Answer => "Signal/Answer",
            },
            Payload::Command(m) => match m.kind {
                CommandKind::InitiateSession => "Command/InitiateSession",
                CommandKind::TerminateSession => "Command/TerminateSession",
            },
            Payload::Info(m) => match m.kind {
                InfoKind::Token => "Info/Token",
                InfoKind::Register => "Info/Register",
                InfoKind::Renew => "Info/Renew",
                InfoKind::Ack => "Info/Ack",
                InfoKind::Error => "Info/Error",
            },
            Payload::Api(_) => "API",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let data = match &self.payload {
            Payload::Session(m) => serde_json::to_value(m)?,
            Payload::Signal(m) => serde_json::to_value(m)?,
            Payload::Command(m) => serde_json::to_value(m)?,
            Payload::Info(m) => serde_json::to_value(m)?,
            Payload::Api(v) => v.clone(),
        };
        let wire = WireFrame { event: self.kind().into(), from: self.from.clone(), data };
        Ok(serde_json::to_string(&wire)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::Oversized { len: text.len(), limit: MAX_FRAME_LEN });
        }
        let wire: WireFrame = serde_json::from_str(text)?;
        let payload = match FrameKind::try_from(wire.event)? {
            FrameKind::Session => Payload::Session(serde_json::from_value(wire.data)?),
            FrameKind::Signal => Payload::Signal(serde_json::from_value(wire.data)?),
            FrameKind::Command => Payload::Command(serde_json::from_value(wire.data)?),
            FrameKind::Info => Payload::Info(serde_json::from_value(wire.data)?),
            FrameKind::Api => Payload::Api(wire.data),
        };
        Ok(Self { from: wire.from, payload })
    }
}

/// Go peers serialize `[]byte` fields as standard base64 strings; match
/// that on the wire while keeping `Vec<u8>` in the typed model.
mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: &Frame) -> Frame {
        let text = frame.encode().expect("encode");
        Frame::decode(&text).expect("decode")
    }

    #[test]
    fn session_roundtrip() {
        for frame in [
            Frame::session(SessionKind::JoinRequest, "tok-1", None),
            Frame::session(SessionKind::JoinResponse, "tok-1", Some(JoinAnswer::Allow)),
            Frame::session(SessionKind::JoinResponse, "tok-1", Some(JoinAnswer::Deny)),
            Frame::session(SessionKind::Leave, "", None),
        ] {
            assert_eq!(roundtrip(&frame), frame);
        }
    }

    #[test]
    fn signal_payload_rides_base64() {
        let frame = Frame::signal(SignalKind::Offer, b"{\"sdp\":\"v=0\"}".to_vec());
        let text = frame.encode().unwrap();
        // The raw SDP bytes must not appear inline in the JSON.
        assert!(!text.contains("v=0"), "payload leaked as plaintext: {text}");
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn info_register_carries_identity() {
        let frame = Frame::register("u1", "d1");
        let text = frame.encode().unwrap();
        assert!(text.contains("\"userID\":\"u1\""));
        assert!(text.contains("\"deviceID\":\"d1\""));
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn info_token_omits_identity_fields() {
        let text = Frame::info(InfoKind::Token, "tok").encode().unwrap();
        assert!(!text.contains("userID"));
        assert!(!text.contains("deviceID"));
    }

    #[test]
    fn from_annotation_roundtrips() {
        let mut frame = Frame::signal(SignalKind::Ice, b"cand".to_vec());
        frame.from = Some("10.0.0.7:4411".into());
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn unknown_outer_tag_is_rejected() {
        let err = Frame::decode(r#"{"event":9,"data":{"event":0}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { kind: "FrameKind", value: 9 }));
    }

    #[test]
    fn unknown_inner_tag_is_rejected() {
        // Inner tags go through serde, so the failure surfaces as a
        // malformed-frame error rather than a bare UnknownTag.
        let err = Frame::decode(r#"{"event":0,"data":{"event":7,"token":"t"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn absent_response_decodes_as_none() {
        let frame = Frame::decode(r#"{"event":0,"data":{"event":1,"token":"t"}}"#).unwrap();
        match frame.payload {
            Payload::Session(m) => {
                assert_eq!(m.kind, SessionKind::JoinResponse);
                assert_eq!(m.response, None);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn reserved_api_tag_is_carried_opaquely() {
        let text = r#"{"event":4,"data":{"anything":true}}"#;
        let frame = Frame::decode(text).unwrap();
        assert!(matches!(frame.payload, Payload::Api(_)));
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn oversized_frame_is_refused() {
        let text = format!(r#"{{"event":1,"data":"{}"}}"#, "x".repeat(MAX_FRAME_LEN));
        assert!(matches!(
            Frame::decode(&text),
            Err(ProtocolError::Oversized { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(Frame::decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Frame::decode(r#"{"event":"x"}"#), Err(ProtocolError::Malformed(_))));
    }
}
