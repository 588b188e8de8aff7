//! Peer-side SDK for the farsight screen-sharing system.
//!
//! The SDK owns the three things every endpoint needs:
//!
//! - the signaling **codec** ([`proto`]) shared with the hub,
//! - the **session core** ([`client`]) — the state machine that
//!   registers with the hub, runs the join handshake and shuttles
//!   Offer/Answer/ICE between the signaling channel and the RTC engine,
//! - the **collaborator seams** ([`rtc`], [`media`], [`input`]) behind
//!   which the platform-specific WebRTC, capture/playback and input
//!   injection implementations live.
//!
//! A GUI, TUI or test harness drives the core through a
//! [`client::ClientHandle`] and consumes [`event::SessionEvent`]s.

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod ice;
pub mod input;
pub mod media;
pub mod proto;
pub mod rtc;

pub use client::{ClientHandle, Collaborators, SessionConfig, connect};
pub use config::{Args, IceServer, VideoCodec};
pub use error::{ClientError, ConfigError, MediaError, ProtocolError, RtcError};
pub use event::{Role, SessionEvent};
