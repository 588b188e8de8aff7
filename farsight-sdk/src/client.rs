//! Peer session core.
//!
//! This is the client-side state machine that mirrors the hub: it
//! registers, holds the assigned session token, issues or answers join
//! requests, shuttles Offer/Answer/ICE blobs between the signaling
//! channel and the RTC engine, and winds sessions down cleanly.
//!
//! [`connect`] dials the hub and spawns three actors: a read pump
//! (rate-limited at 10 Hz, feeding decoded-frame input to the core), a
//! write pump (serializing all writes to the socket) and the core loop
//! itself. The embedder drives the core through a [`ClientHandle`] and
//! consumes [`SessionEvent`]s on the returned receiver.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::VideoCodec;
use crate::error::ClientError;
use crate::event::{Role, SessionEvent};
use crate::ice::{CandidateQueue, DRAIN_INTERVAL};
use crate::input::{InputBridge, InputEvent};
use crate::media::{Playback, ScreenCapture};
use crate::proto::{
    CommandKind, CommandMsg, Frame, InfoKind, InfoMsg, JoinAnswer, Payload, SessionKind,
    SessionMsg, SignalKind, SignalMsg,
};
use crate::rtc::{RTC_EVENT_BUFFER, RtcController, RtcEvent, RtcFactory};

/// Subprotocol tag both ends expect on the signaling channel.
pub const SUBPROTOCOL: &str = "signaling";

/// Inbound reads are limited to one frame per this interval (token
/// bucket of one). Matches the hub's ingress limit.
const READ_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Everything the core needs to know about this endpoint.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hub URL, e.g. `ws://127.0.0.1:8765/ws`.
    pub hub_url: String,
    pub user_id: String,
    pub device_id: String,
    pub ice: crate::config::IceServer,
    /// Codec offered when hosting.
    pub codec: VideoCodec,
    /// Capture resolution when hosting.
    pub width: u32,
    pub height: u32,
}

/// The collaborator implementations the core drives. Tests plug in
/// in-memory fakes; the real application wires the platform pipelines.
pub struct Collaborators {
    pub rtc: Box<dyn RtcFactory>,
    pub capture: Box<dyn ScreenCapture>,
    pub playback: Box<dyn Playback>,
    pub input: InputBridge,
}

/// Commands the embedder can send to the core.
#[derive(Debug)]
pub enum Command {
    /// Register with the hub and obtain a session token.
    Register,
    /// Ask to join another peer's room by its session token.
    Join { token: String },
    /// End the active media session (viewer window closed, host stopped
    /// sharing). The core leaves the room and renews its token.
    EndSession,
    /// Tear everything down and close the signaling channel.
    Shutdown,
}

/// Where the peer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Registering,
    Registered,
    /// Host-mode idle: registered and able to receive join requests.
    WaitingJoin,
    /// Remote-mode: join request sent, waiting for the hub's Ack.
    Requesting,
    /// Remote-mode: admitted to the room, waiting for InitiateSession.
    Joined,
    Negotiating,
    Connected,
    /// Session ended, waiting for the token renewal to land.
    Resetting,
    Closing,
    Closed,
}

/// A handle to a running session core.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn register(&self) -> Result<(), ClientError> {
        self.send(Command::Register).await
    }

    pub async fn join(&self, token: &str) -> Result<(), ClientError> {
        self.send(Command::Join { token: token.to_string() }).await
    }

    pub async fn end_session(&self) -> Result<(), ClientError> {
        self.send(Command::EndSession).await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<(), ClientError> {
        self.cmd_tx.send(cmd).await.map_err(|_| ClientError::Closed)
    }
}

/// Outstanding hub exchange: exists while we wait for the `next` info
/// message; anything else arriving in its place is a protocol surprise.
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    next: InfoKind,
}

/// Everything the core loop multiplexes besides the socket itself.
enum Internal {
    Rtc(RtcEvent),
    Input(InputEvent),
}

/// Dial the hub and spawn the session core.
///
/// Returns a handle for commands and the event stream for the UI
/// layer. The core runs until shutdown, hub error or transport loss.
pub async fn connect(
    config: SessionConfig,
    collab: Collaborators,
) -> Result<(ClientHandle, mpsc::Receiver<SessionEvent>), ClientError> {
    let mut request = config.hub_url.as_str().into_client_request()?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
    let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
    tracing::debug!(url = %config.hub_url, "signaling channel established");

    let (sink, source) = socket.split();
    let (event_tx, event_rx) = mpsc::channel(32);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (to_hub_tx, to_hub_rx) = mpsc::channel::<Frame>(32);
    let (from_hub_tx, from_hub_rx) = mpsc::channel::<String>(32);
    let (internal_tx, internal_rx) = mpsc::channel::<Internal>(32);

    tokio::spawn(read_pump(source, from_hub_tx));
    tokio::spawn(write_pump(sink, to_hub_rx));

    let handle = ClientHandle { cmd_tx };
    let events = event_tx.clone();
    tokio::spawn(async move {
        let _ = events.send(SessionEvent::Connected).await;
        let mut core = SessionCore::new(config, collab, events.clone(), to_hub_tx, internal_tx);
        if let Err(err) = core.run(from_hub_rx, cmd_rx, internal_rx).await {
            tracing::warn!(%err, "session core stopped");
            let _ = events.send(SessionEvent::Disconnected { reason: err.to_string() }).await;
        }
    });

    Ok((handle, event_rx))
}

/// Reads frames off the socket, one per 100 ms at most, and feeds the
/// raw text to the core. Ends when the socket does.
async fn read_pump(mut source: WsSource, tx: mpsc::Sender<String>) {
    let mut limiter = tokio::time::interval(READ_INTERVAL);
    limiter.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        limiter.tick().await;
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if tx.send(text.to_string()).await.is_err() {
                    break;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
            Some(Ok(WsMessage::Binary(_))) => {
                tracing::warn!("dropping unexpected binary frame");
            }
            Some(Err(err)) => {
                tracing::warn!(%err, "signaling read failed");
                break;
            }
        }
    }
    tracing::debug!("read pump closed");
}

/// Owns the socket's write half; everything the core sends funnels
/// through here so writes are serialized. Sends a normal close when the
/// core drops its sender.
async fn write_pump(mut sink: WsSink, mut rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(%err, "failed to encode outbound frame");
                continue;
            }
        };
        tracing::debug!(kind = frame.describe(), "-> hub");
        if let Err(err) = sink.send(WsMessage::Text(text.into())).await {
            tracing::warn!(%err, "signaling write failed");
            return;
        }
    }
    let _ = sink.close().await;
    tracing::debug!("write pump closed");
}

struct SessionCore {
    config: SessionConfig,
    collab: Collaborators,
    events: mpsc::Sender<SessionEvent>,
    to_hub: mpsc::Sender<Frame>,
    internal_tx: mpsc::Sender<Internal>,

    state: SessionState,
    role: Option<Role>,
    session_token: String,
    register_request: Option<PendingRequest>,
    call_request: Option<PendingRequest>,
    renew_request: Option<PendingRequest>,

    rtc: Option<Box<dyn RtcController>>,
    channel_open: bool,
    outbound_ice: CandidateQueue,
    inbound_ice: CandidateQueue,
}

impl SessionCore {
    fn new(
        config: SessionConfig,
        collab: Collaborators,
        events: mpsc::Sender<SessionEvent>,
        to_hub: mpsc::Sender<Frame>,
        internal_tx: mpsc::Sender<Internal>,
    ) -> Self {
        Self {
            config,
            collab,
            events,
            to_hub,
            internal_tx,
            state: SessionState::Idle,
            role: None,
            session_token: String::new(),
            register_request: None,
            call_request: None,
            renew_request: None,
            rtc: None,
            channel_open: false,
            outbound_ice: CandidateQueue::new("outbound"),
            inbound_ice: CandidateQueue::new("inbound"),
        }
    }

    async fn run(
        &mut self,
        mut from_hub: mpsc::Receiver<String>,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::Receiver<Internal>,
    ) -> Result<(), ClientError> {
        let mut drain = tokio::time::interval(DRAIN_INTERVAL);
        drain.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                raw = from_hub.recv() => match raw {
                    Some(text) => self.on_raw(&text).await?,
                    None => {
                        self.teardown();
                        self.state = SessionState::Closed;
                        let _ = self.events
                            .send(SessionEvent::Disconnected { reason: "signaling channel closed".into() })
                            .await;
                        return Ok(());
                    }
                },
                cmd = commands.recv() => {
                    let cmd = cmd.unwrap_or(Command::Shutdown);
                    if self.on_command(cmd).await? {
                        return Ok(());
                    }
                }
                ev = internal.recv() => {
                    // Never `None`: we hold a sender for the session's lifetime.
                    if let Some(ev) = ev {
                        self.on_internal(ev).await?;
                    }
                }
                _ = drain.tick() => self.drain_outbound().await?,
            }
        }
    }

    // ── ingress from the hub ────────────────────────────────────────

    async fn on_raw(&mut self, text: &str) -> Result<(), ClientError> {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, "dropping malformed frame from hub");
                return Ok(());
            }
        };
        tracing::debug!(kind = frame.describe(), "<- hub");
        match frame.payload {
            Payload::Session(msg) => self.on_session(msg).await,
            Payload::Signal(msg) => self.on_signal(msg).await,
            Payload::Command(msg) => self.on_hub_command(msg).await,
            Payload::Info(msg) => self.on_info(msg).await,
            Payload::Api(_) => Ok(()),
        }
    }

    async fn on_session(&mut self, msg: SessionMsg) -> Result<(), ClientError> {
        match msg.kind {
            SessionKind::JoinRequest => {
                let idle_host = matches!(
                    self.state,
                    SessionState::Registered | SessionState::WaitingJoin
                ) && self.role.is_none()
                    && self.call_request.is_none();
                if !idle_host {
                    tracing::warn!(state = ?self.state, "join request in unexpected state, ignoring");
                    return Ok(());
                }
                let _ = self
                    .events
                    .send(SessionEvent::JoinRequested { token: msg.token.clone() })
                    .await;
                tracing::info!("join request received, configuring as host");
                self.state = SessionState::WaitingJoin;
                self.configure_as_host()?;
                self.role = Some(Role::Host);
                self.state = SessionState::Negotiating;
                self.send(Frame::session(
                    SessionKind::JoinResponse,
                    self.session_token.clone(),
                    Some(JoinAnswer::Allow),
                ))
                .await?;
                let _ = self.events.send(SessionEvent::SessionStarted { role: Role::Host }).await;
                Ok(())
            }
            // JoinResponse and Leave travel peer → hub only.
            _ => {
                self.violation("session message the hub never relays");
                Ok(())
            }
        }
    }

    async fn on_info(&mut self, msg: InfoMsg) -> Result<(), ClientError> {
        match msg.kind {
            InfoKind::Token => {
                if self.register_request.is_some_and(|r| r.next == InfoKind::Token) {
                    self.register_request = None;
                    self.session_token = msg.data.clone();
                    self.state = SessionState::Registered;
                    tracing::info!(token = %self.session_token, "registered with hub");
                    let _ = self.events.send(SessionEvent::Registered { token: msg.data }).await;
                } else {
                    self.violation("token without a pending register call");
                }
                Ok(())
            }
            InfoKind::Ack => {
                if self.call_request.is_some_and(|r| r.next == InfoKind::Ack) {
                    self.call_request = None;
                    tracing::info!("join approval received, configuring as remote");
                    self.configure_as_remote()?;
                    self.role = Some(Role::Remote);
                    self.state = SessionState::Joined;
                    let _ = self
                        .events
                        .send(SessionEvent::SessionStarted { role: Role::Remote })
                        .await;
                } else {
                    self.violation("ack without a pending join call");
                }
                Ok(())
            }
            InfoKind::Renew => {
                if self.renew_request.is_some_and(|r| r.next == InfoKind::Renew)
                    || self.state == SessionState::Resetting
                {
                    self.renew_request = None;
                    self.session_token = msg.data.clone();
                    self.state = SessionState::Registered;
                    tracing::info!(token = %self.session_token, "session token renewed");
                    let _ = self.events.send(SessionEvent::TokenRenewed { token: msg.data }).await;
                } else {
                    self.violation("renew without a pending renew call or reset");
                }
                Ok(())
            }
            InfoKind::Error => {
                tracing::warn!(text = %msg.data, "hub reported an error");
                let _ = self.events.send(SessionEvent::HubError { text: msg.data.clone() }).await;
                self.state = SessionState::Closing;
                self.teardown();
                self.state = SessionState::Closed;
                Err(ClientError::Policy(msg.data))
            }
            InfoKind::Register => {
                self.violation("register is peer to hub only");
                Ok(())
            }
        }
    }

    async fn on_hub_command(&mut self, msg: CommandMsg) -> Result<(), ClientError> {
        match msg.kind {
            CommandKind::InitiateSession => {
                if self.role != Some(Role::Remote) || self.state != SessionState::Joined {
                    self.violation("initiate-session outside the joined state");
                    return Ok(());
                }
                let rtc = self.rtc.as_mut().ok_or(crate::error::RtcError::NoConnection)?;
                let offer = rtc.create_offer()?;
                self.state = SessionState::Negotiating;
                self.send(Frame::signal(SignalKind::Offer, offer)).await?;
                Ok(())
            }
            CommandKind::TerminateSession => {
                tracing::info!("terminate-session received");
                self.begin_reset(false).await
            }
        }
    }

    async fn on_signal(&mut self, msg: SignalMsg) -> Result<(), ClientError> {
        if self.rtc.is_none() {
            tracing::warn!(kind = ?msg.kind, "signal without an active peer connection, dropping");
            return Ok(());
        }
        match msg.kind {
            SignalKind::Offer => {
                if self.role != Some(Role::Host) {
                    self.violation("offer on the non-host side");
                    return Ok(());
                }
                let answer = {
                    let Some(rtc) = self.rtc.as_mut() else { return Ok(()) };
                    rtc.set_remote_description(&msg.data)?;
                    Self::flush_inbound(rtc.as_mut(), &mut self.inbound_ice);
                    rtc.create_answer()?
                };
                self.send(Frame::signal(SignalKind::Answer, answer)).await?;
            }
            SignalKind::Answer => {
                if self.role != Some(Role::Remote) {
                    self.violation("answer on the non-remote side");
                    return Ok(());
                }
                let Some(rtc) = self.rtc.as_mut() else { return Ok(()) };
                rtc.set_remote_description(&msg.data)?;
                Self::flush_inbound(rtc.as_mut(), &mut self.inbound_ice);
            }
            SignalKind::Ice => {
                let Some(rtc) = self.rtc.as_mut() else { return Ok(()) };
                if rtc.has_remote_description() {
                    if let Err(err) = rtc.add_ice_candidate(&msg.data) {
                        tracing::warn!(%err, "failed to add ICE candidate");
                    }
                } else {
                    self.inbound_ice.push(msg.data);
                }
            }
        }
        Ok(())
    }

    /// Apply queued inbound candidates in arrival order once a remote
    /// description is in place.
    fn flush_inbound(rtc: &mut dyn RtcController, queue: &mut CandidateQueue) {
        for candidate in queue.drain() {
            if let Err(err) = rtc.add_ice_candidate(&candidate) {
                tracing::warn!(%err, "failed to add queued ICE candidate");
            }
        }
    }

    // ── commands from the embedder ──────────────────────────────────

    /// Returns `true` when the core should stop.
    async fn on_command(&mut self, cmd: Command) -> Result<bool, ClientError> {
        match cmd {
            Command::Register => {
                if self.state != SessionState::Idle {
                    tracing::warn!(state = ?self.state, "register ignored outside idle");
                    return Ok(false);
                }
                self.register_request = Some(PendingRequest { next: InfoKind::Token });
                self.state = SessionState::Registering;
                self.send(Frame::register(
                    self.config.user_id.clone(),
                    self.config.device_id.clone(),
                ))
                .await?;
                Ok(false)
            }
            Command::Join { token } => {
                let can_join = matches!(
                    self.state,
                    SessionState::Registered | SessionState::WaitingJoin
                ) && self.role.is_none();
                if !can_join {
                    tracing::warn!(state = ?self.state, "join ignored in current state");
                    return Ok(false);
                }
                self.call_request = Some(PendingRequest { next: InfoKind::Ack });
                self.state = SessionState::Requesting;
                self.send(Frame::session(SessionKind::JoinRequest, token, None)).await?;
                Ok(false)
            }
            Command::EndSession => {
                if self.role.is_some() {
                    self.begin_reset(true).await?;
                } else {
                    tracing::debug!("end-session with no active session, ignoring");
                }
                Ok(false)
            }
            Command::Shutdown => {
                self.teardown();
                self.state = SessionState::Closed;
                let _ = self
                    .events
                    .send(SessionEvent::Disconnected { reason: "shutdown".into() })
                    .await;
                Ok(true)
            }
        }
    }

    // ── engine and viewer events ────────────────────────────────────

    async fn on_internal(&mut self, ev: Internal) -> Result<(), ClientError> {
        match ev {
            Internal::Rtc(ev) => self.on_rtc_event(ev).await,
            Internal::Input(ev) => {
                if self.channel_open {
                    if let (Some(rtc), Ok(payload)) = (self.rtc.as_mut(), ev.to_bytes()) {
                        if let Err(err) = rtc.send_input(&payload) {
                            tracing::warn!(%err, "failed to send input event");
                        }
                    }
                }
                Ok(())
            }
        }
    }

    async fn on_rtc_event(&mut self, ev: RtcEvent) -> Result<(), ClientError> {
        match ev {
            RtcEvent::Candidate(candidate) => {
                let gathering_done =
                    self.rtc.as_ref().is_some_and(|rtc| rtc.gathering_complete());
                if self.rtc.is_some() && !gathering_done {
                    self.outbound_ice.push(candidate);
                }
            }
            RtcEvent::TransportConnected => {
                tracing::info!("media transport connected");
                if self.state == SessionState::Negotiating {
                    self.state = SessionState::Connected;
                }
                let _ = self.events.send(SessionEvent::MediaConnected).await;
            }
            RtcEvent::TransportClosed { reason } => {
                if self.role.is_some() {
                    tracing::warn!(%reason, "media transport closed");
                    self.begin_reset(false).await?;
                }
            }
            RtcEvent::ChannelOpen => {
                tracing::debug!("input data channel open");
                self.channel_open = true;
            }
            RtcEvent::ChannelMessage(payload) => {
                if self.role == Some(Role::Host) {
                    self.collab.input.parse(&payload);
                }
            }
            RtcEvent::TrackStarted { payload_type, codec } => {
                if self.role == Some(Role::Remote) {
                    tracing::info!(payload_type, %codec, "host video track started");
                    self.collab.playback.start(
                        self.config.width,
                        self.config.height,
                        payload_type,
                        codec,
                    )?;
                }
            }
            RtcEvent::TrackFrame(frame) => {
                if self.role == Some(Role::Remote) {
                    self.collab.playback.handle_frame_buffer(&frame);
                }
            }
        }
        Ok(())
    }

    /// Emit one queued outbound candidate per drain tick until local
    /// gathering completes.
    async fn drain_outbound(&mut self) -> Result<(), ClientError> {
        if self.rtc.is_none() || self.outbound_ice.is_empty() {
            return Ok(());
        }
        if let Some(candidate) = self.outbound_ice.pop() {
            self.send(Frame::signal(SignalKind::Ice, candidate)).await?;
        }
        Ok(())
    }

    // ── session setup and teardown ──────────────────────────────────

    fn configure_as_host(&mut self) -> Result<(), ClientError> {
        let events = self.spawn_rtc_forwarder();
        let session =
            self.collab.rtc.host_session(&self.config.ice, self.config.codec, events)?;
        self.collab.capture.start(
            self.config.width,
            self.config.height,
            self.config.codec,
            session.video_track,
        )?;
        self.rtc = Some(session.controller);
        Ok(())
    }

    fn configure_as_remote(&mut self) -> Result<(), ClientError> {
        let events = self.spawn_rtc_forwarder();
        let controller = self.collab.rtc.remote_session(&self.config.ice, events)?;
        self.rtc = Some(controller);

        // Viewer input flows through the core so it can gate on the
        // data channel being open.
        let mut input_rx = self.collab.playback.input_events();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = input_rx.recv().await {
                if internal.send(Internal::Input(ev)).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Bridge a per-session engine event channel into the core's
    /// multiplexed input. The forwarder dies with the engine.
    fn spawn_rtc_forwarder(&self) -> mpsc::Sender<RtcEvent> {
        let (tx, mut rx) = mpsc::channel(RTC_EVENT_BUFFER);
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                if internal.send(Internal::Rtc(ev)).await.is_err() {
                    break;
                }
            }
        });
        tx
    }

    /// Stop media, close the peer connection, leave the room (unless
    /// the hub is already cleaning up after us) and wait for the token
    /// renewal that returns us to the registered state.
    async fn begin_reset(&mut self, user_initiated: bool) -> Result<(), ClientError> {
        let Some(role) = self.role else {
            return Ok(());
        };
        tracing::info!(?role, user_initiated, "resetting session");
        self.stop_media(role);
        if let Some(mut rtc) = self.rtc.take() {
            rtc.close();
        }
        self.channel_open = false;
        self.outbound_ice.clear();
        self.inbound_ice.clear();
        self.role = None;
        self.call_request = None;
        self.renew_request = Some(PendingRequest { next: InfoKind::Renew });
        self.state = SessionState::Resetting;

        // A host reset triggered by TerminateSession means the hub is
        // already cleaning up and will renew our token unprompted.
        if user_initiated || role == Role::Remote {
            self.send(Frame::session(SessionKind::Leave, "", None)).await?;
        }
        let _ = self.events.send(SessionEvent::SessionEnded).await;
        Ok(())
    }

    fn stop_media(&mut self, role: Role) {
        let result = match role {
            Role::Host => self.collab.capture.stop(),
            Role::Remote => self.collab.playback.stop(),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "failed to stop media pipeline");
        }
    }

    fn teardown(&mut self) {
        if let Some(role) = self.role.take() {
            self.stop_media(role);
        }
        if let Some(mut rtc) = self.rtc.take() {
            rtc.close();
        }
        self.channel_open = false;
        self.outbound_ice.clear();
        self.inbound_ice.clear();
        self.register_request = None;
        self.call_request = None;
        self.renew_request = None;
    }

    fn violation(&self, what: &'static str) {
        let err = crate::error::ProtocolError::Unexpected(what);
        tracing::warn!(state = ?self.state, %err, "protocol violation, frame dropped");
    }

    async fn send(&self, frame: Frame) -> Result<(), ClientError> {
        self.to_hub.send(frame).await.map_err(|_| ClientError::Closed)
    }
}
