//! Full-stack session flow: two real SDK session cores against a live
//! hub, with in-memory collaborator fakes standing in for the WebRTC
//! engine and the media pipelines.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use farsight_hub::config::HubConfig;
use farsight_hub::server::Server;
use farsight_sdk::client::{Collaborators, SessionConfig, connect};
use farsight_sdk::config::{IceServer, VideoCodec};
use farsight_sdk::error::{MediaError, RtcError};
use farsight_sdk::event::{Role, SessionEvent};
use farsight_sdk::input::{InputBridge, InputEvent, InputInjector, KeyAction, Modifier, MouseButton};
use farsight_sdk::media::{Playback, ScreenCapture};
use farsight_sdk::rtc::{HostSession, RtcController, RtcEvent, RtcFactory, SampleSink};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

// ── collaborator fakes ──────────────────────────────────────────────

/// Candidates this side "gathers", and a log of candidates the far side
/// trickled to us.
#[derive(Clone, Default)]
struct RtcProbe {
    received_candidates: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

struct FakeFactory {
    local_candidates: Vec<Vec<u8>>,
    probe: RtcProbe,
}

impl FakeFactory {
    fn new(local_candidates: Vec<Vec<u8>>) -> (Self, RtcProbe) {
        let probe = RtcProbe::default();
        (Self { local_candidates, probe: probe.clone() }, probe)
    }

    fn controller(&self, events: mpsc::Sender<RtcEvent>) -> FakeController {
        for candidate in &self.local_candidates {
            let _ = events.try_send(RtcEvent::Candidate(candidate.clone()));
        }
        FakeController { events, remote_description: false, probe: self.probe.clone() }
    }
}

impl RtcFactory for FakeFactory {
    fn host_session(
        &mut self,
        _ice: &IceServer,
        _codec: VideoCodec,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<HostSession, RtcError> {
        Ok(HostSession {
            controller: Box::new(self.controller(events)),
            video_track: Box::new(NullSink),
        })
    }

    fn remote_session(
        &mut self,
        _ice: &IceServer,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<Box<dyn RtcController>, RtcError> {
        Ok(Box::new(self.controller(events)))
    }
}

struct FakeController {
    events: mpsc::Sender<RtcEvent>,
    remote_description: bool,
    probe: RtcProbe,
}

impl RtcController for FakeController {
    fn create_offer(&mut self) -> Result<Vec<u8>, RtcError> {
        Ok(b"fake-offer".to_vec())
    }

    fn create_answer(&mut self) -> Result<Vec<u8>, RtcError> {
        Ok(b"fake-answer".to_vec())
    }

    fn set_remote_description(&mut self, _sdp: &[u8]) -> Result<(), RtcError> {
        self.remote_description = true;
        // A real engine connects shortly after descriptions are in
        // place; the fake connects immediately.
        let _ = self.events.try_send(RtcEvent::TransportConnected);
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.remote_description
    }

    fn add_ice_candidate(&mut self, candidate: &[u8]) -> Result<(), RtcError> {
        self.probe.received_candidates.lock().push(candidate.to_vec());
        Ok(())
    }

    fn gathering_complete(&self) -> bool {
        false
    }

    fn send_input(&mut self, _payload: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::Relaxed);
    }
}

struct NullSink;

impl SampleSink for NullSink {
    fn write_sample(&mut self, _sample: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeCapture {
    running: Arc<AtomicBool>,
}

impl ScreenCapture for FakeCapture {
    fn start(
        &mut self,
        _width: u32,
        _height: u32,
        _codec: VideoCodec,
        _track: Box<dyn SampleSink>,
    ) -> Result<(), MediaError> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Default)]
struct FakePlayback {
    running: Arc<AtomicBool>,
    input_tx: Option<mpsc::Sender<InputEvent>>,
}

impl Playback for FakePlayback {
    fn start(
        &mut self,
        _width: u32,
        _height: u32,
        _payload_type: u8,
        _codec: VideoCodec,
    ) -> Result<(), MediaError> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn handle_frame_buffer(&mut self, _frame: &[u8]) {}

    fn stop(&mut self) -> Result<(), MediaError> {
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn input_events(&mut self) -> mpsc::Receiver<InputEvent> {
        let (tx, rx) = mpsc::channel(32);
        self.input_tx = Some(tx);
        rx
    }

    fn run_until_closed(&mut self) {}
}

struct NullInjector;

impl InputInjector for NullInjector {
    fn move_to(&mut self, _x: i32, _y: i32) {}
    fn button(&mut self, _button: MouseButton, _action: KeyAction) {}
    fn drag_to(&mut self, _button: MouseButton, _x: i32, _y: i32) {}
    fn scroll(&mut self, _ticks: i32) {}
    fn key(&mut self, _key: &str, _action: KeyAction, _modifiers: &[Modifier]) {}
}

fn collaborators(candidates: Vec<Vec<u8>>) -> (Collaborators, RtcProbe, Arc<AtomicBool>) {
    let (factory, probe) = FakeFactory::new(candidates);
    let capture = FakeCapture::default();
    let capture_running = capture.running.clone();
    let collab = Collaborators {
        rtc: Box::new(factory),
        capture: Box::new(capture),
        playback: Box::new(FakePlayback::default()),
        input: InputBridge::new(Box::new(NullInjector), 1920, 1080),
    };
    (collab, probe, capture_running)
}

fn session_config(addr: std::net::SocketAddr, user: &str, device: &str) -> SessionConfig {
    SessionConfig {
        hub_url: format!("ws://{addr}/ws"),
        user_id: user.to_string(),
        device_id: device.to_string(),
        ice: IceServer { url: "stun:stun.example.org:3478".into(), username: None, password: None },
        codec: VideoCodec::Vp8,
        width: 1280,
        height: 720,
    }
}

async fn next_event(events: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ── the flow ────────────────────────────────────────────────────────

#[tokio::test]
async fn two_peers_negotiate_stream_and_reset() {
    let (addr, _hub) = Server::new(HubConfig::for_tests()).spawn().await.expect("spawn hub");

    let (host_collab, host_probe, capture_running) =
        collaborators(vec![b"cand-host".to_vec()]);
    let (host_handle, mut host_events) =
        connect(session_config(addr, "user-h", "dev-h"), host_collab).await.expect("host connect");

    let (remote_collab, remote_probe, _) = collaborators(vec![b"cand-remote".to_vec()]);
    let (remote_handle, mut remote_events) =
        connect(session_config(addr, "user-r", "dev-r"), remote_collab)
            .await
            .expect("remote connect");

    // Registration.
    assert!(matches!(next_event(&mut host_events).await, SessionEvent::Connected));
    host_handle.register().await.expect("register host");
    let host_token = match next_event(&mut host_events).await {
        SessionEvent::Registered { token } => token,
        other => panic!("expected Registered, got {other:?}"),
    };

    assert!(matches!(next_event(&mut remote_events).await, SessionEvent::Connected));
    remote_handle.register().await.expect("register remote");
    assert!(matches!(next_event(&mut remote_events).await, SessionEvent::Registered { .. }));

    // Join handshake: the host auto-accepts and starts capturing; the
    // remote is told to initiate and both sides negotiate to connected.
    remote_handle.join(&host_token).await.expect("join");

    match next_event(&mut host_events).await {
        SessionEvent::JoinRequested { token } => assert_eq!(token, host_token),
        other => panic!("expected JoinRequested, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut host_events).await,
        SessionEvent::SessionStarted { role: Role::Host }
    ));
    assert!(matches!(
        next_event(&mut remote_events).await,
        SessionEvent::SessionStarted { role: Role::Remote }
    ));

    assert!(matches!(next_event(&mut host_events).await, SessionEvent::MediaConnected));
    assert!(matches!(next_event(&mut remote_events).await, SessionEvent::MediaConnected));
    assert!(capture_running.load(Ordering::Relaxed), "host capture must be running");

    // Trickled candidates reach the opposite engine.
    wait_until("host to receive the remote candidate", || {
        host_probe.received_candidates.lock().iter().any(|c| c == b"cand-remote")
    })
    .await;
    wait_until("remote to receive the host candidate", || {
        remote_probe.received_candidates.lock().iter().any(|c| c == b"cand-host")
    })
    .await;

    // Remote ends the session: both sides reset and get fresh tokens.
    remote_handle.end_session().await.expect("end session");

    assert!(matches!(next_event(&mut remote_events).await, SessionEvent::SessionEnded));
    let renewed_remote = match next_event(&mut remote_events).await {
        SessionEvent::TokenRenewed { token } => token,
        other => panic!("expected TokenRenewed, got {other:?}"),
    };

    assert!(matches!(next_event(&mut host_events).await, SessionEvent::SessionEnded));
    let renewed_host = match next_event(&mut host_events).await {
        SessionEvent::TokenRenewed { token } => token,
        other => panic!("expected TokenRenewed, got {other:?}"),
    };
    assert_ne!(renewed_host, host_token, "host token must be re-minted");
    assert_ne!(renewed_host, renewed_remote);

    assert!(!capture_running.load(Ordering::Relaxed), "capture must stop on reset");
    assert!(host_probe.closed.load(Ordering::Relaxed), "host peer connection must close");
    assert!(remote_probe.closed.load(Ordering::Relaxed), "remote peer connection must close");

    // A renewed host is dialable again.
    remote_handle.join(&renewed_host).await.expect("rejoin");
    assert!(matches!(
        next_event(&mut host_events).await,
        SessionEvent::JoinRequested { .. }
    ));

    host_handle.shutdown().await.expect("shutdown host");
    remote_handle.shutdown().await.expect("shutdown remote");
}

#[tokio::test]
async fn joining_a_bogus_token_surfaces_the_hub_error() {
    let (addr, _hub) = Server::new(HubConfig::for_tests()).spawn().await.expect("spawn hub");

    let (collab, _probe, _) = collaborators(Vec::new());
    let (handle, mut events) =
        connect(session_config(addr, "user-r", "dev-r"), collab).await.expect("connect");

    assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
    handle.register().await.expect("register");
    assert!(matches!(next_event(&mut events).await, SessionEvent::Registered { .. }));

    handle.join("no-such-room").await.expect("join");
    match next_event(&mut events).await {
        SessionEvent::HubError { text } => assert_eq!(text, "Invalid session token"),
        other => panic!("expected HubError, got {other:?}"),
    }
    // The core shuts down after a hub rejection.
    assert!(matches!(next_event(&mut events).await, SessionEvent::Disconnected { .. }));
}
