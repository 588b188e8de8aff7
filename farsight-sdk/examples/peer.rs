//! Headless peer example — registers with a hub and either waits to be
//! joined (host) or dials another peer's session token (remote), with
//! no-op collaborators in place of the real engine and pipelines.
//!
//! Usage:
//!   cargo run --example peer -- --addr ws://127.0.0.1:8765/ws
//!   cargo run --example peer -- --addr ws://127.0.0.1:8765/ws --target <token>
//!
//! The printed session token is what the other side passes as
//! `--target`. Wire real [`RtcFactory`]/[`ScreenCapture`]/[`Playback`]
//! implementations to turn this into an actual screen-sharing endpoint.

use anyhow::Result;
use clap::Parser;

use farsight_sdk::client::{self, Collaborators, SessionConfig};
use farsight_sdk::config::{Args, VideoCodec};
use farsight_sdk::error::{MediaError, RtcError};
use farsight_sdk::event::SessionEvent;
use farsight_sdk::input::{InputBridge, InputEvent, InputInjector, KeyAction, Modifier, MouseButton};
use farsight_sdk::media::{Playback, ScreenCapture};
use farsight_sdk::rtc::{HostSession, RtcController, RtcEvent, RtcFactory, SampleSink};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "peer", about = "Headless farsight peer example")]
struct ExampleArgs {
    #[command(flatten)]
    core: Args,

    /// Session token to join; stays in host mode when absent.
    #[arg(long)]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = ExampleArgs::parse();
    let (codec, ice) = args.core.validate()?;

    let config = SessionConfig {
        hub_url: args.core.addr.clone(),
        user_id: "example-user".into(),
        device_id: "example-device".into(),
        ice,
        codec,
        width: 1280,
        height: 720,
    };
    let collab = Collaborators {
        rtc: Box::new(LoopbackFactory),
        capture: Box::new(NullCapture),
        playback: Box::new(NullPlayback::default()),
        input: InputBridge::new(Box::new(LogInjector), 1920, 1080),
    };

    let (handle, mut events) = client::connect(config, collab).await?;
    handle.register().await?;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Registered { token } => {
                println!("registered; session token: {token}");
                if let Some(ref target) = args.target {
                    handle.join(target).await?;
                }
            }
            SessionEvent::HubError { text } => {
                eprintln!("hub error: {text}");
            }
            SessionEvent::Disconnected { reason } => {
                println!("disconnected: {reason}");
                break;
            }
            other => println!("{other:?}"),
        }
    }
    Ok(())
}

// ── no-op collaborators ─────────────────────────────────────────────

struct LoopbackFactory;

struct LoopbackController {
    remote_description: bool,
    events: mpsc::Sender<RtcEvent>,
}

impl LoopbackController {
    fn new(events: mpsc::Sender<RtcEvent>) -> Box<dyn RtcController> {
        Box::new(Self { remote_description: false, events })
    }
}

impl RtcFactory for LoopbackFactory {
    fn host_session(
        &mut self,
        _ice: &farsight_sdk::config::IceServer,
        _codec: VideoCodec,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<HostSession, RtcError> {
        Ok(HostSession {
            controller: LoopbackController::new(events),
            video_track: Box::new(NullSink),
        })
    }

    fn remote_session(
        &mut self,
        _ice: &farsight_sdk::config::IceServer,
        events: mpsc::Sender<RtcEvent>,
    ) -> Result<Box<dyn RtcController>, RtcError> {
        Ok(LoopbackController::new(events))
    }
}

impl RtcController for LoopbackController {
    fn create_offer(&mut self) -> Result<Vec<u8>, RtcError> {
        Ok(b"{\"type\":\"offer\",\"sdp\":\"v=0\"}".to_vec())
    }

    fn create_answer(&mut self) -> Result<Vec<u8>, RtcError> {
        Ok(b"{\"type\":\"answer\",\"sdp\":\"v=0\"}".to_vec())
    }

    fn set_remote_description(&mut self, _sdp: &[u8]) -> Result<(), RtcError> {
        self.remote_description = true;
        let _ = self.events.try_send(RtcEvent::TransportConnected);
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.remote_description
    }

    fn add_ice_candidate(&mut self, _candidate: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }

    fn gathering_complete(&self) -> bool {
        true
    }

    fn send_input(&mut self, _payload: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }

    fn close(&mut self) {}
}

struct NullSink;

impl SampleSink for NullSink {
    fn write_sample(&mut self, _sample: &[u8]) -> Result<(), RtcError> {
        Ok(())
    }
}

struct NullCapture;

impl ScreenCapture for NullCapture {
    fn start(
        &mut self,
        _width: u32,
        _height: u32,
        _codec: VideoCodec,
        _track: Box<dyn SampleSink>,
    ) -> Result<(), MediaError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        Ok(())
    }
}

#[derive(Default)]
struct NullPlayback {
    input_tx: Option<mpsc::Sender<InputEvent>>,
}

impl Playback for NullPlayback {
    fn start(
        &mut self,
        _width: u32,
        _height: u32,
        _payload_type: u8,
        _codec: VideoCodec,
    ) -> Result<(), MediaError> {
        Ok(())
    }

    fn handle_frame_buffer(&mut self, _frame: &[u8]) {}

    fn stop(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    fn input_events(&mut self) -> mpsc::Receiver<InputEvent> {
        let (tx, rx) = mpsc::channel(32);
        self.input_tx = Some(tx);
        rx
    }

    fn run_until_closed(&mut self) {}
}

struct LogInjector;

impl InputInjector for LogInjector {
    fn move_to(&mut self, x: i32, y: i32) {
        tracing::info!(x, y, "move");
    }

    fn button(&mut self, button: MouseButton, action: KeyAction) {
        tracing::info!(?button, ?action, "button");
    }

    fn drag_to(&mut self, button: MouseButton, x: i32, y: i32) {
        tracing::info!(?button, x, y, "drag");
    }

    fn scroll(&mut self, ticks: i32) {
        tracing::info!(ticks, "scroll");
    }

    fn key(&mut self, key: &str, action: KeyAction, modifiers: &[Modifier]) {
        tracing::info!(key, ?action, ?modifiers, "key");
    }
}
