//! Media collaborator seams. The encode/decode pipelines live outside
//! the session core; these traits are the contract it drives them by.

use tokio::sync::mpsc;

use crate::config::VideoCodec;
use crate::error::MediaError;
use crate::input::InputEvent;
use crate::rtc::SampleSink;

/// Host-side screen capture and encode pipeline.
pub trait ScreenCapture: Send + Sync {
    /// Start capturing at the given resolution, encoding with `codec`,
    /// writing encoded samples into `track`.
    fn start(
        &mut self,
        width: u32,
        height: u32,
        codec: VideoCodec,
        track: Box<dyn SampleSink>,
    ) -> Result<(), MediaError>;

    fn stop(&mut self) -> Result<(), MediaError>;
}

/// Remote-side decode and render pipeline.
pub trait Playback: Send + Sync {
    /// Configure the decode pipeline for an incoming track.
    fn start(
        &mut self,
        width: u32,
        height: u32,
        payload_type: u8,
        codec: VideoCodec,
    ) -> Result<(), MediaError>;

    /// Feed one depacketized frame buffer to the decoder.
    fn handle_frame_buffer(&mut self, frame: &[u8]);

    fn stop(&mut self) -> Result<(), MediaError>;

    /// Input events produced by the viewer window, to be forwarded over
    /// the data channel. Callable once per session; the pipeline hands
    /// out the receiving half of its event queue.
    fn input_events(&mut self) -> mpsc::Receiver<InputEvent>;

    /// Blocks until the user closes the viewer window. Driven by the
    /// embedder's UI thread, never by the session core.
    fn run_until_closed(&mut self);
}
