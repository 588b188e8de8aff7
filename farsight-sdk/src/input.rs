//! Input-event bridge between the remote viewer and the host OS.
//!
//! The remote side serializes viewer-window activity into small JSON
//! messages and ships them over the data channel; the host side parses
//! them, normalizes coordinates from remote-window space into its own
//! screen space, and hands them to an [`InputInjector`] implementation.
//!
//! Wire shape, one object per event:
//! `{"type":"move","event":{"x":..,"y":..,"width":..,"height":..}}`
//! and likewise for `click`, `drag`, `scroll` and `key`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    #[serde(rename = "ButtonPrimary")]
    Primary,
    #[serde(rename = "ButtonSecondary")]
    Secondary,
    #[serde(rename = "ButtonTertiary")]
    Tertiary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
}

/// Pointer moved to (x, y) in remote-window coordinates. `width` and
/// `height` carry the remote window size so the host can scale into its
/// own screen space; the remote resends them with every move, which
/// also covers window resizes mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub button: MouseButton,
    pub action: KeyAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragEvent {
    pub button: MouseButton,
    pub x: f32,
    pub y: f32,
}

/// Positive is up, negative is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollEvent {
    pub scroll: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub action: KeyAction,
    pub modifiers: Vec<Modifier>,
}

/// One input event on the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "event", rename_all = "lowercase")]
pub enum InputEvent {
    Move(MoveEvent),
    Click(ClickEvent),
    Drag(DragEvent),
    Scroll(ScrollEvent),
    Key(KeyEvent),
}

impl InputEvent {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Deserialize one data-channel payload.
pub fn parse(payload: &[u8]) -> Result<InputEvent, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Fixed mapping from viewer-toolkit key symbols to the portable names
/// the host injector understands. Unlisted keys pass through lowercased.
pub fn special_key(symbol: &str) -> Option<&'static str> {
    Some(match symbol {
        "←" => "left",
        "→" => "right",
        "↑" => "up",
        "↓" => "down",
        "⏎" | "⌤" => "enter",
        "⎋" => "escape",
        "⇱" => "home",
        "⇲" => "end",
        "⌫" => "backspace",
        "⌦" => "delete",
        "⇞" => "pageup",
        "⇟" => "pagedown",
        "⇥" => "tab",
        "Space" => "space",
        _ => return None,
    })
}

/// Build a key event from a raw viewer key symbol, applying the special
/// key table.
pub fn key_event(symbol: &str, action: KeyAction, modifiers: Vec<Modifier>) -> InputEvent {
    let key = match special_key(symbol) {
        Some(name) => name.to_string(),
        None => symbol.to_lowercase(),
    };
    InputEvent::Key(KeyEvent { key, action, modifiers })
}

/// Scale a remote-window position into host-screen coordinates.
pub fn normalized_pos(
    x: f32,
    y: f32,
    remote_w: f32,
    remote_h: f32,
    host_w: u32,
    host_h: u32,
) -> (i32, i32) {
    if remote_w <= 0.0 || remote_h <= 0.0 {
        return (0, 0);
    }
    let nx = (x / remote_w) * host_w as f32;
    let ny = (y / remote_h) * host_h as f32;
    (nx as i32, ny as i32)
}

/// Host-side OS injection seam. Implementations wrap whatever native
/// automation layer the platform offers.
pub trait InputInjector: Send + Sync {
    fn move_to(&mut self, x: i32, y: i32);
    fn button(&mut self, button: MouseButton, action: KeyAction);
    fn drag_to(&mut self, button: MouseButton, x: i32, y: i32);
    /// `ticks` follows the wire convention: positive scrolls up.
    fn scroll(&mut self, ticks: i32);
    fn key(&mut self, key: &str, action: KeyAction, modifiers: &[Modifier]);
}

/// Parses data-channel payloads and drives an [`InputInjector`],
/// tracking the remote window size and the drag state so moves and
/// drags stay distinct on the host side.
pub struct InputBridge {
    injector: Box<dyn InputInjector>,
    host_w: u32,
    host_h: u32,
    remote_w: f32,
    remote_h: f32,
    mouse_down: bool,
}

impl InputBridge {
    /// `host_w`/`host_h` is the host screen size in physical pixels.
    pub fn new(injector: Box<dyn InputInjector>, host_w: u32, host_h: u32) -> Self {
        Self { injector, host_w, host_h, remote_w: 0.0, remote_h: 0.0, mouse_down: false }
    }

    /// Consume one payload from the data channel. Malformed payloads
    /// are logged and dropped; the channel stays up.
    pub fn parse(&mut self, payload: &[u8]) {
        match parse(payload) {
            Ok(event) => self.apply(event),
            Err(err) => tracing::warn!(%err, "dropping malformed input event"),
        }
    }

    fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Move(ev) => {
                if ev.width != self.remote_w || ev.height != self.remote_h {
                    self.remote_w = ev.width;
                    self.remote_h = ev.height;
                }
                // A plain move ends any drag in progress.
                if self.mouse_down {
                    self.injector.button(MouseButton::Primary, KeyAction::Release);
                    self.mouse_down = false;
                }
                let (x, y) = self.scale(ev.x, ev.y);
                self.injector.move_to(x, y);
            }
            InputEvent::Click(ev) => {
                if ev.button == MouseButton::Primary {
                    self.mouse_down = ev.action == KeyAction::Press;
                }
                self.injector.button(ev.button, ev.action);
            }
            InputEvent::Drag(ev) => {
                if ev.button == MouseButton::Primary && !self.mouse_down {
                    self.injector.button(MouseButton::Primary, KeyAction::Press);
                    self.mouse_down = true;
                }
                let (x, y) = self.scale(ev.x, ev.y);
                self.injector.drag_to(ev.button, x, y);
            }
            InputEvent::Scroll(ev) => {
                let ticks = if ev.scroll > 0 { 2 } else { -2 };
                self.injector.scroll(ticks);
            }
            InputEvent::Key(ev) => {
                self.injector.key(&ev.key, ev.action, &ev.modifiers);
            }
        }
    }

    fn scale(&self, x: f32, y: f32) -> (i32, i32) {
        normalized_pos(x, y, self.remote_w, self.remote_h, self.host_w, self.host_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Injected {
        Move(i32, i32),
        Button(MouseButton, KeyAction),
        Drag(MouseButton, i32, i32),
        Scroll(i32),
        Key(String, KeyAction, Vec<Modifier>),
    }

    #[derive(Default)]
    struct Recorder(std::sync::Arc<std::sync::Mutex<Vec<Injected>>>);

    impl InputInjector for Recorder {
        fn move_to(&mut self, x: i32, y: i32) {
            self.0.lock().unwrap().push(Injected::Move(x, y));
        }
        fn button(&mut self, button: MouseButton, action: KeyAction) {
            self.0.lock().unwrap().push(Injected::Button(button, action));
        }
        fn drag_to(&mut self, button: MouseButton, x: i32, y: i32) {
            self.0.lock().unwrap().push(Injected::Drag(button, x, y));
        }
        fn scroll(&mut self, ticks: i32) {
            self.0.lock().unwrap().push(Injected::Scroll(ticks));
        }
        fn key(&mut self, key: &str, action: KeyAction, modifiers: &[Modifier]) {
            self.0.lock().unwrap().push(Injected::Key(key.to_string(), action, modifiers.to_vec()));
        }
    }

    fn bridge() -> (InputBridge, std::sync::Arc<std::sync::Mutex<Vec<Injected>>>) {
        let rec = Recorder::default();
        let log = rec.0.clone();
        (InputBridge::new(Box::new(rec), 1920, 1080), log)
    }

    fn payload(event: &InputEvent) -> Vec<u8> {
        event.to_bytes().unwrap()
    }

    #[test]
    fn wire_shape_matches_contract() {
        let ev = InputEvent::Move(MoveEvent { x: 10.0, y: 20.0, width: 640.0, height: 360.0 });
        let text = serde_json::to_string(&ev).unwrap();
        assert_eq!(
            text,
            r#"{"type":"move","event":{"x":10.0,"y":20.0,"width":640.0,"height":360.0}}"#
        );

        let ev = InputEvent::Click(ClickEvent { button: MouseButton::Primary, action: KeyAction::Press });
        let text = serde_json::to_string(&ev).unwrap();
        assert_eq!(text, r#"{"type":"click","event":{"button":"ButtonPrimary","action":"press"}}"#);

        let ev = key_event("←", KeyAction::Press, vec![Modifier::Ctrl, Modifier::Shift]);
        let text = serde_json::to_string(&ev).unwrap();
        assert_eq!(
            text,
            r#"{"type":"key","event":{"key":"left","action":"press","modifiers":["ctrl","shift"]}}"#
        );
    }

    #[test]
    fn parse_rejects_unknown_type() {
        assert!(parse(br#"{"type":"hover","event":{}}"#).is_err());
    }

    #[test]
    fn move_scales_into_host_space() {
        let (mut bridge, log) = bridge();
        bridge.parse(&payload(&InputEvent::Move(MoveEvent {
            x: 320.0,
            y: 180.0,
            width: 640.0,
            height: 360.0,
        })));
        assert_eq!(log.lock().unwrap().as_slice(), &[Injected::Move(960, 540)]);
    }

    #[test]
    fn drag_presses_once_then_moves() {
        let (mut bridge, log) = bridge();
        // Establish the remote window size first.
        bridge.parse(&payload(&InputEvent::Move(MoveEvent {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 360.0,
        })));
        for x in [100.0, 200.0] {
            bridge.parse(&payload(&InputEvent::Drag(DragEvent {
                button: MouseButton::Primary,
                x,
                y: 90.0,
            })));
        }
        // Move after the drag releases the button.
        bridge.parse(&payload(&InputEvent::Move(MoveEvent {
            x: 200.0,
            y: 90.0,
            width: 640.0,
            height: 360.0,
        })));

        let log = log.lock().unwrap();
        assert_eq!(
            log.as_slice(),
            &[
                Injected::Move(0, 0),
                Injected::Button(MouseButton::Primary, KeyAction::Press),
                Injected::Drag(MouseButton::Primary, 300, 270),
                Injected::Drag(MouseButton::Primary, 600, 270),
                Injected::Button(MouseButton::Primary, KeyAction::Release),
                Injected::Move(600, 270),
            ]
        );
    }

    #[test]
    fn scroll_maps_to_two_ticks() {
        let (mut bridge, log) = bridge();
        bridge.parse(&payload(&InputEvent::Scroll(ScrollEvent { scroll: 7 })));
        bridge.parse(&payload(&InputEvent::Scroll(ScrollEvent { scroll: -1 })));
        assert_eq!(log.lock().unwrap().as_slice(), &[Injected::Scroll(2), Injected::Scroll(-2)]);
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let (mut bridge, log) = bridge();
        bridge.parse(b"notjson");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn special_key_table() {
        assert_eq!(special_key("⏎"), Some("enter"));
        assert_eq!(special_key("⇥"), Some("tab"));
        assert_eq!(special_key("Space"), Some("space"));
        assert_eq!(special_key("a"), None);
        // Unlisted keys lowercase through the builder.
        match key_event("A", KeyAction::Release, vec![]) {
            InputEvent::Key(k) => assert_eq!(k.key, "a"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
