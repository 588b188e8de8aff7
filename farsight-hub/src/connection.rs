//! Per-peer connection handling.
//!
//! Each accepted WebSocket gets a rate-limited read loop (this task)
//! and a writer task draining the peer's outbox, so writes to one
//! socket are always serialized. Dispatch runs on the read loop:
//! registry mutations under the write lock, signal forwarding under the
//! read lock, with outbound frames delivered before the lock drops so
//! per-recipient ordering follows registry order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::MutexGuard;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use farsight_sdk::proto::{Frame, InfoKind, JoinAnswer, MAX_FRAME_LEN, Payload, SessionKind};

use crate::registry::{Outcome, RegistryError};
use crate::server::SharedState;

/// Outbox depth per peer. A peer that stops draining for long gets cut.
const OUTBOX_DEPTH: usize = 64;

/// Ingress token bucket: one frame per tick, ten per second.
const READ_INTERVAL: Duration = Duration::from_millis(100);

/// Send a WebSocket ping after this long without outbound traffic.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Close the connection after this long without any inbound traffic.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives one peer connection from upgrade to removal.
pub async fn handle(socket: WebSocket, addr: SocketAddr, state: Arc<SharedState>) {
    let mut socket = socket;
    if socket.protocol().is_none() {
        tracing::warn!(%addr, "subprotocol mismatch, closing");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "signaling subprotocol required".into(),
            })))
            .await;
        return;
    }

    let peer_id = addr.to_string();
    let add_result = state.registry.write().add_peer(&peer_id);
    if let Err(err) = add_result {
        tracing::warn!(peer = %peer_id, %err, "rejecting connection");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "duplicate peer".into(),
            })))
            .await;
        return;
    }

    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_DEPTH);
    state.connections.lock().insert(peer_id.clone(), outbox_tx);
    tracing::info!(peer = %peer_id, "peer connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(sink, outbox_rx, peer_id.clone()));

    read_loop(stream, &peer_id, &state).await;

    // Removal: drop the outbox first so the writer drains and closes,
    // then clean the registry up, delivering any cleanup traffic.
    state.connections.lock().remove(&peer_id);
    let outcome = state.registry.write().remove_peer(&peer_id);
    match outcome {
        Ok(outcome) => deliver(&state, outcome),
        Err(err) => tracing::error!(peer = %peer_id, %err, "cleanup failed on disconnect"),
    }
    let _ = writer.await;
    tracing::info!(peer = %peer_id, "peer disconnected");
}

/// Owns the socket's write half. Encodes and sends everything queued on
/// the outbox; pings when the outbox stays quiet. Ends when the outbox
/// closes (peer removal) or a write fails.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<Frame>,
    peer_id: String,
) {
    loop {
        let frame = match tokio::time::timeout(PING_INTERVAL, outbox.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(_) => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return;
                }
                continue;
            }
        };
        let text = match frame.encode() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(peer = %peer_id, %err, "failed to encode outbound frame");
                continue;
            }
        };
        tracing::debug!(peer = %peer_id, kind = frame.describe(), "-> peer");
        if let Err(err) = sink.send(Message::Text(text.into())).await {
            tracing::warn!(peer = %peer_id, %err, "write failed");
            return;
        }
    }
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        })))
        .await;
}

/// Rate-limited read loop; returns when the peer goes away or breaks an
/// invariant.
async fn read_loop(mut stream: SplitStream<WebSocket>, peer_id: &str, state: &Arc<SharedState>) {
    let mut limiter = tokio::time::interval(READ_INTERVAL);
    limiter.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        limiter.tick().await;
        let message = match tokio::time::timeout(IDLE_TIMEOUT, stream.next()).await {
            Ok(message) => message,
            Err(_) => {
                tracing::info!(peer = %peer_id, "idle timeout, closing");
                return;
            }
        };
        match message {
            Some(Ok(Message::Text(text))) => {
                if text.len() > MAX_FRAME_LEN {
                    tracing::warn!(peer = %peer_id, len = text.len(), "oversized frame, dropping");
                    continue;
                }
                if let Err(err) = dispatch(state, peer_id, text.as_str()) {
                    tracing::error!(peer = %peer_id, %err, "registry invariant violated, closing connection");
                    return;
                }
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(peer = %peer_id, "dropping unexpected binary frame");
            }
            Some(Err(err)) => {
                tracing::debug!(peer = %peer_id, %err, "read failed");
                return;
            }
        }
    }
}

/// Route one decoded frame. Malformed frames and state surprises are
/// logged and dropped; only [`RegistryError`]s propagate, and those
/// close the connection.
fn dispatch(state: &Arc<SharedState>, peer_id: &str, text: &str) -> Result<(), RegistryError> {
    let mut frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(peer = %peer_id, %err, "dropping malformed frame");
            return Ok(());
        }
    };
    // Only the hub writes `from`; whatever the client sent is replaced.
    frame.from = Some(peer_id.to_string());
    tracing::debug!(peer = %peer_id, kind = frame.describe(), "<- peer");

    match frame.payload {
        Payload::Signal(_) => {
            // Blind forwarding to the rest of the room, shared lock only.
            let registry = state.registry.read();
            match registry.signal_targets(peer_id) {
                Some(targets) if !targets.is_empty() => {
                    let mut connections = state.connections.lock();
                    for target in targets {
                        send_to(&mut connections, &target, frame.clone());
                    }
                }
                _ => {
                    tracing::debug!(peer = %peer_id, "signal from a peer not in a room, dropping");
                }
            }
            Ok(())
        }
        Payload::Session(msg) => {
            let mut registry = state.registry.write();
            let outcome = match msg.kind {
                SessionKind::JoinRequest => registry.join_request(peer_id, &msg.token)?,
                SessionKind::JoinResponse => registry.join_response(
                    peer_id,
                    &msg.token,
                    msg.response.unwrap_or(JoinAnswer::Allow),
                )?,
                SessionKind::Leave => registry.leave(peer_id)?,
            };
            // Delivered before the write lock drops so per-recipient
            // ordering follows registry order.
            deliver(state, outcome);
            Ok(())
        }
        Payload::Info(msg) => {
            if msg.kind == InfoKind::Register {
                let mut registry = state.registry.write();
                let outcome = registry.register(peer_id, &msg.user_id, &msg.device_id)?;
                deliver(state, outcome);
            } else {
                tracing::debug!(peer = %peer_id, kind = ?msg.kind, "info frame ignored");
            }
            Ok(())
        }
        // Command ingress is reserved; API is reserved outright.
        Payload::Command(_) | Payload::Api(_) => Ok(()),
    }
}

/// Push an operation's frames into the affected outboxes and its audit
/// records to the fan-out.
pub(crate) fn deliver(state: &SharedState, outcome: Outcome) {
    if !outcome.sends.is_empty() {
        let mut connections = state.connections.lock();
        for (to, frame) in outcome.sends {
            send_to(&mut connections, &to, frame);
        }
    }
    for event in outcome.audit {
        if state.audit.try_send(event).is_err() {
            tracing::debug!("audit channel full, dropping session event");
        }
    }
}

/// Queue a frame on a peer's outbox. A full or closed outbox counts as
/// a write error: the peer's connection is dropped, which its read loop
/// will notice as a transport close.
fn send_to(
    connections: &mut MutexGuard<'_, HashMap<String, mpsc::Sender<Frame>>>,
    to: &str,
    frame: Frame,
) {
    let Some(tx) = connections.get(to) else {
        tracing::debug!(peer = to, "no connection for recipient, dropping frame");
        return;
    };
    if tx.try_send(frame).is_err() {
        tracing::warn!(peer = to, "outbox full or closed, cutting connection");
        connections.remove(to);
    }
}
