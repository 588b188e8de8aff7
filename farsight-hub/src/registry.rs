//! Peer/room/session registry: the hub's only shared mutable state.
//!
//! Four maps, all keyed by string: peers by connection id, peers by the
//! session token they own, rooms by token, and pending join requests by
//! the token they target. A peer's `status` is empty while idle and
//! holds the room token while in a session; a peer hosts its own room
//! exactly when `status == session_token`.
//!
//! Registry methods mutate state and return an [`Outcome`]: the frames
//! to put on the wire and the audit events to record. The caller owns
//! delivery, so the state machine stays synchronous and testable.
//! Everything here runs under the hub's registry lock.

use std::collections::HashMap;

use farsight_sdk::proto::{CommandKind, Frame, InfoKind, JoinAnswer, SessionKind};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditEvent;

/// A registry operation that would break the data model. Treated as a
/// programming error: the affected connection is closed, never the
/// process.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate peer {0}")]
    DuplicatePeer(String),

    #[error("unknown peer {0}")]
    UnknownPeer(String),

    #[error("room {0} not found")]
    UnknownRoom(String),

    #[error("peer {peer} not found in room {room}")]
    NotInRoom { peer: String, room: String },

    #[error("no session host in room {0}")]
    NoHost(String),
}

/// A connected endpoint.
#[derive(Debug, Clone, Default)]
pub struct Peer {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    /// Token of the room this peer owns; empty until registered.
    pub session_token: String,
    /// Token of the room this peer is currently inside; empty when idle.
    pub status: String,
}

impl Peer {
    pub fn in_room(&self) -> bool {
        !self.status.is_empty()
    }

    /// A peer hosts its own room iff it joined the room its token names.
    pub fn is_host(&self) -> bool {
        self.in_room() && self.status == self.session_token
    }
}

/// Rendezvous container for the two peers of a session.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub peers: Vec<String>,
}

/// A join handshake awaiting the host's response, keyed by the target
/// session token.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub id: String,
    pub sender: String,
    pub recipient: String,
}

/// What an operation wants done once the lock is released: frames to
/// specific peers (in order) and audit records.
#[derive(Debug, Default)]
pub struct Outcome {
    pub sends: Vec<(String, Frame)>,
    pub audit: Vec<AuditEvent>,
}

impl Outcome {
    fn send(&mut self, to: &str, frame: Frame) {
        self.sends.push((to.to_string(), frame));
    }

    fn record(&mut self, event: AuditEvent) {
        self.audit.push(event);
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    peers: HashMap<String, Peer>,
    sessions: HashMap<String, String>,
    rooms: HashMap<String, Room>,
    requests: HashMap<String, JoinRequest>,
}

fn mint_token() -> String {
    Uuid::new_v4().to_string()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub fn add_peer(&mut self, id: &str) -> Result<(), RegistryError> {
        if self.peers.contains_key(id) {
            return Err(RegistryError::DuplicatePeer(id.to_string()));
        }
        self.peers.insert(id.to_string(), Peer { id: id.to_string(), ..Peer::default() });
        Ok(())
    }

    /// `Info.Register`: store the peer's identity, mint it a session
    /// token (any client-supplied token is discarded) and create its
    /// room. Replies with `Info.Token`.
    pub fn register(
        &mut self,
        id: &str,
        user_id: &str,
        device_id: &str,
    ) -> Result<Outcome, RegistryError> {
        let peer = self.peer_mut(id)?;
        if !peer.session_token.is_empty() {
            tracing::warn!(peer = id, "register from an already registered peer, ignoring");
            return Ok(Outcome::default());
        }
        let token = mint_token();
        peer.user_id = user_id.to_string();
        peer.device_id = device_id.to_string();
        peer.session_token = token.clone();
        self.sessions.insert(token.clone(), id.to_string());
        self.rooms.insert(token.clone(), Room { id: token.clone(), peers: Vec::new() });
        tracing::info!(peer = id, %token, "peer registered");

        let mut out = Outcome::default();
        out.send(id, Frame::info(InfoKind::Token, token.clone()));
        out.record(AuditEvent::SessionCreated {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            token,
        });
        Ok(out)
    }

    /// `Session.JoinRequest`: peer `id` asks to enter the room named by
    /// `token`. Forwarded to the host unless the token is bogus, the
    /// host is busy, or an identical request is already pending.
    pub fn join_request(&mut self, id: &str, token: &str) -> Result<Outcome, RegistryError> {
        let mut out = Outcome::default();
        let peer = self.peer(id)?;
        if token.is_empty() {
            tracing::warn!(peer = id, "join request without a room token, ignoring");
            return Ok(out);
        }
        if peer.in_room() {
            tracing::warn!(peer = id, room = %peer.status, "join request from a peer already in a room, ignoring");
            return Ok(out);
        }
        let Some(host_id) = self.sessions.get(token).cloned() else {
            out.send(id, Frame::info(InfoKind::Error, "Invalid session token"));
            return Ok(out);
        };
        let host = self.peer(&host_id)?;
        if host.in_room() {
            tracing::info!(peer = id, host = %host_id, "target host is already in a session");
            out.send(id, Frame::info(InfoKind::Error, "Peer already in room"));
            return Ok(out);
        }
        if self.requests.contains_key(token) {
            // Debounce: the handshake is already in flight.
            tracing::debug!(peer = id, %token, "duplicate join request, dropping");
            return Ok(out);
        }
        self.requests.insert(
            token.to_string(),
            JoinRequest {
                id: token.to_string(),
                sender: id.to_string(),
                recipient: host_id.clone(),
            },
        );
        tracing::info!(peer = id, host = %host_id, %token, "join request forwarded");
        let mut forward = Frame::session(SessionKind::JoinRequest, token, None);
        forward.from = Some(id.to_string());
        out.send(&host_id, forward);
        Ok(out)
    }

    /// `Session.JoinResponse` from the host of `token`. Allow seats
    /// both peers in the room and tells the remote to start
    /// negotiating; Deny bounces an error to the requester. Both
    /// resolutions clear the pending request.
    pub fn join_response(
        &mut self,
        id: &str,
        token: &str,
        answer: JoinAnswer,
    ) -> Result<Outcome, RegistryError> {
        let mut out = Outcome::default();
        let peer = self.peer(id)?;
        if peer.in_room() {
            tracing::warn!(peer = id, "join response from a peer already in a session, ignoring");
            return Ok(out);
        }
        if peer.session_token != token {
            tracing::warn!(peer = id, %token, "join response for a session the peer does not own, ignoring");
            return Ok(out);
        }
        let Some(request) = self.requests.remove(token) else {
            tracing::warn!(peer = id, %token, "join response without a pending request, ignoring");
            return Ok(out);
        };
        match answer {
            JoinAnswer::Allow => {
                if !self.peers.contains_key(&request.sender) {
                    // The requester disconnected while the host decided.
                    tracing::info!(remote = %request.sender, "join requester is gone, dropping handshake");
                    return Ok(out);
                }
                tracing::info!(host = id, remote = %request.sender, %token, "join request allowed");
                self.seat_in_room(token, id)?;
                self.seat_in_room(token, &request.sender)?;

                out.send(
                    &request.sender,
                    Frame::info(
                        InfoKind::Ack,
                        format!("Session Join Request {token} ALLOWED"),
                    ),
                );
                out.send(&request.sender, Frame::command(CommandKind::InitiateSession));
                let remote = self.peer(&request.sender)?;
                out.record(AuditEvent::SessionJoined {
                    user_id: remote.user_id.clone(),
                    device_id: remote.device_id.clone(),
                    token: token.to_string(),
                });
            }
            JoinAnswer::Deny => {
                tracing::info!(host = id, remote = %request.sender, %token, "join request denied");
                out.send(
                    &request.sender,
                    Frame::info(
                        InfoKind::Error,
                        format!("Session Join Request {token} Denied"),
                    ),
                );
            }
        }
        Ok(out)
    }

    /// `Session.Leave`. A no-op for peers outside a room. A departing
    /// guest triggers cleanup toward the host; a host leaving is
    /// handled like a disconnect of its session. The departing peer's
    /// token is renewed either way.
    pub fn leave(&mut self, id: &str) -> Result<Outcome, RegistryError> {
        let peer = self.peer(id)?;
        if !peer.in_room() {
            tracing::debug!(peer = id, "leave from a peer not in a room, ignoring");
            return Ok(Outcome::default());
        }
        let was_host = peer.is_host();
        let mut out = Outcome::default();
        self.session_cleanup(id, &mut out)?;
        if !was_host {
            // The host branch of cleanup already renewed the host.
            self.renew_token(id, &mut out)?;
        }
        Ok(out)
    }

    /// Connection closed: run session cleanup if needed, then forget
    /// the peer entirely.
    pub fn remove_peer(&mut self, id: &str) -> Result<Outcome, RegistryError> {
        let mut out = Outcome::default();
        let in_room = match self.peers.get(id) {
            Some(peer) => peer.in_room(),
            // Never made it past add_peer (e.g. duplicate id).
            None => return Ok(out),
        };
        if in_room {
            self.session_cleanup(id, &mut out)?;
        }
        if let Some(peer) = self.peers.remove(id) {
            // The renewal minted during cleanup is discarded with the rest.
            out.sends.retain(|(to, _)| to.as_str() != id);
            self.rooms.remove(&peer.session_token);
            self.sessions.remove(&peer.session_token);
        }
        // Drop any handshake this peer was part of.
        self.requests.retain(|_, req| req.sender != id && req.recipient != id);
        tracing::info!(peer = id, "peer removed");
        Ok(out)
    }

    /// Recipients for a Signal frame from `id`: every other peer in its
    /// room. `None` when the peer is not in a (live) room.
    pub fn signal_targets(&self, id: &str) -> Option<Vec<String>> {
        let peer = self.peers.get(id)?;
        if !peer.in_room() {
            return None;
        }
        let room = self.rooms.get(&peer.status)?;
        Some(room.peers.iter().filter(|m| m.as_str() != id).cloned().collect())
    }

    pub fn peer(&self, id: &str) -> Result<&Peer, RegistryError> {
        self.peers.get(id).ok_or_else(|| RegistryError::UnknownPeer(id.to_string()))
    }

    fn peer_mut(&mut self, id: &str) -> Result<&mut Peer, RegistryError> {
        self.peers.get_mut(id).ok_or_else(|| RegistryError::UnknownPeer(id.to_string()))
    }

    // ── internals, all under the caller's lock ──────────────────────

    /// Tear down the session around departing peer `id`.
    ///
    /// Host departing: every guest gets `Command.TerminateSession`, is
    /// detached and renewed; then the host detaches and renews.
    /// Guest departing: the host gets `Command.TerminateSession`, the
    /// guest detaches, and cleanup recurses to the host (which then
    /// takes the host branch with an empty room).
    fn session_cleanup(&mut self, id: &str, out: &mut Outcome) -> Result<(), RegistryError> {
        let (token, status, is_host) = {
            let peer = self.peer(id)?;
            (peer.session_token.clone(), peer.status.clone(), peer.is_host())
        };
        if is_host {
            tracing::info!(host = id, %token, "session host leaving, dissolving room");
            let members = self
                .rooms
                .get(&token)
                .ok_or_else(|| RegistryError::UnknownRoom(token.clone()))?
                .peers
                .clone();
            for member in members.iter().filter(|m| m.as_str() != id) {
                out.send(member, Frame::command(CommandKind::TerminateSession));
                self.detach_from_room(&token, member)?;
                self.renew_token(member, out)?;
            }
            self.detach_from_room(&token, id)?;
            out.record(AuditEvent::SessionEnded { token: token.clone() });
            self.renew_token(id, out)?;
        } else {
            let room_id = status;
            tracing::info!(peer = id, room = %room_id, "guest leaving session");
            let host_id = {
                let room = self
                    .rooms
                    .get(&room_id)
                    .ok_or_else(|| RegistryError::UnknownRoom(room_id.clone()))?;
                room.peers
                    .iter()
                    .find(|m| self.peers.get(*m).is_some_and(|p| p.is_host()))
                    .cloned()
                    .ok_or_else(|| RegistryError::NoHost(room_id.clone()))?
            };
            out.send(&host_id, Frame::command(CommandKind::TerminateSession));
            self.detach_from_room(&room_id, id)?;
            {
                let peer = self.peer(id)?;
                out.record(AuditEvent::SessionLeft {
                    user_id: peer.user_id.clone(),
                    device_id: peer.device_id.clone(),
                    token: room_id.clone(),
                });
            }
            // Collapses after one step: the host now has an empty room.
            self.session_cleanup(&host_id, out)?;
        }
        Ok(())
    }

    fn seat_in_room(&mut self, token: &str, id: &str) -> Result<(), RegistryError> {
        let room = self
            .rooms
            .get_mut(token)
            .ok_or_else(|| RegistryError::UnknownRoom(token.to_string()))?;
        room.peers.push(id.to_string());
        self.peer_mut(id)?.status = token.to_string();
        Ok(())
    }

    fn detach_from_room(&mut self, room_id: &str, id: &str) -> Result<(), RegistryError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::UnknownRoom(room_id.to_string()))?;
        let position = room.peers.iter().position(|m| m == id).ok_or_else(|| {
            RegistryError::NotInRoom { peer: id.to_string(), room: room_id.to_string() }
        })?;
        room.peers.remove(position);
        self.peer_mut(id)?.status.clear();
        Ok(())
    }

    /// Mint a fresh token for `id`, re-keying its room and session
    /// entries, and tell the peer via `Info.Renew`. Membership of the
    /// re-keyed room is untouched.
    fn renew_token(&mut self, id: &str, out: &mut Outcome) -> Result<(), RegistryError> {
        let old = self.peer(id)?.session_token.clone();
        let new = mint_token();
        let mut room = self
            .rooms
            .remove(&old)
            .ok_or_else(|| RegistryError::UnknownRoom(old.clone()))?;
        room.id = new.clone();
        self.rooms.insert(new.clone(), room);
        if let Some(owner) = self.sessions.remove(&old) {
            self.sessions.insert(new.clone(), owner);
        }
        self.peer_mut(id)?.session_token = new.clone();
        tracing::info!(peer = id, old = %old, renewed = %new, "session token renewed");
        out.send(id, Frame::info(InfoKind::Renew, new));
        Ok(())
    }
}
