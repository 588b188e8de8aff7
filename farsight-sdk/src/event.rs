//! Events emitted by the session core for the UI layer to consume.

/// Which side of the session this peer is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Screen producer, input consumer.
    Host,
    /// Screen consumer, input producer.
    Remote,
}

/// Events the session core emits to its embedder (GUI, TUI, tests).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Signaling channel is up.
    Connected,

    /// Registration completed; `token` is the session token other peers
    /// dial to reach this one.
    Registered { token: String },

    /// A remote peer asked to join our room. The core accepts on our
    /// behalf; this event is informational.
    JoinRequested { token: String },

    /// Media negotiation began in the given role.
    SessionStarted { role: Role },

    /// The underlying media transport reports connected.
    MediaConnected,

    /// The active session ended (peer left, host stopped, or terminate
    /// command received). The core renews its token and returns to the
    /// registered state.
    SessionEnded,

    /// Token renewal completed after a session ended.
    TokenRenewed { token: String },

    /// The hub rejected a request (invalid token, busy host, denied
    /// join). The core shuts down after this.
    HubError { text: String },

    /// Signaling channel is gone.
    Disconnected { reason: String },
}
