//! Session lifecycle event fan-out.
//!
//! The registry records what happened (session created, peer joined,
//! peer left, session ended); one background actor drains those records
//! and POSTs them to an optional REST endpoint. Failures are logged and
//! never reach the signaling path.

use serde::Serialize;
use tokio::sync::mpsc;

/// Depth of the registry → fan-out channel. Overflow drops events, not
/// frames.
pub const AUDIT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    SessionCreated {
        user_id: String,
        device_id: String,
        token: String,
    },
    SessionJoined {
        user_id: String,
        device_id: String,
        token: String,
    },
    SessionLeft {
        user_id: String,
        device_id: String,
        token: String,
    },
    SessionEnded {
        token: String,
    },
}

/// Drains audit events until the hub shuts down. With no endpoint
/// configured the events go to the log at debug level.
pub async fn run(endpoint: Option<String>, mut rx: mpsc::Receiver<AuditEvent>) {
    let client = reqwest::Client::new();
    while let Some(event) = rx.recv().await {
        let Some(url) = endpoint.as_deref() else {
            tracing::debug!(?event, "session event");
            continue;
        };
        match client.post(url).json(&event).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), ?event, "event endpoint rejected the call");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, ?event, "failed to deliver session event"),
        }
    }
    tracing::debug!("session event fan-out stopped");
}
