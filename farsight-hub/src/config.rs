//! Hub configuration, from flags or environment.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "farsight-hub", about = "Signaling hub for farsight screen sharing")]
pub struct HubConfig {
    /// Address the signaling listener binds.
    #[arg(long, env = "FARSIGHT_HUB_LISTEN", default_value = "0.0.0.0:8765")]
    pub listen_addr: String,

    /// REST endpoint that session lifecycle events are POSTed to.
    /// Events are logged locally when unset.
    #[arg(long, env = "FARSIGHT_HUB_EVENTS_URL")]
    pub events_url: Option<String>,
}

impl HubConfig {
    /// Configuration for tests: ephemeral local port, no event fan-out.
    pub fn for_tests() -> Self {
        Self { listen_addr: "127.0.0.1:0".to_string(), events_url: None }
    }
}
