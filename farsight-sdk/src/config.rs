//! Peer configuration: CLI flags with env fallbacks, validated once at
//! startup. Validation failures are [`ConfigError`]s and terminate
//! startup; nothing here is checked again on the hot path.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::ConfigError;

/// Video codecs a host may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp8,
    Vp9,
}

impl VideoCodec {
    /// MIME form used on track negotiation (`video/VP8` etc).
    pub fn mime(self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/H264",
            VideoCodec::Vp8 => "video/VP8",
            VideoCodec::Vp9 => "video/VP9",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for VideoCodec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "video/H264" => Ok(VideoCodec::H264),
            "video/VP8" => Ok(VideoCodec::Vp8),
            "video/VP9" => Ok(VideoCodec::Vp9),
            other => Err(ConfigError::UnsupportedCodec(other.to_string())),
        }
    }
}

/// An ICE server the RTC engine should use, parsed out of `--url` and
/// `--creds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Command-line / environment configuration for a peer endpoint.
#[derive(Debug, Clone, Parser)]
#[command(name = "farsight", about = "Peer endpoint for farsight screen sharing")]
pub struct Args {
    /// ICE server URL (stun: or turn: scheme).
    #[arg(long, env = "FARSIGHT_ICE_URL", default_value = "stun:stun.l.google.com:19302")]
    pub url: String,

    /// TURN credentials as user:pass. Required with turn: URLs,
    /// rejected with stun: URLs.
    #[arg(long, env = "FARSIGHT_ICE_CREDS", default_value = "")]
    pub creds: String,

    /// Video codec the host offers.
    #[arg(long, env = "FARSIGHT_CODEC", default_value = "video/VP8")]
    pub codec: String,

    /// Signaling hub URL.
    #[arg(long, env = "FARSIGHT_HUB_ADDR", default_value = "ws://127.0.0.1:8765/ws")]
    pub addr: String,

    /// Path to a config file with saved user credentials.
    #[arg(long, env = "FARSIGHT_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Credentials for the session log API, as user:pass.
    #[arg(long, env = "FARSIGHT_USER_CREDS")]
    pub user_creds: Option<String>,
}

impl Args {
    /// Checks the flag set the way startup does, returning the parsed
    /// codec and ICE server on success.
    pub fn validate(&self) -> Result<(VideoCodec, IceServer), ConfigError> {
        let codec: VideoCodec = self.codec.parse()?;
        let ice = self.ice_server()?;
        if !self.addr.starts_with("ws://") && !self.addr.starts_with("wss://") {
            return Err(ConfigError::BadHubUrl(self.addr.clone()));
        }
        Ok((codec, ice))
    }

    fn ice_server(&self) -> Result<IceServer, ConfigError> {
        if self.url.starts_with("turn:") {
            if self.creds.is_empty() {
                return Err(ConfigError::MissingTurnCreds);
            }
            let (user, pass) = self
                .creds
                .split_once(':')
                .ok_or(ConfigError::MalformedTurnCreds)?;
            if user.is_empty() || pass.is_empty() {
                return Err(ConfigError::MalformedTurnCreds);
            }
            Ok(IceServer {
                url: self.url.clone(),
                username: Some(user.to_string()),
                password: Some(pass.to_string()),
            })
        } else if self.url.starts_with("stun:") {
            if !self.creds.is_empty() {
                return Err(ConfigError::UnexpectedCreds);
            }
            Ok(IceServer { url: self.url.clone(), username: None, password: None })
        } else {
            Err(ConfigError::BadIceScheme(self.url.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            url: "stun:stun.example.org:3478".into(),
            creds: String::new(),
            codec: "video/VP8".into(),
            addr: "ws://127.0.0.1:8765/ws".into(),
            config_path: None,
            user_creds: None,
        }
    }

    #[test]
    fn stun_without_creds_is_valid() {
        let (codec, ice) = base_args().validate().unwrap();
        assert_eq!(codec, VideoCodec::Vp8);
        assert_eq!(ice.username, None);
    }

    #[test]
    fn stun_with_creds_is_rejected() {
        let mut args = base_args();
        args.creds = "u:p".into();
        assert!(matches!(args.validate(), Err(ConfigError::UnexpectedCreds)));
    }

    #[test]
    fn turn_requires_user_pass() {
        let mut args = base_args();
        args.url = "turn:turn.example.org:3478".into();
        assert!(matches!(args.validate(), Err(ConfigError::MissingTurnCreds)));

        args.creds = "nocolon".into();
        assert!(matches!(args.validate(), Err(ConfigError::MalformedTurnCreds)));

        args.creds = "user:pass".into();
        let (_, ice) = args.validate().unwrap();
        assert_eq!(ice.username.as_deref(), Some("user"));
        assert_eq!(ice.password.as_deref(), Some("pass"));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let mut args = base_args();
        args.url = "http://example.org".into();
        assert!(matches!(args.validate(), Err(ConfigError::BadIceScheme(_))));
    }

    #[test]
    fn codec_parsing_is_closed() {
        assert_eq!("video/H264".parse::<VideoCodec>().unwrap(), VideoCodec::H264);
        assert_eq!("video/VP9".parse::<VideoCodec>().unwrap(), VideoCodec::Vp9);
        assert!("video/AV1".parse::<VideoCodec>().is_err());
    }

    #[test]
    fn hub_url_must_be_websocket() {
        let mut args = base_args();
        args.addr = "http://127.0.0.1:8765".into();
        assert!(matches!(args.validate(), Err(ConfigError::BadHubUrl(_))));
    }
}
