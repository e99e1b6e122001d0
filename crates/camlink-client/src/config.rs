//! Client configuration.
//!
//! Files are parsed into the all-optional `*Input` structs and then resolved
//! into concrete values with defaults and bounds applied.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use camlink_transport::wire::{DEFAULT_READ_TIMEOUT, DEFAULT_RECV_BUFFER, MAX_DATAGRAM_LEN};
use camlink_transport::TransportConfig;
use serde::Deserialize;

use crate::control::{CameraCatalog, CameraInfo, DEFAULT_SELECT_TOPIC};
use crate::error::SessionError;

pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;

// ─── Input (as written in TOML) ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfigInput {
    pub version: u32,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub transport: TransportConfigInput,
    pub session: SessionConfigInput,
    pub control: ControlConfigInput,
    pub cameras: Option<Vec<CameraInfo>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfigInput {
    pub read_timeout_ms: Option<u64>,
    pub recv_buffer: Option<usize>,
    pub max_datagram_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfigInput {
    pub max_consecutive_timeouts: Option<u32>,
    pub frame_queue: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlConfigInput {
    pub select_topic: Option<String>,
}

// ─── Resolved ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Header-read timeouts tolerated in a row before the link is declared
    /// dead. `1` means the first timeout is fatal.
    pub max_consecutive_timeouts: u32,
    /// Decoded frames buffered towards the sink before the oldest is dropped.
    pub frame_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_consecutive_timeouts: 1,
            frame_queue: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub version: u32,
    pub host: String,
    pub port: u16,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub select_topic: String,
    pub cameras: CameraCatalog,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            select_topic: DEFAULT_SELECT_TOPIC.into(),
            cameras: CameraCatalog::default(),
        }
    }
}

impl ClientConfigInput {
    pub fn resolve(self) -> Result<ClientConfig, SessionError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(SessionError::invalid(format!(
                "unsupported config version {version}"
            )));
        }

        let host = self
            .host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.into());

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(SessionError::invalid("port must be in 1..=65535"));
        }

        let transport = TransportConfig {
            read_timeout: self
                .transport
                .read_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READ_TIMEOUT)
                .max(Duration::from_millis(1)),
            recv_buffer: self.transport.recv_buffer.unwrap_or(DEFAULT_RECV_BUFFER),
            max_datagram_len: self
                .transport
                .max_datagram_len
                .unwrap_or(MAX_DATAGRAM_LEN)
                .clamp(1, MAX_DATAGRAM_LEN),
        };

        let session = SessionConfig {
            max_consecutive_timeouts: self
                .session
                .max_consecutive_timeouts
                .unwrap_or(SessionConfig::default().max_consecutive_timeouts)
                .max(1),
            frame_queue: self
                .session
                .frame_queue
                .unwrap_or(SessionConfig::default().frame_queue)
                .max(1),
        };

        let select_topic = self
            .control
            .select_topic
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SELECT_TOPIC.into());

        let cameras = match self.cameras {
            Some(list) if !list.is_empty() => CameraCatalog::new(list),
            _ => CameraCatalog::default(),
        };

        Ok(ClientConfig {
            version,
            host,
            port,
            transport,
            session,
            select_topic,
            cameras,
        })
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let input: ClientConfigInput = toml::from_str(s).context("parsing client config")?;
        Ok(input.resolve()?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("loading config {}", path.display()))
    }
}

// ─── Endpoint ───────────────────────────────────────────────────────────────

/// A validated remote frame server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    addr: SocketAddr,
}

impl Endpoint {
    /// Validate user-entered connection parameters.
    ///
    /// The port arrives as text, exactly as typed; it must be a positive
    /// integer that fits in 16 bits. IPv4 results are preferred when the
    /// host resolves to several addresses.
    pub fn parse(host: &str, port: &str) -> Result<Self, SessionError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(SessionError::invalid("host is empty"));
        }
        let port_text = port.trim();
        let port: u16 = port_text
            .parse()
            .map_err(|_| SessionError::invalid(format!("invalid port '{port_text}'")))?;
        if port == 0 {
            return Err(SessionError::invalid("port must be in 1..=65535"));
        }

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| SessionError::invalid(format!("cannot resolve '{host}': {e}")))?
            .collect();
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| SessionError::invalid(format!("no address for '{host}'")))?;

        Ok(Endpoint {
            host: host.to_string(),
            port,
            addr,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
