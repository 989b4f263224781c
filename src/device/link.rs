//! Persistent control connection to one encoder
//!
//! The protocol has no framing: a command is one CRLF-terminated line, and a
//! response is everything the device sends until it closes the socket or goes
//! quiet for the read timeout.

use encoding_rs::Encoding;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::error::{DeviceError, DeviceResult};
use super::registry::Device;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default quiet period that ends a response
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Default line encoding (Big5 / cp950)
pub const DEFAULT_ENCODING: &str = "big5";

const READ_CHUNK: usize = 1024;

/// Timeouts and text encoding shared by every link
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub encoding: &'static Encoding,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            encoding: encoding_rs::BIG5,
        }
    }
}

impl LinkSettings {
    /// Build settings, resolving a WHATWG encoding label such as `big5`,
    /// `utf-8` or `euc-kr`
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        encoding_label: &str,
    ) -> DeviceResult<Self> {
        Ok(Self {
            connect_timeout,
            read_timeout,
            encoding: resolve_encoding(encoding_label)?,
        })
    }
}

/// Look up an encoding by label
pub fn resolve_encoding(label: &str) -> DeviceResult<&'static Encoding> {
    let trimmed = label.trim();
    // Windows code page name used by older deployments
    if trimmed.eq_ignore_ascii_case("cp950") {
        return Ok(encoding_rs::BIG5);
    }
    Encoding::for_label(trimmed.as_bytes()).ok_or_else(|| DeviceError::Encoding(label.to_string()))
}

/// One lazily connected socket to a device
#[derive(Debug)]
pub struct DeviceLink {
    device: String,
    address: String,
    settings: LinkSettings,
    stream: Option<TcpStream>,
}

impl DeviceLink {
    pub fn new(device: &Device, settings: LinkSettings) -> Self {
        Self::to_address(device.name.clone(), device.address(), settings)
    }

    /// Link to a raw `host:port`, used for discovery
    pub fn to_address(
        device: impl Into<String>,
        address: impl Into<String>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            device: device.into(),
            address: address.into(),
            settings,
            stream: None,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the socket if it is not already open
    pub async fn connect(&mut self) -> DeviceResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = timeout(
            self.settings.connect_timeout,
            TcpStream::connect(&self.address),
        )
        .await
        .map_err(|_| {
            DeviceError::connection(
                &self.device,
                format!(
                    "connect to {} timed out after {:?}",
                    self.address, self.settings.connect_timeout
                ),
            )
        })?
        .map_err(|e| {
            DeviceError::connection(&self.device, format!("connect to {}: {e}", self.address))
        })?;

        let _ = stream.set_nodelay(true);
        tracing::debug!(device = %self.device, address = %self.address, "Link connected");
        self.stream = Some(stream);
        Ok(())
    }

    /// Send one command and collect its response
    pub async fn send(&mut self, command: &str) -> DeviceResult<String> {
        self.connect().await?;

        let line = format!("{command}\r\n");
        let (bytes, _, unmappable) = self.settings.encoding.encode(&line);
        if unmappable {
            tracing::warn!(device = %self.device, command = %command, "Command has characters the link encoding cannot represent");
        }

        let device = self.device.clone();
        let read_timeout = self.settings.read_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(DeviceError::connection(&device, "not connected"));
        };

        if let Err(e) = stream.write_all(&bytes).await {
            self.stream = None;
            return Err(DeviceError::connection(&device, format!("write: {e}")));
        }

        let mut data = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        let mut peer_closed = false;
        loop {
            match timeout(read_timeout, stream.read(&mut buf)).await {
                Err(_) => break,
                Ok(Ok(0)) => {
                    peer_closed = true;
                    break;
                }
                Ok(Ok(n)) => data.extend_from_slice(&buf[..n]),
                Ok(Err(e)) => {
                    self.stream = None;
                    return Err(DeviceError::connection(&device, format!("read: {e}")));
                }
            }
        }

        if peer_closed {
            tracing::debug!(device = %device, "Peer closed link");
            self.stream = None;
            if data.is_empty() {
                return Err(DeviceError::connection(&device, "peer closed without response"));
            }
        }

        let (text, _, _) = self.settings.encoding.decode(&data);
        let response = text.trim().to_string();
        tracing::trace!(device = %device, command = %command, response = %response, "Command exchanged");
        Ok(response)
    }

    /// Close the socket; safe to call repeatedly
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            tracing::debug!(device = %self.device, "Link closed");
        }
    }
}
