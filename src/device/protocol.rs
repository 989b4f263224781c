//! Encoder control protocol
//!
//! Command builders, response classification and the multi-command
//! operations ([`EncoderController`]) built on any [`CommandTransport`].

use std::sync::Arc;

use super::error::{DeviceError, DeviceResult};
use super::pool::{is_synthetic_error, CommandTransport};

/// Default success token
pub const DEFAULT_SUCCESS_TOKEN: &str = "OK";

/// Default encoder channel
pub const DEFAULT_CHANNEL: u32 = 1;

/// Discovery command
pub const LIST_COMMAND: &str = "List";

// ============================================================================
// Command builders
// ============================================================================

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "'"))
}

/// `Setfile "<device>" <channel> "<path>"`
pub fn set_file_command(device: &str, channel: u32, path: &str) -> String {
    format!("Setfile {} {} {}", quoted(device), channel, quoted(path))
}

/// `Setfile "<device>" "<path>"`, for devices that reject the channel form
pub fn set_file_short_command(device: &str, path: &str) -> String {
    format!("Setfile {} {}", quoted(device), quoted(path))
}

pub fn start_command(device: &str, channel: u32) -> String {
    format!("Start {} {}", quoted(device), channel)
}

pub fn stop_command(device: &str, channel: u32) -> String {
    format!("Stop {} {}", quoted(device), channel)
}

pub fn status_command(device: &str) -> String {
    format!("EncStatus {}", quoted(device))
}

pub fn set_snapshot_name_command(device: &str, path: &str) -> String {
    format!("SetSnapshotFileName {} {}", quoted(device), quoted(path))
}

pub fn snapshot_command(device: &str) -> String {
    format!("SnapShot {}", quoted(device))
}

// ============================================================================
// Response classification
// ============================================================================

/// Whether `response` carries `token` as a whole word
///
/// Synthetic error responses never count as success.
pub fn is_success(response: &str, token: &str) -> bool {
    if is_synthetic_error(response) || token.is_empty() {
        return false;
    }
    response
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case(token))
}

/// Whether the device rejected the argument shape of a command
pub fn is_invalid_parameters(response: &str) -> bool {
    response.to_ascii_lowercase().contains("invalid parameter")
}

/// Device names from a `List` response: text before `Mode:` on each line
pub fn parse_device_list(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| line.split_once("Mode:").map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Encoder Controller
// ============================================================================

/// Protocol operations over a transport
#[derive(Clone)]
pub struct EncoderController {
    transport: Arc<dyn CommandTransport>,
    channel: u32,
    success_token: String,
}

impl EncoderController {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            transport,
            channel: DEFAULT_CHANNEL,
            success_token: DEFAULT_SUCCESS_TOKEN.to_string(),
        }
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_success_token(mut self, token: impl Into<String>) -> Self {
        self.success_token = token.into();
        self
    }

    pub fn transport(&self) -> &Arc<dyn CommandTransport> {
        &self.transport
    }

    async fn expect_ok(&self, device: &str, command: String) -> DeviceResult<String> {
        let response = self.transport.execute(device, &command).await;
        if is_success(&response, &self.success_token) {
            Ok(response)
        } else {
            Err(DeviceError::protocol(device, command, response))
        }
    }

    /// Point the device at `relative_path` and start recording
    pub async fn start_recording(&self, device: &str, relative_path: &str) -> DeviceResult<()> {
        let command = set_file_command(device, self.channel, relative_path);
        let mut response = self.transport.execute(device, &command).await;
        let mut sent = command;

        if is_invalid_parameters(&response) {
            tracing::debug!(device = %device, "Three-argument Setfile rejected, using two-argument form");
            sent = set_file_short_command(device, relative_path);
            response = self.transport.execute(device, &sent).await;
        }
        if !is_success(&response, &self.success_token) {
            return Err(DeviceError::protocol(device, sent, response));
        }

        self.expect_ok(device, start_command(device, self.channel))
            .await?;
        tracing::info!(device = %device, path = %relative_path, "Recording started");
        Ok(())
    }

    pub async fn stop_recording(&self, device: &str) -> DeviceResult<()> {
        self.expect_ok(device, stop_command(device, self.channel))
            .await?;
        tracing::info!(device = %device, "Recording stopped");
        Ok(())
    }

    /// Raw `EncStatus` response text
    pub async fn status_text(&self, device: &str) -> String {
        self.transport.execute(device, &status_command(device)).await
    }

    /// Ask the device to write a still image to `relative_path` (no extension)
    ///
    /// Only a synthetic transport error is treated as failure; devices do not
    /// reliably acknowledge snapshot commands.
    pub async fn request_snapshot(&self, device: &str, relative_path: &str) -> DeviceResult<String> {
        let name_cmd = set_snapshot_name_command(device, relative_path);
        let response = self.transport.execute(device, &name_cmd).await;
        if is_synthetic_error(&response) {
            return Err(DeviceError::protocol(device, name_cmd, response));
        }

        let shot_cmd = snapshot_command(device);
        let response = self.transport.execute(device, &shot_cmd).await;
        if is_synthetic_error(&response) {
            return Err(DeviceError::protocol(device, shot_cmd, response));
        }
        tracing::debug!(device = %device, response = %response, "Snapshot requested");
        Ok(response)
    }
}
