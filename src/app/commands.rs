//! Inbound broker commands.
//!
//! The broker adapter hands every inbound message to [`handle`], which
//! decodes it by topic and forwards it onto the event bus.  The buzzer
//! notice rides the interrupt channel (small integer, latency sensitive);
//! the firmware-update URL rides the general channel as a shared `String`.

use std::sync::Arc;

use log::{info, warn};
use serde::Deserialize;

use crate::bus::EventBus;
use crate::events::EventId;

/// Topic carrying `{"notice": "<int>"}`.
pub const NOTICE_TOPIC: &str = "client/notice";

/// Topic carrying `{"url": "<firmware image URL>"}`.
pub const FIRMWARE_TOPIC: &str = "client/ota";

/// Longest firmware URL accepted.
pub const MAX_URL_LEN: usize = 256;

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Drive the buzzer with the given level.
    Notice(i32),
    /// Fetch and install the image at this URL.
    FirmwareUpdate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No decoder for this topic.
    UnknownTopic,
    /// Payload is not the expected JSON object.
    Malformed,
    /// `notice` is not an integer.
    BadNotice,
    /// `url` is empty or longer than [`MAX_URL_LEN`].
    BadUrl,
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownTopic => write!(f, "unknown topic"),
            Self::Malformed => write!(f, "malformed payload"),
            Self::BadNotice => write!(f, "notice is not an integer"),
            Self::BadUrl => write!(f, "invalid firmware URL"),
        }
    }
}

// ── Wire shapes ──────────────────────────────────────────────

/// The notice is sent as a decimal string; a bare number is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum NoticeValue {
    Number(i32),
    Text(String),
}

#[derive(Deserialize)]
struct NoticeMsg {
    notice: NoticeValue,
}

#[derive(Deserialize)]
struct FirmwareMsg {
    url: String,
}

/// Decode one inbound message.
pub fn parse(topic: &str, payload: &[u8]) -> Result<RemoteCommand, CommandError> {
    match topic {
        NOTICE_TOPIC => {
            let msg: NoticeMsg =
                serde_json::from_slice(payload).map_err(|_| CommandError::Malformed)?;
            let level = match msg.notice {
                NoticeValue::Number(n) => n,
                NoticeValue::Text(s) => s.trim().parse().map_err(|_| CommandError::BadNotice)?,
            };
            Ok(RemoteCommand::Notice(level))
        }
        FIRMWARE_TOPIC => {
            let msg: FirmwareMsg =
                serde_json::from_slice(payload).map_err(|_| CommandError::Malformed)?;
            if msg.url.is_empty() || msg.url.len() > MAX_URL_LEN {
                return Err(CommandError::BadUrl);
            }
            Ok(RemoteCommand::FirmwareUpdate(msg.url))
        }
        _ => Err(CommandError::UnknownTopic),
    }
}

/// Forward a decoded command onto the bus.
pub fn dispatch(cmd: RemoteCommand, bus: &EventBus) {
    match cmd {
        RemoteCommand::Notice(level) => bus.publish_from_isr(EventId::Buzzer, level),
        RemoteCommand::FirmwareUpdate(url) => {
            info!("commands: firmware update requested ({})", url);
            bus.publish(EventId::FirmwareUpdate, Some(Arc::new(url)));
        }
    }
}

/// Decode and dispatch; decode failures are logged and returned.
pub fn handle(topic: &str, payload: &[u8], bus: &EventBus) -> Result<(), CommandError> {
    match parse(topic, payload) {
        Ok(cmd) => {
            dispatch(cmd, bus);
            Ok(())
        }
        Err(e) => {
            warn!("commands: dropped message on '{}': {}", topic, e);
            Err(e)
        }
    }
}
