//! Command model - typed commands decoded from a request payload
//!
//! Decoding happens once, up front. Everything after this module works with
//! [`Command`] and never looks at the raw JSON again.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::status::StatusOutcome;

/// A command accepted by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetPosition(SetPosition),
    Focus(Focus),
}

/// Move and resize the windows of a process
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPosition {
    pub pid: i32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Only touch the process's focused window
    #[serde(default)]
    pub frontmost_only: bool,
    /// Exact title to match; ignored when `frontmost_only` is set
    #[serde(default)]
    pub title: Option<String>,
}

/// Focus and raise a window of a process by title
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Focus {
    pub pid: i32,
    /// Substring of the window title. Optional here, but required at dispatch.
    #[serde(default)]
    pub title: Option<String>,
}

/// Reasons a payload does not produce a [`Command`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing or non-string \"command\" field")]
    MissingCommand,

    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error("invalid fields for {command}: {source}")]
    InvalidFields {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn status(&self) -> StatusOutcome {
        StatusOutcome::BadRequest
    }
}

impl Command {
    /// Decode a parsed JSON payload into a command
    pub fn decode(payload: Value) -> Result<Self, DecodeError> {
        let name = match payload.get("command") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(DecodeError::MissingCommand),
        };

        match name.as_str() {
            "setPosition" => fields("setPosition", payload).map(Command::SetPosition),
            "focus" => fields("focus", payload).map(Command::Focus),
            _ => Err(DecodeError::UnrecognizedCommand(name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::SetPosition(_) => "setPosition",
            Command::Focus(_) => "focus",
        }
    }

    pub fn pid(&self) -> i32 {
        match self {
            Command::SetPosition(cmd) => cmd.pid,
            Command::Focus(cmd) => cmd.pid,
        }
    }
}

fn fields<T: DeserializeOwned>(command: &'static str, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|source| DecodeError::InvalidFields { command, source })
}
