//! Connection layer for ACOS device communication.
//!
//! This module defines the transport seam between the automation modules and
//! whatever actually talks to the device. The modules never open sockets
//! themselves; they are handed an object implementing the [`Connection`]
//! trait, which exposes exactly two capabilities:
//!
//! - [`Connection::send`]: deliver one CLI command (optionally with an
//!   interactive prompt/answer pair) and return the raw text reply
//! - [`Connection::get_capabilities`]: report what the session supports
//!
//! All calls are synchronous and blocking. A connection is exclusively owned
//! by one reconciliation invocation at a time; callers that introduce
//! concurrency must serialize access to the session themselves, since
//! interleaving two partial command batches against the same device session
//! corrupts both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur at the transport layer.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A single unit of CLI dispatch.
///
/// Most commands are a bare string, but entering configuration mode or
/// rebooting requires answering an interactive prompt, and a few commands
/// produce no reply at all (`sendonly`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// The command text to send
    pub command: String,
    /// Expected interactive prompt string(s), if any
    #[serde(default)]
    pub prompt: Vec<String>,
    /// Answer(s) to send when a prompt appears
    #[serde(default)]
    pub answer: Vec<String>,
    /// Fire-and-forget: do not wait for a reply
    #[serde(default)]
    pub sendonly: bool,
    /// Wait for all prompts rather than the first one
    #[serde(default)]
    pub check_all: bool,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            prompt: Vec::new(),
            answer: Vec::new(),
            sendonly: false,
            check_all: false,
        }
    }

    pub fn with_prompt(
        mut self,
        prompt: impl IntoIterator<Item = impl Into<String>>,
        answer: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.prompt = prompt.into_iter().map(Into::into).collect();
        self.answer = answer.into_iter().map(Into::into).collect();
        self
    }

    pub fn check_all(mut self, check_all: bool) -> Self {
        self.check_all = check_all;
        self
    }

    pub fn sendonly(mut self, sendonly: bool) -> Self {
        self.sendonly = sendonly;
        self
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        CommandRequest::new(command)
    }
}

impl From<String> for CommandRequest {
    fn from(command: String) -> Self {
        CommandRequest::new(command)
    }
}

/// Session capabilities reported by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// The API flavour of the session; the modules require `cliconf`
    pub network_api: String,
    /// Device identity as reported by the transport (os, version, model, ...)
    #[serde(default)]
    pub device_info: HashMap<String, String>,
}

impl Capabilities {
    pub fn cliconf() -> Self {
        Self {
            network_api: "cliconf".to_string(),
            device_info: HashMap::new(),
        }
    }
}

/// Transport abstraction for a single ACOS CLI session.
///
/// Implementations handle prompts, paging, and privilege escalation; the
/// modules only see commands in and raw text out. The trait is object-safe so
/// modules can hold an `Arc<dyn Connection>`.
pub trait Connection: Send + Sync {
    /// Send one command and return the raw text reply.
    ///
    /// A rejected command surfaces as [`ConnectionError::CommandFailed`] with
    /// the device's error text as the message.
    fn send(&self, request: &CommandRequest) -> ConnectionResult<String>;

    /// Report what this session supports.
    fn get_capabilities(&self) -> ConnectionResult<Capabilities>;

    /// Stable identifier for the remote device (hostname or address).
    ///
    /// Used for log context and backup file naming.
    fn identifier(&self) -> &str;
}
