//! Shared test utilities for the acosible test suite.
//!
//! Provides a scripted fake [`Connection`] and fixture loading. The fake
//! replies from two sources: sticky replies that answer every occurrence of a
//! command, and one-shot replies consumed in order, so a test can model
//! output that changes between polls (a config fetch before and after a
//! push, a status command converging over retries).
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use acosible::cache::DeviceConfigCache;
use acosible::connection::{
    Capabilities, CommandRequest, Connection, ConnectionError, ConnectionResult,
};
use acosible::modules::{ModuleContext, ModuleParams};

/// Load a device-output fixture from `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
}

/// Scripted stand-in for a device CLI session.
#[derive(Default)]
pub struct FakeConnection {
    sticky: Mutex<HashMap<String, String>>,
    queued: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<CommandRequest>>,
}

#[allow(dead_code)]
impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every occurrence of `command` with `response`.
    pub fn with_reply(self, command: &str, response: &str) -> Self {
        self.sticky
            .lock()
            .insert(command.to_string(), response.to_string());
        self
    }

    /// Queue a one-shot reply for `command`. Queued replies are consumed in
    /// order and take precedence over a sticky reply.
    pub fn push_reply(&self, command: &str, response: &str) {
        self.queued
            .lock()
            .entry(command.to_string())
            .or_default()
            .push(response.to_string());
    }

    /// Reject every occurrence of `command` with `message`.
    pub fn fail_on(self, command: &str, message: &str) -> Self {
        self.failures
            .lock()
            .insert(command.to_string(), message.to_string());
        self
    }

    /// Every command sent so far, in order.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.command.clone()).collect()
    }

    /// How many times `command` was sent.
    pub fn times_sent(&self, command: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.command == command)
            .count()
    }

    /// The full request (prompts and all) at position `index`.
    pub fn request_at(&self, index: usize) -> CommandRequest {
        self.sent.lock()[index].clone()
    }
}

impl Connection for FakeConnection {
    fn send(&self, request: &CommandRequest) -> ConnectionResult<String> {
        self.sent.lock().push(request.clone());

        if let Some(message) = self.failures.lock().get(&request.command) {
            return Err(ConnectionError::CommandFailed {
                command: request.command.clone(),
                message: message.clone(),
            });
        }

        let mut queued = self.queued.lock();
        if let Some(replies) = queued.get_mut(&request.command) {
            if !replies.is_empty() {
                return Ok(replies.remove(0));
            }
        }

        Ok(self
            .sticky
            .lock()
            .get(&request.command)
            .cloned()
            .unwrap_or_default())
    }

    fn get_capabilities(&self) -> ConnectionResult<Capabilities> {
        Ok(Capabilities::cliconf())
    }

    fn identifier(&self) -> &str {
        "acos-device"
    }
}

/// Module context wired to the given fake connection.
#[allow(dead_code)]
pub fn context_with(connection: Arc<FakeConnection>) -> ModuleContext {
    ModuleContext::new()
        .with_connection(connection)
        .with_config_cache(Arc::new(DeviceConfigCache::new()))
}

/// Parameter map from json key/value pairs.
#[allow(dead_code)]
pub fn params(entries: &[(&str, serde_json::Value)]) -> ModuleParams {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
