//! Device session operations layered over a raw [`Connection`].
//!
//! [`AcosDevice`] owns the vocabulary of an ACOS CLI session: fetching
//! configuration, dispatching command batches, entering config mode, partition
//! activation, and scraping device identity from `show version`. Modules talk
//! to the device exclusively through this type; the transport underneath only
//! ever sees [`CommandRequest`]s.

use crate::cache::DeviceConfigCache;
use crate::connection::{Capabilities, CommandRequest, Connection};
use crate::modules::{ModuleError, ModuleResult};
use crate::netcfg::{dump_lines, DumpStyle, MatchPolicy, NetworkConfig};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Which stored configuration to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Running,
    Startup,
}

impl ConfigSource {
    fn command(self) -> &'static str {
        match self {
            ConfigSource::Running => "show running-config",
            ConfigSource::Startup => "show startup-config",
        }
    }
}

/// One config-mode exchange: the line sent and the device's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResponse {
    pub request: String,
    pub response: String,
}

/// A single ACOS CLI session with its fetch cache.
#[derive(Clone)]
pub struct AcosDevice {
    connection: Arc<dyn Connection>,
    cache: Arc<DeviceConfigCache>,
}

impl AcosDevice {
    pub fn new(connection: Arc<dyn Connection>, cache: Arc<DeviceConfigCache>) -> Self {
        Self { connection, cache }
    }

    /// Hostname or address of the remote device.
    pub fn identifier(&self) -> &str {
        self.connection.identifier()
    }

    /// Session capabilities, rejecting anything that is not a CLI session.
    pub fn capabilities(&self) -> ModuleResult<Capabilities> {
        let caps = self.connection.get_capabilities()?;
        if caps.network_api != "cliconf" {
            return Err(ModuleError::ExecutionFailed(format!(
                "Invalid connection type {}",
                caps.network_api
            )));
        }
        Ok(caps)
    }

    /// Fetch a stored configuration, optionally with fetch flags such as
    /// `with-default`.
    ///
    /// Running-config fetches are served from the cache when a previous fetch
    /// used the same flag string; startup fetches always hit the device.
    pub fn get_config(&self, source: ConfigSource, flags: &[String]) -> ModuleResult<String> {
        let flag_str = flags.join(" ");

        if source == ConfigSource::Running {
            if let Some(cached) = self.cache.get(&flag_str) {
                return Ok(cached);
            }
        }

        let command = format!("{} {}", source.command(), flag_str);
        let command = command.trim();
        debug!(%command, "fetching device configuration");
        let contents = self
            .connection
            .send(&CommandRequest::new(command))?
            .trim()
            .to_string();

        if source == ConfigSource::Running {
            self.cache.insert(flag_str, contents.clone());
        }
        Ok(contents)
    }

    /// Dispatch a batch of commands in order, collecting one reply per
    /// command.
    ///
    /// With `check_rc` set, the first rejected command aborts the batch. With
    /// it clear the device's error text becomes that command's reply and the
    /// batch continues (tolerant mode, used by fact scraping where some show
    /// commands are absent on older releases).
    pub fn run_commands(
        &self,
        requests: &[CommandRequest],
        check_rc: bool,
    ) -> ModuleResult<Vec<String>> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            debug!(command = %request.command, "dispatching command");
            match self.connection.send(request) {
                Ok(out) => responses.push(out),
                Err(err) if !check_rc => responses.push(err.to_string()),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(responses)
    }

    /// Dispatch a single command, failing on rejection.
    pub fn run_command(&self, command: &str) -> ModuleResult<String> {
        Ok(self
            .run_commands(&[CommandRequest::new(command)], true)?
            .remove(0))
    }

    /// Snapshot of the running config as trimmed lines, comments dropped.
    ///
    /// This is the form used for before/after change detection; it always
    /// bypasses the fetch cache.
    pub fn running_config_lines(&self) -> ModuleResult<Vec<String>> {
        let contents = self.run_command("show running-config")?;
        Ok(sanitize_config_lines(&contents))
    }

    /// Apply a candidate command batch in configuration mode.
    ///
    /// Entering config mode tolerates up to two `(yes/no)` confirmation
    /// prompts, both answered `no`. A bare `end` and `!` comment lines are
    /// skipped; a closing `end` is always sent after the batch.
    pub fn edit_config(&self, commands: &[String]) -> ModuleResult<Vec<EditResponse>> {
        let enter = CommandRequest::new("configure terminal")
            .with_prompt(["(yes/no)", "(yes/no)"], ["no", "no"])
            .check_all(true);
        self.connection.send(&enter).map_err(|_| {
            ModuleError::ExecutionFailed(
                "Unable to enter in config mode. If there is another config session running \
                 on device, close it before retrying."
                    .to_string(),
            )
        })?;

        let mut results = Vec::new();
        for command in commands {
            if command == "end" || command.starts_with('!') {
                continue;
            }
            debug!(%command, "applying config line");
            let response = self.connection.send(&CommandRequest::new(command))?;
            results.push(EditResponse {
                request: command.clone(),
                response,
            });
        }

        self.connection.send(&CommandRequest::new("end"))?;
        Ok(results)
    }

    /// Switch the session to a named partition before any other work.
    ///
    /// The shared partition is the session default and needs no activation.
    /// A reply carrying a `does not exist` marker is fatal: nothing must run
    /// against the wrong partition.
    pub fn activate_partition(&self, partition: &str) -> ModuleResult<Option<String>> {
        if partition.eq_ignore_ascii_case("shared") {
            return Ok(None);
        }
        let out = self.run_command(&format!("active-partition {partition}"))?;
        if out.contains("does not exist") {
            return Err(ModuleError::ExecutionFailed(
                "Provided partition does not exist".to_string(),
            ));
        }
        Ok(Some(out))
    }

    /// Commands needed to converge `running` toward `candidate` under
    /// `policy`, as newline-joined text.
    pub fn get_diff(
        &self,
        candidate: &NetworkConfig,
        running: Option<&str>,
        policy: MatchPolicy,
        ignore_lines: &[String],
    ) -> ModuleResult<String> {
        let diff = match running {
            Some(contents) if policy != MatchPolicy::None => {
                let running =
                    NetworkConfig::parse(contents, NetworkConfig::DEFAULT_INDENT, ignore_lines)?;
                candidate.difference(&running, policy)
            }
            _ => candidate.items().to_vec(),
        };
        Ok(dump_lines(&diff, DumpStyle::Commands))
    }

    /// Device identity scraped from `show version`.
    ///
    /// Keys: `network_os` (always `acos`), `network_os_version`,
    /// `network_os_model`, `network_os_hostname`, `network_os_image`, each
    /// present only when the output matched.
    pub fn device_info(&self) -> ModuleResult<HashMap<String, String>> {
        let data = self.run_command("show version")?;
        let data = data.trim();

        let mut info = HashMap::new();
        info.insert("network_os".to_string(), "acos".to_string());

        if let Some(caps) = version_pattern().captures(data) {
            info.insert(
                "network_os_version".to_string(),
                caps[1].trim_matches(',').to_string(),
            );
        }

        for pattern in model_patterns() {
            if let Some(caps) = pattern.captures(data) {
                let model = caps[1].split(' ').next().unwrap_or(&caps[1]);
                info.insert("network_os_model".to_string(), model.to_string());
                break;
            }
        }

        if let Some(caps) = hostname_pattern().captures(data) {
            info.insert("network_os_hostname".to_string(), caps[1].to_string());
        }

        if let Some(caps) = image_pattern().captures(data) {
            info.insert("network_os_image".to_string(), caps[1].to_string());
        }

        Ok(info)
    }
}

/// Trimmed non-comment lines of a configuration blob.
pub fn sanitize_config_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.starts_with('!'))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Version (\S+)").expect("valid literal pattern"))
}

fn model_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?m)^ACOS (.+) \(revision").expect("valid literal pattern"),
            Regex::new(r"(?m)^ACOS (\S+).+bytes of .*memory").expect("valid literal pattern"),
        ]
    })
}

fn hostname_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^(.+) uptime").expect("valid literal pattern"))
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"image file is "(.+)""#).expect("valid literal pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionError, ConnectionResult};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ScriptedConnection {
        replies: HashMap<String, String>,
        failures: HashMap<String, String>,
        sent: Mutex<Vec<CommandRequest>>,
    }

    impl ScriptedConnection {
        fn reply(mut self, command: &str, response: &str) -> Self {
            self.replies
                .insert(command.to_string(), response.to_string());
            self
        }

        fn fail(mut self, command: &str, message: &str) -> Self {
            self.failures
                .insert(command.to_string(), message.to_string());
            self
        }

        fn sent_commands(&self) -> Vec<String> {
            self.sent.lock().iter().map(|r| r.command.clone()).collect()
        }
    }

    impl Connection for ScriptedConnection {
        fn send(&self, request: &CommandRequest) -> ConnectionResult<String> {
            self.sent.lock().push(request.clone());
            if let Some(message) = self.failures.get(&request.command) {
                return Err(ConnectionError::CommandFailed {
                    command: request.command.clone(),
                    message: message.clone(),
                });
            }
            Ok(self
                .replies
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

    fn device(conn: ScriptedConnection) -> (AcosDevice, Arc<ScriptedConnection>) {
        let conn = Arc::new(conn);
        let device = AcosDevice::new(conn.clone(), Arc::new(DeviceConfigCache::new()));
        (device, conn)
    }

    #[test]
    fn test_get_config_caches_running_fetch() {
        let (device, conn) = device(
            ScriptedConnection::default().reply("show running-config", "hostname acos1\n"),
        );

        let first = device.get_config(ConfigSource::Running, &[]).unwrap();
        let second = device.get_config(ConfigSource::Running, &[]).unwrap();
        assert_eq!(first, "hostname acos1");
        assert_eq!(first, second);
        assert_eq!(conn.sent_commands().len(), 1);
    }

    #[test]
    fn test_get_config_flags_key_separate_cache_entries() {
        let (device, conn) = device(
            ScriptedConnection::default()
                .reply("show running-config", "short")
                .reply("show running-config with-default", "full"),
        );

        let plain = device.get_config(ConfigSource::Running, &[]).unwrap();
        let full = device
            .get_config(ConfigSource::Running, &["with-default".to_string()])
            .unwrap();
        assert_eq!(plain, "short");
        assert_eq!(full, "full");
        assert_eq!(conn.sent_commands().len(), 2);
    }

    #[test]
    fn test_get_config_startup_never_cached() {
        let (device, conn) =
            device(ScriptedConnection::default().reply("show startup-config", "saved"));

        device.get_config(ConfigSource::Startup, &[]).unwrap();
        device.get_config(ConfigSource::Startup, &[]).unwrap();
        assert_eq!(conn.sent_commands().len(), 2);
    }

    #[test]
    fn test_run_commands_tolerant_mode_keeps_error_text() {
        let (device, _) = device(
            ScriptedConnection::default()
                .reply("show version", "ACOS 4.1.1-P9")
                .fail("show bootimage", "Invalid input"),
        );

        let out = device
            .run_commands(
                &["show version".into(), "show bootimage".into()],
                false,
            )
            .unwrap();
        assert_eq!(out[0], "ACOS 4.1.1-P9");
        assert!(out[1].contains("Invalid input"));
    }

    #[test]
    fn test_run_commands_strict_mode_aborts() {
        let (device, _) =
            device(ScriptedConnection::default().fail("show bootimage", "Invalid input"));
        let err = device
            .run_commands(&["show bootimage".into()], true)
            .unwrap_err();
        assert!(matches!(err, ModuleError::Connection(_)));
    }

    #[test]
    fn test_edit_config_skips_end_and_comments() {
        let (device, conn) = device(ScriptedConnection::default());

        let commands = vec![
            "ip dns primary 10.18.18.81".to_string(),
            "!comment".to_string(),
            "end".to_string(),
        ];
        let responses = device.edit_config(&commands).unwrap();

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].request, "ip dns primary 10.18.18.81");
        assert_eq!(
            conn.sent_commands(),
            vec!["configure terminal", "ip dns primary 10.18.18.81", "end"]
        );
    }

    #[test]
    fn test_edit_config_enter_failure_is_actionable() {
        let (device, _) =
            device(ScriptedConnection::default().fail("configure terminal", "locked"));
        let err = device
            .edit_config(&["hostname acos2".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("another config session"));
    }

    #[test]
    fn test_activate_partition_shared_is_noop() {
        let (device, conn) = device(ScriptedConnection::default());
        assert!(device.activate_partition("shared").unwrap().is_none());
        assert!(device.activate_partition("Shared").unwrap().is_none());
        assert!(conn.sent_commands().is_empty());
    }

    #[test]
    fn test_activate_partition_missing_is_fatal() {
        let (device, _) = device(
            ScriptedConnection::default()
                .reply("active-partition web", "Partition web does not exist"),
        );
        let err = device.activate_partition("web").unwrap_err();
        assert_eq!(err.to_string(), "Execution failed: Provided partition does not exist");
    }

    #[test]
    fn test_device_info_scrapes_show_version() {
        let output = "\
Thunder Series Unified Application Service Gateway vThunder
ACOS vThunder (revision 12345)
  64-bit Advanced Core OS (ACOS) Version 4.1.1-P9, build 105
  ACOS image file is \"4_1_1-P9_105\"
acos-lb1 uptime is 7 days, 3 hours, 22 minutes";
        let (device, _) = device(ScriptedConnection::default().reply("show version", output));

        let info = device.device_info().unwrap();
        assert_eq!(info["network_os"], "acos");
        assert_eq!(info["network_os_version"], "4.1.1-P9");
        assert_eq!(info["network_os_model"], "vThunder");
        assert_eq!(info["network_os_hostname"], "acos-lb1");
        assert_eq!(info["network_os_image"], "4_1_1-P9_105");
    }

    #[test]
    fn test_sanitize_config_lines() {
        let lines = sanitize_config_lines("!Current config\nhostname acos1\n  port 80 tcp\n!\n");
        assert_eq!(lines, vec!["hostname acos1", "port 80 tcp"]);
    }

    #[test]
    fn test_get_diff_none_policy_ignores_running() {
        let (device, _) = device(ScriptedConnection::default());
        let candidate = NetworkConfig::from_lines(&["ip dns primary 8.8.4.7".to_string()]);
        let diff = device
            .get_diff(&candidate, Some("ip dns primary 8.8.4.7"), MatchPolicy::None, &[])
            .unwrap();
        assert_eq!(diff, "ip dns primary 8.8.4.7");
    }
}
