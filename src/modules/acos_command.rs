//! Run arbitrary commands on an ACOS device, optionally waiting for the
//! output to satisfy conditions before returning.
//!
//! A batch is resent as a whole round until every wait condition holds
//! (`match: all`) or any one does (`match: any`), up to `retries` rounds with
//! `interval` seconds between rounds. `retries: N` means at most N rounds are
//! sent. Exhausting the rounds with conditions still unsatisfied is a failure
//! carrying the unsatisfied expressions in `failed_conditions`.

use super::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult,
    ParallelizationHint, ParamExt,
};
use crate::condition::Conditional;
use crate::connection::CommandRequest;
use crate::device::AcosDevice;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub struct AcosCommandModule;

impl Module for AcosCommandModule {
    fn name(&self) -> &'static str {
        "acos_command"
    }

    fn description(&self) -> &'static str {
        "Run commands on an A10 ACOS device and wait for conditions"
    }

    fn parallelization_hint(&self) -> ParallelizationHint {
        ParallelizationHint::HostExclusive
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        if !params.contains_key("commands") {
            return Err(ModuleError::MissingParameter("commands".to_string()));
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let connection = context.require_connection(self.name())?;
        let device = AcosDevice::new(connection, context.config_cache.clone());

        let mut warnings = Vec::new();
        let commands = parse_commands(params, context.check_mode, &mut warnings)?;

        let wait_for = params
            .get_vec_string("wait_for")?
            .or(params.get_vec_string("waitfor")?)
            .unwrap_or_default();
        let mut conditionals = wait_for
            .iter()
            .map(|expr| Conditional::parse(expr))
            .collect::<Result<Vec<_>, _>>()?;

        let match_policy = params.get_string("match")?.unwrap_or_else(|| "all".to_string());
        if match_policy != "all" && match_policy != "any" {
            return Err(ModuleError::InvalidParameter(format!(
                "Invalid match value '{match_policy}'. Valid values are all, any"
            )));
        }
        let retries = params.get_i64("retries")?.unwrap_or(10).max(1);
        let interval = params.get_i64("interval")?.unwrap_or(1).max(0) as u64;
        let partition = params
            .get_string("partition")?
            .unwrap_or_else(|| "shared".to_string());

        device.activate_partition(&partition)?;

        let before: HashSet<String> = device.running_config_lines()?.into_iter().collect();

        let mut responses: Vec<String> = Vec::new();
        let mut remaining = retries;
        while remaining > 0 {
            responses = device.run_commands(&commands, true)?;

            let satisfied: Vec<usize> = conditionals
                .iter()
                .enumerate()
                .filter(|(_, c)| c.eval(&responses))
                .map(|(i, _)| i)
                .collect();
            if match_policy == "any" && !satisfied.is_empty() {
                conditionals.clear();
            } else {
                for i in satisfied.into_iter().rev() {
                    conditionals.remove(i);
                }
            }

            if conditionals.is_empty() {
                break;
            }

            debug!(remaining, interval, "wait conditions unsatisfied, retrying");
            if interval > 0 {
                thread::sleep(Duration::from_secs(interval));
            }
            remaining -= 1;
        }

        let after: HashSet<String> = device.running_config_lines()?.into_iter().collect();
        let changed = before != after;

        if !conditionals.is_empty() {
            let failed: Vec<String> = conditionals.iter().map(|c| c.raw().to_string()).collect();
            return Ok(ModuleOutput::failed(
                "One or more conditional statements have not been satisfied",
            )
            .with_data("failed_conditions", serde_json::json!(failed))
            .with_warnings(warnings));
        }

        let stdout_lines: Vec<Vec<String>> = responses
            .iter()
            .map(|r| r.lines().map(String::from).collect())
            .collect();

        let output = if changed {
            ModuleOutput::changed("Commands executed")
        } else {
            ModuleOutput::ok("Commands executed")
        };
        Ok(output
            .with_data("stdout", serde_json::json!(responses))
            .with_data("stdout_lines", serde_json::json!(stdout_lines))
            .with_warnings(warnings))
    }
}

/// Turn the `commands` parameter into dispatch requests.
///
/// Each entry is either a bare command string or a map with `command` plus
/// optional `prompt`, `answer`, `sendonly`, and `check_all`. In check mode,
/// commands that do not start with `show` are dropped with a warning each.
fn parse_commands(
    params: &ModuleParams,
    check_mode: bool,
    warnings: &mut Vec<String>,
) -> ModuleResult<Vec<CommandRequest>> {
    let raw = params
        .get("commands")
        .ok_or_else(|| ModuleError::MissingParameter("commands".to_string()))?;

    let entries: Vec<&serde_json::Value> = match raw {
        serde_json::Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut commands = Vec::with_capacity(entries.len());
    for entry in entries {
        let request = match entry {
            serde_json::Value::String(command) => CommandRequest::new(command),
            serde_json::Value::Object(map) => {
                let command = map
                    .get("command")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ModuleError::InvalidParameter(
                            "commands entries must be strings or maps with a 'command' key"
                                .to_string(),
                        )
                    })?;
                let mut request = CommandRequest::new(command);
                request.prompt = string_list(map.get("prompt"));
                request.answer = string_list(map.get("answer"));
                request.sendonly = map
                    .get("sendonly")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                request.check_all = map
                    .get("check_all")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                request
            }
            _ => {
                return Err(ModuleError::InvalidParameter(
                    "commands entries must be strings or maps with a 'command' key".to_string(),
                ))
            }
        };

        if check_mode && !request.command.starts_with("show") {
            warnings.push(format!(
                "Only show commands are supported when using check mode, not executing {}",
                request.command
            ));
            continue;
        }
        commands.push(request);
    }
    Ok(commands)
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}
