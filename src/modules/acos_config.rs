//! Manage the configuration of an ACOS device by pushing candidate lines and
//! reconciling the result.
//!
//! The flow is: activate the requested partition, snapshot the running
//! config, optionally back it up, push the candidate batch in config mode,
//! verify the push landed, compare snapshots for change detection, honor the
//! `save_when` persistence policy, and report any requested startup
//! comparison.
//!
//! Change detection compares the before and after snapshots as sets in both
//! directions, so removed lines count as a change just like added ones.

use super::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult,
    ParallelizationHint, ParamExt,
};
use crate::backup::{read_src_file, write_backup, BackupOptions};
use crate::device::{sanitize_config_lines, AcosDevice, ConfigSource};
use crate::netcfg::{compile_ignore_patterns, DumpStyle, NetworkConfig};
use regex::Regex;
use similar::TextDiff;
use std::collections::HashSet;
use tracing::{debug, warn};

const SAVE_WHEN_CHOICES: [&str; 4] = ["always", "never", "modified", "changed"];
const DIFF_AGAINST_CHOICES: [&str; 3] = ["running", "startup", "intended"];

pub struct AcosConfigModule;

impl Module for AcosConfigModule {
    fn name(&self) -> &'static str {
        "acos_config"
    }

    fn description(&self) -> &'static str {
        "Manage configuration sections of an A10 ACOS device"
    }

    fn parallelization_hint(&self) -> ParallelizationHint {
        ParallelizationHint::HostExclusive
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let has_lines =
            params.get_vec_string("lines")?.is_some() || params.get_vec_string("commands")?.is_some();
        if has_lines && params.get_string("src")?.is_some() {
            return Err(ModuleError::InvalidParameter(
                "lines and src are mutually exclusive".to_string(),
            ));
        }

        if let Some(save_when) = params.get_string("save_when")? {
            if !SAVE_WHEN_CHOICES.contains(&save_when.as_str()) {
                return Err(ModuleError::InvalidParameter(format!(
                    "Invalid save_when value '{save_when}'. Valid values are always, never, \
                     modified, changed"
                )));
            }
        }
        if let Some(diff_against) = params.get_string("diff_against")? {
            if !DIFF_AGAINST_CHOICES.contains(&diff_against.as_str()) {
                return Err(ModuleError::InvalidParameter(format!(
                    "Invalid diff_against value '{diff_against}'. Valid values are running, \
                     startup, intended"
                )));
            }
            if diff_against == "intended" && params.get_vec_string("intended_config")?.is_none() {
                return Err(ModuleError::InvalidParameter(
                    "diff_against=intended requires intended_config".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        self.validate_params(params)?;

        let connection = context.require_connection(self.name())?;
        let device = AcosDevice::new(connection, context.config_cache.clone());

        let lines = params
            .get_vec_string("lines")?
            .or(params.get_vec_string("commands")?);
        let src = params.get_string("src")?;
        let defaults = params.get_bool("defaults")?.unwrap_or(false);
        let backup = params.get_bool("backup")?.unwrap_or(false);
        let save_when = params
            .get_string("save_when")?
            .unwrap_or_else(|| "never".to_string());
        let diff_against = params.get_string("diff_against")?;
        let diff_ignore_lines = params.get_vec_string("diff_ignore_lines")?.unwrap_or_default();
        let ignore = compile_ignore_patterns(&diff_ignore_lines)?;
        let partition = params
            .get_string("partition")?
            .unwrap_or_else(|| "shared".to_string());

        device.activate_partition(&partition)?;

        let mut warnings: Vec<String> = Vec::new();
        let mut data: Vec<(String, serde_json::Value)> = Vec::new();
        let mut diff: Option<Diff> = None;

        let flags: Vec<String> = if defaults {
            vec!["with-default".to_string()]
        } else {
            Vec::new()
        };

        let before_snapshot = device.running_config_lines()?;

        let mut fetched_contents: Option<String> = None;
        if backup || context.diff_mode {
            let contents = device.get_config(ConfigSource::Running, &flags)?;
            if backup {
                let options = backup_options(params)?;
                let artifact = write_backup(device.identifier(), &contents, &options)?;
                data.push((
                    "backup_path".to_string(),
                    serde_json::json!(artifact.backup_path),
                ));
                data.push(("filename".to_string(), serde_json::json!(artifact.filename)));
                data.push(("date".to_string(), serde_json::json!(artifact.date)));
                data.push(("time".to_string(), serde_json::json!(artifact.time)));
            }
            fetched_contents = Some(contents);
        }

        let candidate = candidate_config(&lines, &src)?;
        let mut pushed = false;
        if !candidate.is_empty() {
            // Multiline entries are replayed one physical line at a time.
            let mut commands: Vec<String> = candidate.lines().map(String::from).collect();
            if let Some(before) = params.get_vec_string("before")? {
                commands.splice(0..0, before);
            }
            if let Some(after) = params.get_vec_string("after")? {
                commands.extend(after);
            }

            data.push(("commands".to_string(), serde_json::json!(commands)));
            data.push(("updates".to_string(), serde_json::json!(commands)));

            if context.check_mode {
                debug!("check mode: candidate not pushed");
            } else if !commands.is_empty() {
                device.edit_config(&commands)?;
                pushed = true;
            }
        }

        let running_after = device.running_config_lines()?;

        // Post-push verification: every requested line must now exist in the
        // running config, or the operator is told which ones did not land.
        if pushed {
            if let Some(lines) = &lines {
                let requested: Vec<String> =
                    lines.iter().map(|l| l.trim().to_string()).collect();
                let missing = lines_missing_from(&requested, &running_after, &ignore);
                if !missing.is_empty() {
                    warn!(?missing, "candidate lines absent after push");
                    warnings.push(format!(
                        "Could not execute following commands or command does not exist in \
                         running config after execution. Check on ACOS device: {missing:?}"
                    ));
                }
            }
        }

        if let Some(intended) = params.get_vec_string("intended_config")? {
            let intended: Vec<String> = intended.iter().map(|l| l.trim().to_string()).collect();
            let candidate_lines: Vec<String> = lines
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|l| l.trim().to_string())
                .collect();
            let missing = lines_missing_from(&intended, &candidate_lines, &ignore);
            if missing.is_empty() {
                data.push(("success".to_string(), serde_json::json!(true)));
            } else {
                data.push(("success".to_string(), serde_json::json!(false)));
                data.push((
                    "failed_diff_lines_between_intended_candidate".to_string(),
                    serde_json::json!(missing),
                ));
            }
        }

        let before_set: HashSet<&String> = before_snapshot.iter().collect();
        let after_set: HashSet<&String> = running_after.iter().collect();
        let mut changed = before_set != after_set;

        match save_when.as_str() {
            "always" => save_config(&device, context, &mut warnings)?,
            "modified" => {
                let running = device.run_command("show running-config")?;
                let startup = device.run_command("show startup-config")?;
                let running = NetworkConfig::parse(
                    &running,
                    NetworkConfig::DEFAULT_INDENT,
                    &diff_ignore_lines,
                )?;
                let startup = NetworkConfig::parse(
                    &startup,
                    NetworkConfig::DEFAULT_INDENT,
                    &diff_ignore_lines,
                )?;
                if running.sha1() != startup.sha1() {
                    save_config(&device, context, &mut warnings)?;
                }
            }
            "changed" if changed => save_config(&device, context, &mut warnings)?,
            _ => {}
        }

        if diff_against.as_deref() == Some("startup") {
            let startup = device.get_config(ConfigSource::Startup, &[])?;
            let startup_lines = sanitize_config_lines(&startup);
            let pending = lines_missing_from(&running_after, &startup_lines, &ignore);
            if pending.is_empty() {
                data.push(("diff_against_found".to_string(), serde_json::json!("no")));
                data.push(("startup_diff".to_string(), serde_json::Value::Null));
                changed = false;
            } else {
                data.push(("diff_against_found".to_string(), serde_json::json!("yes")));
                data.push(("startup_diff".to_string(), serde_json::json!(pending)));
                changed = true;
            }
        }

        if context.diff_mode {
            if diff_against.as_deref() == Some("intended") {
                // Checked during validation
                if let Some(intended) = params.get_vec_string("intended_config")? {
                    let intended = intended.join("\n");
                    let running = running_after.join("\n");
                    let details = TextDiff::from_lines(running.as_str(), intended.as_str())
                        .unified_diff()
                        .header("running-config", "intended")
                        .to_string();
                    diff = Some(Diff::new("running-config", "intended").with_details(details));
                }
            } else if let Some(before_contents) = &fetched_contents {
                // Both sides in sanitized form, otherwise device banners and
                // indentation in the raw fetch would always show as a diff.
                let before_lines = sanitize_config_lines(before_contents).join("\n");
                let after_contents = running_after.join("\n");
                let details = TextDiff::from_lines(before_lines.as_str(), &after_contents)
                    .unified_diff()
                    .header("before", "after")
                    .to_string();
                if !details.is_empty() {
                    diff = Some(
                        Diff::new("running-config (before)", "running-config (after)")
                            .with_details(details),
                    );
                }
            }
        }

        let mut output = if changed {
            ModuleOutput::changed("Configuration updated")
        } else {
            ModuleOutput::ok("No configuration change")
        };
        for (key, value) in data {
            output = output.with_data(key, value);
        }
        if let Some(diff) = diff {
            output = output.with_diff(diff);
        }
        Ok(output.with_warnings(warnings))
    }
}

/// Candidate text from either the `src` file or the `lines` list.
fn candidate_config(lines: &Option<Vec<String>>, src: &Option<String>) -> ModuleResult<String> {
    if let Some(path) = src {
        return read_src_file(path);
    }
    if let Some(lines) = lines {
        let candidate = NetworkConfig::from_lines(lines);
        return Ok(candidate.dumps(DumpStyle::Raw));
    }
    Ok(String::new())
}

/// Entries of `wanted` with no identical line anywhere in `have`. Lines
/// matching any `ignore` pattern are excluded from the comparison.
fn lines_missing_from(wanted: &[String], have: &[String], ignore: &[Regex]) -> Vec<String> {
    let have: HashSet<&str> = have.iter().map(String::as_str).collect();
    wanted
        .iter()
        .filter(|line| {
            !line.is_empty()
                && !ignore.iter().any(|re| re.is_match(line))
                && !have.contains(line.as_str())
        })
        .cloned()
        .collect()
}

fn backup_options(params: &ModuleParams) -> ModuleResult<BackupOptions> {
    match params.get("backup_options") {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ModuleError::InvalidParameter(format!("Invalid backup_options: {e}"))
        }),
        None => Ok(BackupOptions::default()),
    }
}

fn save_config(
    device: &AcosDevice,
    context: &ModuleContext,
    warnings: &mut Vec<String>,
) -> ModuleResult<()> {
    if context.check_mode {
        warnings.push(
            "Skipping command `write memory` due to check mode. Configuration not copied to \
             non-volatile storage"
                .to_string(),
        );
        return Ok(());
    }
    debug!("persisting configuration to non-volatile storage");
    device.run_command("write memory\r")?;
    Ok(())
}
