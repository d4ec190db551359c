//! Difference computation between two configuration models.
//!
//! The differ answers one question: which candidate lines must be pushed to
//! converge a running configuration toward the candidate? The answer depends
//! on the match policy, in increasing order of strictness:
//!
//! - [`MatchPolicy::Line`]: a line is needed if no running line with the same
//!   text exists anywhere, regardless of position or parent
//! - [`MatchPolicy::Strict`]: a line is needed unless the running config has
//!   it at the exact same index under the same parent chain
//! - [`MatchPolicy::Exact`]: any deviation in content or order makes the
//!   whole candidate needed
//! - [`MatchPolicy::None`]: no diffing; the full candidate is always needed
//!   (explicit full-push semantics, never a fallback-on-error)
//!
//! Output preserves candidate source order, with each needed line preceded by
//! its not-yet-emitted parent lines so the result replays cleanly against a
//! CLI that requires entering a parent context first.

use super::{ConfigLine, NetworkConfig};
use crate::modules::{ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How candidate lines are matched against the running configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Match individual lines anywhere in the configuration (default)
    #[default]
    Line,
    /// Lines must exist at the same position under the same parent chain
    Strict,
    /// The entire configuration must match exactly, content and order
    Exact,
    /// No matching; always apply the full candidate
    None,
}

impl FromStr for MatchPolicy {
    type Err = ModuleError;

    fn from_str(s: &str) -> ModuleResult<Self> {
        match s.to_lowercase().as_str() {
            "line" => Ok(MatchPolicy::Line),
            "strict" => Ok(MatchPolicy::Strict),
            "exact" => Ok(MatchPolicy::Exact),
            "none" => Ok(MatchPolicy::None),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid match value '{s}'. Valid values are line, strict, exact, none"
            ))),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Line => write!(f, "line"),
            MatchPolicy::Strict => write!(f, "strict"),
            MatchPolicy::Exact => write!(f, "exact"),
            MatchPolicy::None => write!(f, "none"),
        }
    }
}

impl NetworkConfig {
    /// Compute the candidate lines absent from `running` under `policy`.
    ///
    /// `self` is the candidate. Running lines tagged as ignored do not count
    /// as present. The result preserves candidate order and emits parent
    /// lines before their children, deduplicated across the whole result.
    pub fn difference(&self, running: &NetworkConfig, policy: MatchPolicy) -> Vec<ConfigLine> {
        let have: Vec<&ConfigLine> = running.comparable().collect();

        let mut updates: Vec<&ConfigLine> = Vec::new();
        match policy {
            MatchPolicy::None => {
                updates.extend(self.items().iter());
            }
            MatchPolicy::Line => {
                let texts: HashSet<&str> = have.iter().map(|l| l.text.as_str()).collect();
                for item in self.items() {
                    if !texts.contains(item.text.as_str()) {
                        updates.push(item);
                    }
                }
            }
            MatchPolicy::Strict => {
                for (index, item) in self.items().iter().enumerate() {
                    match have.get(index) {
                        Some(theirs) if theirs.same_path(item) => {}
                        _ => updates.push(item),
                    }
                }
            }
            MatchPolicy::Exact => {
                let equal = have.len() == self.len()
                    && self
                        .items()
                        .iter()
                        .zip(have.iter())
                        .all(|(ours, theirs)| theirs.same_path(ours));
                if !equal {
                    updates.extend(self.items().iter());
                }
            }
        }

        self.expand_parents(&updates)
    }

    /// Prefix each needed line with the parent lines that open its section,
    /// preserving order and skipping parents already emitted.
    fn expand_parents(&self, updates: &[&ConfigLine]) -> Vec<ConfigLine> {
        let mut changes: Vec<ConfigLine> = Vec::new();

        for update in updates {
            for i in 0..update.parents.len() {
                let text = &update.parents[i];
                let parents = &update.parents[..i];
                let already = changes
                    .iter()
                    .any(|c| c.text == *text && c.parents == parents);
                if already {
                    continue;
                }
                let line = self.find(text, parents).cloned().unwrap_or(ConfigLine {
                    raw: text.clone(),
                    text: text.clone(),
                    depth: i,
                    parents: parents.to_vec(),
                    ignored: false,
                });
                changes.push(line);
            }
            if !changes.iter().any(|c| c.same_path(update)) {
                changes.push((*update).clone());
            }
        }

        changes
    }
}
