//! Indent-structured configuration text model.
//!
//! ACOS configuration is a flat, line-oriented dialect where nesting is
//! expressed purely through indentation:
//!
//! ```text
//! slb server server1-test 6.6.5.6
//!   port 80 tcp
//! slb service-group sgtest-1 tcp
//!   member rs1-test 80
//! ```
//!
//! [`NetworkConfig`] parses such a blob into an ordered sequence of
//! [`ConfigLine`]s, each carrying its trimmed command text, its original raw
//! line, and the chain of ancestor commands that opened the section it lives
//! in. The model is immutable once built; every fetch of device output is
//! parsed fresh.
//!
//! Device output is not trusted to be well-formed: depth is derived from the
//! number of open sections rather than from dividing the indentation width,
//! so any indentation width nests correctly and an over-indented orphan line
//! becomes a top-level line instead of raising an error.

pub mod diff;

pub use diff::MatchPolicy;

use crate::modules::{ModuleError, ModuleResult};
use regex::Regex;
use sha1::{Digest, Sha1};

/// One logical configuration statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    /// Original line including indentation
    pub raw: String,
    /// Trimmed command text
    pub text: String,
    /// Indentation level, zero for top-level commands
    pub depth: usize,
    /// Ancestor command texts from root to immediate parent
    pub parents: Vec<String>,
    /// Excluded from diff comparison but retained for serialization
    pub ignored: bool,
}

impl ConfigLine {
    /// Whether this line occupies the same position in the hierarchy as
    /// `other`: identical command text under an identical parent chain.
    pub fn same_path(&self, other: &ConfigLine) -> bool {
        self.text == other.text && self.parents == other.parents
    }
}

/// Serialization styles for a config model or a diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// Original lines, indentation preserved (round-trips the parsed input)
    Raw,
    /// Trimmed command per line, the form replayed against a CLI
    Commands,
}

/// Serialize a sequence of config lines.
pub fn dump_lines(lines: &[ConfigLine], style: DumpStyle) -> String {
    let parts: Vec<&str> = match style {
        DumpStyle::Raw => lines.iter().map(|l| l.raw.as_str()).collect(),
        DumpStyle::Commands => lines.iter().map(|l| l.text.as_str()).collect(),
    };
    parts.join("\n")
}

/// Ordered collection of configuration lines with indentation-derived
/// parent/child relationships.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    indent: usize,
    items: Vec<ConfigLine>,
}

impl NetworkConfig {
    /// Tab stops in device output expand to this many spaces.
    pub const DEFAULT_INDENT: usize = 1;

    /// Parse a configuration text blob.
    ///
    /// Blank lines and `!` comment lines are dropped. Lines matching any of
    /// the `ignore_lines` patterns are kept in the model but tagged as
    /// excluded from comparison (used to mask device-generated lines such as
    /// counters or timestamps). Invalid ignore patterns are rejected before
    /// any parsing work.
    pub fn parse(contents: &str, indent: usize, ignore_lines: &[String]) -> ModuleResult<Self> {
        let ignore = compile_ignore_patterns(ignore_lines)?;
        let indent = indent.max(1);
        let pad = " ".repeat(indent);

        let mut items: Vec<ConfigLine> = Vec::new();
        // Open ancestors as (leading width, text); widths strictly increase
        let mut stack: Vec<(usize, String)> = Vec::new();

        for raw in contents.lines() {
            let expanded = raw.replace('\t', &pad);
            let text = expanded.trim();
            if text.is_empty() || text.starts_with('!') {
                continue;
            }

            let leading = expanded.len() - expanded.trim_start().len();
            while stack.last().is_some_and(|(w, _)| *w >= leading) {
                stack.pop();
            }

            // Depth counts open sections; the raw width decides nesting, so
            // a sibling at equal indentation pops its predecessor no matter
            // how wide the device indents.
            let depth = stack.len();
            let parents: Vec<String> = stack.iter().map(|(_, t)| t.clone()).collect();
            let ignored = ignore.iter().any(|re| re.is_match(text));

            items.push(ConfigLine {
                raw: raw.to_string(),
                text: text.to_string(),
                depth,
                parents,
                ignored,
            });
            stack.push((leading, text.to_string()));
        }

        Ok(Self { indent, items })
    }

    /// Build a model from an explicit list of command lines.
    ///
    /// Each entry becomes one top-level item. An entry containing embedded
    /// newlines (banner/heredoc values) stays a single item in the model,
    /// but serializing it emits each physical line, so replay sends them one
    /// at a time.
    pub fn from_lines(lines: &[String]) -> Self {
        let items = lines
            .iter()
            .map(|line| ConfigLine {
                raw: line.clone(),
                text: line.trim().to_string(),
                depth: 0,
                parents: Vec::new(),
                ignored: false,
            })
            .collect();
        Self {
            indent: Self::DEFAULT_INDENT,
            items,
        }
    }

    /// The full flattened sequence of lines in document order.
    pub fn items(&self) -> &[ConfigLine] {
        &self.items
    }

    /// Lines that participate in diff comparison.
    pub fn comparable(&self) -> impl Iterator<Item = &ConfigLine> {
        self.items.iter().filter(|l| !l.ignored)
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialize the model.
    pub fn dumps(&self, style: DumpStyle) -> String {
        dump_lines(&self.items, style)
    }

    /// Stable content hash over the canonical command serialization.
    ///
    /// Used for change detection without textual comparison; two models with
    /// the same commands in the same order hash identically regardless of
    /// indentation differences in the source text.
    pub fn sha1(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.dumps(DumpStyle::Commands).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Find a line by hierarchy position.
    pub fn find(&self, text: &str, parents: &[String]) -> Option<&ConfigLine> {
        self.items
            .iter()
            .find(|l| l.text == text && l.parents == parents)
    }
}

/// Compile `diff_ignore_lines` patterns, rejecting invalid ones up front.
pub fn compile_ignore_patterns(patterns: &[String]) -> ModuleResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                ModuleError::InvalidParameter(format!("Invalid diff_ignore_lines pattern '{p}': {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
!Current configuration: 423 bytes
ip dns primary 8.8.4.7
slb server server1-test 6.6.5.6
  port 80 tcp
slb service-group sgtest-1 tcp
  member rs1-test 80
  member rs2-test 80
!
end";

    #[test]
    fn test_parse_depth_and_parents() {
        let cfg = NetworkConfig::parse(SAMPLE, 1, &[]).unwrap();
        let items = cfg.items();

        assert_eq!(items[0].text, "ip dns primary 8.8.4.7");
        assert_eq!(items[0].depth, 0);
        assert!(items[0].parents.is_empty());

        let port = cfg.find("port 80 tcp", &["slb server server1-test 6.6.5.6".to_string()]);
        assert!(port.is_some());
        assert_eq!(port.unwrap().depth, 1);

        let member = cfg
            .find("member rs2-test 80", &["slb service-group sgtest-1 tcp".to_string()])
            .unwrap();
        assert_eq!(member.parents.len(), 1);
    }

    #[test]
    fn test_parse_drops_comments_and_blanks() {
        let cfg = NetworkConfig::parse(SAMPLE, 1, &[]).unwrap();
        assert!(cfg.items().iter().all(|l| !l.text.starts_with('!')));
        assert!(cfg.items().iter().all(|l| !l.text.is_empty()));
    }

    #[test]
    fn test_raw_round_trip() {
        let cfg = NetworkConfig::parse(SAMPLE, 1, &[]).unwrap();
        let dumped = cfg.dumps(DumpStyle::Raw);
        // Round-trip identity modulo comment/blank removal
        let expected: Vec<&str> = SAMPLE
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim().starts_with('!'))
            .collect();
        assert_eq!(dumped, expected.join("\n"));
    }

    #[test]
    fn test_siblings_with_wide_indent_share_parent() {
        let text = "\
slb service-group sgtest-1 tcp
  member rs1-test 80
  member rs2-test 80";
        let cfg = NetworkConfig::parse(text, 1, &[]).unwrap();
        let parent = vec!["slb service-group sgtest-1 tcp".to_string()];

        for member in ["member rs1-test 80", "member rs2-test 80"] {
            let line = cfg.find(member, &parent).unwrap();
            assert_eq!(line.depth, 1);
            assert_eq!(line.parents, parent);
        }
    }

    #[test]
    fn test_malformed_indent_is_clamped() {
        let text = "        orphan deep line\nhostname acos1";
        let cfg = NetworkConfig::parse(text, 1, &[]).unwrap();
        assert_eq!(cfg.items()[0].text, "orphan deep line");
        assert_eq!(cfg.items()[0].depth, 0);
        assert!(cfg.items()[0].parents.is_empty());
    }

    #[test]
    fn test_tab_indentation_normalized() {
        let text = "slb server s1 1.2.3.4\n\tport 80 tcp";
        let cfg = NetworkConfig::parse(text, 1, &[]).unwrap();
        let port = &cfg.items()[1];
        assert_eq!(port.depth, 1);
        assert_eq!(port.parents, vec!["slb server s1 1.2.3.4".to_string()]);
    }

    #[test]
    fn test_ignore_lines_tagged_but_retained() {
        let text = "ip dns primary 8.8.4.7\nBuild time Jan 10 2020";
        let patterns = vec!["^Build time".to_string()];
        let cfg = NetworkConfig::parse(text, 1, &patterns).unwrap();

        assert_eq!(cfg.len(), 2);
        assert!(cfg.items()[1].ignored);
        assert_eq!(cfg.comparable().count(), 1);
        // Still present in raw serialization
        assert!(cfg.dumps(DumpStyle::Raw).contains("Build time"));
    }

    #[test]
    fn test_invalid_ignore_pattern_rejected() {
        let err = NetworkConfig::parse("hostname x", 1, &["[".to_string()]).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter(_)));
    }

    #[test]
    fn test_from_lines_flat() {
        let lines = vec![
            "ip dns primary 10.18.18.81".to_string(),
            "slb template http slb-http-test".to_string(),
        ];
        let cfg = NetworkConfig::from_lines(&lines);
        assert_eq!(cfg.len(), 2);
        assert!(cfg.items().iter().all(|l| l.depth == 0 && l.parents.is_empty()));
    }

    #[test]
    fn test_from_lines_keeps_multiline_value() {
        let lines = vec!["banner login line\nwelcome\nend-banner".to_string()];
        let cfg = NetworkConfig::from_lines(&lines);
        assert_eq!(cfg.len(), 1);
        assert!(cfg.items()[0].text.contains('\n'));
    }

    #[test]
    fn test_sha1_stable_across_indent_styles() {
        let spaces = NetworkConfig::parse("slb server s1 1.2.3.4\n  port 80 tcp", 1, &[]).unwrap();
        let tabs = NetworkConfig::parse("slb server s1 1.2.3.4\n\tport 80 tcp", 1, &[]).unwrap();
        assert_eq!(spaces.sha1(), tabs.sha1());
    }

    #[test]
    fn test_sha1_differs_on_content_change() {
        let a = NetworkConfig::from_lines(&["ip dns primary 8.8.4.7".to_string()]);
        let b = NetworkConfig::from_lines(&["ip dns primary 8.8.8.8".to_string()]);
        assert_ne!(a.sha1(), b.sha1());
    }

    #[test]
    fn test_dumps_commands_trims() {
        let cfg = NetworkConfig::parse("slb server s1 1.2.3.4\n  port 80 tcp", 1, &[]).unwrap();
        assert_eq!(
            cfg.dumps(DumpStyle::Commands),
            "slb server s1 1.2.3.4\nport 80 tcp"
        );
    }
}
