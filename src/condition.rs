//! Wait-condition expressions over indexed command output.
//!
//! A conditional like `result[0] contains ACOS` gates the command
//! dispatcher's retry loop: the batch is resent until the condition holds or
//! retries are exhausted. Expressions are parsed once into an operator and
//! operands, then evaluated repeatedly against the latest response batch;
//! evaluation is side-effect free, so a condition can be checked every round
//! without accumulating state.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Invalid conditional expression '{0}': expected result[<index>] <operator> <value>")]
    Malformed(String),

    #[error("Unknown operator '{operator}' in conditional '{raw}'")]
    UnknownOperator { operator: String, raw: String },

    #[error("Invalid regex '{pattern}' in conditional '{raw}': {source}")]
    BadPattern {
        pattern: String,
        raw: String,
        source: regex::Error,
    },
}

/// Comparison operator of a wait condition.
#[derive(Debug, Clone)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    /// Regex match, pattern compiled at parse time
    Matches(Box<Regex>),
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "eq"),
            ComparisonOp::Neq => write!(f, "neq"),
            ComparisonOp::Gt => write!(f, "gt"),
            ComparisonOp::Ge => write!(f, "ge"),
            ComparisonOp::Lt => write!(f, "lt"),
            ComparisonOp::Le => write!(f, "le"),
            ComparisonOp::Contains => write!(f, "contains"),
            ComparisonOp::Matches(_) => write!(f, "matches"),
        }
    }
}

/// A parsed wait condition: `result[<index>] <operator> <value>`.
#[derive(Debug, Clone)]
pub struct Conditional {
    raw: String,
    index: usize,
    op: ComparisonOp,
    operand: String,
}

fn expression_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*result\[(\d+)\]\s+(\S+)\s+(.+?)\s*$").expect("valid literal pattern")
    })
}

impl Conditional {
    /// Parse an expression. Parse errors are input validation errors and are
    /// surfaced before any device interaction.
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let caps = expression_pattern()
            .captures(expr)
            .ok_or_else(|| ConditionError::Malformed(expr.to_string()))?;

        let index: usize = caps[1]
            .parse()
            .map_err(|_| ConditionError::Malformed(expr.to_string()))?;
        let operand = caps[3].to_string();

        let op = match &caps[2] {
            "eq" | "==" => ComparisonOp::Eq,
            "neq" | "ne" | "!=" => ComparisonOp::Neq,
            "gt" | ">" => ComparisonOp::Gt,
            "ge" | ">=" => ComparisonOp::Ge,
            "lt" | "<" => ComparisonOp::Lt,
            "le" | "<=" => ComparisonOp::Le,
            "contains" => ComparisonOp::Contains,
            "matches" => {
                let re = Regex::new(&operand).map_err(|source| ConditionError::BadPattern {
                    pattern: operand.clone(),
                    raw: expr.to_string(),
                    source,
                })?;
                ComparisonOp::Matches(Box::new(re))
            }
            other => {
                return Err(ConditionError::UnknownOperator {
                    operator: other.to_string(),
                    raw: expr.to_string(),
                })
            }
        };

        Ok(Self {
            raw: expr.to_string(),
            index,
            op,
            operand,
        })
    }

    /// The original expression text, reported verbatim in `failed_conditions`.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Evaluate against an indexed response batch.
    ///
    /// An out-of-range index evaluates false (the response it refers to does
    /// not exist yet). Numeric operators require both sides to parse as
    /// numbers; otherwise the condition fails for that round.
    pub fn eval(&self, responses: &[String]) -> bool {
        let Some(value) = responses.get(self.index) else {
            return false;
        };
        let value = value.trim();

        match &self.op {
            ComparisonOp::Eq => value == self.operand,
            ComparisonOp::Neq => value != self.operand,
            ComparisonOp::Contains => value.contains(&self.operand),
            ComparisonOp::Matches(re) => re.is_match(value),
            numeric => match (value.parse::<f64>(), self.operand.parse::<f64>()) {
                (Ok(lhs), Ok(rhs)) => match numeric {
                    ComparisonOp::Gt => lhs > rhs,
                    ComparisonOp::Ge => lhs >= rhs,
                    ComparisonOp::Lt => lhs < rhs,
                    ComparisonOp::Le => lhs <= rhs,
                    _ => unreachable!(),
                },
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contains() {
        let cond = Conditional::parse("result[0] contains ACOS").unwrap();
        assert!(cond.eval(&responses(&["ACOS 4.1.1-P9 on Thunder"])));
        assert!(!cond.eval(&responses(&["IOS XE"])));
    }

    #[test]
    fn test_eq_and_symbolic_aliases() {
        let word = Conditional::parse("result[0] eq up").unwrap();
        let sym = Conditional::parse("result[0] == up").unwrap();
        assert!(word.eval(&responses(&["up"])));
        assert!(sym.eval(&responses(&[" up "])));
        assert!(!sym.eval(&responses(&["down"])));
    }

    #[test]
    fn test_neq() {
        let cond = Conditional::parse("result[1] != down").unwrap();
        assert!(cond.eval(&responses(&["x", "up"])));
        assert!(!cond.eval(&responses(&["x", "down"])));
    }

    #[test]
    fn test_numeric_comparisons() {
        let gt = Conditional::parse("result[0] gt 10").unwrap();
        assert!(gt.eval(&responses(&["42"])));
        assert!(!gt.eval(&responses(&["7"])));
        // Non-numeric output fails the round instead of erroring
        assert!(!gt.eval(&responses(&["not a number"])));

        let le = Conditional::parse("result[0] <= 10").unwrap();
        assert!(le.eval(&responses(&["10"])));
    }

    #[test]
    fn test_matches_regex() {
        let cond = Conditional::parse(r"result[0] matches Version \d+\.\d+").unwrap();
        assert!(cond.eval(&responses(&["Thunder Version 4.1, build 53"])));
        assert!(!cond.eval(&responses(&["no version here"])));
    }

    #[test]
    fn test_out_of_range_index_is_false() {
        let cond = Conditional::parse("result[3] contains x").unwrap();
        assert!(!cond.eval(&responses(&["x"])));
    }

    #[test]
    fn test_repeatable_evaluation() {
        let cond = Conditional::parse("result[0] contains ready").unwrap();
        let batch = responses(&["not yet"]);
        assert!(!cond.eval(&batch));
        assert!(!cond.eval(&batch));
        assert!(cond.eval(&responses(&["ready"])));
    }

    #[test]
    fn test_malformed_expression() {
        assert!(Conditional::parse("output has stuff").is_err());
        assert!(Conditional::parse("result[x] contains y").is_err());
    }

    #[test]
    fn test_unknown_operator() {
        let err = Conditional::parse("result[0] approximates y").unwrap_err();
        assert!(matches!(err, ConditionError::UnknownOperator { .. }));
    }

    #[test]
    fn test_bad_regex_rejected_at_parse() {
        let err = Conditional::parse("result[0] matches [").unwrap_err();
        assert!(matches!(err, ConditionError::BadPattern { .. }));
    }

    #[test]
    fn test_raw_preserved() {
        let cond = Conditional::parse("result[0] contains ACOS").unwrap();
        assert_eq!(cond.raw(), "result[0] contains ACOS");
    }
}
