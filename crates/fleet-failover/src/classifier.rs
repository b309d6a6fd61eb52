//! Failure-line classification for local process output.

use regex::{RegexSet, RegexSetBuilder};

use fleet_core::FailoverConfig;

use crate::error::{FailoverError, FailoverResult};

/// A line recognised as an upstream connectivity failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSignal {
    /// The configured pattern that matched.
    pub pattern: String,
}

/// Case-insensitive substring matcher over the configured failure patterns,
/// with optional success patterns.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    set: RegexSet,
    patterns: Vec<String>,
    success: Option<RegexSet>,
}

impl FailureClassifier {
    /// Compile `patterns`. Each pattern is matched literally.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> FailoverResult<Self> {
        let patterns = normalize(patterns);
        if patterns.is_empty() {
            return Err(FailoverError::InvalidConfig(
                "at least one failure pattern is required".into(),
            ));
        }
        let set = compile(&patterns, "failure")?;
        Ok(Self {
            set,
            patterns,
            success: None,
        })
    }

    /// Also recognise success lines. An empty list disables success matching.
    pub fn with_success_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> FailoverResult<Self> {
        let patterns = normalize(patterns);
        self.success = if patterns.is_empty() {
            None
        } else {
            Some(compile(&patterns, "success")?)
        };
        Ok(self)
    }

    /// Build from `[failover]` failure and success patterns.
    pub fn from_config(config: &FailoverConfig) -> FailoverResult<Self> {
        Self::new(&config.failure_patterns)?.with_success_patterns(&config.success_patterns)
    }

    /// The first configured pattern found in `line`, if any.
    pub fn classify(&self, line: &str) -> Option<FailureSignal> {
        self.set.matches(line).iter().next().map(|i| FailureSignal {
            pattern: self.patterns[i].clone(),
        })
    }

    pub fn is_failure(&self, line: &str) -> bool {
        self.set.is_match(line)
    }

    /// True for a success line that does not also look like a failure.
    pub fn is_success(&self, line: &str) -> bool {
        !self.is_failure(line) && self.success.as_ref().is_some_and(|s| s.is_match(line))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn normalize<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn compile(patterns: &[String], kind: &str) -> FailoverResult<RegexSet> {
    RegexSetBuilder::new(patterns.iter().map(|p| regex::escape(p)))
        .case_insensitive(true)
        .build()
        .map_err(|e| FailoverError::InvalidConfig(format!("{kind} patterns: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> FailureClassifier {
        FailureClassifier::new(&["timeout", "timed out", "refused", "unreachable", "connection failed"])
            .unwrap()
    }

    #[test]
    fn matches_case_insensitively() {
        let c = classifier();
        let signal = c.classify("[2024-01-01] Stratum: Connection REFUSED by peer").unwrap();
        assert_eq!(signal.pattern, "refused");
        assert!(c.is_failure("network Unreachable"));
        assert!(c.is_failure("read timed out after 30s"));
    }

    #[test]
    fn ignores_normal_output() {
        let c = classifier();
        assert!(c.classify("accepted share 1/1 (100%)").is_none());
        assert!(c.classify("").is_none());
    }

    #[test]
    fn reports_first_configured_pattern() {
        let c = classifier();
        let signal = c.classify("connection failed: timeout").unwrap();
        assert_eq!(signal.pattern, "timeout");
    }

    #[test]
    fn patterns_are_literal() {
        let c = FailureClassifier::new(&["err(42)", "a.b"]).unwrap();
        assert!(c.is_failure("fatal err(42) occurred"));
        assert!(!c.is_failure("axb"));
    }

    #[test]
    fn success_lines() {
        let c = FailureClassifier::from_config(&FailoverConfig::default()).unwrap();
        assert!(c.is_success("[GPU0] share ACCEPTED (12 ms)"));
        assert!(!c.is_success("accepted connection, then timed out"));
        assert!(!classifier().is_success("accepted"));
    }

    #[test]
    fn empty_patterns_rejected() {
        let none: [&str; 0] = [];
        assert!(FailureClassifier::new(&none).is_err());
        assert!(FailureClassifier::new(&["  "]).is_err());
    }
}
