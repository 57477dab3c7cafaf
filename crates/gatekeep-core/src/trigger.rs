//! Trigger evaluation: decides whether an event runs the pipeline.

use crate::event::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch filter of a trigger rule.
///
/// Supports:
///   - Exact: "main" matches only "main"
///   - Segment wildcard: "release/*" matches "release/1.0" but not "release/1.0/hotfix"
///   - Multi-segment: "feature/**" matches everything below "feature/"
///
/// A pattern without wildcards is plain string equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct BranchPattern(String);

impl BranchPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_literal(&self) -> bool {
        !self.0.contains('*')
    }

    /// Check if this pattern matches a branch name
    pub fn matches(&self, branch: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }
        if self.is_literal() {
            return self.0 == branch;
        }

        let pattern_parts: Vec<&str> = self.0.split('/').collect();
        let branch_parts: Vec<&str> = branch.split('/').collect();
        match_segments(&pattern_parts, &branch_parts)
    }
}

impl fmt::Display for BranchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn match_segments(pattern: &[&str], branch: &[&str]) -> bool {
    match (pattern.first(), branch.first()) {
        (None, None) => true,
        // ** consumes zero or more segments
        (Some(&"**"), _) => {
            match_segments(&pattern[1..], branch)
                || (!branch.is_empty() && match_segments(pattern, &branch[1..]))
        }
        (Some(p), Some(b)) if segment_match(p, b) => match_segments(&pattern[1..], &branch[1..]),
        _ => false,
    }
}

/// `*` matches any run of characters inside a single segment.
fn segment_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    let mut pi = 0usize;
    let mut vi = 0usize;
    let mut last_star: Option<usize> = None;
    let mut star_vi = 0usize;

    while vi < v.len() {
        if pi < p.len() && p[pi] == '*' {
            last_star = Some(pi);
            pi += 1;
            star_vi = vi;
            continue;
        }

        if pi < p.len() && p[pi] == v[vi] {
            pi += 1;
            vi += 1;
            continue;
        }

        match last_star {
            Some(star_idx) => {
                star_vi += 1;
                vi = star_vi;
                pi = star_idx + 1;
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

/// A static trigger rule: event kind plus branch filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRule {
    #[serde(rename = "event")]
    pub event_kind: EventKind,

    #[serde(rename = "branch")]
    pub branch_pattern: BranchPattern,
}

impl TriggerRule {
    pub fn new(event_kind: EventKind, branch_pattern: impl Into<String>) -> Self {
        Self {
            event_kind,
            branch_pattern: BranchPattern::new(branch_pattern),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.event_kind == event.kind && self.branch_pattern.matches(&event.target_branch)
    }
}

/// Evaluate an event against the rule set.
///
/// Approved iff at least one rule matches both the event kind and the target
/// branch. Unmatched events are not errors.
pub fn evaluate(event: &Event, rules: &[TriggerRule]) -> bool {
    rules.iter().any(|rule| rule.matches(event))
}
