//! Trigger events delivered by the execution host.

use crate::error::{GatekeepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of repository change that produced an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Commits pushed to a branch.
    Push,

    /// Pull request opened or updated against a branch.
    PullRequest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = GatekeepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pr" => Ok(EventKind::PullRequest),
            other => Err(GatekeepError::UnsupportedEvent(other.to_string())),
        }
    }
}

/// An incoming trigger notification.
///
/// Immutable once built; consumed by the trigger evaluator and, when
/// approved, used to pin the snapshot that every job checks out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,

    /// Branch the push landed on, or the base branch of a pull request.
    pub target_branch: String,

    /// Commit to check out. `None` checks out the repository's default HEAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, target_branch: impl Into<String>) -> Self {
        Self {
            kind,
            target_branch: target_branch.into(),
            revision: None,
        }
    }

    pub fn push(target_branch: impl Into<String>) -> Self {
        Self::new(EventKind::Push, target_branch)
    }

    pub fn pull_request(target_branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, target_branch)
    }

    /// Pin the snapshot to a specific commit.
    pub fn at_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Build an event from GitHub Actions style variables.
    ///
    /// Reads `GITHUB_EVENT_NAME`, then `GITHUB_REF` for pushes or
    /// `GITHUB_BASE_REF` for pull requests, and `GITHUB_SHA` when present.
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn from_github_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("GITHUB_EVENT_NAME")
            .ok_or_else(|| GatekeepError::MissingEventField("GITHUB_EVENT_NAME".to_string()))?;
        let kind: EventKind = name.parse()?;

        let target_branch = match kind {
            EventKind::Push => {
                let git_ref = lookup("GITHUB_REF")
                    .ok_or_else(|| GatekeepError::MissingEventField("GITHUB_REF".to_string()))?;
                // Tag pushes keep the full ref so they never equal a branch name.
                git_ref
                    .strip_prefix("refs/heads/")
                    .map(str::to_string)
                    .unwrap_or(git_ref)
            }
            EventKind::PullRequest => lookup("GITHUB_BASE_REF")
                .filter(|b| !b.is_empty())
                .ok_or_else(|| GatekeepError::MissingEventField("GITHUB_BASE_REF".to_string()))?,
        };

        let revision = lookup("GITHUB_SHA").filter(|s| !s.is_empty());

        Ok(Self {
            kind,
            target_branch,
            revision,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.kind, self.target_branch)?;
        if let Some(rev) = &self.revision {
            let short = rev.char_indices().nth(12).map_or(rev.as_str(), |(i, _)| &rev[..i]);
            write!(f, " @ {short}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("push".parse::<EventKind>().unwrap(), EventKind::Push);
        assert_eq!(
            "pull_request".parse::<EventKind>().unwrap(),
            EventKind::PullRequest
        );
        assert_eq!(
            "pull-request".parse::<EventKind>().unwrap(),
            EventKind::PullRequest
        );
        assert!("schedule".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_serde_snake_case() {
        let json = serde_json::to_string(&EventKind::PullRequest).unwrap();
        assert_eq!(json, "\"pull_request\"");
    }

    #[test]
    fn test_from_github_env_push() {
        let event = Event::from_github_env(env(&[
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_SHA", "0123456789abcdef"),
        ]))
        .unwrap();

        assert_eq!(event.kind, EventKind::Push);
        assert_eq!(event.target_branch, "main");
        assert_eq!(event.revision.as_deref(), Some("0123456789abcdef"));
    }

    #[test]
    fn test_from_github_env_pull_request_uses_base_ref() {
        let event = Event::from_github_env(env(&[
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REF", "refs/pull/42/merge"),
            ("GITHUB_BASE_REF", "main"),
        ]))
        .unwrap();

        assert_eq!(event.kind, EventKind::PullRequest);
        assert_eq!(event.target_branch, "main");
        assert!(event.revision.is_none());
    }

    #[test]
    fn test_from_github_env_tag_push_keeps_full_ref() {
        let event = Event::from_github_env(env(&[
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_REF", "refs/tags/v1.0.0"),
        ]))
        .unwrap();
        assert_eq!(event.target_branch, "refs/tags/v1.0.0");
    }

    #[test]
    fn test_from_github_env_missing_fields() {
        assert!(matches!(
            Event::from_github_env(env(&[])),
            Err(GatekeepError::MissingEventField(_))
        ));
        assert!(matches!(
            Event::from_github_env(env(&[("GITHUB_EVENT_NAME", "pull_request")])),
            Err(GatekeepError::MissingEventField(_))
        ));
        assert!(matches!(
            Event::from_github_env(env(&[("GITHUB_EVENT_NAME", "workflow_dispatch")])),
            Err(GatekeepError::UnsupportedEvent(_))
        ));
    }

    #[test]
    fn test_event_display() {
        let event = Event::push("main").at_revision("0123456789abcdef0123");
        assert_eq!(event.to_string(), "push -> main @ 0123456789ab");
    }

    #[test]
    fn test_event_display_multibyte_revision() {
        let event = Event::push("main").at_revision("abcdefghijké-rest");
        assert_eq!(event.to_string(), "push -> main @ abcdefghijké");

        let short = Event::pull_request("main").at_revision("é");
        assert_eq!(short.to_string(), "pull_request -> main @ é");
    }
}
