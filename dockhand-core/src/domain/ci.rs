//! CI domain types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suffix appended to the label to name the generated job
pub const JOB_NAME_SUFFIX: &str = "_JOB";

/// Literal the template-creation script prints when it refuses the request
pub const TEMPLATE_FAILURE_MARKER: &str = "false";

/// Periodic trigger: every 3 hours, minute jittered by the CI server
pub const DEFAULT_TIMER_SPEC: &str = "H */3 * * *";
pub const DEFAULT_BRANCH: &str = "*/master";
pub const DEFAULT_SCRIPT_PATH: &str = "Jenkinsfile";

/// An agent-pool label scoped to one cloud configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiLabel {
    pub cloud: String,
    pub label: String,
}

impl CiLabel {
    pub fn new(cloud: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            cloud: cloud.into(),
            label: label.into(),
        }
    }
}

/// Whether `c` may appear in a label
pub fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Labels are non-empty runs of `[A-Za-z0-9_.-]`
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(is_label_char)
}

/// How a label is looked up in the label listing returned by the CI server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelMatch {
    /// Label must equal one token of the listing (`foo` does not match `foobar`)
    ///
    /// Tokens are maximal runs of label characters, so any markup around a
    /// label still separates it. A label outside the label alphabet cannot be
    /// tokenized and is matched by containment.
    #[default]
    Token,
    /// Label matches when it appears anywhere in the listing
    Substring,
}

impl LabelMatch {
    /// Whether `label` is present in the raw `listing` body
    pub fn matches(self, listing: &str, label: &str) -> bool {
        match self {
            LabelMatch::Substring => listing.contains(label),
            LabelMatch::Token if !is_valid_label(label) => listing.contains(label),
            LabelMatch::Token => listing
                .split(|c: char| !is_label_char(c))
                .any(|token| token == label),
        }
    }
}

impl FromStr for LabelMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "token" | "exact" => Ok(LabelMatch::Token),
            "substring" => Ok(LabelMatch::Substring),
            other => Err(format!(
                "unknown label match mode '{}' (expected 'token' or 'substring')",
                other
            )),
        }
    }
}

/// A pipeline job definition to submit to the CI server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub repo_url: String,
    pub timer_spec: String,
    pub branch: String,
    pub script_path: String,
}

impl JobSpec {
    /// Job definition for a label, named `<label>_JOB`
    pub fn for_label(label: &str, repo_url: impl Into<String>) -> Self {
        Self {
            name: format!("{}{}", label, JOB_NAME_SUFFIX),
            repo_url: repo_url.into(),
            timer_spec: DEFAULT_TIMER_SPEC.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
        }
    }
}

/// A job that exists on the CI server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_match_is_exact() {
        let listing = "[foobar, TeamY_Agent]";
        assert!(!LabelMatch::Token.matches(listing, "foo"));
        assert!(LabelMatch::Token.matches(listing, "foobar"));
        assert!(LabelMatch::Token.matches(listing, "TeamY_Agent"));
    }

    #[test]
    fn test_token_match_handles_line_listing() {
        let listing = "alpha\nbeta gamma\n\"delta\"\n";
        assert!(LabelMatch::Token.matches(listing, "gamma"));
        assert!(LabelMatch::Token.matches(listing, "delta"));
        assert!(!LabelMatch::Token.matches(listing, "eta"));
    }

    #[test]
    fn test_token_match_sees_through_markup() {
        for listing in [
            "<pre>TeamX_Agent</pre>",
            "labels=TeamX_Agent",
            "TeamX_Agent|TeamY",
            "TeamX_Agent:docker",
            "{\"labels\":[\"TeamX_Agent\"]}",
        ] {
            assert!(
                LabelMatch::Token.matches(listing, "TeamX_Agent"),
                "label not found in {:?}",
                listing
            );
        }
        assert!(!LabelMatch::Token.matches("<pre>TeamX_Agent2</pre>", "TeamX_Agent"));
    }

    #[test]
    fn test_token_match_keeps_dots_and_dashes_in_labels() {
        assert!(LabelMatch::Token.matches("[team-x.agent]", "team-x.agent"));
        assert!(!LabelMatch::Token.matches("[team-x.agent]", "team-x"));
    }

    #[test]
    fn test_label_outside_alphabet_falls_back_to_containment() {
        assert!(LabelMatch::Token.matches("[team,x]", "team,x"));
        assert!(!LabelMatch::Token.matches("[team]", "team,x"));
    }

    #[test]
    fn test_valid_labels() {
        assert!(is_valid_label("TeamX_Agent"));
        assert!(is_valid_label("team-x.1"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("team,x"));
        assert!(!is_valid_label("Team X"));
    }

    #[test]
    fn test_substring_match_keeps_containment_behaviour() {
        assert!(LabelMatch::Substring.matches("[foobar]", "foo"));
        assert!(!LabelMatch::Substring.matches("[bar]", "foo"));
    }

    #[test]
    fn test_label_match_from_str() {
        assert_eq!("token".parse::<LabelMatch>(), Ok(LabelMatch::Token));
        assert_eq!("Substring".parse::<LabelMatch>(), Ok(LabelMatch::Substring));
        assert!("fuzzy".parse::<LabelMatch>().is_err());
    }

    #[test]
    fn test_job_spec_for_label() {
        let spec = JobSpec::for_label("TeamX_Agent", "https://example.com/repo.git");
        assert_eq!(spec.name, "TeamX_Agent_JOB");
        assert_eq!(spec.timer_spec, "H */3 * * *");
        assert_eq!(spec.branch, "*/master");
        assert_eq!(spec.script_path, "Jenkinsfile");
    }
}
