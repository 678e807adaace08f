//! Environment classification.
//!
//! An instance's identity is compared for exact, case-sensitive equality
//! against the three configured canonical names. No trimming, no case
//! folding, no prefix matching.

use serde::{Deserialize, Serialize};

use crate::config::InstanceNames;

/// Logical role of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Development,
    Qa,
    Production,
    Unknown,
}

impl EnvironmentKind {
    /// Whether a configuration pipeline may run for this kind.
    pub fn is_configurable(self) -> bool {
        matches!(self, EnvironmentKind::Development | EnvironmentKind::Qa)
    }
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvironmentKind::Development => "development",
            EnvironmentKind::Qa => "qa",
            EnvironmentKind::Production => "production",
            EnvironmentKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Classify `current` against the configured instance names.
///
/// An empty identity is always `Unknown`, even if a configured name is empty.
pub fn classify(current: &str, dev: &str, qa: &str, prod: &str) -> EnvironmentKind {
    if current.is_empty() {
        EnvironmentKind::Unknown
    } else if current == prod {
        EnvironmentKind::Production
    } else if current == dev {
        EnvironmentKind::Development
    } else if current == qa {
        EnvironmentKind::Qa
    } else {
        EnvironmentKind::Unknown
    }
}

/// [`classify`] against a configured name set.
pub fn classify_instance(current: &str, names: &InstanceNames) -> EnvironmentKind {
    classify(current, &names.dev, &names.qa, &names.prod)
}
