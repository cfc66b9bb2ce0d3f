use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coach,
    Subject,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coach => write!(f, "Coach"),
            Role::Subject => write!(f, "Subject"),
        }
    }
}

/// Identifies one subject turn that is routed to the grader.
///
/// Verdicts and audit verdicts carry the id of the turn they judge, so a
/// pair can only be resolved when both refer to the same turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u32);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single line of dialogue. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Procedure step that was current when the turn was produced
    pub step: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, step: u32, content: impl Into<String>) -> Self {
        Self {
            role,
            step,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn coach(step: u32, content: impl Into<String>) -> Self {
        Self::new(Role::Coach, step, content)
    }

    pub fn subject(step: u32, content: impl Into<String>) -> Self {
        Self::new(Role::Subject, step, content)
    }
}
