use serde::{Deserialize, Serialize};

use super::AttemptId;

/// How the grader was consulted for a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMode {
    /// The turn was an attempt at the current step
    Graded,
    /// The turn was a direct question to the grader; never audited
    Interaction,
}

/// The grader's decision on one subject turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub step: u32,
    pub attempt: AttemptId,
    pub passed: bool,
    /// Short feedback for the subject (or a diagnostic when substituted)
    pub message: String,
    pub mode: GradingMode,
}

impl Verdict {
    pub fn graded(step: u32, attempt: AttemptId, passed: bool, message: impl Into<String>) -> Self {
        Self {
            step,
            attempt,
            passed,
            message: message.into(),
            mode: GradingMode::Graded,
        }
    }

    /// Free-form guidance in answer to a direct question. Never a pass.
    pub fn interaction(step: u32, attempt: AttemptId, message: impl Into<String>) -> Self {
        Self {
            step,
            attempt,
            passed: false,
            message: message.into(),
            mode: GradingMode::Interaction,
        }
    }

    /// Substitute for grader output that could not be parsed.
    pub fn unreadable(step: u32, attempt: AttemptId, reason: &str) -> Self {
        Self::graded(
            step,
            attempt,
            false,
            format!(
                "Grader response could not be parsed ({}); treating the attempt as not passed",
                reason
            ),
        )
    }
}

/// The auditor's opinion on whether a verdict's `passed` decision was correct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub step: u32,
    pub attempt: AttemptId,
    pub agrees: bool,
    /// Always `!agrees`
    pub must_regenerate: bool,
    /// Feedback to the grader about its grading
    pub message: String,
    /// Oracle-quality note, e.g. when the raw output contradicted itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl AuditVerdict {
    pub fn new(step: u32, attempt: AttemptId, agrees: bool, message: impl Into<String>) -> Self {
        Self {
            step,
            attempt,
            agrees,
            must_regenerate: !agrees,
            message: message.into(),
            diagnostic: None,
        }
    }

    /// Substitute for auditor output that could not be parsed: a disagreement.
    pub fn unreadable(step: u32, attempt: AttemptId, reason: &str) -> Self {
        Self::new(
            step,
            attempt,
            false,
            "Auditor response could not be parsed; forcing a re-grade",
        )
        .with_diagnostic(reason)
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}
