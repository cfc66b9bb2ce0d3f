mod agent_utils;
pub mod auditor;
pub mod coach;
pub mod grader;
mod json_utils;

pub use agent_utils::{complete_text, create_provider, ProviderConfig};
pub use auditor::*;
pub use coach::*;
pub use grader::*;
pub use json_utils::extract_json_block;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AttemptId, AuditVerdict, ProcedureStep, Verdict};

/// Context for a coach line
#[derive(Debug, Clone)]
pub struct CoachContext {
    /// Whole procedure, rendered for prompts
    pub procedure: String,
    /// Step the subject is working on
    pub step: ProcedureStep,
    /// Dialogue so far as "Role: content" lines; empty for the opening line
    pub dialogue: String,
}

impl CoachContext {
    pub fn is_opening(&self) -> bool {
        self.dialogue.trim().is_empty()
    }
}

/// Context for grading one attempt
#[derive(Debug, Clone)]
pub struct GradingContext {
    pub step: ProcedureStep,
    pub attempt: AttemptId,
    /// The subject's reply
    pub content: String,
    /// Auditor messages on earlier, rejected gradings of the same reply
    pub auditor_notes: Vec<String>,
}

/// Context for a direct question to the grader
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub procedure: String,
    pub step: ProcedureStep,
    pub attempt: AttemptId,
    /// Dialogue so far as "Role: content" lines
    pub history: String,
    /// Question text with the marker stripped
    pub question: String,
}

/// Context for auditing a verdict
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub step: ProcedureStep,
    pub attempt: AttemptId,
    pub content: String,
    pub verdict: Verdict,
}

/// The coach actor
#[async_trait]
pub trait Coach: Send + Sync {
    /// Produce the next coach line
    async fn speak(&self, ctx: &CoachContext) -> Result<String>;
}

/// The primary evaluator
#[async_trait]
pub trait Grader: Send + Sync {
    /// Grade an attempt against the step rubric.
    ///
    /// Unreadable oracle output is not an error: it becomes a failing verdict.
    async fn grade(&self, ctx: &GradingContext) -> Result<Verdict>;

    /// Free-form guidance for a direct question (interaction mode)
    async fn answer_query(&self, ctx: &QueryContext) -> Result<String>;
}

/// Checks whether the grader judged correctly
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Audit a verdict. Unreadable oracle output counts as disagreement.
    async fn audit(&self, ctx: &AuditContext) -> Result<AuditVerdict>;
}
