use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use minijinja::context;
use serde_json::Value;
use tracing::{debug, info, warn};

use goose::providers::base::Provider;

use crate::config::RoleConfig;
use crate::models::{AttemptId, Verdict};
use crate::prompts::{PromptKind, PromptLibrary};

use super::{
    Grader, GradingContext, ProviderConfig, QueryContext, complete_text, create_provider,
    extract_json_block,
};

/// Grader backed by a goose provider
pub struct GooseGrader {
    provider: Arc<dyn Provider>,
    prompts: Arc<PromptLibrary>,
}

impl GooseGrader {
    pub fn new(provider: Arc<dyn Provider>, prompts: Arc<PromptLibrary>) -> Self {
        Self { provider, prompts }
    }

    pub async fn from_config(config: &RoleConfig, prompts: Arc<PromptLibrary>) -> Result<Self> {
        let provider = create_provider(&ProviderConfig::for_grader(config)).await?;
        Ok(Self::new(provider, prompts))
    }
}

#[async_trait]
impl Grader for GooseGrader {
    async fn grade(&self, ctx: &GradingContext) -> Result<Verdict> {
        info!("Grader is grading attempt {} on step {}", ctx.attempt, ctx.step.number);

        let system = self.prompts.render(
            PromptKind::GraderGrading,
            context! {
                step => &ctx.step,
                step_details => ctx.step.details(),
            },
        )?;

        let user = grading_message(ctx);
        let response = complete_text(self.provider.as_ref(), &system, &user, "grader").await?;
        Ok(parse_verdict(&response, ctx.step.number, ctx.attempt))
    }

    async fn answer_query(&self, ctx: &QueryContext) -> Result<String> {
        info!("Grader is answering a direct question on step {}", ctx.step.number);

        let system = self.prompts.render(
            PromptKind::GraderInteraction,
            context! {
                procedure => &ctx.procedure,
                step => &ctx.step,
                step_details => ctx.step.details(),
                history => &ctx.history,
            },
        )?;

        complete_text(self.provider.as_ref(), &system, &ctx.question, "grader").await
    }
}

fn grading_message(ctx: &GradingContext) -> String {
    if ctx.auditor_notes.is_empty() {
        return ctx.content.clone();
    }
    let notes = ctx
        .auditor_notes
        .iter()
        .map(|n| format!("- {}", n))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Trainee reply:\n{}\n\nAn auditor rejected earlier grading of this reply:\n{}",
        ctx.content, notes
    )
}

/// Parse the grader's JSON into a verdict for `attempt` on `step`.
///
/// Anything unreadable becomes a failing verdict with a diagnostic message.
pub fn parse_verdict(text: &str, step: u32, attempt: AttemptId) -> Verdict {
    let Some(json) = extract_json_block(text) else {
        warn!("Grader response contains no JSON object");
        return Verdict::unreadable(step, attempt, "no JSON object");
    };

    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse grader JSON: {}", e);
            debug!("Raw grader response: {}", text);
            return Verdict::unreadable(step, attempt, &e.to_string());
        }
    };

    let Some(passed) = value.get("step_passed").and_then(as_bool) else {
        warn!("Grader response has no usable step_passed");
        return Verdict::unreadable(step, attempt, "missing step_passed");
    };

    if let Some(claimed) = value.get("current_step").and_then(as_u32)
        && claimed != step
    {
        warn!("Grader graded step {} but step {} is pending", claimed, step);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(if passed { "Step passed." } else { "Step not passed." });

    Verdict::graded(step, attempt, passed, message)
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
