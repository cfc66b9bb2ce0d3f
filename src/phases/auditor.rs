use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use minijinja::context;
use serde_json::{Value, json};
use tracing::{info, warn};

use goose::providers::base::Provider;

use crate::config::RoleConfig;
use crate::models::{AttemptId, AuditVerdict};
use crate::prompts::{PromptKind, PromptLibrary};

use super::grader::{as_bool, as_u32};
use super::{
    AuditContext, Auditor, ProviderConfig, complete_text, create_provider, extract_json_block,
};

/// Auditor backed by a goose provider
pub struct GooseAuditor {
    provider: Arc<dyn Provider>,
    prompts: Arc<PromptLibrary>,
}

impl GooseAuditor {
    pub fn new(provider: Arc<dyn Provider>, prompts: Arc<PromptLibrary>) -> Self {
        Self { provider, prompts }
    }

    pub async fn from_config(config: &RoleConfig, prompts: Arc<PromptLibrary>) -> Result<Self> {
        let provider = create_provider(&ProviderConfig::for_auditor(config)).await?;
        Ok(Self::new(provider, prompts))
    }
}

#[async_trait]
impl Auditor for GooseAuditor {
    async fn audit(&self, ctx: &AuditContext) -> Result<AuditVerdict> {
        info!(
            "Auditor is checking the verdict on attempt {} (step {})",
            ctx.attempt, ctx.step.number
        );

        let system = self.prompts.render(
            PromptKind::Auditor,
            context! {
                step => &ctx.step,
                step_title => ctx.step.title(),
                step_details => ctx.step.details(),
            },
        )?;

        let user = serde_json::to_string_pretty(&json!({
            "user_reply": ctx.content,
            "grader_feedback": {
                "role": "grader",
                "message": ctx.verdict.message,
                "current_step": ctx.verdict.step,
                "step_passed": ctx.verdict.passed,
            },
        }))?;

        let response = complete_text(self.provider.as_ref(), &system, &user, "auditor").await?;
        Ok(parse_audit(&response, ctx.step.number, ctx.attempt))
    }
}

/// Parse the auditor's JSON into an audit of `attempt` on `step`.
///
/// `referee_grade` decides agreement. `must_regenerate` is only used when the
/// grade is missing, and a divergence between the two is kept as a diagnostic.
/// Anything unreadable counts as disagreement.
pub fn parse_audit(text: &str, step: u32, attempt: AttemptId) -> AuditVerdict {
    let Some(json) = extract_json_block(text) else {
        warn!("Auditor response contains no JSON object");
        return AuditVerdict::unreadable(step, attempt, "no JSON object");
    };

    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse auditor JSON: {}", e);
            return AuditVerdict::unreadable(step, attempt, &e.to_string());
        }
    };

    let grade = value
        .get("referee_grade")
        .and_then(Value::as_str)
        .map(|g| g.trim().to_ascii_lowercase());
    let must_regenerate = value.get("must_regenerate").and_then(as_bool);

    let (agrees, diagnostic) = match (grade.as_deref(), must_regenerate) {
        (Some("pass"), Some(true)) | (Some("fail"), Some(false)) => {
            let agrees = grade.as_deref() == Some("pass");
            warn!("Auditor returned inconsistent referee_grade and must_regenerate");
            (
                agrees,
                Some(format!(
                    "referee_grade {:?} disagrees with must_regenerate {}; referee_grade used",
                    grade.as_deref().unwrap_or_default(),
                    must_regenerate.unwrap_or_default()
                )),
            )
        }
        (Some("pass"), _) => (true, None),
        (Some("fail"), _) => (false, None),
        (other, Some(regenerate)) => (
            !regenerate,
            Some(match other {
                Some(g) => format!("unknown referee_grade {:?}; must_regenerate used", g),
                None => "missing referee_grade; must_regenerate used".to_string(),
            }),
        ),
        (_, None) => {
            warn!("Auditor response has neither referee_grade nor must_regenerate");
            return AuditVerdict::unreadable(step, attempt, "missing referee_grade");
        }
    };

    if let Some(claimed) = value.get("current_step").and_then(as_u32)
        && claimed != step
    {
        warn!("Auditor audited step {} but step {} is pending", claimed, step);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(if agrees {
            "Grading is correct."
        } else {
            "Grading is incorrect."
        });

    let audit = AuditVerdict::new(step, attempt, agrees, message);
    match diagnostic {
        Some(d) => audit.with_diagnostic(d),
        None => audit,
    }
}
