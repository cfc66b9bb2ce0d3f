use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use minijinja::context;
use tracing::{info, warn};

use goose::providers::base::Provider;

use crate::config::RoleConfig;
use crate::prompts::{PromptKind, PromptLibrary};

use super::{Coach, CoachContext, ProviderConfig, complete_text, create_provider};

/// Coach backed by a goose provider
pub struct GooseCoach {
    provider: Arc<dyn Provider>,
    prompts: Arc<PromptLibrary>,
}

impl GooseCoach {
    pub fn new(provider: Arc<dyn Provider>, prompts: Arc<PromptLibrary>) -> Self {
        Self { provider, prompts }
    }

    pub async fn from_config(config: &RoleConfig, prompts: Arc<PromptLibrary>) -> Result<Self> {
        let provider = create_provider(&ProviderConfig::for_coach(config)).await?;
        Ok(Self::new(provider, prompts))
    }
}

#[async_trait]
impl Coach for GooseCoach {
    async fn speak(&self, ctx: &CoachContext) -> Result<String> {
        let (kind, user) = if ctx.is_opening() {
            info!("Coach is setting the scene");
            (PromptKind::CoachOpening, "Please describe the situation.")
        } else {
            (PromptKind::CoachDialogue, ctx.dialogue.as_str())
        };

        let system = self.prompts.render(
            kind,
            context! {
                procedure => &ctx.procedure,
                step => &ctx.step,
                step_details => ctx.step.details(),
                dialogue => &ctx.dialogue,
            },
        )?;

        let reply = complete_text(self.provider.as_ref(), &system, user, "coach").await?;
        if reply.is_empty() {
            warn!("Coach returned an empty reply, using a default prompt");
            return Ok(fallback_line(ctx));
        }
        Ok(reply)
    }
}

fn fallback_line(ctx: &CoachContext) -> String {
    format!(
        "Let's continue with step {}: {}.",
        ctx.step.number,
        ctx.step.title()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcedureStep;

    #[test]
    fn test_fallback_line_names_step() {
        let ctx = CoachContext {
            procedure: String::new(),
            step: ProcedureStep::new(2, "Verify the order", "Asks for the order number")
                .with_name("Verification"),
            dialogue: "Coach: hi".to_string(),
        };
        assert!(!ctx.is_opening());
        assert_eq!(
            fallback_line(&ctx),
            "Let's continue with step 2: Verification."
        );
    }
}
