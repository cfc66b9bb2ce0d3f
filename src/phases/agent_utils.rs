//! Shared utilities for provider setup across coach, grader, and auditor.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use goose::conversation::message::Message;
use goose::providers::{base::Provider, create_with_named_model};

use crate::config::RoleConfig;

/// Configuration for creating an LLM provider.
///
/// Abstracts the provider/model override pattern shared by the three oracle roles.
pub struct ProviderConfig<'a> {
    /// Override provider from config (e.g., "anthropic", "openai", "litellm")
    pub provider_override: Option<&'a str>,
    /// Override model from config
    pub model_override: Option<&'a str>,
    /// Default provider if no override
    pub default_provider: &'static str,
    /// Default model if no override
    pub default_model: &'static str,
    /// Component name for logging (e.g., "coach", "grader", "auditor")
    pub component_name: &'static str,
}

impl<'a> ProviderConfig<'a> {
    pub fn for_coach(config: &'a RoleConfig) -> Self {
        Self::with_defaults(config, "claude-sonnet-4-20250514", "coach")
    }

    pub fn for_grader(config: &'a RoleConfig) -> Self {
        Self::with_defaults(config, "claude-sonnet-4-20250514", "grader")
    }

    /// The auditor defaults to the stronger model
    pub fn for_auditor(config: &'a RoleConfig) -> Self {
        Self::with_defaults(config, "claude-opus-4-5-20251101", "auditor")
    }

    fn with_defaults(
        config: &'a RoleConfig,
        default_model: &'static str,
        component_name: &'static str,
    ) -> Self {
        Self {
            provider_override: config.provider_override.as_deref(),
            model_override: config.model_override.as_deref(),
            default_provider: "anthropic",
            default_model,
            component_name,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider_override.unwrap_or(self.default_provider)
    }

    pub fn model_name(&self) -> &str {
        self.model_override.unwrap_or(self.default_model)
    }
}

/// Create an LLM provider. Priority: config override > default
pub async fn create_provider(config: &ProviderConfig<'_>) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider_name();
    let model_name = config.model_name();

    info!(
        "Creating {} provider: {} with model: {}",
        config.component_name, provider_name, model_name
    );

    create_with_named_model(provider_name, model_name)
        .await
        .with_context(|| format!("Failed to create {} provider", config.component_name))
}

/// Single completion: system prompt plus one user message, returning the reply text
pub async fn complete_text(
    provider: &dyn Provider,
    system: &str,
    user: &str,
    component_name: &str,
) -> Result<String> {
    let messages = vec![Message::user().with_text(user)];
    let (response, _usage) = provider
        .complete(system, &messages, &[])
        .await
        .with_context(|| format!("{} completion failed", component_name))?;

    let text = response.as_concat_text().trim().to_string();
    debug!("{} response: {}", component_name, text);
    Ok(text)
}
