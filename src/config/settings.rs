use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub session: SessionConfig,
    pub coach: RoleConfig,
    pub grader: RoleConfig,
    pub auditor: RoleConfig,
    pub prompts: PromptConfig,
    pub output: OutputConfig,
}

/// Final step used when neither the config nor the procedure names one
pub const DEFAULT_MAX_STEP: u32 = 6;

/// Constants fixed at session start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Final step number; completing it ends the session.
    /// Unset means the procedure's last step.
    pub max_step: Option<u32>,
    /// Consecutive grader/auditor disagreements that end the session fatally
    pub max_retries: u32,
    /// Prefix marking a turn as a direct question to the grader
    pub query_marker: String,
    /// Prefix marking a turn as addressed to the coach
    pub coach_marker: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_step: None,
            max_retries: 2,
            query_marker: "Grader:".to_string(),
            coach_marker: "Coach:".to_string(),
        }
    }
}

impl SessionConfig {
    /// Configured final step, else the procedure's last step, else `DEFAULT_MAX_STEP`
    pub fn resolve_max_step(&self, last_step: Option<u32>) -> u32 {
        self.max_step.or(last_step).unwrap_or(DEFAULT_MAX_STEP)
    }

    /// Reject settings the session state machine cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_step == Some(0) {
            return Err(ConfigError::InvalidMaxStep);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }
        let query = self.query_marker.trim();
        let coach = self.coach_marker.trim();
        if query.is_empty() || coach.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        if query.eq_ignore_ascii_case(coach) {
            return Err(ConfigError::MarkerCollision(query.to_string()));
        }
        Ok(())
    }
}

/// Provider/model overrides for one oracle role (coach, grader, auditor)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Override provider (e.g., "anthropic", "openai")
    pub provider_override: Option<String>,
    /// Override model (e.g., "claude-sonnet-4-20250514")
    pub model_override: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Directory holding `<prompt-name>.md` overrides
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for transcript artifacts
    /// Defaults to ~/.config/sop-coach/runs/
    pub runs_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            runs_dir: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sop-coach/runs"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_step must be at least 1")]
    InvalidMaxStep,

    #[error("max_retries must be at least 1")]
    InvalidMaxRetries,

    #[error("turn markers must not be empty")]
    EmptyMarker,

    #[error("query marker and coach marker are the same: {0}")]
    MarkerCollision(String),

    #[error("first step {first} is beyond max_step {max_step}")]
    FirstStepBeyondMax { first: u32, max_step: u32 },

    #[error("invalid turn marker {marker:?}: {message}")]
    InvalidMarker { marker: String, message: String },
}

impl CliConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if file doesn't exist
    pub fn load_or_default(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            _ => Ok(Self::default()),
        }
    }
}
