use serde::{Deserialize, Serialize};

/// Name used for a step that is missing from the catalog
pub const UNKNOWN_STEP_NAME: &str = "Unknown step";

/// Description used for a step that is missing from the catalog
pub const NO_DESCRIPTION: &str = "No description";

/// One ordered unit of a training procedure with its own rubric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    /// Step number (>= 1), unique within a catalog
    pub number: u32,
    /// Short human-readable name (e.g. "Acknowledge the issue")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// What the subject is expected to do in this step
    pub description: String,
    /// Rubric text handed to the grader and the auditor
    pub rubric: String,
    /// Example of a reply that satisfies the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_message: Option<String>,
}

impl ProcedureStep {
    pub fn new(number: u32, description: impl Into<String>, rubric: impl Into<String>) -> Self {
        Self {
            number,
            name: None,
            description: description.into(),
            rubric: rubric.into(),
            example_message: None,
        }
    }

    /// Stand-in for a step number the catalog does not define.
    pub fn placeholder(number: u32) -> Self {
        Self {
            number,
            name: Some(UNKNOWN_STEP_NAME.to_string()),
            description: NO_DESCRIPTION.to_string(),
            rubric: String::new(),
            example_message: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.as_deref() == Some(UNKNOWN_STEP_NAME) && self.rubric.is_empty()
    }

    /// Name if present, otherwise the description
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.description)
    }

    /// Full step details as shown to the evaluators
    pub fn details(&self) -> String {
        let mut text = format!("Step {}: {}\n", self.number, self.title());
        if self.name.is_some() {
            text.push_str(&format!("Description: {}\n", self.description));
        }
        if !self.rubric.is_empty() {
            text.push_str(&format!("Rubric:\n{}\n", self.rubric));
        }
        if let Some(example) = &self.example_message {
            text.push_str(&format!("Example message: {}\n", example));
        }
        text
    }
}
