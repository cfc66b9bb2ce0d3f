//! Step catalog - the ordered, read-only procedure a subject is trained on.
//!
//! Procedure files use the layout of the SOP sample simulations:
//!
//! ```json
//! {
//!   "title": "Retail return",
//!   "steps": [
//!     {
//!       "step_number": 1,
//!       "step_name": "Acknowledge",
//!       "rubric": { "description": "Acknowledge the issue with empathy", "example_message": "..." }
//!     }
//!   ]
//! }
//! ```
//!
//! YAML with the same shape is accepted as well. A rubric may also be plain text.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{NO_DESCRIPTION, ProcedureStep};

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("procedure defines no steps")]
    Empty,

    #[error("step numbers start at 1 (found step 0)")]
    ZeroStep,

    #[error("step {0} is defined more than once")]
    DuplicateStep(u32),
}

/// Ordered mapping from step number to step definition
#[derive(Debug, Clone, Default)]
pub struct StepCatalog {
    title: Option<String>,
    steps: BTreeMap<u32, ProcedureStep>,
}

#[derive(Debug, Deserialize)]
struct ProcedureFile {
    #[serde(default, alias = "name")]
    title: Option<String>,
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
struct StepEntry {
    #[serde(alias = "number")]
    step_number: u32,
    #[serde(default, alias = "name")]
    step_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rubric: Option<RubricEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RubricEntry {
    Text(String),
    Detailed {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        criteria: Vec<String>,
        #[serde(default)]
        example_message: Option<String>,
    },
}

impl StepEntry {
    fn into_step(self) -> ProcedureStep {
        let (rubric_description, criteria, example) = match self.rubric {
            Some(RubricEntry::Text(text)) => (None, vec![text], None),
            Some(RubricEntry::Detailed {
                description,
                criteria,
                example_message,
            }) => (description, criteria, example_message),
            None => (None, Vec::new(), None),
        };

        let description = self
            .description
            .or_else(|| rubric_description.clone())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        let mut rubric = String::new();
        if let Some(text) = &rubric_description {
            rubric.push_str(text);
        }
        for criterion in criteria.iter().filter(|c| !c.trim().is_empty()) {
            if !rubric.is_empty() {
                rubric.push('\n');
            }
            if criteria.len() > 1 || rubric_description.is_some() {
                rubric.push_str("- ");
            }
            rubric.push_str(criterion.trim());
        }

        ProcedureStep {
            number: self.step_number,
            name: self.step_name.filter(|n| !n.trim().is_empty()),
            description,
            rubric,
            example_message: example.filter(|e| !e.trim().is_empty()),
        }
    }
}

impl StepCatalog {
    /// Build a catalog from step definitions, rejecting duplicates
    pub fn from_steps(
        title: Option<String>,
        steps: impl IntoIterator<Item = ProcedureStep>,
    ) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for step in steps {
            if step.number == 0 {
                return Err(CatalogError::ZeroStep);
            }
            let number = step.number;
            if map.insert(number, step).is_some() {
                return Err(CatalogError::DuplicateStep(number));
            }
        }
        if map.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { title, steps: map })
    }

    /// Parse a procedure from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: ProcedureFile =
            serde_json::from_str(content).context("Failed to parse procedure JSON")?;
        Self::from_file_model(file)
    }

    /// Parse a procedure from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ProcedureFile =
            serde_yaml::from_str(content).context("Failed to parse procedure YAML")?;
        Self::from_file_model(file)
    }

    /// Load a procedure file; `.yaml`/`.yml` are read as YAML, anything else as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read procedure file: {:?}", path))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let mut catalog = if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
        .with_context(|| format!("Invalid procedure file: {:?}", path))?;

        if catalog.title.is_none() {
            catalog.title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(String::from);
        }

        debug!("Loaded {} steps from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    fn from_file_model(file: ProcedureFile) -> Result<Self> {
        let steps = file.steps.into_iter().map(StepEntry::into_step);
        Ok(Self::from_steps(file.title, steps)?)
    }

    /// Look up a step. An undefined step yields a placeholder rather than an error.
    pub fn get(&self, number: u32) -> ProcedureStep {
        match self.steps.get(&number) {
            Some(step) => step.clone(),
            None => {
                warn!("Step {} is not defined in the procedure; using placeholder", number);
                ProcedureStep::placeholder(number)
            }
        }
    }

    pub fn contains(&self, number: u32) -> bool {
        self.steps.contains_key(&number)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn first_step(&self) -> Option<u32> {
        self.steps.keys().next().copied()
    }

    pub fn last_step(&self) -> Option<u32> {
        self.steps.keys().next_back().copied()
    }

    /// Next defined step number after `number`
    pub fn next_after(&self, number: u32) -> Option<u32> {
        self.steps
            .range(number.saturating_add(1)..)
            .next()
            .map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whole procedure as text, for prompts that need the full SOP
    pub fn overview(&self) -> String {
        let mut text = String::new();
        if let Some(title) = &self.title {
            text.push_str(&format!("Procedure: {}\n\n", title));
        }
        for step in self.steps.values() {
            text.push_str(&step.details());
            text.push('\n');
        }
        text
    }
}
