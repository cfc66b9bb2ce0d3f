//! Bundled default prompt templates for sop-coach.
//!
//! Templates are embedded in the binary using include_str! and can be
//! overridden per project. They are rendered with minijinja.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_COACH_OPENING_PROMPT: &str = include_str!("../prompts/coach_opening.md");
pub const DEFAULT_COACH_DIALOGUE_PROMPT: &str = include_str!("../prompts/coach_dialogue.md");
pub const DEFAULT_GRADER_GRADING_PROMPT: &str = include_str!("../prompts/grader_grading.md");
pub const DEFAULT_GRADER_INTERACTION_PROMPT: &str =
    include_str!("../prompts/grader_interaction.md");
pub const DEFAULT_AUDITOR_PROMPT: &str = include_str!("../prompts/auditor.md");

/// The prompts an oracle call can use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    CoachOpening,
    CoachDialogue,
    GraderGrading,
    GraderInteraction,
    Auditor,
}

impl PromptKind {
    pub const ALL: [PromptKind; 5] = [
        PromptKind::CoachOpening,
        PromptKind::CoachDialogue,
        PromptKind::GraderGrading,
        PromptKind::GraderInteraction,
        PromptKind::Auditor,
    ];

    /// Template name, also the override file stem
    pub fn name(self) -> &'static str {
        match self {
            PromptKind::CoachOpening => "coach_opening",
            PromptKind::CoachDialogue => "coach_dialogue",
            PromptKind::GraderGrading => "grader_grading",
            PromptKind::GraderInteraction => "grader_interaction",
            PromptKind::Auditor => "auditor",
        }
    }

    fn bundled(self) -> &'static str {
        match self {
            PromptKind::CoachOpening => DEFAULT_COACH_OPENING_PROMPT,
            PromptKind::CoachDialogue => DEFAULT_COACH_DIALOGUE_PROMPT,
            PromptKind::GraderGrading => DEFAULT_GRADER_GRADING_PROMPT,
            PromptKind::GraderInteraction => DEFAULT_GRADER_INTERACTION_PROMPT,
            PromptKind::Auditor => DEFAULT_AUDITOR_PROMPT,
        }
    }
}

/// Prompt resolution result
#[derive(Debug, Clone, PartialEq)]
pub enum PromptSource {
    /// Template loaded from a file path
    File(PathBuf),
    /// Template loaded from bundled default
    Bundled(&'static str),
}

impl PromptSource {
    pub fn content(&self) -> Result<String> {
        match self {
            PromptSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt template {:?}", path)),
            PromptSource::Bundled(content) => Ok(content.to_string()),
        }
    }
}

/// Resolve a prompt template, falling back to the bundled default.
///
/// Resolution priority:
/// 1. `<prompt_dir>/<name>.md` if a directory is configured
/// 2. Project-local `.sop-coach/prompts/<name>.md`
/// 3. Bundled default
pub fn resolve_prompt(
    prompt_dir: Option<&Path>,
    base_dir: &Path,
    kind: PromptKind,
) -> PromptSource {
    let file_name = format!("{}.md", kind.name());

    if let Some(dir) = prompt_dir {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base_dir.join(dir)
        };
        let path = dir.join(&file_name);
        if path.exists() {
            debug!("Using prompt from configured directory: {:?}", path);
            return PromptSource::File(path);
        }
    }

    let local = base_dir.join(".sop-coach/prompts").join(&file_name);
    if local.exists() {
        debug!("Using prompt from .sop-coach: {:?}", local);
        return PromptSource::File(local);
    }

    debug!("Using bundled default prompt for: {}", kind.name());
    PromptSource::Bundled(kind.bundled())
}

/// Compiled prompt templates shared by the coach, grader and auditor
#[derive(Clone)]
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    /// Resolve and compile every template
    pub fn load(prompt_dir: Option<&Path>, base_dir: &Path) -> Result<Self> {
        let mut env = Environment::new();
        for kind in PromptKind::ALL {
            let content = resolve_prompt(prompt_dir, base_dir, kind).content()?;
            env.add_template_owned(kind.name(), content)
                .with_context(|| format!("Invalid prompt template: {}", kind.name()))?;
        }
        Ok(Self { env })
    }

    /// Library built from the bundled templates only
    pub fn bundled() -> Result<Self> {
        let mut env = Environment::new();
        for kind in PromptKind::ALL {
            env.add_template(kind.name(), kind.bundled())
                .with_context(|| format!("Invalid bundled prompt: {}", kind.name()))?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, kind: PromptKind, ctx: S) -> Result<String> {
        let template = self
            .env
            .get_template(kind.name())
            .with_context(|| format!("Prompt template not loaded: {}", kind.name()))?;
        template
            .render(ctx)
            .with_context(|| format!("Failed to render prompt: {}", kind.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcedureStep;
    use minijinja::context;

    #[test]
    fn test_bundled_prompts_not_empty() {
        for kind in PromptKind::ALL {
            assert!(!kind.bundled().trim().is_empty(), "{}", kind.name());
        }
    }

    #[test]
    fn test_resolve_prompt_bundled_fallback() {
        let source = resolve_prompt(
            Some(Path::new("nonexistent/prompts")),
            Path::new("/tmp"),
            PromptKind::Auditor,
        );
        assert_eq!(source, PromptSource::Bundled(DEFAULT_AUDITOR_PROMPT));
    }

    #[test]
    fn test_resolve_prompt_prefers_configured_dir() {
        let base = tempfile::tempdir().unwrap();
        let local = base.path().join(".sop-coach/prompts");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("auditor.md"), "local").unwrap();

        let custom = base.path().join("custom");
        std::fs::create_dir_all(&custom).unwrap();
        std::fs::write(custom.join("auditor.md"), "custom").unwrap();

        let source = resolve_prompt(Some(Path::new("custom")), base.path(), PromptKind::Auditor);
        assert_eq!(source, PromptSource::File(custom.join("auditor.md")));

        let source = resolve_prompt(None, base.path(), PromptKind::Auditor);
        assert_eq!(source, PromptSource::File(local.join("auditor.md")));
    }

    #[test]
    fn test_render_grading_prompt() {
        let library = PromptLibrary::bundled().unwrap();
        let step = ProcedureStep::new(3, "Offer a solution", "Offers a refund or replacement");
        let prompt = library
            .render(
                PromptKind::GraderGrading,
                context! { step => &step, step_details => step.details() },
            )
            .unwrap();
        assert!(prompt.contains("\"current_step\": 3"));
        assert!(prompt.contains("Offers a refund or replacement"));
    }

    #[test]
    fn test_override_is_rendered() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join(".sop-coach/prompts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("coach_opening.md"), "Step {{ step.number }} begins").unwrap();

        let library = PromptLibrary::load(None, base.path()).unwrap();
        let step = ProcedureStep::new(1, "Greet", "Greets the customer");
        let prompt = library
            .render(PromptKind::CoachOpening, context! { step => &step, procedure => "" })
            .unwrap();
        assert_eq!(prompt, "Step 1 begins");
    }
}
