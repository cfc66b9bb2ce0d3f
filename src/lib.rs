pub mod config;
pub mod input;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod phases;
pub mod prompts;
pub mod slug;

// Re-export main types
pub use config::{CliConfig, ConfigError, OutputConfig, SessionConfig, StepCatalog};
pub use input::{ConsoleInput, ScriptedInput, SubjectInput};
pub use models::{AttemptId, AuditVerdict, ProcedureStep, Role, Turn, Verdict};
pub use orchestrator::{
    SessionController, SessionHalt, SessionReport, SessionState, SessionStatus, Transcript,
};
pub use output::{FileTranscriptWriter, TranscriptWriter};
pub use phases::{Auditor, Coach, GooseAuditor, GooseCoach, GooseGrader, Grader};
pub use prompts::PromptLibrary;

pub use slug::slugify;
