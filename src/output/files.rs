use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::config::OutputConfig;
use crate::orchestrator::{
    AttemptOutcome, AttemptRecord, SessionReport, SessionStatus, TranscriptEntry,
};
use crate::slugify;

use super::TranscriptWriter;

/// File-based writer producing `<slug>-transcript.json` and `<slug>-transcript.md`
pub struct FileTranscriptWriter {
    config: OutputConfig,
}

impl FileTranscriptWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Slug from the procedure title, or "session" when there is none
    fn session_slug(report: &SessionReport) -> String {
        let slug = report.procedure.as_deref().map(slugify).unwrap_or_default();
        if slug.is_empty() {
            "session".to_string()
        } else {
            slug
        }
    }

    fn run_dir(&self, report: &SessionReport, slug: &str) -> PathBuf {
        let stamp = report.started_at.format("%Y%m%dT%H%M%SZ");
        self.config.runs_dir.join(format!("{}-{}", slug, stamp))
    }

    fn report_to_markdown(&self, report: &SessionReport) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# {}\n\n",
            report.procedure.as_deref().unwrap_or("SOP training session")
        ));
        match &report.status {
            SessionStatus::Completed => md.push_str("**Status**: Completed\n"),
            SessionStatus::Halted { reason } => {
                md.push_str(&format!("**Status**: Halted ({})\n", reason))
            }
        }
        md.push_str(&format!(
            "**Final step**: {} of {}\n",
            report.final_step, report.max_step
        ));
        let completed = report
            .steps_completed
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>();
        md.push_str(&format!(
            "**Steps completed**: {}\n",
            if completed.is_empty() {
                "none".to_string()
            } else {
                completed.join(", ")
            }
        ));
        md.push_str(&format!(
            "**Started**: {}\n**Finished**: {}\n\n",
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339()
        ));

        md.push_str("## Transcript\n\n");
        for entry in report.transcript.entries() {
            match entry {
                TranscriptEntry::Turn(turn) => {
                    md.push_str(&format!(
                        "**{}** (step {}): {}\n\n",
                        turn.role, turn.step, turn.content
                    ));
                }
                TranscriptEntry::Consultation { query, answer } => {
                    md.push_str(&format!(
                        "**{}** (step {}, question): {}\n\n",
                        query.role, query.step, query.content
                    ));
                    md.push_str(&format!("> Grader (not graded): {}\n\n", answer.message));
                }
                TranscriptEntry::Attempt(record) => self.render_attempt(&mut md, record),
            }
        }

        md
    }

    fn render_attempt(&self, md: &mut String, record: &AttemptRecord) {
        md.push_str(&format!(
            "**{}** (step {}, attempt {}): {}\n\n",
            record.turn.role, record.turn.step, record.attempt, record.turn.content
        ));

        for dispute in &record.disputes {
            md.push_str(&format!(
                "> ~~Grader: {} ({})~~\n> Auditor disagreed: {}\n>\n",
                dispute.verdict.message,
                pass_fail(dispute.verdict.passed),
                dispute.audit.message
            ));
        }

        md.push_str(&format!(
            "> Grader: {} ({})\n> Auditor {}: {}\n",
            record.verdict.message,
            pass_fail(record.verdict.passed),
            if record.audit.agrees { "agreed" } else { "disagreed" },
            record.audit.message
        ));
        if let Some(diagnostic) = &record.audit.diagnostic {
            md.push_str(&format!("> Note: {}\n", diagnostic));
        }

        let marker = match record.outcome {
            AttemptOutcome::Advanced { next_step } => {
                format!("Step {} passed, moving to step {}", record.turn.step, next_step)
            }
            AttemptOutcome::Completed => {
                format!("Step {} passed, procedure complete", record.turn.step)
            }
            AttemptOutcome::ConfirmedFail => format!("Step {} not passed", record.turn.step),
            AttemptOutcome::Halted => "Session halted".to_string(),
        };
        md.push_str(&format!("\n*{}*\n\n", marker));
    }
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "pass" } else { "fail" }
}

#[async_trait]
impl TranscriptWriter for FileTranscriptWriter {
    async fn write_report(&self, report: &SessionReport) -> Result<PathBuf> {
        let slug = Self::session_slug(report);
        let dir = self.run_dir(report, &slug);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create run directory {:?}", dir))?;

        let json_path = dir.join(format!("{}-transcript.json", slug));
        fs::write(&json_path, serde_json::to_string_pretty(report)?)
            .await
            .context("Failed to write transcript JSON")?;
        info!("Wrote {:?}", json_path);

        let md_path = dir.join(format!("{}-transcript.md", slug));
        fs::write(&md_path, self.report_to_markdown(report))
            .await
            .context("Failed to write transcript markdown")?;
        info!("Wrote {:?}", md_path);

        Ok(dir)
    }
}
