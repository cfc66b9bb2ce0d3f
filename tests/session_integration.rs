//! Integration tests for full training sessions.
//!
//! The coach, grader and auditor are scripted so every session is deterministic:
//! - The two-step scenario ending on the retry bound
//! - Completion of a full procedure
//! - Direct questions and coach requests leaving the counters alone
//! - Transcript growth per graded attempt
//! - Input closing and oracle failure aborting with an error

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;

use sop_coach::models::{AuditVerdict, ProcedureStep, Verdict};
use sop_coach::orchestrator::{
    AttemptOutcome, SessionEvent, SessionHalt, SessionObserver, TranscriptEntry,
};
use sop_coach::phases::{
    AuditContext, Auditor, Coach, CoachContext, Grader, GradingContext, QueryContext,
};
use sop_coach::{
    ScriptedInput, SessionConfig, SessionController, SessionReport, SessionState, SessionStatus,
    StepCatalog,
};

// ============================================================================
// Scripted oracles
// ============================================================================

#[derive(Default)]
struct ScriptedCoach {
    calls: Mutex<Vec<usize>>,
}

#[async_trait]
impl Coach for ScriptedCoach {
    async fn speak(&self, ctx: &CoachContext) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(ctx.dialogue.lines().count());
        Ok(format!("Let's work on step {}.", ctx.step.number))
    }
}

/// Returns queued `passed` decisions in order
struct ScriptedGrader {
    decisions: Mutex<VecDeque<bool>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedGrader {
    fn new(decisions: &[bool]) -> Self {
        Self {
            decisions: Mutex::new(decisions.iter().copied().collect()),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Grader for ScriptedGrader {
    async fn grade(&self, ctx: &GradingContext) -> Result<Verdict> {
        let Some(passed) = self.decisions.lock().unwrap().pop_front() else {
            bail!("grader script exhausted");
        };
        Ok(Verdict::graded(
            ctx.step.number,
            ctx.attempt,
            passed,
            if passed { "Well done." } else { "Not yet." },
        ))
    }

    async fn answer_query(&self, ctx: &QueryContext) -> Result<String> {
        self.queries.lock().unwrap().push(ctx.question.clone());
        Ok("Try acknowledging how the customer feels.".to_string())
    }
}

/// Returns queued `agrees` decisions in order
struct ScriptedAuditor {
    decisions: Mutex<VecDeque<bool>>,
    calls: Mutex<usize>,
}

impl ScriptedAuditor {
    fn new(decisions: &[bool]) -> Self {
        Self {
            decisions: Mutex::new(decisions.iter().copied().collect()),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Auditor for ScriptedAuditor {
    async fn audit(&self, ctx: &AuditContext) -> Result<AuditVerdict> {
        *self.calls.lock().unwrap() += 1;
        let Some(agrees) = self.decisions.lock().unwrap().pop_front() else {
            bail!("auditor script exhausted");
        };
        Ok(AuditVerdict::new(
            ctx.step.number,
            ctx.attempt,
            agrees,
            if agrees { "Correct grading." } else { "Wrong grading." },
        ))
    }
}

#[derive(Clone, Default)]
struct RecordingObserver {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl SessionObserver for RecordingObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn catalog(steps: u32) -> Arc<StepCatalog> {
    let steps = (1..=steps).map(|n| match n {
        1 => ProcedureStep::new(1, "Acknowledge the issue", "acknowledge issue"),
        n => ProcedureStep::new(n, format!("Step {}", n), format!("rubric {}", n)),
    });
    Arc::new(StepCatalog::from_steps(Some("Retail Return".to_string()), steps).unwrap())
}

fn state(max_step: u32) -> SessionState {
    let config = SessionConfig {
        max_step: Some(max_step),
        ..Default::default()
    };
    SessionState::new(catalog(max_step), &config).unwrap()
}

struct Outcome {
    report: Result<SessionReport>,
    events: Vec<SessionEvent>,
    auditor_calls: usize,
    queries: Vec<String>,
}

async fn run(
    max_step: u32,
    turns: &[&str],
    grades: &[bool],
    audits: &[bool],
) -> Outcome {
    let grader = Arc::new(ScriptedGrader::new(grades));
    let auditor = Arc::new(ScriptedAuditor::new(audits));
    let observer = RecordingObserver::default();

    let mut controller = SessionController::new(
        ScriptedCoach::default(),
        SharedGrader(grader.clone()),
        SharedAuditor(auditor.clone()),
        ScriptedInput::new(turns.iter().copied()),
        state(max_step),
    )
    .with_observer(observer.clone());

    let report = controller.run().await;
    let events = observer.events.lock().unwrap().clone();
    let auditor_calls = *auditor.calls.lock().unwrap();
    let queries = grader.queries.lock().unwrap().clone();
    Outcome {
        report,
        events,
        auditor_calls,
        queries,
    }
}

struct SharedGrader(Arc<ScriptedGrader>);

#[async_trait]
impl Grader for SharedGrader {
    async fn grade(&self, ctx: &GradingContext) -> Result<Verdict> {
        self.0.grade(ctx).await
    }

    async fn answer_query(&self, ctx: &QueryContext) -> Result<String> {
        self.0.answer_query(ctx).await
    }
}

struct SharedAuditor(Arc<ScriptedAuditor>);

#[async_trait]
impl Auditor for SharedAuditor {
    async fn audit(&self, ctx: &AuditContext) -> Result<AuditVerdict> {
        self.0.audit(ctx).await
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_two_step_scenario_ends_fatally() {
    let outcome = run(
        2,
        &[
            "I'm sorry to hear your order arrived damaged.",
            "Okay.",
            "Let me look into a replacement for you.",
        ],
        &[true, false, true, true],
        &[true, true, false, false],
    )
    .await;

    let report = outcome.report.unwrap();
    assert_eq!(
        report.status,
        SessionStatus::Halted {
            reason: SessionHalt::RetriesExhausted {
                step: 2,
                retries: 2,
                limit: 2
            }
        }
    );
    assert!(!report.success());
    assert_eq!(report.final_step, 2);
    assert_eq!(report.retry_count, 2);
    assert_eq!(report.steps_completed, vec![1]);

    let outcomes: Vec<AttemptOutcome> = report
        .transcript
        .attempts()
        .map(|r| r.outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::Advanced { next_step: 2 },
            AttemptOutcome::ConfirmedFail,
            AttemptOutcome::Halted,
        ]
    );

    let disputes: Vec<u32> = outcome
        .events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Disputed { retry_count, .. } => Some(*retry_count),
            _ => None,
        })
        .collect();
    assert_eq!(disputes, vec![1, 2]);
    assert!(matches!(
        outcome.events.last(),
        Some(SessionEvent::SessionHalted { .. })
    ));
}

#[tokio::test]
async fn test_full_procedure_completes() {
    let outcome = run(
        3,
        &["one", "two", "three"],
        &[true, true, true],
        &[true, true, true],
    )
    .await;

    let report = outcome.report.unwrap();
    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.steps_completed, vec![1, 2, 3]);
    assert_eq!(report.final_step, 3);
    assert_eq!(report.retry_count, 0);
    assert_eq!(report.procedure.as_deref(), Some("Retail Return"));

    let last = report.transcript.attempts().last().unwrap();
    assert_eq!(last.outcome, AttemptOutcome::Completed);
}

#[tokio::test]
async fn test_dispute_then_agreement_resets_and_advances() {
    let outcome = run(2, &["first", "second"], &[false, true, true], &[false, true, true]).await;

    let report = outcome.report.unwrap();
    assert!(report.success());

    let first = report.transcript.attempts().next().unwrap();
    assert_eq!(first.disputes.len(), 1);
    assert!(!first.disputes[0].verdict.passed);
    assert!(first.verdict.passed);
    assert_eq!(report.retry_count, 0);
}

#[tokio::test]
async fn test_direct_query_is_not_graded_or_audited() {
    let outcome = run(
        1,
        &["Grader: what should I say first?", "I'm sorry about that."],
        &[true],
        &[true],
    )
    .await;

    let report = outcome.report.unwrap();
    assert!(report.success());
    assert_eq!(outcome.auditor_calls, 1);
    assert_eq!(outcome.queries, vec!["what should I say first?".to_string()]);

    let consultations = report
        .transcript
        .entries()
        .iter()
        .filter(|e| matches!(e, TranscriptEntry::Consultation { .. }))
        .count();
    assert_eq!(consultations, 1);
    assert_eq!(report.transcript.attempts().count(), 1);
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        SessionEvent::ConsultationAnswered { step: 1, .. }
    )));
}

#[tokio::test]
async fn test_coach_request_and_blank_turns_do_not_count() {
    let outcome = run(
        1,
        &["", "Coach: who is the customer?", "Hello, I'm sorry for the trouble."],
        &[true],
        &[true],
    )
    .await;

    let report = outcome.report.unwrap();
    assert!(report.success());
    assert_eq!(report.transcript.attempts().count(), 1);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, SessionEvent::BlankTurnIgnored { step: 1 })));

    let coach_lines = outcome
        .events
        .iter()
        .filter(|e| matches!(e, SessionEvent::CoachSpoke { .. }))
        .count();
    assert_eq!(coach_lines, 2);
}

#[tokio::test]
async fn test_transcript_gains_one_attempt_per_graded_turn() {
    let outcome = run(
        2,
        &["no", "still no", "yes", "Grader: hint?", "done"],
        &[false, false, true, true],
        &[true, true, true, true],
    )
    .await;

    let report = outcome.report.unwrap();
    assert!(report.success());
    assert_eq!(report.transcript.attempts().count(), 4);
}

#[tokio::test]
async fn test_input_closing_aborts_with_error() {
    let outcome = run(2, &["only one reply"], &[true], &[true]).await;

    let err = outcome.report.unwrap_err();
    assert!(err.to_string().contains("input closed"));
}

#[tokio::test]
async fn test_oracle_failure_aborts_with_error() {
    let outcome = run(1, &["reply"], &[], &[]).await;

    let err = outcome.report.unwrap_err();
    assert!(err.to_string().contains("grader script exhausted"));
}
