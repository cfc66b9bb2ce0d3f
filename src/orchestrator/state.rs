use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, SessionConfig, StepCatalog};
use crate::models::{AttemptId, AuditVerdict, Turn, Verdict};

use super::consensus::{self, Consensus, ConsensusError};
use super::events::SessionEvent;
use super::guardrails::{RetryGuard, SessionHalt};
use super::router::{self, Actor, TurnMarkers, TurnRoute};
use super::transcript::{AttemptOutcome, AttemptRecord, Dispute, Transcript, TranscriptEntry};

/// A subject turn routed to the grader, with the verdicts the auditor rejected so far
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub id: AttemptId,
    pub turn: Turn,
    pub disputes: Vec<Dispute>,
}

impl Attempt {
    pub fn step(&self) -> u32 {
        self.turn.step
    }
}

/// Where the session is. Data needed by the next actor lives in the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// The coach speaks next
    Coaching,
    /// Waiting for the subject's reply
    AwaitingAttempt,
    /// Grader grades the attempt
    Grading { attempt: Attempt },
    /// Grader answers a direct question (interaction mode, never audited)
    Consulting { attempt: Attempt },
    /// Auditor checks the grader's verdict
    Auditing { attempt: Attempt, verdict: Verdict },
    /// Verdict and audit are both present
    Resolving {
        attempt: Attempt,
        verdict: Verdict,
        audit: AuditVerdict,
    },
    /// Final step completed
    Complete,
    /// Retry bound reached
    Fatal { halt: SessionHalt },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Coaching => "coaching",
            SessionPhase::AwaitingAttempt => "awaiting attempt",
            SessionPhase::Grading { .. } => "grading",
            SessionPhase::Consulting { .. } => "consulting",
            SessionPhase::Auditing { .. } => "auditing",
            SessionPhase::Resolving { .. } => "resolving",
            SessionPhase::Complete => "complete",
            SessionPhase::Fatal { .. } => "fatal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Complete | SessionPhase::Fatal { .. })
    }
}

/// What an actor produced
#[derive(Debug, Clone, PartialEq)]
pub enum ActorOutput {
    Coach(String),
    Subject(String),
    Verdict(Verdict),
    /// Interaction-mode answer to a direct question
    Answer(String),
    Audit(AuditVerdict),
    Resolve,
}

impl ActorOutput {
    fn name(&self) -> &'static str {
        match self {
            ActorOutput::Coach(_) => "coach",
            ActorOutput::Subject(_) => "subject",
            ActorOutput::Verdict(_) => "verdict",
            ActorOutput::Answer(_) => "answer",
            ActorOutput::Audit(_) => "audit",
            ActorOutput::Resolve => "resolve",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("session has already ended ({phase})")]
    Terminal { phase: &'static str },

    #[error("{output} output is not expected while {phase}")]
    Unexpected {
        phase: &'static str,
        output: &'static str,
    },

    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

type Applied = (SessionPhase, Vec<SessionEvent>);

/// State of one training session, owned by a single coordinator
#[derive(Debug, Clone)]
pub struct SessionState {
    catalog: Arc<StepCatalog>,
    markers: TurnMarkers,
    max_step: u32,
    current_step: u32,
    guard: RetryGuard,
    phase: SessionPhase,
    transcript: Transcript,
    next_attempt: u32,
    last_verdict: Option<Verdict>,
    last_audit: Option<AuditVerdict>,
}

impl SessionState {
    /// Create a session positioned at the catalog's first step
    pub fn new(catalog: Arc<StepCatalog>, config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let markers = TurnMarkers::from_config(config)?;

        let max_step = config.resolve_max_step(catalog.last_step());
        let first = catalog.first_step().unwrap_or(1);
        if first > max_step {
            return Err(ConfigError::FirstStepBeyondMax { first, max_step });
        }
        if let Some(last) = catalog.last_step()
            && last != max_step
        {
            warn!("Procedure's last step is {} but max_step is {}", last, max_step);
        }

        Ok(Self {
            catalog,
            markers,
            max_step,
            current_step: first,
            guard: RetryGuard::new(config.max_retries),
            phase: SessionPhase::Coaching,
            transcript: Transcript::new(),
            next_attempt: 1,
            last_verdict: None,
            last_audit: None,
        })
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn next_actor(&self) -> Option<Actor> {
        router::next_actor(&self.phase)
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn max_step(&self) -> u32 {
        self.max_step
    }

    pub fn retry_count(&self) -> u32 {
        self.guard.count()
    }

    pub fn max_retries(&self) -> u32 {
        self.guard.max_retries()
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, SessionPhase::Complete)
    }

    pub fn halt(&self) -> Option<&SessionHalt> {
        match &self.phase {
            SessionPhase::Fatal { halt } => Some(halt),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn markers(&self) -> &TurnMarkers {
        &self.markers
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Most recent verdict (graded or interaction)
    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.last_verdict.as_ref()
    }

    /// Most recent audit of a graded verdict
    pub fn last_audit(&self) -> Option<&AuditVerdict> {
        self.last_audit.as_ref()
    }

    /// Apply an actor's output. This is the only way the session changes.
    ///
    /// On error the state is left exactly as it was.
    pub fn transition(
        &mut self,
        output: ActorOutput,
    ) -> Result<Vec<SessionEvent>, TransitionError> {
        if self.phase.is_terminal() {
            return Err(TransitionError::Terminal {
                phase: self.phase.name(),
            });
        }

        let phase = std::mem::replace(&mut self.phase, SessionPhase::Coaching);
        match self.apply(phase, output) {
            Ok((next, events)) => {
                debug!("Session phase -> {}", next.name());
                self.phase = next;
                Ok(events)
            }
            Err((previous, err)) => {
                self.phase = previous;
                Err(err)
            }
        }
    }

    fn apply(
        &mut self,
        phase: SessionPhase,
        output: ActorOutput,
    ) -> Result<Applied, (SessionPhase, TransitionError)> {
        match (phase, output) {
            (SessionPhase::Coaching, ActorOutput::Coach(message)) => {
                let step = self.current_step;
                self.transcript
                    .push(TranscriptEntry::Turn(Turn::coach(step, message.clone())));
                Ok((
                    SessionPhase::AwaitingAttempt,
                    vec![SessionEvent::CoachSpoke { step, message }],
                ))
            }

            (SessionPhase::AwaitingAttempt, ActorOutput::Subject(content)) => {
                Ok(self.route_subject(content))
            }

            (SessionPhase::Consulting { attempt }, ActorOutput::Answer(message)) => {
                let step = attempt.step();
                let answer = Verdict::interaction(step, attempt.id, message.clone());
                self.last_verdict = Some(answer.clone());
                self.last_audit = None;
                self.transcript.push(TranscriptEntry::Consultation {
                    query: attempt.turn,
                    answer,
                });
                Ok((
                    SessionPhase::AwaitingAttempt,
                    vec![SessionEvent::ConsultationAnswered { step, message }],
                ))
            }

            (SessionPhase::Grading { attempt }, ActorOutput::Verdict(verdict)) => {
                if let Err(e) = consensus::check_verdict(&verdict, attempt.id, attempt.step()) {
                    return Err((SessionPhase::Grading { attempt }, e.into()));
                }
                self.last_verdict = Some(verdict.clone());
                self.last_audit = None;
                let event = SessionEvent::Graded {
                    step: verdict.step,
                    attempt: verdict.attempt,
                    passed: verdict.passed,
                    message: verdict.message.clone(),
                };
                Ok((SessionPhase::Auditing { attempt, verdict }, vec![event]))
            }

            (SessionPhase::Auditing { attempt, verdict }, ActorOutput::Audit(audit)) => {
                if let Err(e) = consensus::check_audit(&audit, attempt.id, attempt.step()) {
                    return Err((SessionPhase::Auditing { attempt, verdict }, e.into()));
                }
                self.last_audit = Some(audit.clone());
                let event = SessionEvent::Audited {
                    step: audit.step,
                    attempt: audit.attempt,
                    agrees: audit.agrees,
                    message: audit.message.clone(),
                    diagnostic: audit.diagnostic.clone(),
                };
                Ok((
                    SessionPhase::Resolving {
                        attempt,
                        verdict,
                        audit,
                    },
                    vec![event],
                ))
            }

            (
                SessionPhase::Resolving {
                    attempt,
                    verdict,
                    audit,
                },
                ActorOutput::Resolve,
            ) => match consensus::resolve(&verdict, &audit) {
                Ok(outcome) => Ok(self.apply_consensus(outcome, attempt, verdict, audit)),
                Err(e) => Err((
                    SessionPhase::Resolving {
                        attempt,
                        verdict,
                        audit,
                    },
                    e.into(),
                )),
            },

            (phase, output) => {
                let err = TransitionError::Unexpected {
                    phase: phase.name(),
                    output: output.name(),
                };
                Err((phase, err))
            }
        }
    }

    fn route_subject(&mut self, content: String) -> Applied {
        let step = self.current_step;
        let route = self.markers.classify(&content);
        match route {
            TurnRoute::Blank => (
                SessionPhase::AwaitingAttempt,
                vec![SessionEvent::BlankTurnIgnored { step }],
            ),
            TurnRoute::CoachRequest(_) => {
                self.transcript
                    .push(TranscriptEntry::Turn(Turn::subject(step, content)));
                (SessionPhase::Coaching, Vec::new())
            }
            TurnRoute::DirectQuery(_) => {
                let attempt = self.new_attempt(content);
                (SessionPhase::Consulting { attempt }, Vec::new())
            }
            TurnRoute::Attempt => {
                let attempt = self.new_attempt(content);
                (SessionPhase::Grading { attempt }, Vec::new())
            }
        }
    }

    fn new_attempt(&mut self, content: String) -> Attempt {
        let id = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        Attempt {
            id,
            turn: Turn::subject(self.current_step, content),
            disputes: Vec::new(),
        }
    }

    fn apply_consensus(
        &mut self,
        outcome: Consensus,
        mut attempt: Attempt,
        verdict: Verdict,
        audit: AuditVerdict,
    ) -> Applied {
        let step = attempt.step();
        match outcome {
            Consensus::Advance => {
                self.guard.reset();
                let done = step >= self.max_step;
                let next_step = if done {
                    self.current_step
                } else {
                    self.catalog
                        .next_after(step)
                        .unwrap_or(step + 1)
                        .min(self.max_step)
                };
                let message = verdict.message.clone();
                let outcome = if done {
                    AttemptOutcome::Completed
                } else {
                    AttemptOutcome::Advanced { next_step }
                };
                self.record_attempt(attempt, verdict, audit, outcome);
                self.current_step = self.current_step.max(next_step);

                let mut events = vec![SessionEvent::StepCompleted {
                    step,
                    message,
                    next_step: (!done).then_some(next_step),
                }];
                if done {
                    events.push(SessionEvent::SessionCompleted {
                        steps_completed: self.transcript.completed_steps().len(),
                    });
                    (SessionPhase::Complete, events)
                } else {
                    (SessionPhase::Coaching, events)
                }
            }

            Consensus::ConfirmedFail => {
                self.guard.reset();
                let message = verdict.message.clone();
                self.record_attempt(attempt, verdict, audit, AttemptOutcome::ConfirmedFail);
                (
                    SessionPhase::AwaitingAttempt,
                    vec![SessionEvent::AttemptFailed { step, message }],
                )
            }

            Consensus::DisputedPass | Consensus::DisputedFail => {
                match self.guard.record_disagreement(step) {
                    Ok(retry_count) => {
                        let event = SessionEvent::Disputed {
                            step,
                            retry_count,
                            max_retries: self.guard.max_retries(),
                            message: audit.message.clone(),
                        };
                        attempt.disputes.push(Dispute { verdict, audit });
                        (SessionPhase::Grading { attempt }, vec![event])
                    }
                    Err(halt) => {
                        let event = SessionEvent::Disputed {
                            step,
                            retry_count: self.guard.count(),
                            max_retries: self.guard.max_retries(),
                            message: audit.message.clone(),
                        };
                        self.record_attempt(attempt, verdict, audit, AttemptOutcome::Halted);
                        (
                            SessionPhase::Fatal { halt: halt.clone() },
                            vec![event, SessionEvent::SessionHalted { halt }],
                        )
                    }
                }
            }
        }
    }

    fn record_attempt(
        &mut self,
        attempt: Attempt,
        verdict: Verdict,
        audit: AuditVerdict,
        outcome: AttemptOutcome,
    ) {
        self.transcript.push(TranscriptEntry::Attempt(AttemptRecord {
            attempt: attempt.id,
            turn: attempt.turn,
            verdict,
            audit,
            disputes: attempt.disputes,
            outcome,
        }));
    }
}

/// Final status of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SessionStatus {
    /// Every step passed with consensus
    Completed,
    /// The session ended on a hard stop
    Halted { reason: SessionHalt },
}

impl SessionStatus {
    /// One-line banner for the end of a session
    pub fn headline(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "Training Session Complete!",
            SessionStatus::Halted { .. } => "Training Session Halted",
        }
    }
}

/// Result of the entire session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Procedure title, if the catalog has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    pub status: SessionStatus,
    /// Step the session ended on
    pub final_step: u32,
    pub max_step: u32,
    pub retry_count: u32,
    pub steps_completed: Vec<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transcript: Transcript,
}

impl SessionReport {
    /// Build the report for a session that has ended; `None` while it is still running
    pub fn new(state: &SessionState, started_at: DateTime<Utc>) -> Option<Self> {
        let status = match state.phase() {
            SessionPhase::Complete => SessionStatus::Completed,
            SessionPhase::Fatal { halt } => SessionStatus::Halted {
                reason: halt.clone(),
            },
            _ => return None,
        };

        Some(Self {
            procedure: state.catalog().title().map(String::from),
            status,
            final_step: state.current_step(),
            max_step: state.max_step(),
            retry_count: state.retry_count(),
            steps_completed: state.transcript().completed_steps(),
            started_at,
            finished_at: Utc::now(),
            transcript: state.transcript().clone(),
        })
    }

    pub fn success(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcedureStep;

    fn catalog(steps: u32) -> Arc<StepCatalog> {
        let steps = (1..=steps).map(|n| ProcedureStep::new(n, format!("step {}", n), "rubric"));
        Arc::new(StepCatalog::from_steps(Some("Test".to_string()), steps).unwrap())
    }

    fn session(max_step: u32) -> SessionState {
        let config = SessionConfig {
            max_step: Some(max_step),
            ..Default::default()
        };
        SessionState::new(catalog(max_step), &config).unwrap()
    }

    fn pending_id(state: &SessionState) -> AttemptId {
        match state.phase() {
            SessionPhase::Grading { attempt }
            | SessionPhase::Consulting { attempt }
            | SessionPhase::Auditing { attempt, .. }
            | SessionPhase::Resolving { attempt, .. } => attempt.id,
            other => panic!("no pending attempt in {}", other.name()),
        }
    }

    /// Drive one graded attempt from AwaitingAttempt through resolution
    fn judge(state: &mut SessionState, passed: bool, agrees: bool) -> Vec<SessionEvent> {
        let step = state.current_step();
        let id = pending_id(state);
        state
            .transition(ActorOutput::Verdict(Verdict::graded(step, id, passed, "verdict")))
            .unwrap();
        state
            .transition(ActorOutput::Audit(AuditVerdict::new(step, id, agrees, "audit")))
            .unwrap();
        state.transition(ActorOutput::Resolve).unwrap()
    }

    fn start_attempt(state: &mut SessionState, text: &str) {
        if matches!(state.phase(), SessionPhase::Coaching) {
            state
                .transition(ActorOutput::Coach("Your customer is waiting.".into()))
                .unwrap();
        }
        state
            .transition(ActorOutput::Subject(text.to_string()))
            .unwrap();
    }

    #[test]
    fn test_new_session_starts_coaching_at_first_step() {
        let state = session(3);
        assert_eq!(state.current_step(), 1);
        assert_eq!(state.retry_count(), 0);
        assert!(!state.is_done());
        assert!(state.transcript().is_empty());
        assert_eq!(state.next_actor(), Some(Actor::Coach));
    }

    #[test]
    fn test_coach_is_followed_by_subject() {
        let mut state = session(3);
        state
            .transition(ActorOutput::Coach("Hello".into()))
            .unwrap();
        assert_eq!(state.next_actor(), Some(Actor::Subject));
        assert_eq!(state.transcript().len(), 1);
    }

    #[test]
    fn test_agreed_pass_advances_and_resets() {
        let mut state = session(3);
        start_attempt(&mut state, "I'm sorry to hear that.");
        judge(&mut state, true, false);
        assert_eq!(state.retry_count(), 1);

        let events = judge(&mut state, true, true);
        assert_eq!(state.current_step(), 2);
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.next_actor(), Some(Actor::Coach));
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::StepCompleted {
                step: 1,
                next_step: Some(2),
                ..
            }
        )));
    }

    #[test]
    fn test_agreed_fail_keeps_step_and_reprompts_subject() {
        let mut state = session(3);
        start_attempt(&mut state, "What do you want?");
        judge(&mut state, false, true);

        assert_eq!(state.current_step(), 1);
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.next_actor(), Some(Actor::Subject));
        let record = state.transcript().attempts().last().unwrap();
        assert_eq!(record.outcome, AttemptOutcome::ConfirmedFail);
    }

    #[test]
    fn test_disputes_regrade_same_attempt() {
        for passed in [true, false] {
            let mut state = session(3);
            start_attempt(&mut state, "Let me check that for you.");
            let id = pending_id(&state);
            let before = state.transcript().len();

            judge(&mut state, passed, false);

            assert_eq!(state.current_step(), 1);
            assert_eq!(state.retry_count(), 1);
            assert_eq!(state.next_actor(), Some(Actor::Grader));
            assert_eq!(pending_id(&state), id);
            assert_eq!(state.transcript().len(), before);
        }
    }

    #[test]
    fn test_retry_bound_is_fatal() {
        let mut state = session(3);
        start_attempt(&mut state, "Sure.");
        judge(&mut state, true, false);
        let events = judge(&mut state, false, false);

        assert!(state.is_terminal());
        assert!(!state.is_done());
        assert_eq!(state.retry_count(), 2);
        assert_eq!(
            state.halt(),
            Some(&SessionHalt::RetriesExhausted {
                step: 1,
                retries: 2,
                limit: 2
            })
        );
        assert!(matches!(
            events.last(),
            Some(SessionEvent::SessionHalted { .. })
        ));

        let record = state.transcript().attempts().last().unwrap();
        assert_eq!(record.outcome, AttemptOutcome::Halted);
        assert_eq!(record.disputes.len(), 1);

        let err = state.transition(ActorOutput::Resolve).unwrap_err();
        assert_eq!(err, TransitionError::Terminal { phase: "fatal" });
    }

    #[test]
    fn test_final_step_completes_session() {
        let mut state = session(2);
        start_attempt(&mut state, "one");
        judge(&mut state, true, true);
        start_attempt(&mut state, "two");
        let events = judge(&mut state, true, true);

        assert!(state.is_done());
        assert_eq!(state.current_step(), 2);
        assert_eq!(state.next_actor(), None);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::SessionCompleted { steps_completed: 2 })
        ));
    }

    #[test]
    fn test_direct_query_is_never_audited() {
        let mut state = session(3);
        start_attempt(&mut state, "Grader: how should I open?");
        assert_eq!(state.next_actor(), Some(Actor::GraderInteraction));

        let events = state
            .transition(ActorOutput::Answer("Lead with empathy.".into()))
            .unwrap();
        assert_eq!(state.next_actor(), Some(Actor::Subject));
        assert_eq!(state.current_step(), 1);
        assert_eq!(state.retry_count(), 0);
        assert!(state.last_audit().is_none());
        assert!(!state.last_verdict().unwrap().passed);
        assert!(matches!(
            events[0],
            SessionEvent::ConsultationAnswered { step: 1, .. }
        ));
    }

    #[test]
    fn test_coach_request_returns_to_coach() {
        let mut state = session(3);
        start_attempt(&mut state, "Coach: what is the customer's name?");
        assert_eq!(state.next_actor(), Some(Actor::Coach));
        assert_eq!(state.transcript().len(), 2);
        assert_eq!(state.transcript().attempts().count(), 0);
    }

    #[test]
    fn test_blank_reply_is_ignored() {
        let mut state = session(3);
        start_attempt(&mut state, "   ");
        assert_eq!(state.next_actor(), Some(Actor::Subject));
        assert_eq!(state.transcript().len(), 1);
    }

    #[test]
    fn test_stale_verdict_rejected_without_state_change() {
        let mut state = session(3);
        start_attempt(&mut state, "Hello there");
        let id = pending_id(&state);

        let stale = Verdict::graded(1, AttemptId(id.0 + 10), true, "old");
        let err = state.transition(ActorOutput::Verdict(stale)).unwrap_err();
        assert!(matches!(err, TransitionError::Consensus(_)));
        assert_eq!(state.next_actor(), Some(Actor::Grader));
        assert_eq!(pending_id(&state), id);
    }

    #[test]
    fn test_stale_audit_rejected() {
        let mut state = session(3);
        start_attempt(&mut state, "Hello there");
        let id = pending_id(&state);
        state
            .transition(ActorOutput::Verdict(Verdict::graded(1, id, true, "ok")))
            .unwrap();

        let stale = AuditVerdict::new(2, id, true, "wrong step");
        assert!(state.transition(ActorOutput::Audit(stale)).is_err());
        assert_eq!(state.next_actor(), Some(Actor::Auditor));
    }

    #[test]
    fn test_unexpected_output_rejected() {
        let mut state = session(3);
        let err = state
            .transition(ActorOutput::Subject("too early".into()))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Unexpected {
                phase: "coaching",
                output: "subject"
            }
        );
        assert_eq!(state.next_actor(), Some(Actor::Coach));
    }

    #[test]
    fn test_direct_query_after_graded_attempt_drops_old_audit() {
        let mut state = session(3);
        start_attempt(&mut state, "What do you want?");
        judge(&mut state, false, true);
        assert!(state.last_audit().is_some());

        state
            .transition(ActorOutput::Subject("Grader: any hint?".into()))
            .unwrap();
        state
            .transition(ActorOutput::Answer("Apologize first.".into()))
            .unwrap();

        let verdict = state.last_verdict().unwrap();
        assert_eq!(verdict.attempt, AttemptId(2));
        assert!(state.last_audit().is_none());
    }

    fn gapped_session(steps: &[u32], max_step: u32) -> SessionState {
        let steps = steps.iter().map(|&n| ProcedureStep::new(n, "step", "rubric"));
        let catalog = Arc::new(StepCatalog::from_steps(None, steps).unwrap());
        let config = SessionConfig {
            max_step: Some(max_step),
            ..Default::default()
        };
        SessionState::new(catalog, &config).unwrap()
    }

    #[test]
    fn test_advance_follows_catalog_gaps() {
        let mut state = gapped_session(&[1, 3], 3);
        start_attempt(&mut state, "first");
        judge(&mut state, true, true);
        assert_eq!(state.current_step(), 3);
    }

    #[test]
    fn test_advance_is_clamped_to_max_step() {
        let mut state = gapped_session(&[1, 5], 3);
        start_attempt(&mut state, "first");
        let events = judge(&mut state, true, true);

        assert_eq!(state.current_step(), 3);
        assert!(!state.is_done());
        assert!(matches!(
            events[0],
            SessionEvent::StepCompleted {
                next_step: Some(3),
                ..
            }
        ));

        start_attempt(&mut state, "placeholder step");
        judge(&mut state, true, true);
        assert!(state.is_done());
        assert_eq!(state.current_step(), 3);
    }

    #[test]
    fn test_unset_max_step_uses_last_catalog_step() {
        let state = SessionState::new(catalog(3), &SessionConfig::default()).unwrap();
        assert_eq!(state.max_step(), 3);
    }

    #[test]
    fn test_first_step_beyond_max_is_rejected() {
        let steps = vec![ProcedureStep::new(5, "a", "a")];
        let catalog = Arc::new(StepCatalog::from_steps(None, steps).unwrap());
        let config = SessionConfig {
            max_step: Some(2),
            ..Default::default()
        };
        let err = SessionState::new(catalog, &config).unwrap_err();
        assert_eq!(
            err,
            ConfigError::FirstStepBeyondMax {
                first: 5,
                max_step: 2
            }
        );
    }

    #[test]
    fn test_halted_report_is_not_announced_as_complete() {
        let mut state = session(3);
        start_attempt(&mut state, "Sure.");
        judge(&mut state, true, false);
        judge(&mut state, false, false);

        let report = SessionReport::new(&state, Utc::now()).unwrap();
        assert!(matches!(report.status, SessionStatus::Halted { .. }));
        assert_eq!(report.status.headline(), "Training Session Halted");
        assert_eq!(
            SessionStatus::Completed.headline(),
            "Training Session Complete!"
        );
    }

    #[test]
    fn test_report_only_for_terminal_sessions() {
        let mut state = session(1);
        let started = Utc::now();
        assert!(SessionReport::new(&state, started).is_none());

        start_attempt(&mut state, "done");
        judge(&mut state, true, true);
        let report = SessionReport::new(&state, started).unwrap();
        assert!(report.success());
        assert_eq!(report.steps_completed, vec![1]);
        assert_eq!(report.procedure.as_deref(), Some("Test"));
    }
}
