use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::input::SubjectInput;
use crate::phases::{
    AuditContext, Auditor, Coach, CoachContext, Grader, GradingContext, QueryContext,
};

use super::events::{SessionEvent, SessionObserver, TracingObserver};
use super::router::{Actor, TurnRoute};
use super::state::{ActorOutput, Attempt, SessionPhase, SessionReport, SessionState};

/// Drives one training session: dispatch, run the actor, apply its output
pub struct SessionController<C, G, A, I>
where
    C: Coach,
    G: Grader,
    A: Auditor,
    I: SubjectInput,
{
    coach: C,
    grader: G,
    auditor: A,
    input: I,
    observer: Box<dyn SessionObserver>,
    state: SessionState,
}

impl<C, G, A, I> SessionController<C, G, A, I>
where
    C: Coach,
    G: Grader,
    A: Auditor,
    I: SubjectInput,
{
    pub fn new(coach: C, grader: G, auditor: A, input: I, state: SessionState) -> Self {
        Self {
            coach,
            grader,
            auditor,
            input,
            observer: Box::new(TracingObserver),
            state,
        }
    }

    /// Send session events to `observer` instead of the log
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run until the final step completes or the retry bound is reached.
    ///
    /// Oracle or input failures abort with an error. Retry exhaustion is not an
    /// error: it is reported as a halted session.
    pub async fn run(&mut self) -> Result<SessionReport> {
        let started_at = Utc::now();
        info!(
            "Starting session at step {} (max step {}, max retries {})",
            self.state.current_step(),
            self.state.max_step(),
            self.state.max_retries()
        );

        while let Some(actor) = self.state.next_actor() {
            debug!(
                "Step {} / {}: {} runs next",
                self.state.current_step(),
                self.state.phase().name(),
                actor
            );
            let output = self.run_actor(actor).await?;
            let events = self.state.transition(output)?;
            for event in &events {
                self.observer.on_event(event);
            }
        }

        let report = SessionReport::new(&self.state, started_at)
            .ok_or_else(|| anyhow!("Session stopped before reaching a terminal phase"))?;

        if report.success() {
            info!(
                "Session completed: {} steps passed",
                report.steps_completed.len()
            );
        } else {
            warn!(
                "Session halted on step {} after {} disagreements",
                report.final_step, report.retry_count
            );
        }

        Ok(report)
    }

    async fn run_actor(&mut self, actor: Actor) -> Result<ActorOutput> {
        match actor {
            Actor::Coach => {
                let ctx = self.coach_context();
                let message = self.coach.speak(&ctx).await?;
                Ok(ActorOutput::Coach(message))
            }
            Actor::Subject => {
                let step = self.state.catalog().get(self.state.current_step());
                self.observer.on_event(&SessionEvent::AwaitingSubject {
                    step: step.number,
                    title: step.title().to_string(),
                });
                match self.input.read_next().await? {
                    Some(line) => Ok(ActorOutput::Subject(line)),
                    None => bail!(
                        "Subject input closed before the session finished (step {})",
                        step.number
                    ),
                }
            }
            Actor::Grader => {
                let ctx = self.grading_context()?;
                let verdict = self.grader.grade(&ctx).await?;
                Ok(ActorOutput::Verdict(verdict))
            }
            Actor::GraderInteraction => {
                let ctx = self.query_context()?;
                let answer = self.grader.answer_query(&ctx).await?;
                Ok(ActorOutput::Answer(answer))
            }
            Actor::Auditor => {
                let ctx = self.audit_context()?;
                let audit = self.auditor.audit(&ctx).await?;
                Ok(ActorOutput::Audit(audit))
            }
            Actor::Resolver => Ok(ActorOutput::Resolve),
        }
    }

    fn coach_context(&self) -> CoachContext {
        CoachContext {
            procedure: self.state.catalog().overview(),
            step: self.state.catalog().get(self.state.current_step()),
            dialogue: self.state.transcript().dialogue_text(),
        }
    }

    fn grading_context(&self) -> Result<GradingContext> {
        let SessionPhase::Grading { attempt } = self.state.phase() else {
            bail!("Grader invoked while {}", self.state.phase().name());
        };
        Ok(GradingContext {
            step: self.state.catalog().get(attempt.step()),
            attempt: attempt.id,
            content: attempt.turn.content.clone(),
            auditor_notes: attempt
                .disputes
                .iter()
                .map(|d| d.audit.message.clone())
                .collect(),
        })
    }

    fn query_context(&self) -> Result<QueryContext> {
        let SessionPhase::Consulting { attempt } = self.state.phase() else {
            bail!("Grader consulted while {}", self.state.phase().name());
        };
        Ok(QueryContext {
            procedure: self.state.catalog().overview(),
            step: self.state.catalog().get(attempt.step()),
            attempt: attempt.id,
            history: self.state.transcript().dialogue_text(),
            question: self.question_text(attempt),
        })
    }

    fn audit_context(&self) -> Result<AuditContext> {
        let SessionPhase::Auditing { attempt, verdict } = self.state.phase() else {
            bail!("Auditor invoked while {}", self.state.phase().name());
        };
        Ok(AuditContext {
            step: self.state.catalog().get(attempt.step()),
            attempt: attempt.id,
            content: attempt.turn.content.clone(),
            verdict: verdict.clone(),
        })
    }

    /// Question without its marker; the whole turn if nothing follows the marker
    fn question_text(&self, attempt: &Attempt) -> String {
        match self.state.markers().classify(&attempt.turn.content) {
            TurnRoute::DirectQuery(question) if !question.is_empty() => question.to_string(),
            _ => attempt.turn.content.clone(),
        }
    }
}
