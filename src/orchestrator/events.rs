//! Session events and the observer that receives them.

use tracing::{debug, info, warn};

use crate::models::AttemptId;

use super::guardrails::SessionHalt;

/// Something the subject (or an operator) may want to see
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CoachSpoke {
        step: u32,
        message: String,
    },
    /// The subject is expected to reply for `step`
    AwaitingSubject {
        step: u32,
        title: String,
    },
    BlankTurnIgnored {
        step: u32,
    },
    /// Ungraded answer to a direct question
    ConsultationAnswered {
        step: u32,
        message: String,
    },
    Graded {
        step: u32,
        attempt: AttemptId,
        passed: bool,
        message: String,
    },
    Audited {
        step: u32,
        attempt: AttemptId,
        agrees: bool,
        message: String,
        diagnostic: Option<String>,
    },
    /// Grader failed the attempt and the auditor agreed
    AttemptFailed {
        step: u32,
        message: String,
    },
    /// Auditor rejected the verdict; the attempt is re-graded
    Disputed {
        step: u32,
        retry_count: u32,
        max_retries: u32,
        message: String,
    },
    StepCompleted {
        step: u32,
        message: String,
        next_step: Option<u32>,
    },
    SessionCompleted {
        steps_completed: usize,
    },
    SessionHalted {
        halt: SessionHalt,
    },
}

/// Receives session events as they happen
pub trait SessionObserver: Send {
    fn on_event(&mut self, event: &SessionEvent);
}

/// Observer that only logs
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Disputed {
                step,
                retry_count,
                max_retries,
                message,
            } => warn!(
                "Auditor disagreed on step {} ({}/{}): {}",
                step, retry_count, max_retries, message
            ),
            SessionEvent::SessionHalted { halt } => warn!("Session halted: {}", halt),
            SessionEvent::StepCompleted { step, .. } => info!("Step {} completed", step),
            SessionEvent::SessionCompleted { steps_completed } => {
                info!("Session complete after {} steps", steps_completed)
            }
            other => debug!("{:?}", other),
        }
    }
}

/// Observer that renders the session for a person at a terminal
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::CoachSpoke { message, .. } => println!("\n🗣️  Coach: {}", message),
            SessionEvent::AwaitingSubject { step, title } => {
                println!("\n📝 SOP Step {} - {}", step, title)
            }
            SessionEvent::BlankTurnIgnored { .. } => println!("(empty reply ignored)"),
            SessionEvent::ConsultationAnswered { message, .. } => {
                println!("\n📝 Grader (not graded): {}", message)
            }
            SessionEvent::AttemptFailed { message, .. } => {
                println!("\n📝 Grader: {}", message);
                println!("⚠️  Please revise your response to meet the current SOP step.");
            }
            SessionEvent::Disputed { message, .. } => {
                println!("⚠️  Auditor disagreed with the grader: {}", message)
            }
            SessionEvent::StepCompleted { step, message, .. } => {
                println!("\n📝 Grader: {}", message);
                println!("✅ Step {} passed", step);
            }
            SessionEvent::SessionCompleted { .. } => {
                println!("\n✅ Simulation complete! All steps passed.")
            }
            SessionEvent::SessionHalted { halt } => println!("\n💥 Simulation halted: {}", halt),
            SessionEvent::Graded { .. } | SessionEvent::Audited { .. } => {}
        }
    }
}
