//! Consensus resolution between the grader's verdict and the auditor's opinion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AttemptId, AuditVerdict, GradingMode, Verdict};

/// What a verdict/audit pair means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consensus {
    /// Grader passed the attempt and the auditor agrees
    Advance,
    /// Grader failed the attempt and the auditor agrees
    ConfirmedFail,
    /// Auditor disagrees with a pass
    DisputedPass,
    /// Auditor disagrees with a fail
    DisputedFail,
}

impl Consensus {
    /// The decision table. Both disagreement rows are handled the same way.
    pub fn decide(passed: bool, agrees: bool) -> Self {
        match (passed, agrees) {
            (true, true) => Consensus::Advance,
            (false, true) => Consensus::ConfirmedFail,
            (true, false) => Consensus::DisputedPass,
            (false, false) => Consensus::DisputedFail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("verdict for step {verdict_step} {verdict_attempt} does not match audit for step {audit_step} {audit_attempt}")]
    StalePair {
        verdict_step: u32,
        verdict_attempt: AttemptId,
        audit_step: u32,
        audit_attempt: AttemptId,
    },

    #[error("{what} for step {step} {attempt} does not belong to pending attempt {pending} on step {pending_step}")]
    NotPending {
        what: &'static str,
        step: u32,
        attempt: AttemptId,
        pending: AttemptId,
        pending_step: u32,
    },

    #[error("interaction-mode verdict {0} cannot take part in consensus")]
    InteractionVerdict(AttemptId),
}

/// Check that a verdict judges the pending attempt.
pub fn check_verdict(
    verdict: &Verdict,
    pending: AttemptId,
    pending_step: u32,
) -> Result<(), ConsensusError> {
    if verdict.attempt != pending || verdict.step != pending_step {
        return Err(ConsensusError::NotPending {
            what: "verdict",
            step: verdict.step,
            attempt: verdict.attempt,
            pending,
            pending_step,
        });
    }
    if verdict.mode == GradingMode::Interaction {
        return Err(ConsensusError::InteractionVerdict(verdict.attempt));
    }
    Ok(())
}

/// Check that an audit judges the pending attempt.
pub fn check_audit(
    audit: &AuditVerdict,
    pending: AttemptId,
    pending_step: u32,
) -> Result<(), ConsensusError> {
    if audit.attempt != pending || audit.step != pending_step {
        return Err(ConsensusError::NotPending {
            what: "audit",
            step: audit.step,
            attempt: audit.attempt,
            pending,
            pending_step,
        });
    }
    Ok(())
}

/// Resolve a verdict against its audit. Stale pairs are rejected.
pub fn resolve(verdict: &Verdict, audit: &AuditVerdict) -> Result<Consensus, ConsensusError> {
    if verdict.mode == GradingMode::Interaction {
        return Err(ConsensusError::InteractionVerdict(verdict.attempt));
    }
    if verdict.step != audit.step || verdict.attempt != audit.attempt {
        return Err(ConsensusError::StalePair {
            verdict_step: verdict.step,
            verdict_attempt: verdict.attempt,
            audit_step: audit.step,
            audit_attempt: audit.attempt,
        });
    }
    Ok(Consensus::decide(verdict.passed, audit.agrees))
}
