//! Guardrails - the retry bound on grader/auditor disagreement.
//!
//! A disagreement between the grader and the auditor never resolves itself by
//! overriding one of them: the attempt is re-graded. The guard counts
//! consecutive disagreements and turns the bound into a **hard stop**. Reaching
//! the bound ends the session; it is never capped or downgraded to a pass or a
//! fail, since either would misrepresent the subject's performance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Hard Stops
// ============================================================================

/// Fatal conditions that terminate a session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SessionHalt {
    /// Grader and auditor disagreed `retries` consecutive times on `step`
    #[error("grader and auditor disagreed {retries} times in a row on step {step} (limit {limit})")]
    RetriesExhausted { step: u32, retries: u32, limit: u32 },
}

// ============================================================================
// Retry Guard
// ============================================================================

/// Counts consecutive disagreements for the attempt being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryGuard {
    max_retries: u32,
    count: u32,
}

impl RetryGuard {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            count: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record one disagreement on `step`.
    ///
    /// Returns the new count, or the hard stop when the count reaches the bound.
    pub fn record_disagreement(&mut self, step: u32) -> Result<u32, SessionHalt> {
        self.count += 1;
        if self.count >= self.max_retries {
            return Err(SessionHalt::RetriesExhausted {
                step,
                retries: self.count,
                limit: self.max_retries,
            });
        }
        Ok(self.count)
    }

    /// Called when a step advances or a fail is confirmed.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
