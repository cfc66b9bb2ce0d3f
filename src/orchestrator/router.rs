//! Turn routing - which actor runs next, and what a subject turn is.
//!
//! Routing is a pure function of the session phase. Subject turns are classified
//! by prefix markers (matched case-insensitively after leading whitespace):
//! a direct question to the grader, a line addressed to the coach, or a graded
//! attempt at the current step.

use std::fmt;

use regex::Regex;

use crate::config::{ConfigError, SessionConfig};

use super::state::SessionPhase;

/// The actor the coordinator invokes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Coach,
    Subject,
    /// Grader in grading mode
    Grader,
    /// Grader answering a direct question (interaction mode)
    GraderInteraction,
    Auditor,
    Resolver,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Coach => write!(f, "coach"),
            Actor::Subject => write!(f, "subject"),
            Actor::Grader => write!(f, "grader"),
            Actor::GraderInteraction => write!(f, "grader (interaction)"),
            Actor::Auditor => write!(f, "auditor"),
            Actor::Resolver => write!(f, "resolver"),
        }
    }
}

/// Next actor for a phase, or `None` once the session is terminal
pub fn next_actor(phase: &SessionPhase) -> Option<Actor> {
    match phase {
        SessionPhase::Coaching => Some(Actor::Coach),
        SessionPhase::AwaitingAttempt => Some(Actor::Subject),
        SessionPhase::Grading { .. } => Some(Actor::Grader),
        SessionPhase::Consulting { .. } => Some(Actor::GraderInteraction),
        SessionPhase::Auditing { .. } => Some(Actor::Auditor),
        SessionPhase::Resolving { .. } => Some(Actor::Resolver),
        SessionPhase::Complete | SessionPhase::Fatal { .. } => None,
    }
}

/// What a subject turn asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRoute<'a> {
    /// Direct question to the grader; carries the text after the marker
    DirectQuery(&'a str),
    /// Line addressed to the coach; carries the text after the marker
    CoachRequest(&'a str),
    /// Attempt at the current step, to be graded and audited
    Attempt,
    /// Nothing but whitespace
    Blank,
}

/// Compiled prefix markers
#[derive(Debug, Clone)]
pub struct TurnMarkers {
    query: Regex,
    coach: Regex,
}

impl TurnMarkers {
    pub fn new(query_marker: &str, coach_marker: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            query: marker_regex(query_marker)?,
            coach: marker_regex(coach_marker)?,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        Self::new(&config.query_marker, &config.coach_marker)
    }

    pub fn classify<'a>(&self, content: &'a str) -> TurnRoute<'a> {
        if content.trim().is_empty() {
            return TurnRoute::Blank;
        }
        if let Some(m) = self.query.find(content) {
            return TurnRoute::DirectQuery(content[m.end()..].trim());
        }
        if let Some(m) = self.coach.find(content) {
            return TurnRoute::CoachRequest(content[m.end()..].trim());
        }
        TurnRoute::Attempt
    }
}

fn marker_regex(marker: &str) -> Result<Regex, ConfigError> {
    let pattern = format!(r"(?i)^\s*{}", regex::escape(marker.trim()));
    Regex::new(&pattern).map_err(|e| ConfigError::InvalidMarker {
        marker: marker.to_string(),
        message: e.to_string(),
    })
}
