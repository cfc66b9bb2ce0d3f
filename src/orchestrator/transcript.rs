//! Transcript - the append-only audit trail of a session.

use serde::{Deserialize, Serialize};

use crate::models::{AttemptId, AuditVerdict, Role, Turn, Verdict};

/// A verdict the auditor rejected, kept for the record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub verdict: Verdict,
    pub audit: AuditVerdict,
}

/// How a graded attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    /// Step passed; the session moved on to `next_step`
    Advanced { next_step: u32 },
    /// Final step passed; the session is complete
    Completed,
    /// Step failed with the auditor's agreement; the subject tries again
    ConfirmedFail,
    /// Retry bound reached while grader and auditor disagreed
    Halted,
}

/// One graded subject turn with everything the evaluators said about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: AttemptId,
    pub turn: Turn,
    /// The verdict that was resolved
    pub verdict: Verdict,
    /// The audit of that verdict
    pub audit: AuditVerdict,
    /// Earlier verdicts on the same turn that the auditor rejected
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disputes: Vec<Dispute>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TranscriptEntry {
    /// Coaching dialogue (coach lines and subject lines addressed to the coach)
    Turn(Turn),
    /// Direct question to the grader and its ungraded answer
    Consultation { query: Turn, answer: Verdict },
    /// A resolved graded attempt
    Attempt(AttemptRecord),
}

/// Append-only ordered log. Entries are never removed or modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Attempt(record) => Some(record),
            _ => None,
        })
    }

    /// Steps whose final attempt was accepted, in completion order
    pub fn completed_steps(&self) -> Vec<u32> {
        self.attempts()
            .filter(|r| {
                matches!(
                    r.outcome,
                    AttemptOutcome::Advanced { .. } | AttemptOutcome::Completed
                )
            })
            .map(|r| r.turn.step)
            .collect()
    }

    /// Dialogue rendered as "Role: content" lines
    pub fn dialogue_text(&self) -> String {
        self.entries
            .iter()
            .flat_map(|e| match e {
                TranscriptEntry::Turn(turn) => vec![format_line(turn.role, &turn.content)],
                TranscriptEntry::Consultation { query, answer } => vec![
                    format_line(query.role, &query.content),
                    format!("Grader: {}", answer.message),
                ],
                TranscriptEntry::Attempt(record) => {
                    vec![format_line(record.turn.role, &record.turn.content)]
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn format_line(role: Role, content: &str) -> String {
    format!("{}: {}", role, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(step: u32, id: u32, outcome: AttemptOutcome) -> TranscriptEntry {
        TranscriptEntry::Attempt(AttemptRecord {
            attempt: AttemptId(id),
            turn: Turn::subject(step, format!("reply {}", id)),
            verdict: Verdict::graded(step, AttemptId(id), true, "ok"),
            audit: AuditVerdict::new(step, AttemptId(id), true, "agreed"),
            disputes: Vec::new(),
            outcome,
        })
    }

    #[test]
    fn test_completed_steps_in_order() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::Turn(Turn::coach(1, "Welcome")));
        transcript.push(attempt(1, 1, AttemptOutcome::ConfirmedFail));
        transcript.push(attempt(1, 2, AttemptOutcome::Advanced { next_step: 2 }));
        transcript.push(attempt(2, 3, AttemptOutcome::Completed));

        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.attempts().count(), 3);
        assert_eq!(transcript.completed_steps(), vec![1, 2]);
    }

    #[test]
    fn test_dialogue_text_includes_consultations() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::Turn(Turn::coach(1, "A customer lost an order.")));
        transcript.push(TranscriptEntry::Consultation {
            query: Turn::subject(1, "Grader: what do I say first?"),
            answer: Verdict::interaction(1, AttemptId(1), "Start with empathy."),
        });

        let text = transcript.dialogue_text();
        assert_eq!(
            text,
            "Coach: A customer lost an order.\nSubject: Grader: what do I say first?\nGrader: Start with empathy."
        );
    }

    #[test]
    fn test_entry_serializes_with_type_tag() {
        let entry = attempt(1, 1, AttemptOutcome::Advanced { next_step: 2 });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "attempt");
        assert_eq!(json["outcome"]["kind"], "advanced");
        assert_eq!(json["outcome"]["next_step"], 2);
    }
}
