pub mod consensus;
pub mod events;
pub mod guardrails;
pub mod loop_controller;
pub mod router;
pub mod state;
pub mod transcript;

pub use consensus::{Consensus, ConsensusError};
pub use events::{ConsoleObserver, SessionEvent, SessionObserver, TracingObserver};
pub use guardrails::{RetryGuard, SessionHalt};
pub use loop_controller::SessionController;
pub use router::{Actor, TurnMarkers, TurnRoute, next_actor};
pub use state::{
    ActorOutput, Attempt, SessionPhase, SessionReport, SessionState, SessionStatus,
    TransitionError,
};
pub use transcript::{AttemptOutcome, AttemptRecord, Dispute, Transcript, TranscriptEntry};
