pub mod answer;
pub mod assessment;
pub mod attempt;
pub mod events;
pub mod integrity;
pub mod question;
pub mod session;
pub mod timer;

pub use answer::{Answer, AnswerStore};
pub use assessment::{AssessmentDefinition, AssessmentKind};
pub use attempt::{
    AttemptRecord, CompletionReason, Grade, PassPolicy, QuestionScore, ScoreBreakdown,
    ScoredAttempt,
};
pub use events::SessionEvent;
pub use integrity::{BlockedShortcut, IntegrityWarning, KeyChord, ViolationKind, ViolationRecord};
pub use question::{AnswerKey, Question, QuestionKind, QuestionView};
pub use session::{SessionSnapshot, SessionStatus, UserContext};
pub use timer::{TimeExpired, TimerTick};
