//! Scripted session driver. Each step is applied in order to a started
//! session; rejected steps are collected rather than aborting the run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{KeyChord, ScoredAttempt, SessionStatus};
use crate::services::integrity::{ManualSignalSource, SignalOutcome};
use crate::services::session::ProctoredSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayStep {
    Answer {
        index: usize,
        value: serde_json::Value,
    },
    GoTo {
        index: usize,
    },
    Next,
    Previous,
    FocusLost,
    VisibilityHidden,
    BlockedInput,
    KeyChord {
        #[serde(flatten)]
        chord: KeyChord,
    },
    /// Lets the countdown run.
    Wait {
        millis: u64,
    },
    Submit,
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedStep {
    pub step: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub status: SessionStatus,
    pub attempt: Option<ScoredAttempt>,
    pub rejected_steps: Vec<RejectedStep>,
}

/// Applies `steps` to `session`, starting it first when needed. Signals are
/// fed through `signals`, which must be the source the session was built
/// with.
pub async fn run_script(
    session: &ProctoredSession,
    signals: &ManualSignalSource,
    steps: &[ReplayStep],
) -> ReplayOutcome {
    let mut rejected_steps = Vec::new();

    if session.status() == SessionStatus::NotStarted {
        if let Err(e) = session.start() {
            rejected_steps.push(RejectedStep {
                step: 0,
                error: e.to_string(),
            });
        }
    }

    for (position, step) in steps.iter().enumerate() {
        let result = match step {
            ReplayStep::Answer { index, value } => {
                session.answer_payload(*index, value).map(|_| ())
            }
            ReplayStep::GoTo { index } => session.go_to(*index).map(|_| ()),
            ReplayStep::Next => session.next().map(|_| ()),
            ReplayStep::Previous => session.previous().map(|_| ()),
            ReplayStep::FocusLost => {
                log_signal(position, signals.focus_lost());
                Ok(())
            }
            ReplayStep::VisibilityHidden => {
                log_signal(position, signals.visibility_hidden());
                Ok(())
            }
            ReplayStep::BlockedInput => {
                log_signal(position, signals.blocked_input_attempt());
                Ok(())
            }
            ReplayStep::KeyChord { chord } => {
                log_signal(position, signals.key_chord(chord));
                Ok(())
            }
            ReplayStep::Wait { millis } => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
                Ok(())
            }
            ReplayStep::Submit => session.submit().await.map(|_| ()),
            ReplayStep::Abandon => session.abandon(),
        };

        if let Err(e) = result {
            tracing::debug!(step = position + 1, error = %e, "Replay step rejected");
            rejected_steps.push(RejectedStep {
                step: position + 1,
                error: e.to_string(),
            });
        }
    }

    // Auto-finalized sessions deliver in the background.
    if session.status() == SessionStatus::Completed {
        session.wait_for_delivery().await;
    }

    ReplayOutcome {
        status: session.status(),
        attempt: session.result(),
        rejected_steps,
    }
}

fn log_signal(position: usize, outcome: SignalOutcome) {
    tracing::debug!(step = position + 1, outcome = ?outcome, "Replay signal");
}
