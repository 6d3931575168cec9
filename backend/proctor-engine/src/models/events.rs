use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::CompletionReason;
use super::integrity::IntegrityWarning;
use super::timer::{TimeExpired, TimerTick};

/// Everything a hosting UI may want to react to during a session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        time_limit_seconds: u32,
    },
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    IntegrityWarning(IntegrityWarning),
    Finalized {
        session_id: Uuid,
        reason: CompletionReason,
        percentage: u32,
    },
    Abandoned {
        session_id: Uuid,
    },
    ResultDelivered {
        session_id: Uuid,
    },
    ResultDeliveryFailed {
        session_id: Uuid,
        error: String,
    },
}

impl SessionEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "started",
            SessionEvent::TimerTick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::IntegrityWarning(_) => "integrity-warning",
            SessionEvent::Finalized { .. } => "finalized",
            SessionEvent::Abandoned { .. } => "abandoned",
            SessionEvent::ResultDelivered { .. } => "result-delivered",
            SessionEvent::ResultDeliveryFailed { .. } => "result-delivery-failed",
        }
    }
}
