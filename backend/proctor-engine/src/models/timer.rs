use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimerTick {
    pub session_id: Uuid,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimeExpired {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimeExpired {
    pub fn now(session_id: Uuid) -> Self {
        Self {
            session_id,
            timestamp: Utc::now(),
            message: "Time limit exceeded".to_string(),
        }
    }
}
