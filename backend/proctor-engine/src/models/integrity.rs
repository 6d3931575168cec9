use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    FocusLost,
    VisibilityHidden,
    BlockedInput,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::FocusLost => "focus_lost",
            ViolationKind::VisibilityHidden => "visibility_hidden",
            ViolationKind::BlockedInput => "blocked_input",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockedShortcut {
    DevTools,
    ViewSource,
    Save,
    Print,
    NewTab,
    NewWindow,
}

/// A key press with its modifiers, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    /// Cmd on macOS; treated like ctrl.
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Classifies shortcuts that leave or inspect the test page.
    pub fn blocked_shortcut(&self) -> Option<BlockedShortcut> {
        let key = self.key.to_ascii_lowercase();
        if key == "f12" {
            return Some(BlockedShortcut::DevTools);
        }

        let command = self.ctrl || self.meta;
        if !command || self.alt {
            return None;
        }

        match (key.as_str(), self.shift) {
            ("i" | "j" | "c", true) => Some(BlockedShortcut::DevTools),
            ("u", false) => Some(BlockedShortcut::ViewSource),
            ("s", false) => Some(BlockedShortcut::Save),
            ("p", false) => Some(BlockedShortcut::Print),
            ("t", false) => Some(BlockedShortcut::NewTab),
            ("n", false) => Some(BlockedShortcut::NewWindow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub ordinal: u32,
    pub kind: ViolationKind,
    pub shortcut: Option<BlockedShortcut>,
    pub remaining_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

/// Non-fatal notice raised for every violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub session_id: Uuid,
    pub kind: ViolationKind,
    pub violation_count: u32,
    pub threshold: u32,
    pub remaining_before_escalation: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl IntegrityWarning {
    pub fn new(session_id: Uuid, kind: ViolationKind, violation_count: u32, threshold: u32) -> Self {
        let remaining = threshold.saturating_sub(violation_count);
        let action = match kind {
            ViolationKind::FocusLost => "Leaving the test window",
            ViolationKind::VisibilityHidden => "Switching tabs",
            ViolationKind::BlockedInput => "That shortcut",
        };
        let message = match remaining {
            0 => format!(
                "{} is not allowed. Violation limit reached; your test has been submitted.",
                action
            ),
            1 => format!(
                "{} is not allowed (warning {} of {}). Your test will be submitted automatically if this continues.",
                action, violation_count, threshold
            ),
            _ => format!(
                "{} is not allowed (warning {} of {}).",
                action, violation_count, threshold
            ),
        };

        Self {
            session_id,
            kind,
            violation_count,
            threshold,
            remaining_before_escalation: remaining,
            message,
            timestamp: Utc::now(),
        }
    }
}
