use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::models::{BlockedShortcut, KeyChord, ViolationKind};

/// Host environment that reports focus, visibility and keyboard activity.
///
/// Implementations must not invoke the listener from inside `subscribe` or
/// `unsubscribe`; signals arrive later from the host's own context.
pub trait EnvironmentSignalSource: Send + Sync {
    fn subscribe(&self, listener: SignalListener);
    fn unsubscribe(&self);
}

/// What a reported signal led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Monitor inactive, session gone, or the chord was harmless.
    Ignored,
    Warned { violation_count: u32 },
    Escalated { violation_count: u32 },
}

pub(crate) trait ViolationHandler: Send + Sync {
    fn record_violation(
        self: Arc<Self>,
        kind: ViolationKind,
        shortcut: Option<BlockedShortcut>,
    ) -> SignalOutcome;
}

/// Handle given to a signal source. Cheap to clone; goes inert as soon as
/// monitoring stops or the session is dropped.
#[derive(Clone)]
pub struct SignalListener {
    handler: Weak<dyn ViolationHandler>,
    active: Arc<AtomicBool>,
}

impl SignalListener {
    pub fn on_focus_lost(&self) -> SignalOutcome {
        self.dispatch(ViolationKind::FocusLost, None)
    }

    pub fn on_visibility_hidden(&self) -> SignalOutcome {
        self.dispatch(ViolationKind::VisibilityHidden, None)
    }

    /// A blocked input was already classified by the host.
    pub fn on_blocked_input_attempt(&self) -> SignalOutcome {
        self.dispatch(ViolationKind::BlockedInput, None)
    }

    /// Raw key press; only chords on the block list count as violations.
    pub fn on_key_chord(&self, chord: &KeyChord) -> SignalOutcome {
        match chord.blocked_shortcut() {
            Some(shortcut) => self.dispatch(ViolationKind::BlockedInput, Some(shortcut)),
            None => SignalOutcome::Ignored,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.handler.strong_count() > 0
    }

    fn dispatch(&self, kind: ViolationKind, shortcut: Option<BlockedShortcut>) -> SignalOutcome {
        if !self.active.load(Ordering::SeqCst) {
            return SignalOutcome::Ignored;
        }
        match self.handler.upgrade() {
            Some(handler) => handler.record_violation(kind, shortcut),
            None => SignalOutcome::Ignored,
        }
    }
}

/// Connects a session to its signal source for the in-progress window.
pub struct IntegrityMonitor {
    source: Arc<dyn EnvironmentSignalSource>,
    active: Arc<AtomicBool>,
    threshold: u32,
}

impl IntegrityMonitor {
    pub fn new(source: Arc<dyn EnvironmentSignalSource>, threshold: u32) -> Self {
        Self {
            source,
            active: Arc::new(AtomicBool::new(false)),
            threshold: threshold.max(1),
        }
    }

    pub(crate) fn start(&self, handler: Weak<dyn ViolationHandler>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        self.source.subscribe(SignalListener {
            handler,
            active: self.active.clone(),
        });
        tracing::debug!(threshold = self.threshold, "Integrity monitoring started");
    }

    /// Idempotent. Signals already in flight see the cleared flag and are
    /// ignored.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.source.unsubscribe();
            tracing::debug!("Integrity monitoring stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn should_escalate(&self, violation_count: u32) -> bool {
        violation_count >= self.threshold
    }
}

/// Signal source driven by explicit calls. Used by the replay harness and
/// by hosts that forward events from elsewhere.
#[derive(Default)]
pub struct ManualSignalSource {
    listener: Mutex<Option<SignalListener>>,
}

impl ManualSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn focus_lost(&self) -> SignalOutcome {
        self.with_listener(|l| l.on_focus_lost())
    }

    pub fn visibility_hidden(&self) -> SignalOutcome {
        self.with_listener(|l| l.on_visibility_hidden())
    }

    pub fn blocked_input_attempt(&self) -> SignalOutcome {
        self.with_listener(|l| l.on_blocked_input_attempt())
    }

    pub fn key_chord(&self, chord: &KeyChord) -> SignalOutcome {
        self.with_listener(|l| l.on_key_chord(chord))
    }

    fn with_listener(&self, f: impl FnOnce(&SignalListener) -> SignalOutcome) -> SignalOutcome {
        // Escalation unsubscribes, so the lock must be released first.
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match listener {
            Some(listener) => f(&listener),
            None => SignalOutcome::Ignored,
        }
    }
}

impl EnvironmentSignalSource for ManualSignalSource {
    fn subscribe(&self, listener: SignalListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn unsubscribe(&self) {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
