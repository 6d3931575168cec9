use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::attempt_gate::{AttemptGate, AttemptGrant, CatalogProvider};
use super::integrity::{
    EnvironmentSignalSource, IntegrityMonitor, SignalOutcome, ViolationHandler,
};
use super::result_sink::{self, DeliveryStatus, ResultSink};
use super::scoring;
use super::timer::{CountdownTimer, TickFlow};
use crate::config::Config;
use crate::error::{GateError, SessionError};
use crate::metrics::{
    ANSWERS_RECORDED_TOTAL, ATTEMPT_SCORE_PERCENTAGE, INTEGRITY_VIOLATIONS_TOTAL,
    SESSIONS_ACTIVE, SESSIONS_TOTAL,
};
use crate::models::{
    Answer, AnswerStore, AssessmentDefinition, BlockedShortcut, CompletionReason,
    IntegrityWarning, QuestionView, ScoredAttempt, SessionEvent, SessionSnapshot, SessionStatus,
    TimeExpired, TimerTick, UserContext, ViolationKind, ViolationRecord,
};
use crate::utils::retry::RetryConfig;

/// Entry point for hosts: authorizes through the gate and wires new sessions
/// with the configured sink and timing.
pub struct SessionEngine {
    gate: AttemptGate,
    sink: Arc<dyn ResultSink>,
    config: Config,
}

impl SessionEngine {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        sink: Arc<dyn ResultSink>,
        config: Config,
    ) -> Self {
        Self {
            gate: AttemptGate::new(catalog),
            sink,
            config,
        }
    }

    /// Authorizes `user` and returns a session in `NotStarted`. For exams the
    /// attempt is already consumed when this returns.
    pub async fn begin(
        &self,
        assessment: Arc<AssessmentDefinition>,
        user: &UserContext,
        signals: Arc<dyn EnvironmentSignalSource>,
    ) -> Result<ProctoredSession, GateError> {
        let grant = self.gate.authorize(assessment, user).await?;
        Ok(ProctoredSession::new(
            grant,
            signals,
            self.sink.clone(),
            &self.config,
        ))
    }
}

/// Result of an explicit submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub attempt: ScoredAttempt,
    pub delivery: DeliveryStatus,
}

/// One proctored attempt. Clones share the same session.
#[derive(Clone)]
pub struct ProctoredSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    assessment: Arc<AssessmentDefinition>,
    user: UserContext,
    attempt_number: Option<u32>,
    tick_interval: Duration,
    retry: RetryConfig,
    sink: Arc<dyn ResultSink>,
    monitor: IntegrityMonitor,
    events: broadcast::Sender<SessionEvent>,
    delivered: Notify,
    state: Mutex<SessionState>,
}

struct SessionState {
    status: SessionStatus,
    current_index: usize,
    remaining_seconds: u32,
    violation_count: u32,
    answers: AnswerStore,
    violations: Vec<ViolationRecord>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<ScoredAttempt>,
    delivery: Option<DeliveryStatus>,
    timer: Option<CountdownTimer>,
    runtime: Option<Handle>,
}

impl SessionState {
    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::SessionClosed);
        }
        match self.status {
            SessionStatus::NotStarted => Err(SessionError::NotStarted),
            _ => Ok(()),
        }
    }
}

impl ProctoredSession {
    pub fn new(
        grant: AttemptGrant,
        signals: Arc<dyn EnvironmentSignalSource>,
        sink: Arc<dyn ResultSink>,
        config: &Config,
    ) -> Self {
        let (events, _) = broadcast::channel(config.session.event_buffer.max(1));
        let time_limit = grant.assessment.time_limit_seconds;

        let inner = SessionInner {
            id: Uuid::new_v4(),
            assessment: grant.assessment,
            user: grant.user,
            attempt_number: grant.attempt_number,
            tick_interval: config.session.tick_interval(),
            retry: config.delivery.retry_config(),
            sink,
            monitor: IntegrityMonitor::new(signals, config.session.escalation_threshold),
            events,
            delivered: Notify::new(),
            state: Mutex::new(SessionState {
                status: SessionStatus::NotStarted,
                current_index: 0,
                remaining_seconds: time_limit,
                violation_count: 0,
                answers: AnswerStore::new(),
                violations: Vec::new(),
                started_at: None,
                completed_at: None,
                result: None,
                delivery: None,
                timer: None,
                runtime: None,
            }),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn assessment(&self) -> &AssessmentDefinition {
        &self.inner.assessment
    }

    pub fn user(&self) -> &UserContext {
        &self.inner.user
    }

    pub fn attempt_number(&self) -> Option<u32> {
        self.inner.attempt_number
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Starts the countdown and integrity monitoring. Must be called from
    /// within a tokio runtime; the timer and deliveries run on it.
    pub fn start(&self) -> Result<(), SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::RuntimeUnavailable)?;
        let inner = &self.inner;
        let mut state = inner.lock();

        match state.status {
            SessionStatus::NotStarted => {}
            SessionStatus::InProgress => return Err(SessionError::AlreadyStarted),
            SessionStatus::Completed | SessionStatus::Abandoned => {
                return Err(SessionError::SessionClosed)
            }
        }

        state.status = SessionStatus::InProgress;
        state.current_index = 0;
        state.remaining_seconds = inner.assessment.time_limit_seconds;
        state.violation_count = 0;
        state.started_at = Some(Utc::now());

        let weak = Arc::downgrade(inner);
        state.timer = Some(CountdownTimer::spawn(
            &runtime,
            inner.tick_interval,
            move || {
                let flow = match weak.upgrade() {
                    Some(inner) => inner.tick(),
                    None => TickFlow::Stop,
                };
                std::future::ready(flow)
            },
        ));
        state.runtime = Some(runtime);

        let handler: Weak<SessionInner> = Arc::downgrade(inner);
        inner.monitor.start(handler as Weak<dyn ViolationHandler>);

        SESSIONS_ACTIVE.inc();
        tracing::info!(
            session_id = %inner.id,
            assessment_id = %inner.assessment.id,
            user_id = %inner.user.user_id,
            time_limit_seconds = inner.assessment.time_limit_seconds,
            "Session started"
        );
        inner.emit(SessionEvent::Started {
            session_id: inner.id,
            time_limit_seconds: inner.assessment.time_limit_seconds,
        });

        Ok(())
    }

    /// Stores `answer` for `question_index`, returning the answer it replaced.
    pub fn answer(
        &self,
        question_index: usize,
        answer: Answer,
    ) -> Result<Option<Answer>, SessionError> {
        let mut state = self.inner.lock();
        state.ensure_in_progress()?;

        let len = self.inner.assessment.question_count();
        if question_index >= len {
            return Err(SessionError::QuestionOutOfRange {
                index: question_index,
                len,
            });
        }

        ANSWERS_RECORDED_TOTAL
            .with_label_values(&[answer.kind_label()])
            .inc();
        tracing::debug!(
            session_id = %self.inner.id,
            question_index,
            kind = answer.kind_label(),
            "Answer recorded"
        );

        Ok(state.answers.put(question_index, answer))
    }

    /// Like [`answer`](Self::answer), for a raw JSON payload from the UI.
    pub fn answer_payload(
        &self,
        question_index: usize,
        payload: &serde_json::Value,
    ) -> Result<Option<Answer>, SessionError> {
        self.inner.lock().ensure_in_progress()?;
        let answer = Answer::from_payload(payload)?;
        self.answer(question_index, answer)
    }

    /// Moves to `index`, clamped to the question range.
    pub fn go_to(&self, index: usize) -> Result<usize, SessionError> {
        self.navigate(|_, last| index.min(last))
    }

    pub fn next(&self) -> Result<usize, SessionError> {
        self.navigate(|current, last| (current + 1).min(last))
    }

    pub fn previous(&self) -> Result<usize, SessionError> {
        self.navigate(|current, _| current.saturating_sub(1))
    }

    fn navigate(&self, target: impl FnOnce(usize, usize) -> usize) -> Result<usize, SessionError> {
        let mut state = self.inner.lock();
        state.ensure_in_progress()?;
        state.current_index = target(state.current_index, self.inner.assessment.last_index());
        Ok(state.current_index)
    }

    /// Scores the attempt and hands it to the result sink. A failed delivery
    /// is reported in the returned [`Submission`]; the session stays
    /// completed either way. Delivery runs on the session's runtime, so it
    /// still completes if this future is dropped.
    pub async fn submit(&self) -> Result<Submission, SessionError> {
        let (attempt, runtime) = {
            let mut state = self.inner.lock();
            state.ensure_in_progress()?;
            let attempt = self
                .inner
                .finalize_locked(&mut state, CompletionReason::Submitted);
            (attempt, state.runtime.clone())
        };

        let delivery = match self.inner.spawn_delivery(attempt.clone(), runtime) {
            Some(handle) => match handle.await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!(session_id = %self.inner.id, "Result delivery task failed: {}", e);
                    DeliveryStatus::Failed(e.to_string())
                }
            },
            None => self.inner.deliver(&attempt).await,
        };
        Ok(Submission { attempt, delivery })
    }

    /// Leaves the session without scoring. Nothing is sent to the sink and
    /// a consumed exam attempt is not refunded.
    pub fn abandon(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.lock();
        state.ensure_in_progress()?;

        if let Some(mut timer) = state.timer.take() {
            timer.stop();
        }
        inner.monitor.stop();

        state.status = SessionStatus::Abandoned;
        state.completed_at = Some(Utc::now());
        state.answers = AnswerStore::new();
        state.violations.clear();

        SESSIONS_ACTIVE.dec();
        SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::info!(
            session_id = %inner.id,
            assessment_id = %inner.assessment.id,
            "Session abandoned"
        );
        inner.emit(SessionEvent::Abandoned {
            session_id: inner.id,
        });
        inner.delivered.notify_waiters();

        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = &self.inner;
        let state = inner.lock();
        let total = inner.assessment.time_limit_seconds;

        SessionSnapshot {
            session_id: inner.id,
            assessment_id: inner.assessment.id.clone(),
            user_id: inner.user.user_id.clone(),
            status: state.status,
            current_question_index: state.current_index,
            question_count: inner.assessment.question_count(),
            remaining_seconds: state.remaining_seconds,
            elapsed_seconds: total.saturating_sub(state.remaining_seconds),
            violation_count: state.violation_count,
            answered_count: state
                .result
                .as_ref()
                .map(|r| r.answered_count)
                .unwrap_or_else(|| state.answers.answered_count()),
            started_at: state.started_at,
            completed_at: state.completed_at,
        }
    }

    /// The question at the current index, without its answer key.
    pub fn current_question(&self) -> Result<QuestionView, SessionError> {
        let state = self.inner.lock();
        state.ensure_in_progress()?;
        let index = state.current_index;
        self.inner
            .assessment
            .questions
            .get(index)
            .map(|q| q.view(index))
            .ok_or(SessionError::QuestionOutOfRange {
                index,
                len: self.inner.assessment.question_count(),
            })
    }

    pub fn current_answer(&self) -> Option<Answer> {
        let state = self.inner.lock();
        state.answers.get(state.current_index).cloned()
    }

    /// Violations recorded while the session is in progress. Cleared once the
    /// session closes; the count survives in the scored attempt.
    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.inner.lock().violations.clone()
    }

    pub fn result(&self) -> Option<ScoredAttempt> {
        self.inner.lock().result.clone()
    }

    pub fn delivery(&self) -> Option<DeliveryStatus> {
        self.inner.lock().delivery.clone()
    }

    /// Waits for the result sink outcome. Returns `None` when the session
    /// was abandoned.
    pub async fn wait_for_delivery(&self) -> Option<DeliveryStatus> {
        loop {
            let notified = self.inner.delivered.notified();
            {
                let state = self.inner.lock();
                if let Some(delivery) = &state.delivery {
                    return Some(delivery.clone());
                }
                if state.status == SessionStatus::Abandoned {
                    return None;
                }
            }
            notified.await;
        }
    }
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn tick(self: &Arc<Self>) -> TickFlow {
        let mut state = self.lock();
        if state.status != SessionStatus::InProgress {
            return TickFlow::Stop;
        }

        let total = self.assessment.time_limit_seconds;
        state.remaining_seconds = state.remaining_seconds.saturating_sub(1);
        let remaining = state.remaining_seconds;

        tracing::debug!(session_id = %self.id, remaining_seconds = remaining, "Timer tick");
        self.emit(SessionEvent::TimerTick(TimerTick {
            session_id: self.id,
            remaining_seconds: remaining,
            elapsed_seconds: total.saturating_sub(remaining),
            total_seconds: total,
            timestamp: Utc::now(),
        }));

        if remaining > 0 {
            return TickFlow::Continue;
        }

        tracing::info!(session_id = %self.id, "Time limit reached");
        self.emit(SessionEvent::TimeExpired(TimeExpired::now(self.id)));
        let attempt = self.finalize_locked(&mut state, CompletionReason::TimeExpired);
        let runtime = state.runtime.clone();
        drop(state);

        self.spawn_delivery(attempt, runtime);
        TickFlow::Stop
    }

    /// Single finalize path. Callers hold the lock and have checked the
    /// session is in progress.
    fn finalize_locked(&self, state: &mut SessionState, reason: CompletionReason) -> ScoredAttempt {
        if let Some(mut timer) = state.timer.take() {
            timer.stop();
        }
        self.monitor.stop();

        let answers = std::mem::take(&mut state.answers);
        let breakdown = scoring::score(&self.assessment.questions, &answers);
        let completed_at = Utc::now();

        let attempt = ScoredAttempt {
            session_id: self.id,
            assessment_id: self.assessment.id.clone(),
            user_id: self.user.user_id.clone(),
            earned_points: breakdown.earned_points,
            total_points: breakdown.total_points,
            percentage: breakdown.percentage,
            answered_count: breakdown.answered_count,
            violation_count: state.violation_count,
            completion_reason: reason,
            started_at: state.started_at.unwrap_or(completed_at),
            completed_at,
            per_question: breakdown.per_question,
        };

        state.status = SessionStatus::Completed;
        state.completed_at = Some(completed_at);
        state.violations.clear();
        state.result = Some(attempt.clone());

        SESSIONS_ACTIVE.dec();
        SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
        ATTEMPT_SCORE_PERCENTAGE.observe(f64::from(attempt.percentage));
        tracing::info!(
            session_id = %self.id,
            assessment_id = %self.assessment.id,
            reason = reason.as_str(),
            earned = attempt.earned_points,
            total = attempt.total_points,
            percentage = attempt.percentage,
            "Session finalized"
        );
        self.emit(SessionEvent::Finalized {
            session_id: self.id,
            reason,
            percentage: attempt.percentage,
        });

        attempt
    }

    /// Runs delivery as its own task, detached from whoever finalized.
    fn spawn_delivery(
        self: &Arc<Self>,
        attempt: ScoredAttempt,
        runtime: Option<Handle>,
    ) -> Option<JoinHandle<DeliveryStatus>> {
        let Some(runtime) = runtime.or_else(|| Handle::try_current().ok()) else {
            tracing::error!(session_id = %self.id, "No runtime available for result delivery");
            return None;
        };
        let inner = Arc::clone(self);
        Some(runtime.spawn(async move { inner.deliver(&attempt).await }))
    }

    async fn deliver(&self, attempt: &ScoredAttempt) -> DeliveryStatus {
        let status = result_sink::deliver(self.sink.as_ref(), attempt, self.retry.clone()).await;

        self.lock().delivery = Some(status.clone());
        match &status {
            DeliveryStatus::Recorded => self.emit(SessionEvent::ResultDelivered {
                session_id: self.id,
            }),
            DeliveryStatus::Failed(error) => self.emit(SessionEvent::ResultDeliveryFailed {
                session_id: self.id,
                error: error.clone(),
            }),
        }
        self.delivered.notify_waiters();

        status
    }
}

impl ViolationHandler for SessionInner {
    fn record_violation(
        self: Arc<Self>,
        kind: ViolationKind,
        shortcut: Option<BlockedShortcut>,
    ) -> SignalOutcome {
        let mut state = self.lock();
        if state.status != SessionStatus::InProgress {
            return SignalOutcome::Ignored;
        }

        state.violation_count += 1;
        let violation_count = state.violation_count;
        let threshold = self.monitor.threshold();
        let remaining_seconds = state.remaining_seconds;
        state.violations.push(ViolationRecord {
            ordinal: violation_count,
            kind,
            shortcut,
            remaining_seconds,
            timestamp: Utc::now(),
        });

        INTEGRITY_VIOLATIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        tracing::warn!(
            session_id = %self.id,
            violation_type = kind.as_str(),
            shortcut = ?shortcut,
            violation_count,
            threshold,
            "Integrity violation"
        );
        self.emit(SessionEvent::IntegrityWarning(IntegrityWarning::new(
            self.id,
            kind,
            violation_count,
            threshold,
        )));

        if !self.monitor.should_escalate(violation_count) {
            return SignalOutcome::Warned { violation_count };
        }

        let attempt = self.finalize_locked(&mut state, CompletionReason::IntegrityEscalation);
        let runtime = state.runtime.clone();
        drop(state);

        self.spawn_delivery(attempt, runtime);
        SignalOutcome::Escalated { violation_count }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.status == SessionStatus::InProgress {
            if let Some(mut timer) = state.timer.take() {
                timer.stop();
            }
            self.monitor.stop();
            SESSIONS_ACTIVE.dec();
            tracing::warn!(session_id = %self.id, "In-progress session dropped");
        }
    }
}
