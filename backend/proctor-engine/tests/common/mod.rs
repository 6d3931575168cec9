#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proctor_engine::config::Config;
use proctor_engine::models::{
    AnswerKey, AssessmentDefinition, AssessmentKind, Question, QuestionKind, ScoredAttempt,
    UserContext,
};
use proctor_engine::services::{
    InMemoryCatalog, ManualSignalSource, MemoryResultSink, ProctoredSession, ResultSink,
    SessionEngine,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config with deliveries that fail fast.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.delivery.max_attempts = 2;
    config.delivery.base_backoff_ms = 1;
    config
}

pub fn question(
    id: &str,
    kind: QuestionKind,
    options: &[&str],
    answer_key: AnswerKey,
    points: u32,
) -> Question {
    Question {
        id: id.to_string(),
        kind,
        prompt: format!("Prompt for {}", id),
        options: options.iter().map(|o| o.to_string()).collect(),
        answer_key,
        points,
        explanation: format!("Explanation for {}", id),
    }
}

/// Three questions worth 2, 1 and 3 points.
pub fn react_quiz() -> AssessmentDefinition {
    AssessmentDefinition {
        id: "react-basics".to_string(),
        title: "React basics".to_string(),
        questions: vec![
            question(
                "q1",
                QuestionKind::SingleChoice,
                &["A library", "A framework", "A language"],
                AnswerKey::Choice { index: 1 },
                2,
            ),
            question(
                "q2",
                QuestionKind::TrueFalse,
                &[],
                AnswerKey::Choice { index: 0 },
                1,
            ),
            question(
                "q3",
                QuestionKind::ShortAnswer,
                &[],
                AnswerKey::Text {
                    text: "virtual dom".to_string(),
                },
                3,
            ),
        ],
        time_limit_seconds: 600,
        kind: AssessmentKind::Quiz,
        requires_subscription: false,
        max_attempts: 0,
    }
}

pub fn essay_quiz() -> AssessmentDefinition {
    AssessmentDefinition {
        id: "essay".to_string(),
        title: "Essay".to_string(),
        questions: vec![question(
            "e1",
            QuestionKind::Essay,
            &[],
            AnswerKey::Manual,
            5,
        )],
        time_limit_seconds: 600,
        kind: AssessmentKind::Quiz,
        requires_subscription: false,
        max_attempts: 0,
    }
}

pub fn final_exam() -> AssessmentDefinition {
    AssessmentDefinition {
        id: "final-exam".to_string(),
        title: "Final exam".to_string(),
        kind: AssessmentKind::Exam,
        requires_subscription: true,
        max_attempts: 3,
        ..react_quiz()
    }
}

pub fn with_time_limit(mut assessment: AssessmentDefinition, seconds: u32) -> AssessmentDefinition {
    assessment.time_limit_seconds = seconds;
    assessment
}

pub fn student() -> UserContext {
    UserContext::new("student-1", true)
}

pub struct Harness {
    pub engine: SessionEngine,
    pub catalog: Arc<InMemoryCatalog>,
    pub sink: Arc<MemoryResultSink>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let catalog = Arc::new(InMemoryCatalog::default());
        let sink = Arc::new(MemoryResultSink::new());
        let engine = SessionEngine::new(catalog.clone(), sink.clone(), test_config());
        Self {
            engine,
            catalog,
            sink,
        }
    }

    /// Authorizes, builds and starts a session for `student()`.
    pub async fn started(
        &self,
        assessment: AssessmentDefinition,
    ) -> (ProctoredSession, Arc<ManualSignalSource>) {
        let signals = Arc::new(ManualSignalSource::new());
        self.catalog.add(assessment.clone());
        let session = self
            .engine
            .begin(Arc::new(assessment), &student(), signals.clone())
            .await
            .unwrap();
        session.start().unwrap();
        (session, signals)
    }
}

/// Sink that always fails and counts calls.
#[derive(Default)]
pub struct FailingSink {
    pub calls: AtomicUsize,
}

impl FailingSink {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultSink for FailingSink {
    async fn record(&self, _attempt: &ScoredAttempt) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("results store offline")
    }
}

/// Sink that holds each record for `delay` before storing it.
pub struct SlowSink {
    pub delay: Duration,
    pub stored: MemoryResultSink,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            stored: MemoryResultSink::new(),
        }
    }
}

#[async_trait]
impl ResultSink for SlowSink {
    async fn record(&self, attempt: &ScoredAttempt) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.stored.record(attempt).await
    }
}
