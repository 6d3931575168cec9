mod common;

use std::sync::Arc;

use common::*;
use proctor_engine::models::{SessionStatus, UserContext};
use proctor_engine::services::{
    AttemptGate, Eligibility, InMemoryCatalog, ManualSignalSource, MemoryResultSink,
    SessionEngine,
};
use proctor_engine::GateError;
use tokio_test::{assert_err, assert_ok};

fn gate_with(catalog: &Arc<InMemoryCatalog>) -> AttemptGate {
    AttemptGate::new(catalog.clone())
}

#[tokio::test]
async fn exam_denies_fourth_attempt() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![final_exam()]));
    let gate = gate_with(&catalog);
    let exam = Arc::new(final_exam());
    let user = student();

    for expected in 1..=3 {
        let grant = assert_ok!(gate.authorize(exam.clone(), &user).await);
        assert_eq!(grant.attempt_number, Some(expected));
    }

    let err = assert_err!(gate.authorize(exam.clone(), &user).await);
    assert!(matches!(err, GateError::AttemptsExhausted { used: 3, max: 3 }));
    assert!(err.is_denial());
    assert_eq!(
        catalog
            .attempt_record("final-exam", "student-1")
            .unwrap()
            .attempts_used,
        3
    );
}

#[tokio::test]
async fn quizzes_are_never_exhausted() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![react_quiz()]));
    let gate = gate_with(&catalog);
    let quiz = Arc::new(react_quiz());

    for _ in 0..10 {
        let grant = gate.authorize(quiz.clone(), &student()).await.unwrap();
        assert_eq!(grant.attempt_number, None);
    }

    assert!(catalog.attempt_record("react-basics", "student-1").is_none());
}

#[tokio::test]
async fn subscription_is_required_when_flagged() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![final_exam()]));
    let gate = gate_with(&catalog);
    let free_user = UserContext::new("free-1", false);

    let err = gate
        .authorize(Arc::new(final_exam()), &free_user)
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::SubscriptionRequired));
    assert_eq!(err.reason_code(), "subscription_required");
    assert!(catalog.attempt_record("final-exam", "free-1").is_none());
}

#[tokio::test]
async fn attempts_are_tracked_per_user() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![final_exam()]));
    catalog.set_attempts_used("final-exam", "student-1", 3);
    let gate = gate_with(&catalog);

    let other = UserContext::new("student-2", true);
    let grant = gate.authorize(Arc::new(final_exam()), &other).await.unwrap();

    assert_eq!(grant.attempt_number, Some(1));
    assert!(gate
        .authorize(Arc::new(final_exam()), &student())
        .await
        .is_err());
}

#[tokio::test]
async fn attempt_is_consumed_before_session_starts() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![final_exam()]));
    let engine = SessionEngine::new(
        catalog.clone(),
        Arc::new(MemoryResultSink::new()),
        test_config(),
    );

    let session = engine
        .begin(
            Arc::new(final_exam()),
            &student(),
            Arc::new(ManualSignalSource::new()),
        )
        .await
        .unwrap();

    assert_eq!(session.status(), SessionStatus::NotStarted);
    assert_eq!(session.attempt_number(), Some(1));
    assert_eq!(
        catalog
            .attempt_record("final-exam", "student-1")
            .unwrap()
            .attempts_used,
        1
    );
}

#[tokio::test]
async fn abandoned_exam_attempt_is_not_refunded() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![final_exam()]));
    let engine = SessionEngine::new(
        catalog.clone(),
        Arc::new(MemoryResultSink::new()),
        test_config(),
    );

    let session = engine
        .begin(
            Arc::new(final_exam()),
            &student(),
            Arc::new(ManualSignalSource::new()),
        )
        .await
        .unwrap();
    session.start().unwrap();
    session.abandon().unwrap();

    assert_eq!(
        catalog
            .attempt_record("final-exam", "student-1")
            .unwrap()
            .attempts_used,
        1
    );
}

#[tokio::test]
async fn invalid_definition_is_rejected() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::default());
    let gate = gate_with(&catalog);
    let mut broken = react_quiz();
    broken.questions.clear();

    let err = gate
        .authorize(Arc::new(broken), &student())
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::InvalidAssessment(_)));
    assert!(!err.is_denial());
}

#[tokio::test]
async fn listing_reports_eligibility_without_consuming() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::new(vec![react_quiz(), final_exam()]));
    catalog.set_attempts_used("final-exam", "student-1", 3);
    let gate = gate_with(&catalog);

    let listings = gate.available_assessments(&student()).await.unwrap();

    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].eligibility, Eligibility::Eligible);
    assert_eq!(
        listings[1].eligibility,
        Eligibility::AttemptsExhausted { used: 3, max: 3 }
    );
    assert_eq!(listings[1].attempts_used, Some(3));

    let free = gate
        .available_assessments(&UserContext::new("free-1", false))
        .await
        .unwrap();
    assert_eq!(free[1].eligibility, Eligibility::SubscriptionRequired);
    assert!(catalog.attempt_record("final-exam", "free-1").is_none());
}
