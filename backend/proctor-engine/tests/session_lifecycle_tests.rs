mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use proctor_engine::models::{Answer, CompletionReason, SessionEvent, SessionStatus};
use proctor_engine::services::{
    DeliveryStatus, InMemoryCatalog, ManualSignalSource, SessionEngine,
};
use proctor_engine::SessionError;

#[tokio::test]
async fn scores_the_reference_attempt() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    session.answer(0, Answer::choice(1)).unwrap();
    session.answer(1, Answer::choice(1)).unwrap();
    session
        .answer(2, Answer::text("It uses a Virtual DOM representation"))
        .unwrap();

    let submission = session.submit().await.unwrap();
    let attempt = submission.attempt;

    assert_eq!(attempt.earned_points, 5);
    assert_eq!(attempt.total_points, 6);
    assert_eq!(attempt.percentage, 83);
    assert_eq!(attempt.answered_count, 3);
    assert_eq!(attempt.completion_reason, CompletionReason::Submitted);
    assert_eq!(
        attempt
            .per_question
            .iter()
            .map(|q| q.earned)
            .collect::<Vec<_>>(),
        vec![2, 0, 3]
    );
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(submission.delivery, DeliveryStatus::Recorded);
    assert_eq!(harness.sink.records(), vec![attempt]);
}

#[tokio::test]
async fn essay_is_left_for_manual_grading() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(essay_quiz()).await;

    session
        .answer(0, Answer::text("A long and thoughtful essay"))
        .unwrap();
    let attempt = session.submit().await.unwrap().attempt;

    assert_eq!(attempt.earned_points, 0);
    assert_eq!(attempt.total_points, 5);
    assert_eq!(attempt.per_question[0].possible, 5);
    assert!(attempt.per_question[0].needs_manual_grading);
}

#[tokio::test(start_paused = true)]
async fn timeout_auto_submits() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(with_time_limit(react_quiz(), 1)).await;
    let mut events = session.subscribe();
    session.answer(0, Answer::choice(1)).unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(session.status(), SessionStatus::Completed);
    let delivery = session.wait_for_delivery().await;
    assert_eq!(delivery, Some(DeliveryStatus::Recorded));

    let attempt = session.result().unwrap();
    assert_eq!(attempt.completion_reason, CompletionReason::TimeExpired);
    assert_eq!(attempt.earned_points, 2);
    assert_eq!(harness.sink.len(), 1);

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.event_name());
    }
    assert_eq!(
        names,
        vec!["timer-tick", "time-expired", "finalized", "result-delivered"]
    );
}

#[tokio::test(start_paused = true)]
async fn ticks_count_down_and_stop_after_submit() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.remaining_seconds, 597);
    assert_eq!(snapshot.elapsed_seconds, 3);

    session.submit().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(session.snapshot().remaining_seconds, 597);
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn second_submit_is_rejected_and_result_kept() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;
    session.answer(0, Answer::choice(1)).unwrap();

    let first = session.submit().await.unwrap().attempt;
    let second = session.submit().await;

    assert_eq!(second.unwrap_err(), SessionError::SessionClosed);
    assert_eq!(session.result(), Some(first));
    assert_eq!(harness.sink.len(), 1);
}

#[tokio::test]
async fn closed_session_rejects_everything_but_reads() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;
    session.submit().await.unwrap();

    assert_eq!(session.start(), Err(SessionError::SessionClosed));
    assert_eq!(
        session.answer(0, Answer::choice(0)),
        Err(SessionError::SessionClosed)
    );
    assert_eq!(session.next(), Err(SessionError::SessionClosed));
    assert_eq!(session.go_to(1), Err(SessionError::SessionClosed));
    assert_eq!(session.abandon(), Err(SessionError::SessionClosed));
    assert_eq!(
        session.current_question().unwrap_err(),
        SessionError::SessionClosed
    );
    assert!(session.result().is_some());
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    assert_eq!(session.start(), Err(SessionError::AlreadyStarted));
    assert_eq!(session.status(), SessionStatus::InProgress);
}

#[tokio::test]
async fn navigation_clamps_at_bounds() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    assert_eq!(session.previous().unwrap(), 0);
    assert_eq!(session.next().unwrap(), 1);
    assert_eq!(session.next().unwrap(), 2);
    assert_eq!(session.next().unwrap(), 2);
    assert_eq!(session.go_to(99).unwrap(), 2);
    assert_eq!(session.go_to(0).unwrap(), 0);

    let view = session.current_question().unwrap();
    assert_eq!(view.index, 0);
    assert_eq!(view.id, "q1");
}

#[tokio::test]
async fn out_of_range_answer_leaves_state_unchanged() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    let err = session.answer(3, Answer::choice(0)).unwrap_err();

    assert_eq!(err, SessionError::QuestionOutOfRange { index: 3, len: 3 });
    assert_eq!(session.snapshot().answered_count, 0);
}

#[tokio::test]
async fn payload_answers_are_parsed_at_the_boundary() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    session
        .answer_payload(0, &serde_json::json!({"choiceIndex": 1}))
        .unwrap();
    session
        .answer_payload(2, &serde_json::json!({"text": "virtual DOM"}))
        .unwrap();
    let err = session
        .answer_payload(1, &serde_json::json!({"choiceIndex": -1}))
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidAnswerPayload(_)));
    assert_eq!(session.snapshot().answered_count, 2);
    assert_eq!(session.submit().await.unwrap().attempt.earned_points, 5);
}

#[tokio::test]
async fn wrong_answer_shape_scores_zero() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    session.answer(0, Answer::text("1")).unwrap();
    session.answer(2, Answer::choice(0)).unwrap();

    let attempt = session.submit().await.unwrap().attempt;
    assert_eq!(attempt.earned_points, 0);
    assert_eq!(attempt.answered_count, 2);
}

#[tokio::test]
async fn abandon_discards_without_scoring() {
    let harness = Harness::new();
    let (session, signals) = harness.started(react_quiz()).await;
    let mut events = session.subscribe();
    session.answer(0, Answer::choice(1)).unwrap();

    session.abandon().unwrap();

    assert_eq!(session.status(), SessionStatus::Abandoned);
    assert!(session.result().is_none());
    assert!(harness.sink.is_empty());
    assert!(!signals.is_subscribed());
    assert_eq!(session.wait_for_delivery().await, None);
    assert_eq!(session.submit().await.unwrap_err(), SessionError::SessionClosed);
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Abandoned { .. }
    ));
}

#[tokio::test]
async fn abandon_wakes_pending_delivery_waiters() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    let waiter = tokio::spawn({
        let session = session.clone();
        async move { session.wait_for_delivery().await }
    });
    tokio::task::yield_now().await;
    session.abandon().unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter should resolve after abandon")
        .unwrap();
    assert_eq!(delivery, None);
}

#[tokio::test(start_paused = true)]
async fn dropped_submit_still_delivers() {
    init_tracing();
    let sink = Arc::new(SlowSink::new(Duration::from_secs(5)));
    let engine = SessionEngine::new(
        Arc::new(InMemoryCatalog::default()),
        sink.clone(),
        test_config(),
    );
    let session = engine
        .begin(
            Arc::new(react_quiz()),
            &student(),
            Arc::new(ManualSignalSource::new()),
        )
        .await
        .unwrap();
    session.start().unwrap();
    let mut events = session.subscribe();

    let timed_out = tokio::time::timeout(Duration::from_millis(1), session.submit()).await;
    assert!(timed_out.is_err());
    assert_eq!(session.status(), SessionStatus::Completed);

    assert_eq!(
        session.wait_for_delivery().await,
        Some(DeliveryStatus::Recorded)
    );
    assert_eq!(sink.stored.len(), 1);
    assert_eq!(sink.stored.records()[0].session_id, session.id());

    let names: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.event_name())
        .collect();
    assert_eq!(names, vec!["finalized", "result-delivered"]);
}

#[tokio::test]
async fn delivery_failure_keeps_session_completed() {
    init_tracing();
    let catalog = Arc::new(InMemoryCatalog::default());
    let sink = Arc::new(FailingSink::default());
    let engine = SessionEngine::new(catalog, sink.clone(), test_config());
    let signals = Arc::new(ManualSignalSource::new());
    let session = engine
        .begin(Arc::new(react_quiz()), &student(), signals)
        .await
        .unwrap();
    session.start().unwrap();
    let mut events = session.subscribe();

    let submission = session.submit().await.unwrap();

    assert!(matches!(
        submission.delivery,
        DeliveryStatus::Failed(ref msg) if msg.contains("results store offline")
    ));
    assert_eq!(sink.calls(), 2);
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.result(), Some(submission.attempt));

    let names: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.event_name())
        .collect();
    assert_eq!(names, vec!["finalized", "result-delivery-failed"]);
}

#[tokio::test]
async fn snapshot_reflects_progress() {
    let harness = Harness::new();
    let (session, _signals) = harness.started(react_quiz()).await;

    session.answer(1, Answer::choice(0)).unwrap();
    session.go_to(1).unwrap();
    let snapshot = session.snapshot();

    assert_eq!(snapshot.status, SessionStatus::InProgress);
    assert_eq!(snapshot.current_question_index, 1);
    assert_eq!(snapshot.question_count, 3);
    assert_eq!(snapshot.answered_count, 1);
    assert_eq!(snapshot.remaining_seconds, 600);
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.completed_at.is_none());
    assert_eq!(session.current_answer(), Some(Answer::choice(0)));
}
