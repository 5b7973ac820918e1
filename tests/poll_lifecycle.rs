//! Integration coverage for the poll lifecycle driven through the services.

mod common;

use std::time::Duration;

use uuid::Uuid;

use class_pulse_back::dao::models::PollStatus;
use class_pulse_back::dto::poll::{PollCreatePayload, PollStatePayload, PollVotePayload};
use class_pulse_back::dto::student::StudentJoinPayload;
use class_pulse_back::error::ServiceError;
use class_pulse_back::services::{poll_service, student_service};

use common::state_with_store;

fn create_payload(options: &[&str], correct: Option<usize>, duration_sec: u32) -> PollCreatePayload {
    PollCreatePayload {
        request_id: None,
        question: "Q".into(),
        options: options.iter().map(|text| text.to_string()).collect(),
        correct_option_index: correct,
        duration_sec,
    }
}

fn vote_payload(poll_id: Uuid, student_key: &str, option_id: &str) -> PollVotePayload {
    PollVotePayload {
        request_id: None,
        poll_id,
        student_key: student_key.into(),
        student_name: student_key.to_uppercase(),
        option_id: option_id.into(),
    }
}

fn poll_id_of(snapshot: &PollStatePayload) -> Uuid {
    snapshot.active_poll.as_ref().expect("poll present").poll_id
}

#[tokio::test]
async fn create_poll_returns_active_snapshot() {
    let (state, _store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], Some(0), 30))
        .await
        .expect("create succeeds");

    let poll = snapshot.active_poll.expect("active poll");
    assert_eq!(poll.status, PollStatus::Active);
    assert_eq!(poll.options.len(), 2);
    assert!(poll.options[0].is_correct);
    assert!(!poll.options[1].is_correct);
    assert_eq!(poll.duration_sec, 30);
    assert!(snapshot.results.iter().all(|result| result.count == 0));
}

#[tokio::test]
async fn second_create_rejected_until_first_expires() {
    let (state, store) = state_with_store().await;

    let first = poll_service::create_poll(&state, create_payload(&["A", "B"], Some(0), 30))
        .await
        .expect("first create");
    let first_id = poll_id_of(&first);

    let rejected = poll_service::create_poll(&state, create_payload(&["A", "B"], Some(0), 30)).await;
    assert!(matches!(rejected, Err(ServiceError::Conflict(_))));

    // Push the first poll past its deadline; the retry self-heals by ending it.
    store.backdate_active_poll(Duration::from_secs(31));
    let second = poll_service::create_poll(&state, create_payload(&["A", "B"], Some(0), 30))
        .await
        .expect("create after expiry");

    assert_ne!(poll_id_of(&second), first_id);
    assert_eq!(store.poll(first_id).unwrap().status, PollStatus::Ended);
}

#[tokio::test]
async fn vote_tally_rounds_percentages_per_option() {
    let (state, _store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B", "C"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();
    let (a, b) = (poll.options[0].id.clone(), poll.options[1].id.clone());

    for student in ["s1", "s2", "s3"] {
        poll_service::vote(&state, vote_payload(poll.poll_id, student, &a))
            .await
            .expect("vote A");
    }
    let outcome = poll_service::vote(&state, vote_payload(poll.poll_id, "s4", &b))
        .await
        .expect("vote B");

    let counts: Vec<u64> = outcome.results.iter().map(|result| result.count).collect();
    let percents: Vec<u8> = outcome.results.iter().map(|result| result.percent).collect();
    assert_eq!(counts, vec![3, 1, 0]);
    assert_eq!(percents, vec![75, 25, 0]);
}

#[tokio::test]
async fn vote_tally_thirds_do_not_sum_to_hundred() {
    let (state, _store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B", "C"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    let mut last = None;
    for (student, option) in ["s1", "s2", "s3"].iter().zip(poll.options.iter()) {
        last = Some(
            poll_service::vote(&state, vote_payload(poll.poll_id, student, &option.id))
                .await
                .expect("vote"),
        );
    }

    let percents: Vec<u8> = last
        .unwrap()
        .results
        .iter()
        .map(|result| result.percent)
        .collect();
    assert_eq!(percents, vec![33, 33, 33]);
}

#[tokio::test]
async fn duplicate_vote_rejected_and_not_recorded() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();
    let option = poll.options[0].id.clone();

    poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &option))
        .await
        .expect("first vote");
    let second = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &option)).await;

    assert!(matches!(second, Err(ServiceError::AlreadyVoted)));
    assert_eq!(store.vote_count(poll.poll_id), 1);
}

#[tokio::test]
async fn concurrent_identical_votes_count_once() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();
    let option = poll.options[0].id.clone();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let state = state.clone();
        let payload = vote_payload(poll.poll_id, "s1", &option);
        tasks.push(tokio::spawn(async move {
            poll_service::vote(&state, payload).await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task completes").is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.vote_count(poll.poll_id), 1);
}

#[tokio::test]
async fn invalid_option_rejected_without_record() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    let rejected = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", "bogus")).await;
    assert!(matches!(rejected, Err(ServiceError::InvalidInput(_))));
    assert_eq!(store.vote_count(poll.poll_id), 0);

    let current = poll_service::active_poll_state(&state).await.expect("state");
    assert!(current.results.iter().all(|result| result.count == 0));
}

#[tokio::test]
async fn overdue_poll_is_reported_ended_on_read() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 30))
        .await
        .expect("create");
    let poll_id = poll_id_of(&snapshot);

    store.backdate_active_poll(Duration::from_secs(31));

    let current = poll_service::active_poll_state(&state).await.expect("state");
    let poll = current.active_poll.expect("poll still reported");
    assert_eq!(poll.poll_id, poll_id);
    assert_eq!(poll.status, PollStatus::Ended);

    let stored = store.poll(poll_id).unwrap();
    assert_eq!(stored.status, PollStatus::Ended);
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn end_poll_flips_exactly_once() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll_id = poll_id_of(&snapshot);

    assert!(poll_service::end_poll(&state, poll_id).await.expect("first end"));
    let ended_at = store.poll(poll_id).unwrap().ended_at;

    assert!(!poll_service::end_poll(&state, poll_id).await.expect("second end"));
    assert_eq!(store.poll(poll_id).unwrap().ended_at, ended_at);
}

#[tokio::test]
async fn concurrent_ends_produce_a_single_transition() {
    let (state, _store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll_id = poll_id_of(&snapshot);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            poll_service::end_poll(&state, poll_id).await
        }));
    }

    let mut flips = 0;
    for task in tasks {
        if task.await.expect("task completes").expect("end succeeds") {
            flips += 1;
        }
    }
    assert_eq!(flips, 1);
}

#[tokio::test]
async fn poll_ends_early_once_all_eligible_students_voted() {
    let (state, store) = state_with_store().await;
    store.seed_student("s1", "Ada");
    store.seed_student("s2", "Grace");

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();
    let option = poll.options[0].id.clone();

    let first = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &option))
        .await
        .expect("first vote");
    assert!(!first.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Active);

    let second = poll_service::vote(&state, vote_payload(poll.poll_id, "s2", &option))
        .await
        .expect("second vote");
    assert!(second.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Ended);
}

#[tokio::test]
async fn vote_from_outside_the_eligibility_set_counts_toward_early_end() {
    let (state, store) = state_with_store().await;
    store.seed_student("s1", "Ada");

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    // Anyone may vote; the early-end rule compares distinct-voter count with
    // the eligibility-set size, so a vote from outside the set completes it.
    let outcome = poll_service::vote(&state, vote_payload(poll.poll_id, "s2", &poll.options[0].id))
        .await
        .expect("vote");

    assert!(outcome.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Ended);
}

#[tokio::test]
async fn mid_poll_join_extends_eligibility_and_delays_early_end() {
    let (state, store) = state_with_store().await;
    store.seed_student("s1", "Ada");

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();
    let option = poll.options[0].id.clone();

    // A student joining mid-poll grows the eligibility set, so one vote no
    // longer suffices for the early end.
    student_service::join(
        &state,
        &StudentJoinPayload {
            student_key: "s2".into(),
            name: "Grace".into(),
        },
    )
    .await
    .expect("join");
    poll_service::note_student_joined(&state, "s2").await;

    let first = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &option))
        .await
        .expect("first vote");
    assert!(!first.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Active);

    let second = poll_service::vote(&state, vote_payload(poll.poll_id, "s2", &option))
        .await
        .expect("second vote");
    assert!(second.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Ended);
}

#[tokio::test]
async fn empty_eligibility_set_never_triggers_early_end() {
    let (state, store) = state_with_store().await;

    // No students were known at creation, so the eligibility set is empty.
    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    let outcome = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &poll.options[0].id))
        .await
        .expect("vote");

    assert!(!outcome.early_ended);
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Active);
}

#[tokio::test]
async fn kick_is_sticky_across_rejoin_and_blocks_votes() {
    let (state, store) = state_with_store().await;
    store.seed_student("s1", "Ada");

    student_service::kick_student(&state, "s1").await.expect("kick");

    let rejoin = student_service::join(
        &state,
        &StudentJoinPayload {
            student_key: "s1".into(),
            name: "Ada Again".into(),
        },
    )
    .await;
    assert!(matches!(rejoin, Err(ServiceError::Kicked)));

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    let vote = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &poll.options[0].id)).await;
    assert!(matches!(vote, Err(ServiceError::Kicked)));
    assert_eq!(store.vote_count(poll.poll_id), 0);
}

#[tokio::test]
async fn vote_after_end_is_a_conflict() {
    let (state, _store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    poll_service::end_poll(&state, poll.poll_id).await.expect("end");

    let vote = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &poll.options[0].id)).await;
    assert!(
        matches!(vote, Err(ServiceError::Conflict(message)) if message == "This poll has already ended.")
    );
}

#[tokio::test]
async fn vote_on_overdue_poll_rejected_with_expiry_notice() {
    let (state, store) = state_with_store().await;

    let snapshot = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 30))
        .await
        .expect("create");
    let poll = snapshot.active_poll.unwrap();

    store.backdate_active_poll(Duration::from_secs(31));

    // The expiry path carries its own wording, distinct from the
    // already-ended rejection.
    let vote = poll_service::vote(&state, vote_payload(poll.poll_id, "s1", &poll.options[0].id)).await;
    assert!(matches!(vote, Err(ServiceError::Conflict(message)) if message == "This poll has ended."));
    assert_eq!(store.poll(poll.poll_id).unwrap().status, PollStatus::Ended);
    assert_eq!(store.vote_count(poll.poll_id), 0);
}

#[tokio::test]
async fn history_lists_ended_polls_and_clear_removes_them() {
    let (state, store) = state_with_store().await;

    let first = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 30))
        .await
        .expect("first create");
    let first_id = poll_id_of(&first);
    store.backdate_active_poll(Duration::from_secs(31));

    let second = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 3600))
        .await
        .expect("second create");
    let second_id = poll_id_of(&second);
    poll_service::end_poll(&state, second_id).await.expect("end second");

    let history = poll_service::history(&state).await.expect("history");
    assert_eq!(history.len(), 2);
    // Most recent start first.
    assert_eq!(history[0].poll.poll_id, second_id);
    assert_eq!(history[1].poll.poll_id, first_id);

    let cleared = poll_service::clear_history(&state).await.expect("clear");
    assert_eq!(cleared, 2);
    assert!(poll_service::history(&state).await.expect("history").is_empty());
}

#[tokio::test]
async fn degraded_mode_fails_fast() {
    let state = common::degraded_state();

    let create = poll_service::create_poll(&state, create_payload(&["A", "B"], None, 30)).await;
    assert!(matches!(create, Err(ServiceError::Degraded)));

    let read = poll_service::active_poll_state(&state).await;
    assert!(matches!(read, Err(ServiceError::Degraded)));
}
