//! Poll lifecycle coordination: create, vote, tally, end.

use std::time::{Duration, SystemTime};

use rand::{Rng, distr::Alphanumeric};
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{PollEntity, PollOptionEntity, PollStatus, VoteEntity},
        poll_store::PollStore,
    },
    dto::{
        epoch_ms,
        poll::{
            OptionResult, PollCreatePayload, PollHistoryItem, PollStatePayload, PollUpdatePayload,
            PollVotePayload,
        },
    },
    error::ServiceError,
    services::{student_service, ws_events},
    state::{PollTimer, SharedState},
};

const OPTION_ID_LENGTH: usize = 10;

/// Result of a successfully counted vote.
#[derive(Debug)]
pub struct VoteOutcome {
    /// Poll the vote was counted for.
    pub poll_id: Uuid,
    /// Aggregates including the new vote.
    pub results: Vec<OptionResult>,
    /// Whether this vote completed the eligibility set and ended the poll.
    pub early_ended: bool,
}

/// Open a new poll and arm its countdown.
///
/// Rejected while another unexpired poll is active; an expired leftover is
/// lazily ended first. Returns the fresh canonical state payload.
pub async fn create_poll(
    state: &SharedState,
    payload: PollCreatePayload,
) -> Result<PollStatePayload, ServiceError> {
    let store = state.require_poll_store().await?;

    if let Some(active) = store.find_active_poll().await? {
        if active.is_expired(SystemTime::now()) {
            // Missed timer (e.g. process restart): self-heal before creating.
            end_poll(state, active.id).await?;
        } else {
            return Err(ServiceError::Conflict(
                "An active poll is already running.".into(),
            ));
        }
    }

    let options = build_options(&payload.options, payload.correct_option_index)?;

    let eligible_student_keys = match student_service::active_student_keys(state).await {
        Ok(keys) => keys,
        Err(err) => {
            warn!(error = %err, "failed to snapshot eligibility; creating poll with an empty set");
            Vec::new()
        }
    };

    let poll = PollEntity {
        id: Uuid::new_v4(),
        question: payload.question,
        options,
        duration_sec: payload.duration_sec,
        started_at: SystemTime::now(),
        status: PollStatus::Active,
        ended_at: None,
        eligible_student_keys,
    };

    store.insert_poll(poll.clone()).await?;
    info!(poll_id = %poll.id, duration_sec = poll.duration_sec, "poll created");

    arm_timer(state, poll.id, Duration::from_secs(u64::from(poll.duration_sec))).await;

    active_poll_state(state).await
}

/// Count a vote for the active poll.
///
/// The unique vote index is the sole double-vote guard: the insert is
/// attempted unconditionally and the store's duplicate failure becomes
/// [`ServiceError::AlreadyVoted`].
pub async fn vote(state: &SharedState, payload: PollVotePayload) -> Result<VoteOutcome, ServiceError> {
    let store = state.require_poll_store().await?;

    if student_service::is_kicked(state, &payload.student_key).await? {
        return Err(ServiceError::Kicked);
    }

    let Some(poll) = store.find_poll(payload.poll_id).await? else {
        return Err(ServiceError::NotFound("Poll not found.".into()));
    };

    if poll.status == PollStatus::Ended {
        return Err(ServiceError::Conflict("This poll has already ended.".into()));
    }
    if poll.is_expired(SystemTime::now()) {
        end_poll(state, poll.id).await?;
        return Err(ServiceError::Conflict("This poll has ended.".into()));
    }

    if !poll.has_option(&payload.option_id) {
        return Err(ServiceError::InvalidInput("Invalid option.".into()));
    }

    store
        .insert_vote(VoteEntity {
            poll_id: poll.id,
            student_key: payload.student_key.clone(),
            student_name: payload.student_name.clone(),
            option_id: payload.option_id.clone(),
            voted_at: SystemTime::now(),
        })
        .await?;

    let results = compute_results(store.as_ref(), &poll).await?;
    let early_ended = check_early_end(state, store.as_ref(), &poll).await?;

    ws_events::broadcast_results(
        state,
        PollUpdatePayload {
            poll_id: poll.id,
            results: results.clone(),
        },
    );

    Ok(VoteOutcome {
        poll_id: poll.id,
        results,
        early_ended,
    })
}

/// The canonical poll-state payload pushed to clients and served over REST.
///
/// Prefers the active unexpired poll, lazily ends an overdue one, and falls
/// back to the most recently ended poll.
pub async fn active_poll_state(state: &SharedState) -> Result<PollStatePayload, ServiceError> {
    let store = state.require_poll_store().await?;

    let poll = match store.find_active_poll().await? {
        Some(active) if !active.is_expired(SystemTime::now()) => Some(active),
        Some(expired) => {
            finalize(state, store.as_ref(), expired.id).await?;
            store.find_poll(expired.id).await?
        }
        None => store.latest_ended_poll().await?,
    };

    let results = match &poll {
        Some(poll) => compute_results(store.as_ref(), poll).await?,
        None => Vec::new(),
    };

    Ok(PollStatePayload {
        active_poll: poll.map(Into::into),
        server_time: epoch_ms(SystemTime::now()),
        results,
    })
}

/// Best-effort idempotent addition to the active poll's eligibility set.
pub async fn add_eligible_student(state: &SharedState, poll_id: Uuid, student_key: &str) {
    let Ok(store) = state.require_poll_store().await else {
        return;
    };
    if let Err(err) = store.add_eligible_student(poll_id, student_key.to_string()).await {
        warn!(poll_id = %poll_id, error = %err, "failed to extend poll eligibility set");
    }
}

/// Add a joining student to the active poll's eligibility set, if one exists.
///
/// Best-effort, like [`add_eligible_student`].
pub async fn note_student_joined(state: &SharedState, student_key: &str) {
    let Ok(store) = state.require_poll_store().await else {
        return;
    };
    match store.find_active_poll().await {
        Ok(Some(poll)) if !poll.is_expired(SystemTime::now()) => {
            add_eligible_student(state, poll.id, student_key).await;
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to look up active poll for eligibility update"),
    }
}

/// End a poll and broadcast the new canonical state when this call flipped it.
///
/// Idempotent: the conditional active→ended update succeeds at most once.
pub async fn end_poll(state: &SharedState, poll_id: Uuid) -> Result<bool, ServiceError> {
    let store = state.require_poll_store().await?;
    let flipped = finalize(state, store.as_ref(), poll_id).await?;
    if flipped {
        ws_events::broadcast_poll_state(state).await;
    }
    Ok(flipped)
}

/// Ended polls with their final results, most recent first.
pub async fn history(state: &SharedState) -> Result<Vec<PollHistoryItem>, ServiceError> {
    let store = state.require_poll_store().await?;
    let polls = store
        .list_ended_polls(state.config().poll_history_limit())
        .await?;

    let mut items = Vec::with_capacity(polls.len());
    for poll in polls {
        let results = compute_results(store.as_ref(), &poll).await?;
        items.push(PollHistoryItem {
            poll: poll.into(),
            results,
        });
    }
    Ok(items)
}

/// Delete every ended poll and its votes, returning the number removed.
pub async fn clear_history(state: &SharedState) -> Result<u64, ServiceError> {
    let store = state.require_poll_store().await?;
    let count = store.clear_ended_polls().await?;
    info!(count, "poll history cleared");
    Ok(count)
}

/// Flip a poll to ended and disarm its timer. Does not broadcast.
async fn finalize(
    state: &SharedState,
    store: &dyn PollStore,
    poll_id: Uuid,
) -> Result<bool, ServiceError> {
    let flipped = store.end_poll(poll_id, SystemTime::now()).await?;
    if flipped {
        state.disarm_poll_timer(poll_id).await;
        info!(poll_id = %poll_id, "poll ended");
    }
    Ok(flipped)
}

/// End the poll early once the distinct voters cover the eligibility set.
///
/// The rule compares counts, not membership: any student may vote, so a vote
/// from outside the set still moves the poll toward its early end. Returns
/// `true` only when this call performed the actual transition, so concurrent
/// completing votes cannot both claim the early end.
async fn check_early_end(
    state: &SharedState,
    store: &dyn PollStore,
    poll: &PollEntity,
) -> Result<bool, ServiceError> {
    // Re-read the eligibility set: it may have grown since the poll was loaded.
    let Some(current) = store.find_poll(poll.id).await? else {
        return Ok(false);
    };
    if current.eligible_student_keys.is_empty() {
        return Ok(false);
    }

    let voters = store.distinct_voters(poll.id).await?;
    if voters.len() < current.eligible_student_keys.len() {
        return Ok(false);
    }

    let flipped = finalize(state, store, poll.id).await?;
    if flipped {
        info!(poll_id = %poll.id, "all eligible students voted; poll ended early");
        ws_events::broadcast_poll_state(state).await;
    }
    Ok(flipped)
}

/// Aggregate per-option counts and rounded percentages for a poll.
async fn compute_results(
    store: &dyn PollStore,
    poll: &PollEntity,
) -> Result<Vec<OptionResult>, ServiceError> {
    let counts = store.count_votes_by_option(poll.id).await?;
    let total: u64 = counts.values().sum();

    Ok(poll
        .options
        .iter()
        .map(|option| {
            let count = counts.get(&option.id).copied().unwrap_or(0);
            OptionResult {
                option_id: option.id.clone(),
                text: option.text.clone(),
                is_correct: option.is_correct,
                count,
                percent: percent(count, total),
            }
        })
        .collect())
}

/// Rounded share of `count` in `total`, 0 when there are no votes.
fn percent(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

/// Turn raw option texts into entities with generated ids.
///
/// Blank entries are dropped; `correct_index` refers to positions in the
/// submitted array, before filtering.
fn build_options(
    texts: &[String],
    correct_index: Option<usize>,
) -> Result<Vec<PollOptionEntity>, ServiceError> {
    let options: Vec<PollOptionEntity> = texts
        .iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(PollOptionEntity {
                id: new_option_id(),
                text: trimmed.to_string(),
                is_correct: correct_index == Some(index),
            })
        })
        .collect();

    if options.len() < 2 {
        return Err(ServiceError::InvalidInput(
            "At least 2 non-empty options required.".into(),
        ));
    }
    Ok(options)
}

fn new_option_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(OPTION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Arm the single process-wide countdown for `poll_id`.
///
/// Arming aborts any previous timer task, so an orphaned countdown can never
/// end a newer poll. The fired task clears its own slot before ending the
/// poll; it must never abort its own handle.
async fn arm_timer(state: &SharedState, poll_id: Uuid, duration: Duration) {
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        sleep(duration).await;
        task_state.clear_poll_timer(poll_id).await;
        match end_poll(&task_state, poll_id).await {
            Ok(true) => {}
            Ok(false) => info!(poll_id = %poll_id, "countdown elapsed but poll was already ended"),
            Err(err) => warn!(poll_id = %poll_id, error = %err, "failed to end poll on countdown"),
        }
    });
    state.arm_poll_timer(PollTimer { poll_id, handle }).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_each_option_independently() {
        assert_eq!(percent(3, 4), 75);
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(0, 4), 0);

        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
    }

    #[test]
    fn test_percent_zero_votes() {
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn test_build_options_filters_blanks() {
        let texts = vec![
            "A".to_string(),
            "   ".to_string(),
            " B ".to_string(),
        ];
        let options = build_options(&texts, Some(2)).expect("two survivors");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].text, "A");
        assert_eq!(options[1].text, "B");
        assert!(!options[0].is_correct);
        // The correct index refers to the submitted array, blanks included.
        assert!(options[1].is_correct);
    }

    #[test]
    fn test_build_options_requires_two_survivors() {
        let texts = vec!["A".to_string(), "  ".to_string()];
        assert!(matches!(
            build_options(&texts, None),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_option_ids_are_alphanumeric() {
        let id = new_option_id();
        assert_eq!(id.len(), OPTION_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
