//! End-to-end generation runs over the in-memory repository

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{add_movie, add_seasons, add_show, date, episodes, repo_with_shows, sequence};
use showrunner::config::EngineConfig;
use showrunner::models::{ContentRef, Episode, EpisodeKey};
use showrunner::scheduler::schedule::NO_CONTENT_AVAILABLE;
use showrunner::scheduler::{
    ContentSelection, EpisodeFilterRule, GenerationRequest, GenerationStatus, RerunFrequency, RotationStrategy,
    ScheduleEngine, SlotSpec, UserPreferences,
};
use showrunner::storage::{
    CursorRepository, MemoryRepository, PreferencesRepository, ScheduleStore, WatchQueueRepository,
};

fn engine(repo: &Arc<MemoryRepository>) -> ScheduleEngine {
    ScheduleEngine::from_repository(repo.clone(), EngineConfig::default())
}

fn request(start: u32, end: u32, labels: &[&str], shows: &[&str]) -> GenerationRequest {
    GenerationRequest::new(date(2024, 1, start), date(2024, 1, end), SlotSpec::labels(labels.iter().copied()))
        .with_selection(ContentSelection::explicit(shows.iter().copied()))
        .with_as_of(date(2024, 1, 1))
}

fn s(id: &str, season: u32, episode: u32) -> (String, Option<u32>, Option<u32>) {
    (id.to_string(), Some(season), Some(episode))
}

#[tokio::test]
async fn test_two_shows_alternate_across_slots() {
    let repo = repo_with_shows(&[("a", 3), ("b", 3)]);
    let outcome = engine(&repo)
        .generate("u1", &request(1, 2, &["19:00", "20:00"], &["a", "b"]))
        .await
        .unwrap();

    assert_eq!(outcome.status, GenerationStatus::Scheduled);
    assert_eq!(
        sequence(&outcome.items),
        vec![s("a", 1, 1), s("b", 1, 1), s("a", 1, 2), s("b", 1, 2)]
    );
    assert_eq!(outcome.summary.total_slots, 4);
    assert_eq!(outcome.summary.skipped_slots, 0);
    assert_eq!(repo.len(), 4);

    let first = &outcome.items[0];
    assert_eq!(first.scheduled_at, Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap());
    assert_eq!(first.duration_minutes, 25);
    assert!(!first.is_rerun);
    assert!(outcome.items.iter().all(|item| item.run_id == outcome.run_id));
}

#[tokio::test]
async fn test_nothing_eligible_reports_no_content() {
    let repo = Arc::new(MemoryRepository::new());
    let outcome = engine(&repo)
        .generate("u1", &request(1, 3, &["20:00"], &["missing"]))
        .await
        .unwrap();

    assert!(outcome.is_nothing_schedulable());
    assert_eq!(
        outcome.status,
        GenerationStatus::NothingSchedulable {
            reason: NO_CONTENT_AVAILABLE.to_string()
        }
    );
    assert!(outcome.items.is_empty());
    assert_eq!(outcome.summary.skipped_slots, 3);
    assert!(repo.is_empty());
}

#[tokio::test]
async fn test_empty_queue_is_nothing_schedulable() {
    let repo = repo_with_shows(&[("a", 3)]);
    let req = request(1, 1, &["20:00"], &[]).with_selection(ContentSelection::Queue);

    let outcome = engine(&repo).generate("u1", &req).await.unwrap();
    assert!(outcome.is_nothing_schedulable());
}

#[tokio::test]
async fn test_queue_order_drives_rotation() {
    let repo = repo_with_shows(&[("a", 3), ("b", 3)]);
    repo.set_queue("u1", &["b".to_string(), "a".to_string()]).unwrap();

    let req = request(1, 1, &["19:00", "20:00", "21:00"], &[]).with_selection(ContentSelection::Queue);
    let outcome = engine(&repo).preview("u1", &req).await.unwrap();

    assert_eq!(
        sequence(&outcome.items),
        vec![s("b", 1, 1), s("a", 1, 1), s("b", 1, 2)]
    );
}

#[tokio::test]
async fn test_episode_filters_restrict_seasons() {
    let repo = Arc::new(MemoryRepository::new());
    add_seasons(&repo, "a", 2, 2);

    let req = request(1, 3, &["20:00"], &["a"]).with_filter("a", EpisodeFilterRule::include_seasons([2]));
    let outcome = engine(&repo).preview("u1", &req).await.unwrap();

    assert_eq!(sequence(&outcome.items), vec![s("a", 2, 1), s("a", 2, 2)]);
    assert_eq!(outcome.summary.skipped_slots, 1);
}

#[tokio::test]
async fn test_reruns_fill_slots_after_exhaustion() {
    let repo = repo_with_shows(&[("a", 2)]);
    let req = request(1, 4, &["20:00"], &["a"]).with_reruns(true, RerunFrequency::High);

    let outcome = engine(&repo).preview("u1", &req).await.unwrap();

    assert_eq!(
        sequence(&outcome.items),
        vec![s("a", 1, 1), s("a", 1, 2), s("a", 1, 1), s("a", 1, 2)]
    );
    let flags: Vec<bool> = outcome.items.iter().map(|item| item.is_rerun).collect();
    assert_eq!(flags, vec![false, false, true, true]);
    assert_eq!(outcome.summary.reruns, 2);
    assert_eq!(outcome.summary.skipped_slots, 0);

    // Reruns never move the cursor
    assert_eq!(outcome.cursors[0].next, EpisodeKey::new(1, 3));
}

#[tokio::test]
async fn test_filtered_out_episodes_never_return_as_reruns() {
    let repo = Arc::new(MemoryRepository::new());
    add_seasons(&repo, "a", 2, 1);
    let engine = engine(&repo);

    // An unfiltered run schedules both seasons and finishes the show
    let first = engine
        .generate_and_commit("u1", &request(1, 2, &["20:00"], &["a"]))
        .await
        .unwrap();
    assert_eq!(sequence(&first.items), vec![s("a", 1, 1), s("a", 2, 1)]);

    let req = request(3, 6, &["20:00"], &["a"])
        .with_filter("a", EpisodeFilterRule::exclude_seasons([1]))
        .with_reruns(true, RerunFrequency::High);
    let outcome = engine.preview("u1", &req).await.unwrap();

    assert_eq!(outcome.items.len(), 4);
    assert!(outcome.items.iter().all(|item| item.is_rerun && item.season == Some(2)));
}

#[tokio::test]
async fn test_reruns_disabled_by_default() {
    let repo = repo_with_shows(&[("a", 1)]);
    let outcome = engine(&repo).preview("u1", &request(1, 3, &["20:00"], &["a"])).await.unwrap();

    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.summary.skipped_slots, 2);
}

#[tokio::test]
async fn test_prefetch_failure_is_not_fatal() {
    let repo = repo_with_shows(&[("a", 2)]);
    repo.fail_fetch("a");

    repo.add_content(ContentRef::episodic("c", "Remote Show"));
    repo.stage_remote_episodes("c", episodes("c", 1, 2, 40));

    let outcome = engine(&repo)
        .preview("u1", &request(1, 2, &["19:00", "20:00"], &["a", "c"]))
        .await
        .unwrap();

    assert_eq!(outcome.summary.shows_prefetched, 1);
    assert_eq!(outcome.summary.shows_considered, 2);
    assert_eq!(
        sequence(&outcome.items),
        vec![s("a", 1, 1), s("c", 1, 1), s("a", 1, 2), s("c", 1, 2)]
    );
    assert_eq!(outcome.items[1].duration_minutes, 40);
}

#[tokio::test]
async fn test_committed_cursors_carry_into_next_run() {
    let repo = repo_with_shows(&[("a", 5)]);
    let engine = engine(&repo);

    let first = engine
        .generate_and_commit("u1", &request(1, 2, &["20:00"], &["a"]))
        .await
        .unwrap();
    assert_eq!(sequence(&first.items), vec![s("a", 1, 1), s("a", 1, 2)]);

    let stored = repo.get_cursors("u1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].next, EpisodeKey::new(1, 3));

    let second = engine
        .generate_and_commit("u1", &request(3, 4, &["20:00"], &["a"]))
        .await
        .unwrap();
    assert_eq!(sequence(&second.items), vec![s("a", 1, 3), s("a", 1, 4)]);
    assert_eq!(repo.list_items("u1").unwrap().len(), 4);
}

#[tokio::test]
async fn test_concurrent_runs_for_one_user_never_repeat_episodes() {
    let repo = repo_with_shows(&[("a", 10)]);
    let engine = engine(&repo);
    let req = request(1, 3, &["20:00"], &["a"]);

    let (left, right) = tokio::join!(
        engine.generate_and_commit("u1", &req),
        engine.generate_and_commit("u1", &req)
    );

    let mut seen = HashSet::new();
    for item in left.unwrap().items.iter().chain(right.unwrap().items.iter()) {
        assert!(seen.insert((item.season, item.episode)), "episode scheduled twice");
    }
    assert_eq!(seen.len(), 6);
}

#[tokio::test]
async fn test_unordered_labels_stay_on_requested_date() {
    let repo = repo_with_shows(&[("a", 3)]);
    let outcome = engine(&repo)
        .preview("u1", &request(1, 1, &["21:00", "19:00"], &["a"]))
        .await
        .unwrap();

    let instants: Vec<_> = outcome.items.iter().map(|item| item.scheduled_at).collect();
    assert_eq!(
        instants,
        vec![
            Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap(),
        ]
    );
    assert_eq!(outcome.summary.total_slots, 2);
}

#[tokio::test]
async fn test_failed_cursor_save_leaves_no_items_behind() {
    let repo = repo_with_shows(&[("a", 4)]);
    let engine = engine(&repo);
    let req = request(1, 2, &["20:00"], &["a"]);

    repo.fail_cursor_saves(true);
    assert!(engine.generate_and_commit("u1", &req).await.is_err());
    assert!(repo.list_items("u1").unwrap().is_empty());

    repo.fail_cursor_saves(false);
    let outcome = engine.generate_and_commit("u1", &req).await.unwrap();
    assert_eq!(sequence(&outcome.items), vec![s("a", 1, 1), s("a", 1, 2)]);
    assert_eq!(repo.list_items("u1").unwrap().len(), 2);
}

#[tokio::test]
async fn test_timezone_offset_shifts_instants() {
    let repo = repo_with_shows(&[("a", 2)]);
    let req = request(1, 1, &["20:00"], &["a"]).with_timezone_offset("-05:00");

    let outcome = engine(&repo).preview("u1", &req).await.unwrap();
    assert_eq!(
        outcome.items[0].scheduled_at,
        Utc.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_preview_is_repeatable_and_stores_nothing() {
    let repo = repo_with_shows(&[("a", 3), ("b", 3)]);
    let engine = engine(&repo);
    let req = request(1, 2, &["20:00"], &["a", "b"]);

    let first = engine.preview("u1", &req).await.unwrap();
    let second = engine.preview("u1", &req).await.unwrap();

    assert_eq!(sequence(&first.items), sequence(&second.items));
    assert_ne!(first.run_id, second.run_id);
    assert!(repo.is_empty());
    assert!(repo.get_cursors("u1").unwrap().is_empty());
}

#[tokio::test]
async fn test_movie_is_scheduled_once() {
    let repo = repo_with_shows(&[("a", 5)]);
    add_movie(&repo, "heat", 170);

    let outcome = engine(&repo)
        .preview("u1", &request(1, 4, &["20:00"], &["heat", "a"]))
        .await
        .unwrap();

    assert_eq!(
        sequence(&outcome.items),
        vec![("heat".to_string(), None, None), s("a", 1, 1), s("a", 1, 2), s("a", 1, 3)]
    );
    assert_eq!(outcome.items[0].duration_minutes, 170);
}

#[tokio::test]
async fn test_future_episodes_are_not_scheduled() {
    let repo = Arc::new(MemoryRepository::new());
    repo.add_content(ContentRef::episodic("a", "Airing"));
    repo.add_episodes([
        Episode::new("a", 1, 1).with_air_date(date(2023, 12, 1)),
        Episode::new("a", 1, 2).with_air_date(date(2024, 2, 1)),
    ]);

    let outcome = engine(&repo)
        .preview("u1", &request(1, 2, &["20:00"], &["a"]))
        .await
        .unwrap();

    assert_eq!(sequence(&outcome.items), vec![s("a", 1, 1)]);
}

#[tokio::test]
async fn test_stored_preferences_allow_parallel_shows() {
    let repo = repo_with_shows(&[("a", 3), ("b", 3)]);
    repo.save_preferences(
        "u1",
        &UserPreferences {
            max_concurrent_shows: 2,
            ..Default::default()
        },
    )
    .unwrap();

    let outcome = engine(&repo)
        .preview("u1", &request(1, 1, &["20:00"], &["a", "b"]))
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.items[0].scheduled_at, outcome.items[1].scheduled_at);
    assert_ne!(outcome.items[0].content_id, outcome.items[1].content_id);
}

#[tokio::test]
async fn test_seeded_random_strategy_is_reproducible() {
    let repo = Arc::new(MemoryRepository::new());
    for id in ["a", "b", "c", "d"] {
        add_show(&repo, id, 4);
    }
    let engine = engine(&repo);
    let req = request(1, 4, &["19:00", "20:00"], &["a", "b", "c", "d"])
        .with_strategy(RotationStrategy::Random)
        .with_seed(7);

    let first = engine.preview("u1", &req).await.unwrap();
    let second = engine.preview("u1", &req).await.unwrap();
    assert_eq!(sequence(&first.items), sequence(&second.items));
    assert_eq!(first.items.len(), 8);
}

#[tokio::test]
async fn test_window_slots_use_step() {
    let repo = repo_with_shows(&[("a", 10)]);
    let req = GenerationRequest::new(date(2024, 1, 1), date(2024, 1, 1), SlotSpec::window("19:00", "21:00", Some(60)))
        .with_selection(ContentSelection::explicit(["a"]))
        .with_as_of(date(2024, 1, 1));

    let outcome = engine(&repo).preview("u1", &req).await.unwrap();
    assert_eq!(outcome.summary.total_slots, 2);
    assert_eq!(outcome.items[1].scheduled_at, Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap());
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let repo = repo_with_shows(&[("a", 2)]);
    let req = request(1, 1, &["8pm"], &["a"]);

    let err = engine(&repo).generate("u1", &req).await.unwrap_err();
    assert!(err.is_validation());
    assert!(repo.is_empty());
}
