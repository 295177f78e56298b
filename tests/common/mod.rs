//! Common test utilities

use std::sync::Arc;

use chrono::NaiveDate;
use showrunner::models::{ContentRef, Episode};
use showrunner::storage::MemoryRepository;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Episodes `1..=per_season` for every season `1..=seasons`
pub fn episodes(content_id: &str, seasons: u32, per_season: u32, minutes: u32) -> Vec<Episode> {
    (1..=seasons)
        .flat_map(|season| {
            (1..=per_season).map(move |number| Episode::new(content_id, season, number).with_duration(minutes))
        })
        .collect()
}

/// Add a single-season show with `count` 25-minute episodes
pub fn add_show(repo: &MemoryRepository, id: &str, count: u32) {
    repo.add_content(ContentRef::episodic(id, format!("Show {id}")));
    repo.add_episodes(episodes(id, 1, count, 25));
}

/// Add a multi-season show
#[allow(dead_code)]
pub fn add_seasons(repo: &MemoryRepository, id: &str, seasons: u32, per_season: u32) {
    repo.add_content(ContentRef::episodic(id, format!("Show {id}")));
    repo.add_episodes(episodes(id, seasons, per_season, 25));
}

#[allow(dead_code)]
pub fn add_movie(repo: &MemoryRepository, id: &str, runtime: u32) {
    repo.add_content(ContentRef::movie(id, format!("Movie {id}"), runtime));
}

/// Repository holding single-season shows `(id, episode count)`
pub fn repo_with_shows(shows: &[(&str, u32)]) -> Arc<MemoryRepository> {
    let repo = Arc::new(MemoryRepository::new());
    for (id, count) in shows {
        add_show(&repo, id, *count);
    }
    repo
}

/// `(content_id, season, episode)` of each item, for compact assertions
#[allow(dead_code)]
pub fn sequence(items: &[showrunner::ScheduleItem]) -> Vec<(String, Option<u32>, Option<u32>)> {
    items
        .iter()
        .map(|item| (item.content_id.clone(), item.season, item.episode))
        .collect()
}
