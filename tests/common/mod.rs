#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use ladder_stats::model::LadderScope;
use ladder_stats::upstream::{LadderApi, MatchPageQuery, UpstreamError, UpstreamResult};

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn fixture_json(name: &str) -> Value {
    serde_json::from_str(&read_fixture(name)).expect("fixture should be valid json")
}

pub fn scope() -> LadderScope {
    LadderScope {
        gateway: 20,
        season: 24,
        game_mode: 1,
    }
}

#[derive(Default)]
pub struct Calls {
    pub match_pages: AtomicUsize,
    pub league_pages: AtomicUsize,
    pub country: AtomicUsize,
    pub profile: AtomicUsize,
    pub settings: AtomicUsize,
    pub search: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Scripted upstream. Anything not scripted answers with an empty array.
#[derive(Default)]
pub struct FakeApi {
    match_pages: HashMap<(String, u32, usize), Value>,
    failing_pages: HashSet<(String, u32, usize)>,
    leagues: HashMap<u32, Value>,
    countries: HashMap<String, Value>,
    profiles: HashMap<String, Value>,
    settings: HashMap<String, Value>,
    searches: HashMap<String, Value>,
    delay: Option<Duration>,
    pub calls: Calls,
    pub page_log: Mutex<Vec<MatchPageQuery>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `matches` into pages of `page_size`, starting at offset 0.
    pub fn with_history(mut self, tag: &str, season: u32, matches: Vec<Value>, page_size: usize) -> Self {
        for (idx, chunk) in matches.chunks(page_size).enumerate() {
            self.match_pages.insert(
                (tag.to_lowercase(), season, idx * page_size),
                json!({ "matches": chunk, "count": matches.len() }),
            );
        }
        self
    }

    pub fn with_page(mut self, tag: &str, season: u32, offset: usize, payload: Value) -> Self {
        self.match_pages.insert((tag.to_lowercase(), season, offset), payload);
        self
    }

    pub fn failing_page(mut self, tag: &str, season: u32, offset: usize) -> Self {
        self.failing_pages.insert((tag.to_lowercase(), season, offset));
        self
    }

    pub fn with_league(mut self, league: u32, payload: Value) -> Self {
        self.leagues.insert(league, payload);
        self
    }

    pub fn with_country(mut self, country: &str, payload: Value) -> Self {
        self.countries.insert(country.to_string(), payload);
        self
    }

    pub fn with_profile(mut self, tag: &str, payload: Value) -> Self {
        self.profiles.insert(tag.to_lowercase(), payload);
        self
    }

    pub fn with_settings(mut self, tag: &str, payload: Value) -> Self {
        self.settings.insert(tag.to_lowercase(), payload);
        self
    }

    pub fn with_search(mut self, name: &str, payload: Value) -> Self {
        self.searches.insert(name.to_string(), payload);
        self
    }

    /// Every call sleeps this long first (use with paused time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn page_offsets(&self, tag: &str, season: u32) -> Vec<usize> {
        let lower = tag.to_lowercase();
        let mut offsets: Vec<usize> = self
            .page_log
            .lock()
            .expect("page log lock")
            .iter()
            .filter(|q| q.battle_tag.to_lowercase() == lower && q.season == season)
            .map(|q| q.offset)
            .collect();
        offsets.sort_unstable();
        offsets
    }

    /// Distinct gateways seen on match-page requests, sorted.
    pub fn page_gateways(&self) -> Vec<u32> {
        let mut gateways: Vec<u32> = self
            .page_log
            .lock()
            .expect("page log lock")
            .iter()
            .map(|q| q.gateway)
            .collect();
        gateways.sort_unstable();
        gateways.dedup();
        gateways
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LadderApi for FakeApi {
    async fn match_page(&self, query: &MatchPageQuery) -> UpstreamResult {
        self.calls.match_pages.fetch_add(1, Ordering::SeqCst);
        self.page_log.lock().expect("page log lock").push(query.clone());
        self.pause().await;
        let key = (query.battle_tag.to_lowercase(), query.season, query.offset);
        if self.failing_pages.contains(&key) {
            return Err(UpstreamError::Status { status: 502 });
        }
        Ok(self.match_pages.get(&key).cloned().unwrap_or_else(|| json!([])))
    }

    async fn league_page(&self, league: u32, _scope: &LadderScope) -> UpstreamResult {
        self.calls.league_pages.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.leagues.get(&league).cloned().unwrap_or_else(|| json!([])))
    }

    async fn country_ladder(&self, country: &str, _scope: &LadderScope) -> UpstreamResult {
        self.calls.country.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.countries.get(country).cloned().unwrap_or_else(|| json!([])))
    }

    async fn player_profile(&self, battle_tag: &str) -> UpstreamResult {
        self.calls.profile.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.profiles
            .get(&battle_tag.to_lowercase())
            .cloned()
            .ok_or(UpstreamError::Status { status: 404 })
    }

    async fn personal_settings(&self, battle_tag: &str) -> UpstreamResult {
        self.calls.settings.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.settings
            .get(&battle_tag.to_lowercase())
            .cloned()
            .ok_or(UpstreamError::Status { status: 404 })
    }

    async fn global_search(&self, name: &str, _page_size: usize) -> UpstreamResult {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.searches.get(name).cloned().unwrap_or_else(|| json!([])))
    }
}

pub fn player(tag: &str, race: i64, old_mmr: f64, gain: f64, won: bool) -> Value {
    json!({
        "battleTag": tag,
        "race": race,
        "oldMmr": old_mmr,
        "currentMmr": old_mmr + gain,
        "mmrGain": gain,
        "won": won,
    })
}

/// A 1v1 game; `me` and `opp` are player objects such as [`player`] builds.
pub fn duel(id: &str, start: &str, season: u32, duration: f64, me: Value, opp: Value) -> Value {
    json!({
        "id": id,
        "startTime": start,
        "season": season,
        "gameMode": 1,
        "durationInSeconds": duration,
        "mapName": "Concealed Hill",
        "teams": [{ "players": [me] }, { "players": [opp] }],
    })
}

/// `n` minimal 1v1 games of `tag` against a fixed opponent.
pub fn filler_games(tag: &str, season: u32, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            duel(
                &format!("{tag}-{season}-{i}"),
                "2025-03-01T12:00:00Z",
                season,
                600.0,
                player(tag, 2, 1500.0, 5.0, i % 2 == 0),
                player("Opp#1", 1, 1500.0, -5.0, i % 2 != 0),
            )
        })
        .collect()
}
