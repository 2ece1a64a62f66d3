//! League snapshots: fetch, flatten, dedupe.
//!
//! Ladder endpoints nest their player rows differently depending on the
//! endpoint and its version. Rather than model each shape, the payload is
//! walked as a tree and every object a [`RowExtractor`] recognises becomes a
//! [`RawLadderRow`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::coalesce::Coalescer;
use crate::model::LadderScope;
use crate::ranking::LadderInputRow;
use crate::ttl_cache::TtlCache;
use crate::upstream::LadderApi;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLadderRow {
    pub race: i64,
    pub rating: f64,
    pub games: u32,
    pub wins: u32,
    pub battle_tag: Option<String>,
    pub battle_tag_lower: Option<String>,
    pub player_id_lower: Option<String>,
}

impl RawLadderRow {
    pub fn win_pct(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games)
        }
    }

    fn identity(&self) -> &str {
        self.battle_tag_lower
            .as_deref()
            .or(self.player_id_lower.as_deref())
            .unwrap_or("")
    }
}

/// Decides whether one JSON object is a player row and pulls its fields.
pub trait RowExtractor {
    fn extract(&self, obj: &Map<String, Value>) -> Option<RawLadderRow>;
}

/// Reads rows the way the public ladder endpoints lay them out: top-level
/// `race`, rating and counters either inline or under `player`, identity from
/// `player1Id` or the battle-tag fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRowExtractor;

impl RowExtractor for DefaultRowExtractor {
    fn extract(&self, obj: &Map<String, Value>) -> Option<RawLadderRow> {
        let player = obj.get("player").and_then(Value::as_object);
        let field = |key: &str| inline_or_nested(obj, player, key);

        let race = to_num(obj.get("race"));
        let rating = to_num(field("mmr"));
        let games = to_num(field("games"));
        let wins = to_num(field("wins").or_else(|| field("won"))).unwrap_or(0.0);

        let from_tag_fields = to_str(obj.get("battleTag"))
            .or_else(|| to_str(obj.get("battletag")))
            .or_else(|| to_str(player.and_then(|p| p.get("battleTag"))))
            .or_else(|| to_str(player.and_then(|p| p.get("battletag"))));
        let from_player1 = to_str(field("player1Id"));
        let from_id_fields = to_str(obj.get("playerId"))
            .or_else(|| to_str(player.and_then(|p| p.get("playerId"))))
            .or_else(|| to_str(obj.get("id")));

        let battle_tag = match from_player1 {
            Some(id) if looks_like_battle_tag(&id) => Some(id),
            _ => from_tag_fields,
        };
        let player_id = from_id_fields.filter(|id| !looks_like_battle_tag(id));

        let battle_tag_lower = battle_tag.as_ref().map(|t| t.to_lowercase());
        let player_id_lower = player_id.map(|id| id.to_lowercase());
        if battle_tag_lower.is_none() && player_id_lower.is_none() {
            return None;
        }

        Some(RawLadderRow {
            race: race? as i64,
            rating: rating?.round(),
            games: to_count(games?),
            wins: to_count(wins),
            battle_tag,
            battle_tag_lower,
            player_id_lower,
        })
    }
}

struct LadderVisitor<'a, E: ?Sized> {
    extractor: &'a E,
    seen: HashSet<String>,
    rows: Vec<RawLadderRow>,
}

impl<E: RowExtractor + ?Sized> LadderVisitor<'_, E> {
    fn visit(&mut self, node: &Value) {
        match node {
            Value::Array(items) => {
                for item in items {
                    self.visit(item);
                }
            }
            Value::Object(obj) => {
                if let Some(row) = self.extractor.extract(obj) {
                    self.push(row);
                }
                for child in obj.values() {
                    if child.is_array() {
                        self.visit(child);
                    }
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, row: RawLadderRow) {
        let key = format!("{}|{}", row.race, row.identity());
        if self.seen.insert(key) {
            self.rows.push(row);
        }
    }
}

/// Every player row in `payload`, first occurrence per `(race, identity)`.
pub fn flatten_ladder(payload: &Value) -> Vec<RawLadderRow> {
    flatten_with(payload, &DefaultRowExtractor)
}

pub fn flatten_with<E: RowExtractor + ?Sized>(payload: &Value, extractor: &E) -> Vec<RawLadderRow> {
    let mut visitor = LadderVisitor {
        extractor,
        seen: HashSet::new(),
        rows: Vec::new(),
    };
    visitor.visit(payload);
    visitor.rows
}

/// Collapses rows to one per lower-cased battle-tag (highest rating wins,
/// earlier row on a tie, first-seen order kept), then applies the entry
/// filters. Rows without a battle-tag cannot be ranked and are skipped.
pub fn build_inputs(rows: &[RawLadderRow], min_games: u32) -> Vec<LadderInputRow> {
    let mut best: Vec<&RawLadderRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let Some(key) = row.battle_tag_lower.as_deref() else {
            continue;
        };
        match index.get(key) {
            Some(&slot) => {
                if row.rating > best[slot].rating {
                    best[slot] = row;
                }
            }
            None => {
                index.insert(key, best.len());
                best.push(row);
            }
        }
    }

    best.into_iter()
        .filter(|r| r.games >= min_games && r.rating > 0.0)
        .map(input_row)
        .collect()
}

/// Rows of one race with enough games, as ranking candidates.
pub fn race_inputs(rows: &[RawLadderRow], race: i64, min_games: u32) -> Vec<LadderInputRow> {
    rows.iter()
        .filter(|r| r.race == race && r.games >= min_games && r.rating > 0.0)
        .filter(|r| r.battle_tag.is_some())
        .map(input_row)
        .collect()
}

fn input_row(row: &RawLadderRow) -> LadderInputRow {
    LadderInputRow {
        battle_tag: row.battle_tag.clone().unwrap_or_default(),
        rating: row.rating,
        wins: row.wins,
        games: row.games,
        sos: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankPosition {
    pub rank: usize,
    pub total: usize,
    /// Rating and games of the matched row.
    pub rating: f64,
    pub games: u32,
}

/// Position of a player among the rows of `race` ordered by rating, then win
/// percentage, then games. Matches on battle-tag or, failing that, player id.
pub fn rank_by_rating(
    rows: &[RawLadderRow],
    battle_tag_lower: &str,
    player_id_lower: Option<&str>,
    race: i64,
    min_games: u32,
) -> Option<RankPosition> {
    let mut pool: Vec<&RawLadderRow> = rows
        .iter()
        .filter(|r| r.race == race && r.games >= min_games)
        .collect();
    pool.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then_with(|| b.win_pct().total_cmp(&a.win_pct()))
            .then_with(|| b.games.cmp(&a.games))
    });

    let idx = pool.iter().position(|r| {
        r.battle_tag_lower.as_deref() == Some(battle_tag_lower)
            || player_id_lower.is_some_and(|pid| r.player_id_lower.as_deref() == Some(pid))
    })?;

    Some(RankPosition {
        rank: idx + 1,
        total: pool.len(),
        rating: pool[idx].rating,
        games: pool[idx].games,
    })
}

pub type Snapshot = Arc<Vec<RawLadderRow>>;

/// Leaderboard snapshots per scope, cached briefly and fetched at most once
/// at a time.
pub struct LeaderboardFetcher {
    api: Arc<dyn LadderApi>,
    max_league: u32,
    ttl: Duration,
    cache: Arc<TtlCache<String, Snapshot>>,
    inflight: Coalescer<String, Snapshot>,
}

impl LeaderboardFetcher {
    pub fn new(api: Arc<dyn LadderApi>, max_league: u32, ttl: Duration) -> Self {
        Self {
            api,
            max_league,
            ttl,
            cache: Arc::new(TtlCache::new()),
            inflight: Coalescer::new(),
        }
    }

    /// Flattened rows of league tiers `0..=max_league`, requested concurrently.
    /// A failed tier contributes nothing.
    pub async fn fetch_all_leagues(&self, scope: LadderScope) -> Snapshot {
        let key = format!("leagues:{}", scope.cache_key());
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, rows = hit.len(), "league cache hit");
            return hit;
        }

        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let max_league = self.max_league;
        let cache_key = key.clone();

        self.inflight
            .run(key, move || async move {
                let pages = join_all((0..=max_league).map(|league| {
                    let api = Arc::clone(&api);
                    async move {
                        match api.league_page(league, &scope).await {
                            Ok(page) => page,
                            Err(err) => {
                                warn!(league, error = %err, "league page failed");
                                Value::Null
                            }
                        }
                    }
                }))
                .await;
                let rows: Snapshot = Arc::new(flatten_ladder(&Value::Array(pages)));
                info!(
                    season = scope.season,
                    gateway = scope.gateway,
                    rows = rows.len(),
                    "league snapshot built"
                );
                cache.set(cache_key, Arc::clone(&rows), ttl);
                rows
            })
            .await
    }

    pub async fn fetch_country_ladder(&self, country: &str, scope: LadderScope) -> Vec<RawLadderRow> {
        if country.trim().is_empty() {
            return Vec::new();
        }
        match self.api.country_ladder(country, &scope).await {
            Ok(payload) if payload.is_array() => flatten_ladder(&payload),
            Ok(_) => Vec::new(),
            Err(err) => {
                warn!(country, error = %err, "country ladder failed");
                Vec::new()
            }
        }
    }
}

/// `obj[key]`, or `player[key]` when the former is absent or null.
fn inline_or_nested<'a>(
    obj: &'a Map<String, Value>,
    player: Option<&'a Map<String, Value>>,
    key: &str,
) -> Option<&'a Value> {
    present(obj.get(key)).or_else(|| present(player.and_then(|p| p.get(key))))
}

fn present(v: Option<&Value>) -> Option<&Value> {
    v.filter(|v| !v.is_null())
}

fn to_num(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn to_str(v: Option<&Value>) -> Option<String> {
    let s = v?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn to_count(n: f64) -> u32 {
    n.trunc().clamp(0.0, f64::from(u32::MAX)) as u32
}

fn looks_like_battle_tag(s: &str) -> bool {
    s.contains('#')
}
