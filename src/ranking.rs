//! Composite ladder score and rank assignment. Pure; no I/O.

use serde::{Deserialize, Serialize};

/// Ratings above this are treated as data errors and never ranked.
pub const RATING_CAP: f64 = 3000.0;

const W_RATING: f64 = 0.50;
const W_SOS: f64 = 0.40;
const W_ACTIVITY: f64 = 0.10;

const ACTIVITY_STEP: u32 = 5;
const ACTIVITY_MAX_GAMES: u32 = 200;
const ACTIVITY_MAX_SCORE: f64 = 2000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderInputRow {
    pub battle_tag: String,
    pub rating: f64,
    pub wins: u32,
    pub games: u32,
    pub sos: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderRow {
    pub rank: usize,
    pub battle_tag: String,
    pub rating: f64,
    pub sos: Option<f64>,
    pub score: f64,
    pub wins: u32,
    pub losses: u32,
    pub games: u32,
}

/// Games bucketed in steps of five, capped at 200, rescaled to 0..=2000.
pub fn activity_score(games: u32) -> f64 {
    let bucket = ((games / ACTIVITY_STEP) * ACTIVITY_STEP).min(ACTIVITY_MAX_GAMES);
    f64::from(bucket) / f64::from(ACTIVITY_MAX_GAMES) * ACTIVITY_MAX_SCORE
}

/// Weighted rating/schedule/activity sum, rounded to an integer and shifted
/// one decimal place. Unknown schedule strength counts as the player's own
/// rating.
pub fn compute_score(rating: f64, sos: Option<f64>, games: u32) -> f64 {
    let sos = sos.unwrap_or(rating);
    let raw = rating * W_RATING + sos * W_SOS + activity_score(games) * W_ACTIVITY;
    raw.round() / 10.0
}

/// Scores, orders and ranks `rows`.
///
/// Order is score descending, then rating descending, then lower-cased
/// battle-tag ascending, so ranks are `1..=n` and independent of input order.
pub fn build_ladder(rows: Vec<LadderInputRow>) -> Vec<LadderRow> {
    let mut ladder: Vec<(String, LadderRow)> = rows
        .into_iter()
        .filter(|r| r.rating <= RATING_CAP)
        .map(|r| {
            let row = LadderRow {
                rank: 0,
                score: compute_score(r.rating, r.sos, r.games),
                losses: r.games.saturating_sub(r.wins),
                battle_tag: r.battle_tag,
                rating: r.rating,
                sos: r.sos,
                wins: r.wins,
                games: r.games,
            };
            (row.battle_tag.to_lowercase(), row)
        })
        .collect();

    ladder.sort_by(|(a_key, a), (b_key, b)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a_key.cmp(b_key))
    });

    ladder
        .into_iter()
        .enumerate()
        .map(|(idx, (_, mut row))| {
            row.rank = idx + 1;
            row
        })
        .collect()
}
