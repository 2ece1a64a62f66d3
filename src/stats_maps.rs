use serde::Serialize;

use crate::model::{MatchRecord, player_and_opponent};
use crate::stats_common::{Ordered, round_to};

const LIST_LEN: usize = 5;

/// Inclusive second ranges; games shorter than five minutes fall in none.
const DURATION_BUCKETS: [(&str, f64, f64); 6] = [
    ("5-10 min", 300.0, 600.0),
    ("11-15 min", 601.0, 900.0),
    ("16-20 min", 901.0, 1200.0),
    ("20-25 min", 1201.0, 1500.0),
    ("26-30 min", 1501.0, 1800.0),
    ("30+ min", 1801.0, f64::INFINITY),
];

#[derive(Debug, Default, Clone)]
struct MapAgg {
    games: u32,
    wins: u32,
    losses: u32,
    total_secs: f64,
    net_rating: f64,
    vs_higher: u32,
    vs_lower: u32,
    hero_level_sum: f64,
    hero_level_games: u32,
    hero_counts: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRow {
    pub map: String,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percent, one decimal.
    pub win_rate: f64,
    pub avg_minutes: f64,
    pub net_rating: f64,
    pub vs_higher: u32,
    pub vs_lower: u32,
    pub hero_avg_level: Option<f64>,
    /// Games played with one, two and three heroes.
    pub hero_counts: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationRow {
    pub label: String,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongestWin {
    pub map: String,
    pub minutes: f64,
    pub opp_tag: String,
    pub opp_rating: Option<f64>,
    pub rating_change: f64,
    pub secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapReport {
    pub battle_tag: String,
    pub maps: Vec<MapRow>,
    pub top_maps: Vec<MapRow>,
    pub worst_maps: Vec<MapRow>,
    pub durations: Vec<DurationRow>,
    pub longest_win: Option<LongestWin>,
}

/// Human map name: `mapName` when present, else the raw `map` id with its
/// lower-case prefix and `v<digits>_...` version suffix stripped.
pub fn resolve_map_name(m: &MatchRecord) -> String {
    if let Some(name) = m.map_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match m.map.as_deref() {
        Some(raw) => strip_map_id(raw),
        None => "Unknown".to_string(),
    }
}

fn strip_map_id(raw: &str) -> String {
    let start = raw.find(|c: char| c.is_ascii_uppercase()).unwrap_or(0);
    let name = &raw[start..];
    let end = version_suffix_at(name).unwrap_or(name.len());
    name[..end].trim().to_string()
}

/// Byte offset of the first `v<digits>_`.
fn version_suffix_at(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..bytes.len()).find(|&i| {
        if bytes[i] != b'v' {
            return false;
        }
        let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        digits > 0 && bytes.get(i + 1 + digits) == Some(&b'_')
    })
}

/// Per-map results over qualifying games of `game_mode` that report a
/// rating change.
pub fn map_breakdown(matches: &[MatchRecord], battle_tag: &str, game_mode: u32) -> MapReport {
    let mut maps: Ordered<String, MapAgg> = Ordered::default();
    let mut durations = DURATION_BUCKETS.map(|(label, _, _)| DurationRow {
        label: label.to_string(),
        wins: 0,
        losses: 0,
    });
    let mut longest_win: Option<LongestWin> = None;

    for m in matches.iter().filter(|m| m.is_qualifying(game_mode)) {
        let Some(pair) = player_and_opponent(m, battle_tag) else {
            continue;
        };
        let (me, opp) = (pair.me, pair.opp);
        let Some(gain) = me.mmr_gain else {
            continue;
        };
        let dur = m.duration();
        let map = resolve_map_name(m);

        let agg = maps.entry(map.clone());
        agg.games += 1;
        agg.total_secs += dur;
        agg.net_rating += gain;
        if let (Some(mine), Some(theirs)) = (me.old_mmr, opp.old_mmr) {
            if mine < theirs {
                agg.vs_higher += 1;
            }
            if mine > theirs {
                agg.vs_lower += 1;
            }
        }

        if let Some(idx) = DURATION_BUCKETS
            .iter()
            .position(|&(_, lo, hi)| dur >= lo && dur <= hi)
        {
            if me.won {
                durations[idx].wins += 1;
            } else {
                durations[idx].losses += 1;
            }
        }

        if me.won {
            agg.wins += 1;
            if longest_win.as_ref().is_none_or(|w| dur > w.secs) {
                longest_win = Some(LongestWin {
                    map,
                    minutes: round_to(dur / 60.0, 1),
                    opp_tag: opp.tag().to_string(),
                    opp_rating: opp.old_mmr,
                    rating_change: gain,
                    secs: dur,
                });
            }
        } else {
            agg.losses += 1;
        }

        let heroes = me.hero_list();
        if (1..=3).contains(&heroes.len()) {
            agg.hero_counts[heroes.len() - 1] += 1;
        }
        if !heroes.is_empty() {
            let avg = heroes.iter().map(|h| h.level.unwrap_or(0.0)).sum::<f64>() / heroes.len() as f64;
            if avg.is_finite() {
                agg.hero_level_sum += avg;
                agg.hero_level_games += 1;
            }
        }
    }

    let rows: Vec<MapRow> = maps
        .into_entries()
        .into_iter()
        .filter(|(_, agg)| agg.games > 0)
        .map(|(map, agg)| {
            let games = f64::from(agg.games);
            MapRow {
                map,
                games: agg.games,
                wins: agg.wins,
                losses: agg.losses,
                win_rate: round_to(f64::from(agg.wins) / games * 100.0, 1),
                avg_minutes: round_to(agg.total_secs / games / 60.0, 1),
                net_rating: agg.net_rating,
                vs_higher: agg.vs_higher,
                vs_lower: agg.vs_lower,
                hero_avg_level: (agg.hero_level_games > 0)
                    .then(|| round_to(agg.hero_level_sum / f64::from(agg.hero_level_games), 2)),
                hero_counts: agg.hero_counts,
            }
        })
        .collect();

    let mut by_rate = rows.clone();
    by_rate.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
    let top_maps: Vec<MapRow> = by_rate.iter().take(LIST_LEN).cloned().collect();
    let worst_maps: Vec<MapRow> = by_rate.iter().rev().take(LIST_LEN).cloned().collect();

    MapReport {
        battle_tag: battle_tag.to_string(),
        maps: rows,
        top_maps,
        worst_maps,
        durations: durations.into_iter().collect(),
        longest_win,
    }
}
