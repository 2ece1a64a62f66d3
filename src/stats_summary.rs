use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MIN_DURATION_SECONDS;
use crate::model::{MatchRecord, PlayerRecord, player_and_opponent, race_label};
use crate::stats_common::Ordered;

/// Qualifying games with a race before its peak rating is tracked.
const PEAK_MIN_GAMES: u32 = 35;
const MAX_ABS_GAIN: f64 = 30.0;
const HIGH_GAIN_THRESHOLD: f64 = 15.0;
/// Seasons back from the current one that count towards peaks and gains.
const RECENT_SEASONS_BACK: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RacePeak {
    pub race: String,
    pub rating: f64,
    pub season: Option<u32>,
    /// Index of the qualifying game (per race) that set the peak.
    pub game: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotableGame {
    pub my_race: String,
    pub my_rating: Option<f64>,
    pub opp_name: String,
    pub opp_race: String,
    pub opp_rating: Option<f64>,
}

impl NotableGame {
    fn new(me: &PlayerRecord, opp: &PlayerRecord) -> Self {
        Self {
            my_race: race_label(me.race).to_string(),
            my_rating: me.old_mmr,
            opp_name: opp.tag().to_string(),
            opp_race: race_label(opp.race).to_string(),
            opp_rating: opp.old_mmr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GainGame {
    pub gain: f64,
    #[serde(flatten)]
    pub game: NotableGame,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapGame {
    pub gap: f64,
    #[serde(flatten)]
    pub game: NotableGame,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub battle_tag: String,
    pub most_played_all_time: String,
    pub most_played_this_season: String,
    pub highest_current_race: Option<String>,
    pub highest_current_rating: Option<f64>,
    pub last_played: Option<DateTime<Utc>>,
    pub last_played_race: BTreeMap<String, DateTime<Utc>>,
    pub top_peaks: Vec<RacePeak>,
    pub gain_games: Vec<GainGame>,
    pub largest_gap_win: Option<GapGame>,
}

/// Career overview across the summary season window.
pub fn summarize(matches: &[MatchRecord], battle_tag: &str, current_season: u32, game_mode: u32) -> PlayerSummary {
    let recent = current_season.saturating_sub(RECENT_SEASONS_BACK)..=current_season;

    let mut games_all_time: Ordered<&'static str, u32> = Ordered::default();
    let mut games_this_season: Ordered<&'static str, u32> = Ordered::default();
    let mut last_played_race: BTreeMap<&'static str, DateTime<Utc>> = BTreeMap::new();
    let mut current_rating: BTreeMap<&'static str, Option<f64>> = BTreeMap::new();
    let mut qualifying: BTreeMap<&'static str, u32> = BTreeMap::new();
    let mut peaks: Ordered<&'static str, Option<RacePeak>> = Ordered::default();

    let mut highest_current: Option<&'static str> = None;
    let mut last_played: Option<DateTime<Utc>> = None;
    let mut largest_gap_win: Option<GapGame> = None;
    let mut largest_gain: Option<GainGame> = None;
    let mut high_gains: Vec<GainGame> = Vec::new();

    for m in matches.iter().filter(|m| m.is_game_mode(game_mode)) {
        let Some(pair) = player_and_opponent(m, battle_tag) else {
            continue;
        };
        let (me, opp) = (pair.me, pair.opp);
        let race = race_label(me.race);
        let date = m.start_time;
        let prev = last_played_race.get(race).copied();

        *games_all_time.entry(race) += 1;

        if m.season == Some(current_season) {
            *games_this_season.entry(race) += 1;
            let newer = match (date, prev) {
                (_, None) => true,
                (Some(d), Some(p)) => d > p,
                (None, Some(_)) => false,
            };
            if newer {
                current_rating.insert(race, me.current_mmr);
            }
        }

        if let Some(d) = date {
            if prev.is_none_or(|p| d > p) {
                last_played_race.insert(race, d);
            }
            if last_played.is_none_or(|p| d > p) {
                last_played = Some(d);
            }
        }

        let rating_of = |r: &str| current_rating.get(r).copied().flatten().unwrap_or(0.0);
        if highest_current.is_none_or(|h| rating_of(race) > rating_of(h)) {
            highest_current = Some(race);
        }

        let Some(gain) = me.mmr_gain else {
            continue;
        };
        let in_window = m.season.is_some_and(|s| recent.contains(&s));
        if m.duration() < MIN_DURATION_SECONDS || !in_window || gain.abs() > MAX_ABS_GAIN {
            continue;
        }

        let counter = qualifying.entry(race).or_insert(0);
        *counter += 1;
        let game_index = *counter;

        if game_index > PEAK_MIN_GAMES {
            if let Some(rating) = me.current_mmr {
                let peak = peaks.entry(race);
                if peak.as_ref().is_none_or(|p| rating > p.rating) {
                    *peak = Some(RacePeak {
                        race: race.to_string(),
                        rating,
                        season: m.season,
                        game: game_index,
                    });
                }
            }
        }

        let gain_game = GainGame {
            gain,
            game: NotableGame::new(me, opp),
        };
        if largest_gain.as_ref().is_none_or(|g| gain > g.gain) {
            largest_gain = Some(gain_game.clone());
        }
        if gain >= HIGH_GAIN_THRESHOLD {
            high_gains.push(gain_game);
        }

        if let (Some(mine), Some(theirs)) = (me.old_mmr, opp.old_mmr) {
            let gap = (mine - theirs).abs();
            if me.won && mine < theirs && largest_gap_win.as_ref().is_none_or(|g| gap > g.gap) {
                largest_gap_win = Some(GapGame {
                    gap,
                    game: NotableGame::new(me, opp),
                });
            }
        }
    }

    let mut top_peaks: Vec<RacePeak> = peaks.into_entries().into_iter().filter_map(|(_, p)| p).collect();
    top_peaks.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    top_peaks.truncate(2);

    let gain_games = if high_gains.is_empty() {
        largest_gain.into_iter().collect()
    } else {
        high_gains
    };

    PlayerSummary {
        battle_tag: battle_tag.to_string(),
        most_played_all_time: games_all_time.most_common().copied().unwrap_or("Unknown").to_string(),
        most_played_this_season: games_this_season.most_common().copied().unwrap_or("Unknown").to_string(),
        highest_current_race: highest_current.map(str::to_string),
        highest_current_rating: highest_current.and_then(|r| current_rating.get(r).copied().flatten()),
        last_played,
        last_played_race: last_played_race
            .into_iter()
            .map(|(race, at)| (race.to_string(), at))
            .collect(),
        top_peaks,
        gain_games,
        largest_gap_win,
    }
}
