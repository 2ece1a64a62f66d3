use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identity::PlayerProfile;
use crate::leaderboard::{RawLadderRow, rank_by_rating};
use crate::model::{MatchRecord, Race};
use crate::stats_common::{count_race_games, iso2};

/// Races in race-code order.
const RANK_ORDER: [Race; 5] = [Race::Random, Race::Human, Race::Orc, Race::NightElf, Race::Undead];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRow {
    pub race: String,
    pub race_id: i64,
    pub global_rank: usize,
    pub global_total: usize,
    pub country_rank: Option<usize>,
    pub country_total: Option<usize>,
    pub rating: f64,
    pub games: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankReport {
    pub battle_tag: String,
    pub season: u32,
    /// Two-letter code, or `-` when unknown.
    pub country: String,
    pub min_games: u32,
    pub as_of: DateTime<Utc>,
    pub ranks: Vec<RankRow>,
}

/// Everything the rank report is computed from, already fetched.
pub struct RankInputs<'a> {
    pub battle_tag: &'a str,
    pub player_id: Option<&'a str>,
    pub season: u32,
    pub game_mode: u32,
    pub country: Option<&'a str>,
    pub snapshot: &'a [RawLadderRow],
    pub country_rows: &'a [RawLadderRow],
    /// History across the lifetime season window, for race eligibility.
    pub lifetime_matches: &'a [MatchRecord],
    pub min_games: u32,
    pub min_lifetime_games: u32,
    pub as_of: DateTime<Utc>,
}

/// Country from the player's own rows in this season's matches, falling back
/// to the profile's country code.
pub fn infer_country(matches: &[MatchRecord], battle_tag: &str, profile: &PlayerProfile) -> Option<String> {
    let lower = battle_tag.to_lowercase();
    matches
        .iter()
        .flat_map(MatchRecord::players)
        .filter(|p| p.is(&lower))
        .find_map(|p| iso2(p.country_code.as_deref()))
        .or_else(|| iso2(profile.country_code.as_deref()))
}

/// Global and country positions for every race the player has played enough
/// lifetime games with and appears on the ladder as.
pub fn build_rank_report(inputs: &RankInputs<'_>) -> RankReport {
    let tag_lower = inputs.battle_tag.to_lowercase();
    let pid_lower = inputs.player_id.map(str::to_lowercase);
    let pid_lower = pid_lower.as_deref();

    let ranks = RANK_ORDER
        .into_iter()
        .filter(|&race| {
            count_race_games(inputs.lifetime_matches, inputs.battle_tag, race, inputs.game_mode)
                >= inputs.min_lifetime_games as usize
        })
        .filter_map(|race| {
            let global = rank_by_rating(inputs.snapshot, &tag_lower, pid_lower, race.code(), inputs.min_games)?;
            let country = rank_by_rating(inputs.country_rows, &tag_lower, pid_lower, race.code(), inputs.min_games);
            Some(RankRow {
                race: race.label().to_string(),
                race_id: race.code(),
                global_rank: global.rank,
                global_total: global.total,
                country_rank: country.map(|c| c.rank),
                country_total: country.map(|c| c.total),
                rating: global.rating,
                games: global.games,
            })
        })
        .collect();

    RankReport {
        battle_tag: inputs.battle_tag.to_string(),
        season: inputs.season,
        country: inputs.country.unwrap_or("-").to_string(),
        min_games: inputs.min_games,
        as_of: inputs.as_of,
        ranks,
    }
}
