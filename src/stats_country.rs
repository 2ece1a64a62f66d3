use std::collections::HashSet;

use serde::Serialize;

use crate::config::MIN_DURATION_SECONDS;
use crate::identity::PlayerProfile;
use crate::model::{MatchRecord, PlayerRecord, duel, race_label};
use crate::stats_common::{Ordered, WinLoss, iso2, ratio};

pub const UNKNOWN_COUNTRY: &str = "UN";

const COUNTRY_SHORT: &[(&str, &str)] = &[
    ("US", "USA"),
    ("GB", "UK"),
    ("KR", "Korea"),
    ("CN", "China"),
    ("RU", "Russia"),
    ("BR", "Brazil"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("PL", "Poland"),
    ("PE", "Peru"),
    ("PH", "Philippines"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("CF", "CAR"),
];

pub fn country_label(code: &str) -> String {
    if code.is_empty() || code == UNKNOWN_COUNTRY {
        return "Unknown".to_string();
    }
    COUNTRY_SHORT
        .iter()
        .find(|(c, _)| *c == code)
        .map_or_else(|| code.to_string(), |(_, label)| label.to_string())
}

fn player_country(p: &PlayerRecord) -> Option<String> {
    iso2(p.country_code.as_deref()).or_else(|| iso2(p.location.as_deref()))
}

/// Country from the profile (country code, else location), else the most
/// frequent country on the player's own two-player match rows.
pub fn home_country(profile: &PlayerProfile, matches: &[MatchRecord], battle_tag: &str) -> String {
    let from_profile = profile
        .country_code
        .as_deref()
        .filter(|c| !c.is_empty())
        .or(profile.location.as_deref());
    if let Some(cc) = iso2(from_profile) {
        return cc;
    }

    let mut counts: Ordered<String, u32> = Ordered::default();
    for pair in matches.iter().filter_map(|m| duel(m, battle_tag)) {
        if let Some(cc) = player_country(pair.me) {
            *counts.entry(cc) += 1;
        }
    }
    counts
        .most_common()
        .cloned()
        .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRaceRow {
    pub race_id: i64,
    pub race: String,
    #[serde(flatten)]
    pub record: WinLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRow {
    pub country: String,
    pub label: String,
    #[serde(flatten)]
    pub record: WinLoss,
    pub unique_opponents: usize,
    pub avg_games_per_opponent: f64,
    pub avg_opponent_rating: Option<f64>,
    pub avg_self_rating: Option<f64>,
    pub time_played_seconds: f64,
    pub time_share: f64,
    pub avg_game_seconds: Option<f64>,
    pub races: Vec<CountryRaceRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryReport {
    pub battle_tag: String,
    pub home_country: String,
    pub home_country_label: String,
    pub countries: Vec<CountryRow>,
}

#[derive(Debug, Default)]
struct CountryAgg {
    record: WinLoss,
    opponents: HashSet<String>,
    races: Ordered<i64, WinLoss>,
    opp_rating_sum: f64,
    self_rating_sum: f64,
    rated_games: u32,
    time_sum: f64,
}

/// Results against opponents grouped by their country, most played first.
/// Two-player games of at least two minutes; opponents without a country
/// are skipped.
pub fn country_breakdown(
    matches: &[MatchRecord],
    battle_tag: &str,
    profile: &PlayerProfile,
) -> CountryReport {
    let home = home_country(profile, matches, battle_tag);

    let mut by_country: Ordered<String, CountryAgg> = Ordered::default();
    let mut total_time = 0.0;

    for m in matches {
        if m.duration() < MIN_DURATION_SECONDS {
            continue;
        }
        let Some(pair) = duel(m, battle_tag) else {
            continue;
        };
        let (me, opp) = (pair.me, pair.opp);
        let Some(cc) = player_country(opp) else {
            continue;
        };
        let won = me.won;
        let dur = m.duration();

        let agg = by_country.entry(cc);
        agg.record.record(won);
        if let Some(tag) = opp.battle_tag.as_deref().filter(|t| !t.is_empty()) {
            agg.opponents.insert(tag.trim().to_lowercase());
        }
        if let Some(race) = opp.race {
            agg.races.entry(race).record(won);
        }
        if let (Some(mine), Some(theirs)) = (me.old_mmr, opp.old_mmr) {
            agg.opp_rating_sum += theirs;
            agg.self_rating_sum += mine;
            agg.rated_games += 1;
        }
        agg.time_sum += dur;
        total_time += dur;
    }

    let mut countries: Vec<CountryRow> = by_country
        .into_entries()
        .into_iter()
        .map(|(country, agg)| {
            let rated = f64::from(agg.rated_games);
            let games = agg.record.games;
            CountryRow {
                label: country_label(&country),
                country,
                record: agg.record,
                unique_opponents: agg.opponents.len(),
                avg_games_per_opponent: if agg.opponents.is_empty() {
                    0.0
                } else {
                    f64::from(games) / agg.opponents.len() as f64
                },
                avg_opponent_rating: (agg.rated_games > 0).then(|| agg.opp_rating_sum / rated),
                avg_self_rating: (agg.rated_games > 0).then(|| agg.self_rating_sum / rated),
                time_played_seconds: agg.time_sum,
                time_share: if total_time > 0.0 { agg.time_sum / total_time } else { 0.0 },
                avg_game_seconds: (games > 0).then(|| agg.time_sum / f64::from(games)),
                races: agg
                    .races
                    .into_entries()
                    .into_iter()
                    .map(|(race_id, mut record)| {
                        record.win_rate = ratio(record.wins, record.games);
                        CountryRaceRow {
                            race_id,
                            race: race_name(race_id),
                            record,
                        }
                    })
                    .collect(),
            }
        })
        .collect();
    countries.sort_by(|a, b| b.record.games.cmp(&a.record.games));

    CountryReport {
        battle_tag: battle_tag.to_string(),
        home_country_label: country_label(&home),
        home_country: home,
        countries,
    }
}

fn race_name(race_id: i64) -> String {
    match race_label(Some(race_id)) {
        "Unknown" => format!("Race {race_id}"),
        label => label.to_string(),
    }
}
