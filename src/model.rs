use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::MIN_DURATION_SECONDS;

/// Region/season/mode triple that identifies one ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderScope {
    pub gateway: u32,
    pub season: u32,
    pub game_mode: u32,
}

impl LadderScope {
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.season, self.game_mode, self.gateway)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Race {
    Random,
    Human,
    Orc,
    NightElf,
    Undead,
}

impl Race {
    pub const ALL: [Race; 5] = [Race::Human, Race::Orc, Race::NightElf, Race::Undead, Race::Random];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Race::Random),
            1 => Some(Race::Human),
            2 => Some(Race::Orc),
            4 => Some(Race::NightElf),
            8 => Some(Race::Undead),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Race::Random => 0,
            Race::Human => 1,
            Race::Orc => 2,
            Race::NightElf => 4,
            Race::Undead => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Race::Random => "Random",
            Race::Human => "Human",
            Race::Orc => "Orc",
            Race::NightElf => "Night Elf",
            Race::Undead => "Undead",
        }
    }

    /// Short key used by ladder URLs (`human`, `orc`, `elf`, `undead`, `random`).
    pub fn key(self) -> &'static str {
        match self {
            Race::Random => "random",
            Race::Human => "human",
            Race::Orc => "orc",
            Race::NightElf => "elf",
            Race::Undead => "undead",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "random" | "rdm" => Some(Race::Random),
            "human" | "hu" => Some(Race::Human),
            "orc" => Some(Race::Orc),
            "elf" | "nightelf" | "night elf" | "ne" => Some(Race::NightElf),
            "undead" | "ud" => Some(Race::Undead),
            _ => None,
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display label for a raw race code; unknown codes render as "Unknown".
pub fn race_label(code: Option<i64>) -> &'static str {
    code.and_then(Race::from_code)
        .map(Race::label)
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroPick {
    pub name: Option<String>,
    pub level: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerRecord {
    #[serde(alias = "battletag")]
    pub battle_tag: Option<String>,
    pub player_id: Option<String>,
    pub race: Option<i64>,
    pub rnd_race: Option<i64>,
    pub old_mmr: Option<f64>,
    #[serde(alias = "newMmr")]
    pub current_mmr: Option<f64>,
    pub mmr: Option<f64>,
    pub mmr_gain: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub won: bool,
    pub country_code: Option<String>,
    pub location: Option<String>,
    pub heroes: Option<Vec<HeroPick>>,
}

impl PlayerRecord {
    pub fn is(&self, tag_lower: &str) -> bool {
        self.battle_tag
            .as_deref()
            .is_some_and(|tag| tag.to_lowercase() == tag_lower)
    }

    /// Pre-game rating, falling back to post-game and plain rating fields.
    pub fn rating_before(&self) -> Option<f64> {
        self.old_mmr.or(self.current_mmr).or(self.mmr)
    }

    pub fn race(&self) -> Option<Race> {
        self.race.and_then(Race::from_code)
    }

    pub fn hero_list(&self) -> &[HeroPick] {
        self.heroes.as_deref().unwrap_or(&[])
    }

    pub fn tag(&self) -> &str {
        self.battle_tag.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamRecord {
    pub players: Vec<PlayerRecord>,
}

/// One completed ranked game as returned by the match search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchRecord {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_time")]
    pub start_time: Option<DateTime<Utc>>,
    pub season: Option<u32>,
    pub game_mode: Option<u32>,
    pub duration_in_seconds: Option<f64>,
    pub map: Option<String>,
    pub map_name: Option<String>,
    pub teams: Vec<TeamRecord>,
}

impl MatchRecord {
    pub fn duration(&self) -> f64 {
        self.duration_in_seconds.unwrap_or(0.0)
    }

    pub fn is_game_mode(&self, game_mode: u32) -> bool {
        self.game_mode == Some(game_mode)
    }

    /// Game mode matches and the game lasted long enough to count.
    pub fn is_qualifying(&self, game_mode: u32) -> bool {
        self.is_game_mode(game_mode)
            && self
                .duration_in_seconds
                .is_some_and(|secs| secs >= MIN_DURATION_SECONDS)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.teams.iter().flat_map(|t| t.players.iter())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pairing<'a> {
    pub me: &'a PlayerRecord,
    pub opp: &'a PlayerRecord,
}

/// First player matching `tag` (case-insensitive) and the first other player.
pub fn player_and_opponent<'a>(m: &'a MatchRecord, tag: &str) -> Option<Pairing<'a>> {
    let lower = tag.to_lowercase();
    let me = m.players().find(|p| p.is(&lower))?;
    let opp = m.players().find(|p| !std::ptr::eq(*p, me))?;
    Some(Pairing { me, opp })
}

/// Like [`player_and_opponent`] but only for games with exactly two players.
pub fn duel<'a>(m: &'a MatchRecord, tag: &str) -> Option<Pairing<'a>> {
    if m.players().count() != 2 {
        return None;
    }
    player_and_opponent(m, tag)
}

/// Every shape the match search endpoint has been seen to answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchesPayload {
    List(Vec<Value>),
    Wrapped { matches: Vec<Value> },
    Nested { data: NestedMatches },
    Single {
        #[serde(rename = "match")]
        single: Value,
    },
}

#[derive(Debug, Deserialize)]
struct NestedMatches {
    matches: Vec<Value>,
}

/// Raw entries of one match page; anything unrecognised is an empty page.
pub fn normalize_match_entries(payload: Value) -> Vec<Value> {
    match serde_json::from_value::<MatchesPayload>(payload) {
        Ok(MatchesPayload::List(items)) => items,
        Ok(MatchesPayload::Wrapped { matches }) => matches,
        Ok(MatchesPayload::Nested { data }) => data.matches,
        Ok(MatchesPayload::Single { single }) if !single.is_null() => vec![single],
        _ => Vec::new(),
    }
}

/// Entries that cannot be read as a match (non-objects, wrong field types) are
/// dropped.
pub fn parse_match_entries(entries: Vec<Value>) -> Vec<MatchRecord> {
    entries
        .into_iter()
        .filter(|v| v.is_object())
        .filter_map(|v| serde_json::from_value::<MatchRecord>(v).ok())
        .collect()
}

pub fn normalize_matches(payload: Value) -> Vec<MatchRecord> {
    parse_match_entries(normalize_match_entries(payload))
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_timestamp))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(matches!(raw, Some(Value::Bool(true))))
}

pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Strings only; any other JSON value reads as absent.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

pub(crate) fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_payload_shape_normalizes() {
        let m = json!({"id": "a", "gameMode": 1});
        assert_eq!(normalize_match_entries(json!([m, m])).len(), 2);
        assert_eq!(normalize_match_entries(json!({"matches": [m]})).len(), 1);
        assert_eq!(normalize_match_entries(json!({"data": {"matches": [m, m, m]}})).len(), 3);
        assert_eq!(normalize_match_entries(json!({"match": m})).len(), 1);
        assert!(normalize_match_entries(json!({"count": 3})).is_empty());
        assert!(normalize_match_entries(Value::Null).is_empty());
        assert!(normalize_match_entries(json!("nope")).is_empty());
    }

    #[test]
    fn unparsable_start_time_is_tolerated() {
        let rows = normalize_matches(json!([{"startTime": "yesterday", "season": 24}]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_time, None);
        assert_eq!(rows[0].season, Some(24));
    }

    #[test]
    fn opponent_is_first_other_player() {
        let m: MatchRecord = serde_json::from_value(json!({
            "teams": [
                {"players": [{"battleTag": "Foo#1", "oldMmr": 1500}]},
                {"players": [{"battleTag": "Bar#2", "oldMmr": 1600}]}
            ]
        }))
        .expect("match");
        let pair = player_and_opponent(&m, "FOO#1").expect("pair");
        assert_eq!(pair.opp.tag(), "Bar#2");
        assert_eq!(pair.opp.rating_before(), Some(1600.0));
        assert!(player_and_opponent(&m, "Baz#3").is_none());
    }

    #[test]
    fn race_codes_round_trip() {
        for race in Race::ALL {
            assert_eq!(Race::from_code(race.code()), Some(race));
            assert_eq!(Race::from_key(race.key()), Some(race));
        }
        assert_eq!(Race::from_code(3), None);
    }
}
