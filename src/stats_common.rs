use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::model::{MatchRecord, Race, player_and_opponent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinLoss {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    /// Fraction in `0.0..=1.0`.
    pub win_rate: f64,
}

impl WinLoss {
    pub fn record(&mut self, won: bool) {
        self.games += 1;
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.win_rate = ratio(self.wins, self.games);
    }
}

pub fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Map that remembers first-insertion order, so "first key wins a tie"
/// orderings survive aggregation.
#[derive(Debug, Clone)]
pub struct Ordered<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Ordered<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Default> Ordered<K, V> {
    pub fn entry(&mut self, key: K) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }
}

impl<K: Eq + Hash, V> Ordered<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

impl<K: Eq + Hash + Clone> Ordered<K, u32> {
    /// Key with the highest count; the earliest inserted wins ties.
    pub fn most_common(&self) -> Option<&K> {
        let mut best: Option<(&K, u32)> = None;
        for (k, n) in &self.entries {
            if best.is_none_or(|(_, top)| *n > top) {
                best = Some((k, *n));
            }
        }
        best.map(|(k, _)| k)
    }
}

/// Two-letter upper-cased country code, or `None` for anything else.
pub fn iso2(code: Option<&str>) -> Option<String> {
    let c = code?.trim().to_uppercase();
    (c.chars().count() == 2).then_some(c)
}

/// Qualifying games of `battle_tag` queued as `race`.
pub fn count_race_games(matches: &[MatchRecord], battle_tag: &str, race: Race, game_mode: u32) -> usize {
    matches
        .iter()
        .filter(|m| m.is_qualifying(game_mode))
        .filter_map(|m| player_and_opponent(m, battle_tag))
        .filter(|pair| pair.me.race == Some(race.code()))
        .count()
}

/// Matches sorted by start time, unknown start times first.
pub fn chronological(matches: &[MatchRecord]) -> Vec<&MatchRecord> {
    let mut sorted: Vec<&MatchRecord> = matches.iter().collect();
    sorted.sort_by_key(|m| m.start_time);
    sorted
}
