use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::model::{MatchRecord, PlayerRecord};
use crate::stats_common::{Ordered, WinLoss, ratio};

const LIST_LEN: usize = 5;
const MIN_HERO_GAMES: u32 = 1;

static HERO_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("archmage", "Archmage"),
        ("mountainking", "Mountain King"),
        ("paladin", "Paladin"),
        ("sorceror", "Blood Mage"),
        ("blademaster", "Blademaster"),
        ("farseer", "Farseer"),
        ("shadowhunter", "Shadow Hunter"),
        ("taurenchieftain", "Tauren Chieftain"),
        ("deathknight", "Death Knight"),
        ("lich", "Lich"),
        ("dreadlord", "Dreadlord"),
        ("cryptlord", "Crypt Lord"),
        ("demonhunter", "Demon Hunter"),
        ("keeperofthegrove", "Keeper of the Grove"),
        ("priestessofthemoon", "Priestess of the Moon"),
        ("warden", "Warden"),
        ("alchemist", "Alchemist"),
        ("beastmaster", "Beastmaster"),
        ("pitlord", "Pit Lord"),
        ("tinker", "Tinker"),
        ("avatarofflame", "Firelord"),
        ("bansheeranger", "Dark Ranger"),
        ("seawitch", "Naga Sea Witch"),
        ("pandarenbrewmaster", "Pandaren Brewmaster"),
    ])
});

/// Display name for an upstream hero id; unknown ids pass through.
pub fn hero_display(id: &str) -> String {
    if id.is_empty() {
        return "Unknown".to_string();
    }
    HERO_NAMES.get(id).copied().unwrap_or(id).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroCountRow {
    pub heroes: u8,
    #[serde(flatten)]
    pub record: WinLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroRow {
    pub hero: String,
    pub name: String,
    #[serde(flatten)]
    pub record: WinLoss,
    /// Win rate against this hero minus the baseline win rate.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroReport {
    pub battle_tag: String,
    pub baseline_win_rate: f64,
    pub own_hero_count: Vec<HeroCountRow>,
    pub opponent_hero_count: Vec<HeroCountRow>,
    pub best_vs_openers: Vec<HeroRow>,
    pub worst_vs_openers: Vec<HeroRow>,
    pub best_vs_heroes: Vec<HeroRow>,
    pub worst_vs_heroes: Vec<HeroRow>,
}

fn find_me<'a>(m: &'a MatchRecord, tag_lower: &str, player_id_lower: Option<&str>) -> Option<&'a PlayerRecord> {
    m.players().find(|p| {
        p.is(tag_lower)
            || player_id_lower.is_some_and(|pid| {
                p.player_id
                    .as_deref()
                    .is_some_and(|own| own.to_lowercase() == pid)
            })
    })
}

fn count_slot(heroes: usize) -> usize {
    heroes.clamp(1, 3) - 1
}

/// Hero matchup breakdown over two-player games of `game_mode` where both
/// sides report their heroes. The player is found by battle-tag or, when
/// given, by player id.
pub fn hero_matchups(
    matches: &[MatchRecord],
    battle_tag: &str,
    player_id: Option<&str>,
    game_mode: u32,
) -> HeroReport {
    let tag_lower = battle_tag.to_lowercase();
    let pid_lower = player_id.map(str::to_lowercase);
    let pid_lower = pid_lower.as_deref();

    let mut own_count = [WinLoss::default(); 3];
    let mut opp_count = [WinLoss::default(); 3];
    let mut vs_any: Ordered<String, WinLoss> = Ordered::default();
    let mut vs_opener: Ordered<String, WinLoss> = Ordered::default();

    for m in matches.iter().filter(|m| m.is_game_mode(game_mode)) {
        if m.players().count() != 2 {
            continue;
        }
        let Some(me) = find_me(m, &tag_lower, pid_lower) else {
            continue;
        };
        let Some(opp) = m.players().find(|p| !std::ptr::eq(*p, me)) else {
            continue;
        };
        let (Some(my_heroes), Some(opp_heroes)) = (me.heroes.as_deref(), opp.heroes.as_deref()) else {
            continue;
        };
        let won = me.won;

        own_count[count_slot(my_heroes.len())].record(won);
        opp_count[count_slot(opp_heroes.len())].record(won);

        let mut seen = HashSet::new();
        for name in opp_heroes.iter().filter_map(|h| h.name.as_deref()) {
            if !name.is_empty() && seen.insert(name) {
                vs_any.entry(name.to_string()).record(won);
            }
        }

        if let Some(opener) = opp_heroes.first().and_then(|h| h.name.as_deref()) {
            if !opener.is_empty() {
                vs_opener.entry(opener.to_string()).record(won);
            }
        }
    }

    // Baseline over every fetched match, whatever its mode.
    let total = matches.len() as u32;
    let total_wins = matches
        .iter()
        .filter(|m| find_me(m, &tag_lower, pid_lower).is_some_and(|me| me.won))
        .count() as u32;
    let baseline = ratio(total_wins, total);

    let rows = |tally: Ordered<String, WinLoss>| -> Vec<HeroRow> {
        tally
            .into_entries()
            .into_iter()
            .filter(|(_, wl)| wl.games >= MIN_HERO_GAMES)
            .map(|(hero, record)| HeroRow {
                name: hero_display(&hero),
                delta: record.win_rate - baseline,
                hero,
                record,
            })
            .collect()
    };

    let mut worst_vs_openers = rows(vs_opener);
    let mut best_vs_openers = worst_vs_openers.clone();
    best_vs_openers.sort_by(|a, b| b.record.win_rate.total_cmp(&a.record.win_rate));
    best_vs_openers.truncate(LIST_LEN);
    worst_vs_openers.sort_by(|a, b| a.record.win_rate.total_cmp(&b.record.win_rate));
    worst_vs_openers.truncate(LIST_LEN);

    let mut by_delta = rows(vs_any);
    by_delta.sort_by(|a, b| b.delta.total_cmp(&a.delta));
    let best_vs_heroes: Vec<HeroRow> = by_delta.iter().take(LIST_LEN).cloned().collect();
    let best_ids: HashSet<&str> = best_vs_heroes.iter().map(|r| r.hero.as_str()).collect();
    let mut rest: Vec<HeroRow> = by_delta
        .iter()
        .filter(|r| !best_ids.contains(r.hero.as_str()))
        .cloned()
        .collect();
    rest.sort_by(|a, b| a.delta.total_cmp(&b.delta));
    rest.truncate(LIST_LEN);

    let count_rows = |counts: [WinLoss; 3]| -> Vec<HeroCountRow> {
        counts
            .into_iter()
            .zip(1u8..)
            .filter(|(wl, _)| wl.games > 0)
            .map(|(record, heroes)| HeroCountRow { heroes, record })
            .collect()
    };

    HeroReport {
        battle_tag: battle_tag.to_string(),
        baseline_win_rate: baseline,
        own_hero_count: count_rows(own_count),
        opponent_hero_count: count_rows(opp_count),
        best_vs_openers,
        worst_vs_openers,
        best_vs_heroes,
        worst_vs_heroes: rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hero_names_fall_back_to_id() {
        assert_eq!(hero_display("sorceror"), "Blood Mage");
        assert_eq!(hero_display("newhero"), "newhero");
        assert_eq!(hero_display(""), "Unknown");
    }

    #[test]
    fn hero_counts_clamp_to_one_through_three() {
        assert_eq!(count_slot(0), 0);
        assert_eq!(count_slot(1), 0);
        assert_eq!(count_slot(3), 2);
        assert_eq!(count_slot(5), 2);
    }
}
