use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MIN_DURATION_SECONDS;
use crate::model::MatchRecord;
use crate::stats_common::WinLoss;

const BUCKET_SIZE: i64 = 50;
const MAX_BUCKET_EDGE: i64 = 300;
/// Rating gaps within this many points count as an even match.
const EVEN_THRESHOLD: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapBucket {
    pub min: i64,
    /// `None` for the open-ended edge buckets.
    pub max: Option<i64>,
    #[serde(flatten)]
    pub record: WinLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub battle_tag: String,
    pub overall: WinLoss,
    /// Games where the player was rated higher than the opponent.
    pub higher: WinLoss,
    pub lower: WinLoss,
    pub even: WinLoss,
    pub buckets: Vec<GapBucket>,
}

fn bucket_floor(diff: f64) -> i64 {
    let edge = MAX_BUCKET_EDGE as f64;
    if diff >= edge {
        MAX_BUCKET_EDGE
    } else if diff <= -edge {
        -MAX_BUCKET_EDGE
    } else {
        (diff / BUCKET_SIZE as f64).floor() as i64 * BUCKET_SIZE
    }
}

/// Win/loss split by pre-game rating difference (own minus opponent's).
///
/// Only two-team games of `game_mode` lasting at least two minutes where the
/// player leads one team and both pre-game ratings are known.
pub fn performance_by_gap(matches: &[MatchRecord], battle_tag: &str, game_mode: u32) -> PerformanceReport {
    let lower_tag = battle_tag.to_lowercase();

    let mut overall = WinLoss::default();
    let mut higher = WinLoss::default();
    let mut lower = WinLoss::default();
    let mut even = WinLoss::default();
    let mut buckets: BTreeMap<i64, WinLoss> = BTreeMap::new();

    for m in matches {
        if m.duration() < MIN_DURATION_SECONDS || !m.is_game_mode(game_mode) || m.teams.len() != 2 {
            continue;
        }
        let (Some(a), Some(b)) = (m.teams[0].players.first(), m.teams[1].players.first()) else {
            continue;
        };
        let (me, opp) = if a.is(&lower_tag) {
            (a, b)
        } else if b.is(&lower_tag) {
            (b, a)
        } else {
            continue;
        };
        let (Some(mine), Some(theirs)) = (me.old_mmr, opp.old_mmr) else {
            continue;
        };

        let diff = mine - theirs;
        let won = me.won;

        overall.record(won);
        if diff.abs() <= EVEN_THRESHOLD {
            even.record(won);
        } else if diff > 0.0 {
            higher.record(won);
        } else {
            lower.record(won);
        }
        buckets.entry(bucket_floor(diff)).or_default().record(won);
    }

    PerformanceReport {
        battle_tag: battle_tag.to_string(),
        overall,
        higher,
        lower,
        even,
        buckets: buckets
            .into_iter()
            .map(|(min, record)| GapBucket {
                min,
                max: (min.abs() != MAX_BUCKET_EDGE).then_some(min + BUCKET_SIZE),
                record,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::bucket_floor;

    #[test]
    fn buckets_floor_and_clamp() {
        assert_eq!(bucket_floor(0.0), 0);
        assert_eq!(bucket_floor(49.9), 0);
        assert_eq!(bucket_floor(-1.0), -50);
        assert_eq!(bucket_floor(-50.0), -50);
        assert_eq!(bucket_floor(299.0), 250);
        assert_eq!(bucket_floor(300.0), 300);
        assert_eq!(bucket_floor(-812.0), -300);
    }
}
