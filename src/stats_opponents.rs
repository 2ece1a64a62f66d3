use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MIN_DURATION_SECONDS;
use crate::model::{MatchRecord, player_and_opponent, race_label};
use crate::stats_common::{Ordered, chronological, round_to};

const MAX_EXTREME_ABS_CHANGE: f64 = 30.0;
const HIGH_GAIN_THRESHOLD: f64 = 15.0;
/// Pseudo-games at 50% blended into every opponent's record.
const PRIOR_GAMES: f64 = 10.0;
const PRIOR_WIN_RATE: f64 = 0.5;
/// Best-opponent candidates may average at most this far below the player.
const BEST_OPPONENT_RATING_SLACK: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameResult {
    W,
    L,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentGame {
    pub result: GameResult,
    pub my_name: String,
    pub opp_name: String,
    pub my_race: String,
    pub opp_race: String,
    pub my_rating: f64,
    pub opp_rating: f64,
    pub rating_change: f64,
    pub date: Option<DateTime<Utc>>,
    /// Rolled race for Random picks, otherwise the queued race.
    pub race_code: i64,
}

impl OpponentGame {
    fn won(&self) -> bool {
        self.result == GameResult::W
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapResult {
    pub gap: f64,
    #[serde(flatten)]
    pub game: OpponentGame,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentRow {
    pub tag: String,
    pub opp_race: String,
    pub wins: u32,
    pub losses: u32,
    pub total_games: u32,
    /// Percent, one decimal.
    pub win_rate: f64,
    pub net_rating: f64,
    pub avg_opp_rating: f64,
    pub avg_my_rating: f64,
    pub adjusted_win_rate: f64,
    pub games: Vec<OpponentGame>,
}

impl OpponentRow {
    fn raw_rate(&self) -> f64 {
        f64::from(self.wins) / f64::from(self.total_games)
    }

    fn by_opponent_rating(&self) -> Self {
        let mut row = self.clone();
        row.games.sort_by(|a, b| b.opp_rating.total_cmp(&a.opp_rating));
        row
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extremes {
    pub largest_single_gain: Option<f64>,
    pub largest_single_loss: Option<f64>,
    pub largest_loss_game: Option<OpponentGame>,
    pub largest_gap_win: Option<GapResult>,
    pub largest_gap_loss: Option<GapResult>,
    pub high_gain_games: Vec<OpponentGame>,
    pub gain_games_to_show: Vec<OpponentGame>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentReport {
    pub battle_tag: String,
    pub season: u32,
    pub strict_games: usize,
    pub extremes: Extremes,
    /// Games against it are sorted by opponent rating, highest first.
    pub best: Option<OpponentRow>,
    pub worst: Option<OpponentRow>,
    /// First-met order.
    pub opponents: Vec<OpponentRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHead {
    pub battle_tag: String,
    pub opponent: String,
    pub record: Option<OpponentRow>,
}

fn strict_games(matches: &[MatchRecord], battle_tag: &str, season: u32, game_mode: u32) -> Vec<OpponentGame> {
    let mut games = Vec::new();
    for m in chronological(matches) {
        if !m.is_game_mode(game_mode) || m.season != Some(season) {
            continue;
        }
        let Some(pair) = player_and_opponent(m, battle_tag) else {
            continue;
        };
        let (me, opp) = (pair.me, pair.opp);
        if m.duration_in_seconds.is_none_or(|secs| secs < MIN_DURATION_SECONDS) {
            continue;
        }
        let (Some(change), Some(mine), Some(theirs)) = (me.mmr_gain, me.old_mmr, opp.old_mmr) else {
            continue;
        };
        let race_code = match me.race {
            Some(code) if code != 0 => code,
            _ => me.rnd_race.unwrap_or(0),
        };
        games.push(OpponentGame {
            result: if me.won { GameResult::W } else { GameResult::L },
            my_name: me.tag().to_string(),
            opp_name: opp.tag().to_string(),
            my_race: race_label(me.race).to_string(),
            opp_race: race_label(opp.race).to_string(),
            my_rating: mine,
            opp_rating: theirs,
            rating_change: change,
            date: m.start_time,
            race_code,
        });
    }
    games
}

#[derive(Debug, Default)]
struct OpponentAgg {
    wins: u32,
    losses: u32,
    net_rating: f64,
    opp_rating_sum: f64,
    my_rating_sum: f64,
    games: Vec<OpponentGame>,
}

fn aggregate(games: &[OpponentGame]) -> Vec<OpponentRow> {
    let mut by_opponent: Ordered<String, OpponentAgg> = Ordered::default();
    for g in games {
        let agg = by_opponent.entry(g.opp_name.clone());
        agg.opp_rating_sum += g.opp_rating;
        agg.my_rating_sum += g.my_rating;
        if g.won() {
            agg.wins += 1;
            agg.net_rating += g.rating_change;
        } else {
            agg.losses += 1;
            agg.net_rating -= g.rating_change.abs();
        }
        agg.games.push(g.clone());
    }

    by_opponent
        .into_entries()
        .into_iter()
        .map(|(tag, agg)| {
            let total = agg.wins + agg.losses;
            let n = f64::from(total);
            OpponentRow {
                opp_race: agg
                    .games
                    .first()
                    .map_or_else(|| "Unknown".to_string(), |g| g.opp_race.clone()),
                tag,
                wins: agg.wins,
                losses: agg.losses,
                total_games: total,
                win_rate: round_to(f64::from(agg.wins) / n * 100.0, 1),
                net_rating: agg.net_rating,
                avg_opp_rating: agg.opp_rating_sum / n,
                avg_my_rating: agg.my_rating_sum / n,
                adjusted_win_rate: (f64::from(agg.wins) + PRIOR_GAMES * PRIOR_WIN_RATE) / (n + PRIOR_GAMES),
                games: agg.games,
            }
        })
        .collect()
}

fn best_opponent(rows: &[OpponentRow]) -> Option<OpponentRow> {
    let mut candidates: Vec<&OpponentRow> = rows
        .iter()
        .filter(|r| r.avg_opp_rating >= r.avg_my_rating - BEST_OPPONENT_RATING_SLACK)
        .collect();
    candidates.sort_by(|a, b| {
        b.adjusted_win_rate
            .total_cmp(&a.adjusted_win_rate)
            .then(b.total_games.cmp(&a.total_games))
    });
    candidates.first().map(|r| r.by_opponent_rating())
}

fn worst_opponent(rows: &[OpponentRow]) -> Option<OpponentRow> {
    let mut sorted: Vec<&OpponentRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.raw_rate().total_cmp(&b.raw_rate()));
    sorted.first().map(|r| r.by_opponent_rating())
}

fn extremes(games: &[OpponentGame]) -> Extremes {
    let mut out = Extremes::default();
    let mut largest_loss: Option<&OpponentGame> = None;

    for g in games {
        let change = g.rating_change;
        if change.abs() <= MAX_EXTREME_ABS_CHANGE {
            if out.largest_single_gain.is_none_or(|best| change > best) {
                out.largest_single_gain = Some(change);
            }
            if change >= HIGH_GAIN_THRESHOLD {
                out.high_gain_games.push(g.clone());
            }
            if change < 0.0 && largest_loss.is_none_or(|l| change < l.rating_change) {
                largest_loss = Some(g);
            }
        }

        let gap = (g.my_rating - g.opp_rating).abs();
        if g.won() && g.my_rating < g.opp_rating && out.largest_gap_win.as_ref().is_none_or(|w| gap > w.gap) {
            out.largest_gap_win = Some(GapResult { gap, game: g.clone() });
        }
        if !g.won() && g.my_rating > g.opp_rating && out.largest_gap_loss.as_ref().is_none_or(|l| gap > l.gap) {
            out.largest_gap_loss = Some(GapResult { gap, game: g.clone() });
        }
    }

    out.largest_single_loss = largest_loss.map(|g| g.rating_change);
    out.largest_loss_game = largest_loss.cloned();
    out.gain_games_to_show = if out.high_gain_games.is_empty() {
        out.largest_single_gain
            .and_then(|best| games.iter().find(|g| g.rating_change == best))
            .cloned()
            .into_iter()
            .collect()
    } else {
        out.high_gain_games.clone()
    };
    out
}

/// Per-opponent results over the strict games of `season`: the game mode,
/// at least two minutes, a reported rating change and both pre-game ratings.
pub fn opponent_breakdown(matches: &[MatchRecord], battle_tag: &str, season: u32, game_mode: u32) -> OpponentReport {
    let games = strict_games(matches, battle_tag, season, game_mode);
    let opponents = aggregate(&games);

    OpponentReport {
        battle_tag: battle_tag.to_string(),
        season,
        strict_games: games.len(),
        extremes: extremes(&games),
        best: best_opponent(&opponents),
        worst: worst_opponent(&opponents),
        opponents,
    }
}

/// The breakdown narrowed to one opponent, matched case-insensitively.
pub fn head_to_head(report: &OpponentReport, opponent: &str) -> HeadToHead {
    let wanted = opponent.to_lowercase();
    HeadToHead {
        battle_tag: report.battle_tag.clone(),
        opponent: opponent.to_string(),
        record: report
            .opponents
            .iter()
            .find(|row| row.tag.to_lowercase() == wanted)
            .cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(opp: &str, won: bool, mine: f64, theirs: f64, change: f64) -> OpponentGame {
        OpponentGame {
            result: if won { GameResult::W } else { GameResult::L },
            my_name: "Me#1".to_string(),
            opp_name: opp.to_string(),
            my_race: "Orc".to_string(),
            opp_race: "Human".to_string(),
            my_rating: mine,
            opp_rating: theirs,
            rating_change: change,
            date: None,
            race_code: 2,
        }
    }

    #[test]
    fn net_rating_subtracts_losses() {
        let rows = aggregate(&[
            game("A#1", true, 1500.0, 1520.0, 9.0),
            game("A#1", false, 1509.0, 1511.0, -8.0),
            game("A#1", true, 1501.0, 1519.0, 10.0),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].net_rating, 11.0);
        assert_eq!(rows[0].win_rate, 66.7);
        assert!((rows[0].adjusted_win_rate - 7.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn best_opponent_skips_much_weaker_players() {
        let rows = aggregate(&[
            game("Weak#1", true, 1800.0, 1500.0, 2.0),
            game("Weak#1", true, 1800.0, 1500.0, 2.0),
            game("Peer#1", true, 1800.0, 1790.0, 8.0),
            game("Peer#1", false, 1800.0, 1790.0, -8.0),
        ]);
        assert_eq!(best_opponent(&rows).map(|r| r.tag), Some("Peer#1".to_string()));
        assert_eq!(worst_opponent(&rows).map(|r| r.tag), Some("Peer#1".to_string()));
    }

    #[test]
    fn gain_fallback_uses_largest_gain() {
        let ex = extremes(&[
            game("A#1", true, 1500.0, 1400.0, 5.0),
            game("B#1", true, 1500.0, 1600.0, 12.0),
            game("C#1", false, 1500.0, 1300.0, -25.0),
            game("D#1", false, 1500.0, 1300.0, -40.0),
        ]);
        assert_eq!(ex.largest_single_gain, Some(12.0));
        assert_eq!(ex.largest_single_loss, Some(-25.0));
        assert!(ex.high_gain_games.is_empty());
        assert_eq!(ex.gain_games_to_show.len(), 1);
        assert_eq!(ex.gain_games_to_show[0].opp_name, "B#1");
        assert_eq!(ex.largest_gap_win.map(|g| g.gap), Some(100.0));
        assert_eq!(ex.largest_gap_loss.map(|g| g.gap), Some(200.0));
    }
}
