use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{MatchRecord, player_and_opponent};
use crate::stats_common::{chronological, round_to};

/// A pause longer than this starts a new session.
const SESSION_GAP_MINUTES: i64 = 30;
const RECENT_WINDOWS: [usize; 3] = [10, 25, 50];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streaks {
    pub longest_win: u32,
    pub longest_loss: u32,
    /// Positive for a running win streak, negative for losses.
    pub current: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start: Option<DateTime<Utc>>,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentForm {
    pub window: usize,
    pub games: usize,
    pub wins: usize,
    /// Percent, two decimals.
    pub win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPoint {
    pub start_time: Option<DateTime<Utc>>,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub battle_tag: String,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: Option<f64>,
    pub streaks: Streaks,
    pub sessions: Vec<Session>,
    pub recent: Vec<RecentForm>,
    pub results: Vec<ResultPoint>,
}

fn streaks(results: &[bool]) -> Streaks {
    let mut longest_win = 0;
    let mut longest_loss = 0;
    let mut current: i32 = 0;
    for &won in results {
        current = match (won, current) {
            (true, c) if c > 0 => c + 1,
            (true, _) => 1,
            (false, c) if c < 0 => c - 1,
            (false, _) => -1,
        };
        if current > 0 {
            longest_win = longest_win.max(current.unsigned_abs());
        } else {
            longest_loss = longest_loss.max(current.unsigned_abs());
        }
    }
    Streaks {
        longest_win,
        longest_loss,
        current,
    }
}

fn sessions(points: &[ResultPoint]) -> Vec<Session> {
    let gap = Duration::minutes(SESSION_GAP_MINUTES);
    let mut out: Vec<Session> = Vec::new();
    let mut last_time: Option<DateTime<Utc>> = None;

    for point in points {
        let split = match (point.start_time, last_time) {
            (Some(now), Some(prev)) => now - prev > gap,
            _ => false,
        };
        if split || out.is_empty() {
            out.push(Session {
                start: point.start_time,
                games: 0,
                wins: 0,
                losses: 0,
            });
        }
        if let Some(session) = out.last_mut() {
            session.games += 1;
            if point.won {
                session.wins += 1;
            } else {
                session.losses += 1;
            }
            if session.start.is_none() {
                session.start = point.start_time;
            }
        }
        if point.start_time.is_some() {
            last_time = point.start_time;
        }
    }
    out
}

fn percent(wins: usize, games: usize) -> Option<f64> {
    (games > 0).then(|| round_to(wins as f64 / games as f64 * 100.0, 2))
}

/// Streaks, play sessions and recent form over qualifying games of
/// `game_mode`, oldest first. `None` when the player has no such games.
pub fn consistency(matches: &[MatchRecord], battle_tag: &str, game_mode: u32) -> Option<ConsistencyReport> {
    let points: Vec<ResultPoint> = chronological(matches)
        .into_iter()
        .filter(|m| m.is_qualifying(game_mode))
        .filter_map(|m| {
            player_and_opponent(m, battle_tag).map(|pair| ResultPoint {
                start_time: m.start_time,
                won: pair.me.won,
            })
        })
        .collect();
    if points.is_empty() {
        return None;
    }

    let results: Vec<bool> = points.iter().map(|p| p.won).collect();
    let wins = results.iter().filter(|&&w| w).count();

    let recent = RECENT_WINDOWS
        .iter()
        .map(|&window| {
            let tail = &results[results.len().saturating_sub(window)..];
            let tail_wins = tail.iter().filter(|&&w| w).count();
            RecentForm {
                window,
                games: tail.len(),
                wins: tail_wins,
                win_rate: percent(tail_wins, tail.len()),
            }
        })
        .collect();

    Some(ConsistencyReport {
        battle_tag: battle_tag.to_string(),
        games: results.len() as u32,
        wins: wins as u32,
        losses: (results.len() - wins) as u32,
        win_rate: percent(wins, results.len()),
        streaks: streaks(&results),
        sessions: sessions(&points),
        recent,
        results: points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn streak_tracking() {
        let s = streaks(&[true, true, false, true, true, true, false, false]);
        assert_eq!(s.longest_win, 3);
        assert_eq!(s.longest_loss, 2);
        assert_eq!(s.current, -2);
        assert_eq!(streaks(&[]).current, 0);
    }

    #[test]
    fn sessions_split_on_long_gaps() {
        let at = |min: i64| Some(Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap() + Duration::minutes(min));
        let points = vec![
            ResultPoint { start_time: at(0), won: true },
            ResultPoint { start_time: at(25), won: false },
            ResultPoint { start_time: None, won: true },
            ResultPoint { start_time: at(56), won: true },
            ResultPoint { start_time: at(120), won: false },
        ];
        let out = sessions(&points);
        assert_eq!(out.len(), 3);
        assert_eq!((out[0].games, out[0].wins), (3, 2));
        assert_eq!(out[1].start, at(56));
        assert_eq!(out[2].losses, 1);
    }
}
