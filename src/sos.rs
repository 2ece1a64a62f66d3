use futures::future::join_all;
use tracing::debug;

use crate::match_fetch::MatchFetcher;
use crate::model::{LadderScope, MatchRecord, Race, player_and_opponent};
use crate::ranking::LadderRow;

/// Average pre-game opponent rating over the qualifying matches of
/// `battle_tag`; `None` when nothing qualifies. A `race` other than Random
/// keeps only games the player queued as that race.
pub fn schedule_strength(
    matches: &[MatchRecord],
    battle_tag: &str,
    game_mode: u32,
    race: Option<Race>,
) -> Option<f64> {
    let race_code = race.filter(|r| *r != Race::Random).map(Race::code);

    let mut sum = 0.0;
    let mut n = 0u32;
    for m in matches.iter().filter(|m| m.is_qualifying(game_mode)) {
        let Some(pair) = player_and_opponent(m, battle_tag) else {
            continue;
        };
        if race_code.is_some_and(|code| pair.me.race != Some(code)) {
            continue;
        }
        let Some(opp) = pair.opp.rating_before() else {
            continue;
        };
        sum += opp;
        n += 1;
    }

    (n > 0).then(|| sum / f64::from(n))
}

/// Fills `sos` on ladder rows from each player's current-season history.
pub struct SosCalculator<'a> {
    fetcher: &'a MatchFetcher,
    scope: LadderScope,
    concurrency: usize,
}

impl<'a> SosCalculator<'a> {
    pub fn new(fetcher: &'a MatchFetcher, scope: LadderScope, concurrency: usize) -> Self {
        Self {
            fetcher,
            scope,
            concurrency: concurrency.max(1),
        }
    }

    /// Processes rows in chunks of `concurrency`; each chunk's histories are
    /// fetched together and the next chunk starts once all have settled.
    pub async fn compute_sos(&self, rows: &mut [LadderRow], race: Option<Race>) {
        let fetcher = self.fetcher;
        let seasons = [self.scope.season];
        let gateway = self.scope.gateway;
        let game_mode = self.scope.game_mode;

        for (chunk_idx, chunk) in rows.chunks_mut(self.concurrency).enumerate() {
            debug!(chunk = chunk_idx, rows = chunk.len(), "schedule strength chunk");
            join_all(chunk.iter_mut().map(|row| async move {
                let matches = fetcher.fetch_all_matches(&row.battle_tag, gateway, &seasons).await;
                row.sos = schedule_strength(&matches, &row.battle_tag, game_mode, race);
            }))
            .await;
        }
    }
}
