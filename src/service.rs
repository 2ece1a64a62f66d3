//! The public face of the core: ladders, per-player statistics and rank
//! reports, all built from one set of process-wide caches.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{LIFETIME_SEASONS_BACK, LadderConfig, PAGE_SIZE, season_window};
use crate::identity::{IdentityResolver, ResolvedPlayer, decode_input};
use crate::leaderboard::{LeaderboardFetcher, build_inputs, race_inputs};
use crate::match_fetch::{MatchFetcher, MatchList};
use crate::model::{LadderScope, Race};
use crate::player_rank::{RankInputs, RankReport, build_rank_report, infer_country};
use crate::ranking::{LadderRow, build_ladder};
use crate::sos::SosCalculator;
use crate::stats_common::count_race_games;
use crate::stats_consistency::{ConsistencyReport, consistency};
use crate::stats_country::{CountryReport, country_breakdown};
use crate::stats_heroes::{HeroReport, hero_matchups};
use crate::stats_maps::{MapReport, map_breakdown};
use crate::stats_opponents::{HeadToHead, OpponentReport, head_to_head, opponent_breakdown};
use crate::stats_performance::{PerformanceReport, performance_by_gap};
use crate::stats_summary::{PlayerSummary, summarize};
use crate::ttl_cache::TtlCache;
use crate::upstream::LadderApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRequest {
    pub scope: LadderScope,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub race: Option<Race>,
    /// Raw user input; resolved before use.
    pub battle_tag: Option<String>,
}

impl LadderRequest {
    pub fn new(scope: LadderScope) -> Self {
        Self {
            scope,
            page: 1,
            page_size: PAGE_SIZE,
            race: None,
            battle_tag: None,
        }
    }

    fn window(&self, len: usize) -> Range<usize> {
        let size = self.page_size.max(1);
        let start = (self.page.max(1) - 1).saturating_mul(size).min(len);
        start..start.saturating_add(size).min(len)
    }

    fn top(&self, len: usize) -> Range<usize> {
        0..self.page_size.max(1).min(len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderPage {
    pub battle_tag: Option<String>,
    pub race: Option<Race>,
    pub rows: Vec<LadderRow>,
    pub total_count: usize,
    pub top: Vec<LadderRow>,
    pub me: Option<LadderRow>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatisticKind {
    Summary,
    Performance,
    Heroes,
    Maps,
    Countries,
    Consistency,
    Opponents,
    /// Raw opponent input, resolved like any other battle-tag.
    HeadToHead(String),
    Rank,
}

impl StatisticKind {
    /// Parses a kind name; `head-to-head` needs the opponent.
    pub fn from_name(name: &str, opponent: Option<&str>) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "summary" => Self::Summary,
            "performance" => Self::Performance,
            "heroes" => Self::Heroes,
            "maps" => Self::Maps,
            "countries" | "country" => Self::Countries,
            "consistency" => Self::Consistency,
            "opponents" => Self::Opponents,
            "head-to-head" | "h2h" | "vs" => Self::HeadToHead(opponent?.to_string()),
            "rank" => Self::Rank,
            _ => return None,
        };
        Some(kind)
    }

    fn cache_key(&self, battle_tag: &str) -> String {
        let tag = battle_tag.to_lowercase();
        match self {
            Self::HeadToHead(opp) => format!("{self}:{tag}:{}", decode_input(opp).to_lowercase()),
            _ => format!("{self}:{tag}"),
        }
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summary => "summary",
            Self::Performance => "performance",
            Self::Heroes => "heroes",
            Self::Maps => "maps",
            Self::Countries => "countries",
            Self::Consistency => "consistency",
            Self::Opponents => "opponents",
            Self::HeadToHead(_) => "head-to-head",
            Self::Rank => "rank",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum PlayerStatistics {
    Summary(PlayerSummary),
    Performance(PerformanceReport),
    Heroes(HeroReport),
    Maps(MapReport),
    Countries(CountryReport),
    Consistency(ConsistencyReport),
    Opponents(OpponentReport),
    HeadToHead(HeadToHead),
    Rank(RankReport),
}

pub struct LadderService {
    config: LadderConfig,
    matches: MatchFetcher,
    leaderboard: LeaderboardFetcher,
    rank_pool: LeaderboardFetcher,
    identity: IdentityResolver,
    stats: TtlCache<String, Arc<PlayerStatistics>>,
}

impl LadderService {
    pub fn new(api: Arc<dyn LadderApi>, config: LadderConfig) -> Self {
        let ttls = config.ttls;
        Self {
            matches: MatchFetcher::new(Arc::clone(&api), config.limits, ttls.matches),
            leaderboard: LeaderboardFetcher::new(Arc::clone(&api), config.max_league, ttls.leagues),
            rank_pool: LeaderboardFetcher::new(Arc::clone(&api), config.rank_max_league, ttls.leagues),
            identity: IdentityResolver::new(api, ttls.search),
            stats: TtlCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &LadderConfig {
        &self.config
    }

    pub fn matches(&self) -> &MatchFetcher {
        &self.matches
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// One page of the ranked ladder for `req.scope`, optionally restricted
    /// to one race, with schedule strength filled in for the rows shown.
    pub async fn get_ladder(&self, req: &LadderRequest) -> LadderPage {
        let battle_tag = match req.battle_tag.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(input) => self.identity.resolve_battle_tag(input).await,
            None => None,
        };

        let snapshot = self.leaderboard.fetch_all_leagues(req.scope).await;
        let inputs = match req.race {
            Some(race) => race_inputs(&snapshot, race.code(), self.config.min_games),
            None => build_inputs(&snapshot, self.config.min_games),
        };
        let mut ladder = build_ladder(inputs);

        if let Some(race) = req.race {
            ladder = self.drop_ineligible(ladder, req, race).await;
        }

        let visible = req.window(ladder.len());
        let top = req.top(ladder.len());
        let me = battle_tag.as_deref().and_then(|tag| {
            let lower = tag.to_lowercase();
            ladder.iter().position(|r| r.battle_tag.to_lowercase() == lower)
        });

        let mut seen = HashSet::new();
        let targets: Vec<usize> = visible
            .clone()
            .chain(top.clone())
            .chain(me)
            .filter(|&idx| seen.insert(ladder[idx].battle_tag.to_lowercase()))
            .collect();
        let mut sampled: Vec<LadderRow> = targets.iter().map(|&idx| ladder[idx].clone()).collect();
        SosCalculator::new(&self.matches, req.scope, self.config.sos_concurrency)
            .compute_sos(&mut sampled, req.race)
            .await;
        for (&idx, row) in targets.iter().zip(sampled) {
            ladder[idx].sos = row.sos;
        }

        info!(
            race = ?req.race,
            page = req.page,
            total = ladder.len(),
            sos_rows = targets.len(),
            "ladder page built"
        );

        LadderPage {
            battle_tag,
            race: req.race,
            rows: ladder[visible].to_vec(),
            total_count: ladder.len(),
            top: ladder[top].to_vec(),
            me: me.map(|idx| ladder[idx].clone()),
            updated_at: Utc::now(),
        }
    }

    /// Removes sampled rows (requested page and top slice) whose lifetime
    /// games with `race` fall below the configured floor. Rows outside the
    /// sample are kept unchecked; ranks are left as assigned.
    async fn drop_ineligible(&self, ladder: Vec<LadderRow>, req: &LadderRequest, race: Race) -> Vec<LadderRow> {
        let mut seen = HashSet::new();
        let sample: Vec<String> = req
            .window(ladder.len())
            .chain(req.top(ladder.len()))
            .map(|idx| ladder[idx].battle_tag.clone())
            .filter(|tag| seen.insert(tag.clone()))
            .collect();

        let seasons = season_window(req.scope.season, LIFETIME_SEASONS_BACK);
        let floor = self.config.race_min_lifetime_games as usize;
        let gateway = req.scope.gateway;
        let game_mode = req.scope.game_mode;

        let mut ineligible = HashSet::new();
        for chunk in sample.chunks(self.config.sos_concurrency.max(1)) {
            let verdicts = join_all(chunk.iter().map(|tag| {
                let seasons = &seasons;
                async move {
                    let matches = self.matches.fetch_all_matches(tag, gateway, seasons).await;
                    count_race_games(&matches, tag, race, game_mode) >= floor
                }
            }))
            .await;
            for (tag, eligible) in chunk.iter().zip(verdicts) {
                if !eligible {
                    ineligible.insert(tag.clone());
                }
            }
        }

        debug!(%race, sampled = sample.len(), dropped = ineligible.len(), "race eligibility checked");
        ladder
            .into_iter()
            .filter(|row| !ineligible.contains(&row.battle_tag))
            .collect()
    }

    /// Aggregated statistics of one kind for `input`. `None` when the player
    /// cannot be resolved or has no games for kinds that need them.
    pub async fn get_player_statistics(&self, input: &str, kind: StatisticKind) -> Option<Arc<PlayerStatistics>> {
        let resolved = self.identity.resolve_battle_tag_and_player_id(input).await?;
        let key = kind.cache_key(&resolved.battle_tag);
        if let Some(hit) = self.stats.get(&key) {
            debug!(%key, "statistics cache hit");
            return Some(hit);
        }

        let stats = Arc::new(self.compute_statistics(&resolved, &kind).await?);
        self.stats.set(key, Arc::clone(&stats), self.config.ttls.stats);
        Some(stats)
    }

    async fn compute_statistics(&self, player: &ResolvedPlayer, kind: &StatisticKind) -> Option<PlayerStatistics> {
        let tag = player.battle_tag.as_str();
        let season = self.config.season;
        let game_mode = self.config.game_mode;

        let stats = match kind {
            StatisticKind::Summary => {
                let matches = self
                    .matches
                    .fetch_all_matches(tag, self.config.gateway, &self.config.summary_seasons())
                    .await;
                non_empty(&matches)?;
                PlayerStatistics::Summary(summarize(&matches, tag, season, game_mode))
            }
            StatisticKind::Performance => {
                let matches = non_empty(&self.current_season(tag).await)?;
                PlayerStatistics::Performance(performance_by_gap(&matches, tag, game_mode))
            }
            StatisticKind::Heroes => {
                let matches = non_empty(&self.current_season(tag).await)?;
                PlayerStatistics::Heroes(hero_matchups(&matches, tag, player.player_id.as_deref(), game_mode))
            }
            StatisticKind::Maps => {
                let matches = non_empty(&self.current_season(tag).await)?;
                PlayerStatistics::Maps(map_breakdown(&matches, tag, game_mode))
            }
            StatisticKind::Countries => {
                let (matches, profile) =
                    futures::join!(self.current_season(tag), self.identity.fetch_player_profile(tag));
                PlayerStatistics::Countries(country_breakdown(&matches, tag, &profile))
            }
            StatisticKind::Consistency => {
                let matches = self.current_season(tag).await;
                PlayerStatistics::Consistency(consistency(&matches, tag, game_mode)?)
            }
            StatisticKind::Opponents => {
                let matches = self.current_season(tag).await;
                PlayerStatistics::Opponents(opponent_breakdown(&matches, tag, season, game_mode))
            }
            StatisticKind::HeadToHead(opponent) => {
                let (matches, resolved) =
                    futures::join!(self.current_season(tag), self.identity.resolve_battle_tag(opponent));
                let opponent = resolved.unwrap_or_else(|| decode_input(opponent));
                let report = opponent_breakdown(&matches, tag, season, game_mode);
                PlayerStatistics::HeadToHead(head_to_head(&report, &opponent))
            }
            StatisticKind::Rank => PlayerStatistics::Rank(self.rank_report(tag).await),
        };
        Some(stats)
    }

    /// Per-race global and country ladder positions for `input`.
    pub async fn get_player_rank(&self, input: &str) -> Option<RankReport> {
        let tag = self.identity.resolve_battle_tag(input).await?;
        Some(self.rank_report(&tag).await)
    }

    async fn rank_report(&self, tag: &str) -> RankReport {
        let scope = self.config.scope();
        let lifetime = self.config.lifetime_seasons();
        let (profile, current, lifetime_matches) = futures::join!(
            self.identity.fetch_player_profile(tag),
            self.current_season(tag),
            self.matches.fetch_all_matches(tag, scope.gateway, &lifetime),
        );

        let country = infer_country(&current, tag, &profile);
        let (snapshot, country_rows) = futures::join!(self.rank_pool.fetch_all_leagues(scope), async {
            match country.as_deref() {
                Some(cc) => self.leaderboard.fetch_country_ladder(cc, scope).await,
                None => Vec::new(),
            }
        });

        build_rank_report(&RankInputs {
            battle_tag: tag,
            player_id: profile.player_id.as_deref(),
            season: scope.season,
            game_mode: scope.game_mode,
            country: country.as_deref(),
            snapshot: &snapshot,
            country_rows: &country_rows,
            lifetime_matches: &lifetime_matches,
            min_games: self.config.min_games,
            min_lifetime_games: self.config.race_min_lifetime_games,
            as_of: Utc::now(),
        })
    }

    async fn current_season(&self, tag: &str) -> MatchList {
        self.matches
            .fetch_all_matches(tag, self.config.gateway, &[self.config.season])
            .await
    }
}

fn non_empty(matches: &MatchList) -> Option<MatchList> {
    (!matches.is_empty()).then(|| Arc::clone(matches))
}
