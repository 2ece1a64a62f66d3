use std::env;
use std::time::Duration;

use crate::model::LadderScope;

pub const DEFAULT_API_BASE: &str = "https://website-backend.w3champions.com/api";

pub const PAGE_SIZE: usize = 50;
pub const MAX_PAGES_PER_SEASON: usize = 2000;
pub const MIN_DURATION_SECONDS: f64 = 120.0;

pub const SUMMARY_SEASONS_BACK: u32 = 3;
pub const LIFETIME_SEASONS_BACK: u32 = 4;

const DEFAULT_SEASON: u32 = 24;
const DEFAULT_GAME_MODE: u32 = 1;
const DEFAULT_GATEWAY: u32 = 20;
const DEFAULT_MIN_GAMES: u32 = 5;
const DEFAULT_MAX_LEAGUE: u32 = 30;
const DEFAULT_RANK_MAX_LEAGUE: u32 = 76;
const DEFAULT_RACE_MIN_LIFETIME_GAMES: u32 = 35;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_SOS_CONCURRENCY: usize = 25;

/// Knobs for the paginated match fetcher.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub page_size: usize,
    pub batch_size: usize,
    pub max_pages_per_season: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            max_pages_per_season: MAX_PAGES_PER_SEASON,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub matches: Duration,
    pub leagues: Duration,
    pub search: Duration,
    pub stats: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            matches: Duration::from_secs(10 * 60),
            leagues: Duration::from_secs(60),
            search: Duration::from_secs(30),
            stats: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LadderConfig {
    pub api_base: String,
    pub http_timeout: Option<Duration>,
    pub season: u32,
    pub game_mode: u32,
    pub gateway: u32,
    pub min_games: u32,
    pub max_league: u32,
    /// Deepest tier scanned for the rank report's global pools.
    pub rank_max_league: u32,
    pub race_min_lifetime_games: u32,
    pub sos_concurrency: usize,
    pub limits: FetchLimits,
    pub ttls: CacheTtls,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: None,
            season: DEFAULT_SEASON,
            game_mode: DEFAULT_GAME_MODE,
            gateway: DEFAULT_GATEWAY,
            min_games: DEFAULT_MIN_GAMES,
            max_league: DEFAULT_MAX_LEAGUE,
            rank_max_league: DEFAULT_RANK_MAX_LEAGUE,
            race_min_lifetime_games: DEFAULT_RACE_MIN_LIFETIME_GAMES,
            sos_concurrency: DEFAULT_SOS_CONCURRENCY,
            limits: FetchLimits::default(),
            ttls: CacheTtls::default(),
        }
    }
}

impl LadderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_base = opt_env("W3C_API_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);
        let http_timeout = env_u64("W3C_HTTP_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let limits = FetchLimits {
            batch_size: env_u64("MATCH_BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_BATCH_SIZE)
                .clamp(1, 32),
            ..FetchLimits::default()
        };

        let ttls = CacheTtls {
            matches: env_secs("MATCH_CACHE_TTL_SECS").unwrap_or(defaults.ttls.matches),
            leagues: env_secs("LEAGUE_CACHE_TTL_SECS").unwrap_or(defaults.ttls.leagues),
            search: env_secs("SEARCH_CACHE_TTL_SECS").unwrap_or(defaults.ttls.search),
            stats: env_secs("STATS_CACHE_TTL_SECS").unwrap_or(defaults.ttls.stats),
        };

        Self {
            api_base,
            http_timeout,
            season: env_u64("LADDER_SEASON").map(|v| v as u32).unwrap_or(DEFAULT_SEASON),
            game_mode: env_u64("LADDER_GAME_MODE")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_GAME_MODE),
            gateway: env_u64("LADDER_GATEWAY").map(|v| v as u32).unwrap_or(DEFAULT_GATEWAY),
            min_games: env_u64("LADDER_MIN_GAMES")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_MIN_GAMES),
            max_league: env_u64("LADDER_MAX_LEAGUE")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_MAX_LEAGUE)
                .min(200),
            rank_max_league: env_u64("LADDER_RANK_MAX_LEAGUE")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_RANK_MAX_LEAGUE)
                .min(200),
            race_min_lifetime_games: env_u64("LADDER_RACE_MIN_LIFETIME_GAMES")
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_RACE_MIN_LIFETIME_GAMES),
            sos_concurrency: env_u64("SOS_CONCURRENCY")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_SOS_CONCURRENCY)
                .clamp(1, 100),
            limits,
            ttls,
        }
    }

    /// Scope of the current-season ladder for the configured region.
    pub fn scope(&self) -> LadderScope {
        LadderScope {
            gateway: self.gateway,
            season: self.season,
            game_mode: self.game_mode,
        }
    }

    /// Seasons replayed by the summary aggregator (current plus three back).
    pub fn summary_seasons(&self) -> Vec<u32> {
        season_window(self.season, SUMMARY_SEASONS_BACK)
    }

    /// Seasons counted towards lifetime race eligibility.
    pub fn lifetime_seasons(&self) -> Vec<u32> {
        season_window(self.season, LIFETIME_SEASONS_BACK)
    }
}

/// `current - back ..= current`, saturating at season zero.
pub fn season_window(current: u32, back: u32) -> Vec<u32> {
    (current.saturating_sub(back)..=current).collect()
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

fn env_u64(key: &str) -> Option<u64> {
    opt_env(key).and_then(|val| val.trim().parse::<u64>().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_u64(key).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::season_window;

    #[test]
    fn season_window_is_inclusive_and_saturates() {
        assert_eq!(season_window(24, 3), vec![21, 22, 23, 24]);
        assert_eq!(season_window(2, 4), vec![0, 1, 2]);
    }
}
