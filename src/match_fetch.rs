use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coalesce::Coalescer;
use crate::config::FetchLimits;
use crate::model::{MatchRecord, normalize_match_entries, parse_match_entries};
use crate::ttl_cache::TtlCache;
use crate::upstream::{LadderApi, MatchPageQuery};

pub type MatchList = Arc<Vec<MatchRecord>>;

/// Full match histories, cached per `(tag, gateway, seasons)` and fetched at
/// most once at a time per key.
pub struct MatchFetcher {
    api: Arc<dyn LadderApi>,
    limits: FetchLimits,
    ttl: Duration,
    cache: Arc<TtlCache<String, MatchList>>,
    inflight: Coalescer<String, MatchList>,
}

impl MatchFetcher {
    pub fn new(api: Arc<dyn LadderApi>, limits: FetchLimits, ttl: Duration) -> Self {
        Self {
            api,
            limits,
            ttl,
            cache: Arc::new(TtlCache::new()),
            inflight: Coalescer::new(),
        }
    }

    pub fn limits(&self) -> FetchLimits {
        self.limits
    }

    /// Every match of `battle_tag` on `gateway` across `seasons`, seasons
    /// fetched concurrently and concatenated in the order given.
    pub async fn fetch_all_matches(&self, battle_tag: &str, gateway: u32, seasons: &[u32]) -> MatchList {
        let tag = battle_tag.trim();
        if tag.is_empty() {
            return Arc::new(Vec::new());
        }

        let key = match_cache_key(tag, gateway, seasons);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, matches = hit.len(), "match cache hit");
            return hit;
        }

        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let limits = self.limits;
        let tag = tag.to_string();
        let seasons = seasons.to_vec();
        let cache_key = key.clone();

        self.inflight
            .run(key, move || async move {
                let per_season = join_all(
                    seasons
                        .iter()
                        .map(|&season| fetch_season_matches(api.as_ref(), &tag, gateway, season, limits)),
                )
                .await;
                let matches: MatchList = Arc::new(per_season.into_iter().flatten().collect());
                info!(battle_tag = %tag, gateway, ?seasons, matches = matches.len(), "match history fetched");
                cache.set(cache_key, Arc::clone(&matches), ttl);
                matches
            })
            .await
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

pub fn match_cache_key(battle_tag: &str, gateway: u32, seasons: &[u32]) -> String {
    let seasons = seasons
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}@{gateway}-{seasons}", battle_tag.to_lowercase())
}

/// One season of one player, requested in rounds of `batch_size` pages.
///
/// Within a round, pages are examined in offset order; the first empty or
/// short page ends the season and every later page of that round is dropped
/// even though it was fetched. A failed page reads as empty, so an upstream
/// hiccup truncates the history at that point.
pub async fn fetch_season_matches(
    api: &dyn LadderApi,
    battle_tag: &str,
    gateway: u32,
    season: u32,
    limits: FetchLimits,
) -> Vec<MatchRecord> {
    let page_size = limits.page_size.max(1);
    let batch_size = limits.batch_size.max(1);
    let ceiling = page_size * limits.max_pages_per_season;

    let mut all = Vec::new();
    let mut offset = 0usize;

    loop {
        let queries: Vec<MatchPageQuery> = (0..batch_size)
            .map(|i| MatchPageQuery {
                battle_tag: battle_tag.to_string(),
                gateway,
                season,
                offset: offset + i * page_size,
                page_size,
            })
            .collect();
        let pages = join_all(queries.iter().map(|q| fetch_page(api, q))).await;

        let mut end_at = None;
        for (idx, entries) in pages.into_iter().enumerate() {
            if entries.is_empty() {
                end_at = Some(idx);
                break;
            }
            let short = entries.len() < page_size;
            all.extend(parse_match_entries(entries));
            if short {
                end_at = Some(idx);
                break;
            }
        }

        if let Some(idx) = end_at {
            let discarded = batch_size - idx - 1;
            if discarded > 0 {
                debug!(
                    battle_tag,
                    season,
                    end_offset = offset + idx * page_size,
                    discarded,
                    "end of data inside round, later pages dropped"
                );
            }
            break;
        }

        offset += batch_size * page_size;
        if offset >= ceiling {
            warn!(battle_tag, season, offset, "page ceiling reached, stopping");
            break;
        }
    }

    all
}

async fn fetch_page(api: &dyn LadderApi, query: &MatchPageQuery) -> Vec<Value> {
    match api.match_page(query).await {
        Ok(payload) => normalize_match_entries(payload),
        Err(err) => {
            warn!(
                battle_tag = %query.battle_tag,
                season = query.season,
                offset = query.offset,
                error = %err,
                "match page failed, treating as empty"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::match_cache_key;

    #[test]
    fn cache_key_lowercases_tag_and_joins_seasons() {
        assert_eq!(match_cache_key("Foo#123", 20, &[22, 23, 24]), "foo#123@20-22,23,24");
        assert_eq!(match_cache_key("Foo#123", 20, &[]), "foo#123@20-");
    }

    #[test]
    fn cache_key_separates_gateways() {
        assert_ne!(match_cache_key("Foo#123", 10, &[24]), match_cache_key("Foo#123", 20, &[24]));
    }
}
