//! The ranked-ladder backend as seen by the core.
//!
//! [`LadderApi`] has one method per endpoint; [`W3cClient`] implements it
//! over HTTP. Callers never see a panic or an exception from here: every
//! failure is an [`UpstreamError`] that the fetch layer turns into "no data".

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::coalesce::Coalescer;
use crate::http_client::http_client;
use crate::model::LadderScope;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("upstream answered with status {status}")]
    Status { status: u16 },

    #[error("malformed response body: {0}")]
    Decode(String),
}

pub type UpstreamResult = Result<Value, UpstreamError>;

/// One page of a player's match search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchPageQuery {
    pub battle_tag: String,
    pub gateway: u32,
    pub season: u32,
    pub offset: usize,
    pub page_size: usize,
}

#[async_trait]
pub trait LadderApi: Send + Sync {
    async fn match_page(&self, query: &MatchPageQuery) -> UpstreamResult;

    async fn league_page(&self, league: u32, scope: &LadderScope) -> UpstreamResult;

    async fn country_ladder(&self, country: &str, scope: &LadderScope) -> UpstreamResult;

    async fn player_profile(&self, battle_tag: &str) -> UpstreamResult;

    async fn personal_settings(&self, battle_tag: &str) -> UpstreamResult;

    async fn global_search(&self, name: &str, page_size: usize) -> UpstreamResult;
}

/// HTTP implementation of [`LadderApi`]. Identical GETs that overlap in time
/// share one round trip.
pub struct W3cClient {
    client: Client,
    base: String,
    inflight: Coalescer<String, UpstreamResult>,
}

impl W3cClient {
    pub fn new(base: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self::with_client(http_client(timeout)?, base))
    }

    pub fn with_client(client: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            client,
            base,
            inflight: Coalescer::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn get_json(&self, url: String) -> UpstreamResult {
        let key = format!("GET:{url}");
        let client = self.client.clone();
        self.inflight
            .run(key, move || fetch_json(client, url))
            .await
    }
}

#[async_trait]
impl LadderApi for W3cClient {
    async fn match_page(&self, query: &MatchPageQuery) -> UpstreamResult {
        self.get_json(match_search_url(&self.base, query)).await
    }

    async fn league_page(&self, league: u32, scope: &LadderScope) -> UpstreamResult {
        self.get_json(league_url(&self.base, league, scope)).await
    }

    async fn country_ladder(&self, country: &str, scope: &LadderScope) -> UpstreamResult {
        self.get_json(country_ladder_url(&self.base, country, scope))
            .await
    }

    async fn player_profile(&self, battle_tag: &str) -> UpstreamResult {
        let url = format!("{}/players/{}", self.base, urlencoding::encode(battle_tag));
        self.get_json(url).await
    }

    async fn personal_settings(&self, battle_tag: &str) -> UpstreamResult {
        let url = format!(
            "{}/personal-settings/{}",
            self.base,
            urlencoding::encode(battle_tag)
        );
        self.get_json(url).await
    }

    async fn global_search(&self, name: &str, page_size: usize) -> UpstreamResult {
        self.get_json(global_search_url(&self.base, name, page_size))
            .await
    }
}

async fn fetch_json(client: Client, url: String) -> UpstreamResult {
    debug!(%url, "upstream get");
    let resp = client.get(&url).send().await.map_err(|err| {
        warn!(%url, error = %err, "upstream request failed");
        UpstreamError::Transport(err.to_string())
    })?;

    let status = resp.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "upstream returned non-success");
        return Err(UpstreamError::Status {
            status: status.as_u16(),
        });
    }

    resp.json::<Value>().await.map_err(|err| {
        warn!(%url, error = %err, "upstream body was not json");
        UpstreamError::Decode(err.to_string())
    })
}

pub(crate) fn match_search_url(base: &str, query: &MatchPageQuery) -> String {
    format!(
        "{base}/matches/search?playerId={}&gateway={}&season={}&offset={}&pageSize={}",
        urlencoding::encode(&query.battle_tag),
        query.gateway,
        query.season,
        query.offset,
        query.page_size
    )
}

pub(crate) fn league_url(base: &str, league: u32, scope: &LadderScope) -> String {
    format!(
        "{base}/ladder/{league}?gateWay={}&gameMode={}&season={}",
        scope.gateway, scope.game_mode, scope.season
    )
}

pub(crate) fn country_ladder_url(base: &str, country: &str, scope: &LadderScope) -> String {
    format!(
        "{base}/ladder/country/{}?gateWay={}&gameMode={}&season={}",
        urlencoding::encode(country),
        scope.gateway,
        scope.game_mode,
        scope.season
    )
}

pub(crate) fn global_search_url(base: &str, name: &str, page_size: usize) -> String {
    format!(
        "{base}/players/global-search?search={}&pageSize={page_size}",
        urlencoding::encode(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.test/api";

    fn scope() -> LadderScope {
        LadderScope {
            gateway: 20,
            season: 24,
            game_mode: 1,
        }
    }

    #[test]
    fn match_search_url_encodes_battle_tag() {
        let query = MatchPageQuery {
            battle_tag: "Grubby#1278".to_string(),
            gateway: 20,
            season: 24,
            offset: 100,
            page_size: 50,
        };
        assert_eq!(
            match_search_url(BASE, &query),
            "https://example.test/api/matches/search?playerId=Grubby%231278&gateway=20&season=24&offset=100&pageSize=50"
        );
    }

    #[test]
    fn ladder_urls_carry_scope() {
        assert_eq!(
            league_url(BASE, 3, &scope()),
            "https://example.test/api/ladder/3?gateWay=20&gameMode=1&season=24"
        );
        assert_eq!(
            country_ladder_url(BASE, "DE", &scope()),
            "https://example.test/api/ladder/country/DE?gateWay=20&gameMode=1&season=24"
        );
    }

    #[test]
    fn search_url_encodes_name() {
        assert_eq!(
            global_search_url(BASE, "Moon Walker", 20),
            "https://example.test/api/players/global-search?search=Moon%20Walker&pageSize=20"
        );
    }
}
