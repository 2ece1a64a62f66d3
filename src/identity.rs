//! Turning user input into the upstream's canonical battle-tag, plus the
//! profile lookup that goes with it.
//!
//! The global search endpoint is the casing authority: whatever it returns is
//! used verbatim everywhere else, and lookups are case-insensitive.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::coalesce::Coalescer;
use crate::model::{lenient_id, lenient_list, lenient_text};
use crate::ttl_cache::TtlCache;
use crate::upstream::LadderApi;

const SEARCH_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchHit {
    #[serde(deserialize_with = "lenient_text")]
    pub battle_tag: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub seasons: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient_id")]
    pub relevance_id: Option<String>,
}

impl SearchHit {
    fn season_count(&self) -> usize {
        self.seasons.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlayer {
    pub battle_tag: String,
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub battle_tag: String,
    pub player_id: Option<String>,
    pub country_code: Option<String>,
    pub location: Option<String>,
    pub aka_country: Option<String>,
}

impl PlayerProfile {
    fn fallback(battle_tag: &str) -> Self {
        Self {
            battle_tag: battle_tag.to_string(),
            ..Self::default()
        }
    }
}

type Hits = Arc<Vec<SearchHit>>;

pub struct IdentityResolver {
    api: Arc<dyn LadderApi>,
    ttl: Duration,
    cache: Arc<TtlCache<String, Hits>>,
    inflight: Coalescer<String, Option<Hits>>,
}

impl IdentityResolver {
    pub fn new(api: Arc<dyn LadderApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            cache: Arc::new(TtlCache::new()),
            inflight: Coalescer::new(),
        }
    }

    /// Canonical battle-tag for `input` (`Name#1234`, possibly
    /// percent-encoded), or `None` when no such player exists.
    pub async fn resolve_battle_tag(&self, input: &str) -> Option<String> {
        self.resolve_battle_tag_and_player_id(input)
            .await
            .map(|resolved| resolved.battle_tag)
    }

    /// Same resolution, also returning the hit's relevance id as a player id
    /// fallback.
    pub async fn resolve_battle_tag_and_player_id(&self, input: &str) -> Option<ResolvedPlayer> {
        let raw = decode_input(input);
        let (name, id) = split_battle_tag(&raw)?;

        let hits = self.search(name).await?;
        let suffix = format!("#{id}").to_lowercase();

        let best = hits
            .iter()
            .filter(|hit| {
                hit.battle_tag
                    .as_deref()
                    .is_some_and(|tag| tag.to_lowercase().ends_with(&suffix))
            })
            .min_by_key(|hit| Reverse(hit.season_count()))?;

        let battle_tag = best.battle_tag.clone()?;
        debug!(input = %raw, %battle_tag, "battle-tag resolved");
        Some(ResolvedPlayer {
            battle_tag,
            player_id: best.relevance_id.clone().filter(|id| !id.is_empty()),
        })
    }

    async fn search(&self, name: &str) -> Option<Hits> {
        let key = name.to_string();
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }

        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let name = key.clone();

        self.inflight
            .run(key, move || async move {
                let payload = match api.global_search(&name, SEARCH_PAGE_SIZE).await {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(%name, error = %err, "global search failed");
                        return None;
                    }
                };
                let Value::Array(items) = payload else {
                    return None;
                };
                let hits: Hits = Arc::new(
                    items
                        .into_iter()
                        .filter_map(|item| serde_json::from_value::<SearchHit>(item).ok())
                        .collect(),
                );
                cache.set(name, Arc::clone(&hits), ttl);
                Some(hits)
            })
            .await
            .filter(|hits| !hits.is_empty())
    }

    /// Profile from `players/{tag}`, then `personal-settings/{tag}`, then a
    /// default carrying only the tag.
    pub async fn fetch_player_profile(&self, battle_tag: &str) -> PlayerProfile {
        if battle_tag.is_empty() {
            return PlayerProfile::fallback(battle_tag);
        }

        match self.api.player_profile(battle_tag).await {
            Ok(json) if !json.is_null() => {
                let canonical = pick_string(&json, &["battleTag"])
                    .or_else(|| pick_string(&json, &["battletag"]))
                    .or_else(|| pick_string(&json, &["id"]))
                    .unwrap_or_else(|| battle_tag.to_string());
                return PlayerProfile {
                    battle_tag: canonical,
                    player_id: pick_string(&json, &["playerId"]),
                    country_code: pick_string(&json, &["countryCode"]),
                    location: pick_string(&json, &["location"]),
                    aka_country: pick_string(&json, &["playerAkaData", "country"]),
                };
            }
            Ok(_) => {}
            Err(err) => warn!(battle_tag, error = %err, "players endpoint failed, falling back"),
        }

        match self.api.personal_settings(battle_tag).await {
            Ok(json) if !json.is_null() => PlayerProfile {
                battle_tag: battle_tag.to_string(),
                player_id: pick_string(&json, &["playerId"]),
                country_code: pick_string(&json, &["countryCode"]),
                location: pick_string(&json, &["location"]),
                aka_country: None,
            },
            Ok(_) => PlayerProfile::fallback(battle_tag),
            Err(err) => {
                warn!(battle_tag, error = %err, "personal settings failed");
                PlayerProfile::fallback(battle_tag)
            }
        }
    }
}

/// Percent-decodes and trims; malformed encodings are kept as typed.
pub fn decode_input(input: &str) -> String {
    let raw = input.trim();
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `Name#1234` into its two halves; both must be non-empty.
pub fn split_battle_tag(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.split('#');
    let name = parts.next()?;
    let id = parts.next()?;
    if name.is_empty() || id.is_empty() {
        return None;
    }
    Some((name, id))
}

fn pick_string(json: &Value, path: &[&str]) -> Option<String> {
    let mut node = json;
    for key in path {
        node = node.get(key)?;
    }
    let s = node.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}
