pub mod coalesce;
pub mod config;
pub mod http_client;
pub mod identity;
pub mod leaderboard;
pub mod match_fetch;
pub mod model;
pub mod player_rank;
pub mod ranking;
pub mod service;
pub mod sos;
pub mod stats_common;
pub mod stats_consistency;
pub mod stats_country;
pub mod stats_heroes;
pub mod stats_maps;
pub mod stats_opponents;
pub mod stats_performance;
pub mod stats_summary;
pub mod ttl_cache;
pub mod upstream;
