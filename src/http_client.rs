use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

const USER_AGENT: &str = concat!("ladder_stats/", env!("CARGO_PKG_VERSION"));
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Async client shared by every upstream call. No request timeout unless one
/// is configured: a hung upstream call hangs the request that issued it.
pub fn http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build http client")
}
