use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ladder_stats::config::LadderConfig;
use ladder_stats::service::{LadderRequest, LadderService};
use ladder_stats::upstream::W3cClient;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let limit = std::env::var("DEBUG_PREFETCH_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(1, 100);

    let config = LadderConfig::from_env();
    let seasons = [config.season];
    let gateway = config.gateway;
    let client = W3cClient::new(config.api_base.clone(), config.http_timeout)
        .with_context(|| format!("build client for {}", config.api_base))?;
    let service = LadderService::new(Arc::new(client), config);

    let mut req = LadderRequest::new(service.config().scope());
    req.page_size = limit;
    let page = service.get_ladder(&req).await;
    println!(
        "Ladder has {} rows; prefetching top {}:",
        page.total_count,
        page.top.len()
    );

    for row in &page.top {
        let matches = service.matches().fetch_all_matches(&row.battle_tag, gateway, &seasons).await;
        if matches.is_empty() {
            println!("EMPTY #{:<4} {}", row.rank, row.battle_tag);
        } else {
            println!(
                "OK    #{:<4} {}: {} matches, sos={}",
                row.rank,
                row.battle_tag,
                matches.len(),
                row.sos.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"))
            );
        }
    }
    println!("Cached histories: {}", service.matches().cached_entries());

    Ok(())
}
