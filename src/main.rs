use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ladder_stats::config::LadderConfig;
use ladder_stats::model::Race;
use ladder_stats::service::{LadderRequest, LadderService, StatisticKind};
use ladder_stats::upstream::W3cClient;

const USAGE: &str = "usage:
  ladder_stats ladder [--page N] [--page-size N] [--race human|orc|elf|undead|random] [--tag NAME#1234]
  ladder_stats player NAME#1234 summary|performance|heroes|maps|countries|consistency|opponents|rank
  ladder_stats player NAME#1234 vs OPPONENT#5678
  ladder_stats rank NAME#1234
  ladder_stats resolve NAME#1234";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let config = LadderConfig::from_env();
    let client = W3cClient::new(config.api_base.clone(), config.http_timeout).context("build upstream client")?;
    let service = LadderService::new(Arc::new(client), config);

    match command.as_str() {
        "ladder" => {
            let req = ladder_request(&service, rest)?;
            print_json(&service.get_ladder(&req).await)
        }
        "player" => {
            let [tag, kind, extra @ ..] = rest else {
                bail!("player needs a battle-tag and a statistic\n{USAGE}");
            };
            let kind = StatisticKind::from_name(kind, extra.first().map(String::as_str))
                .ok_or_else(|| anyhow!("unknown statistic {kind:?}\n{USAGE}"))?;
            match service.get_player_statistics(tag, kind).await {
                Some(stats) => print_json(stats.as_ref()),
                None => not_found(tag),
            }
        }
        "rank" => {
            let tag = rest.first().ok_or_else(|| anyhow!("rank needs a battle-tag"))?;
            match service.get_player_rank(tag).await {
                Some(report) => print_json(&report),
                None => not_found(tag),
            }
        }
        "resolve" => {
            let tag = rest.first().ok_or_else(|| anyhow!("resolve needs a battle-tag"))?;
            match service.identity().resolve_battle_tag_and_player_id(tag).await {
                Some(resolved) => print_json(&resolved),
                None => not_found(tag),
            }
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

fn ladder_request(service: &LadderService, args: &[String]) -> Result<LadderRequest> {
    let mut req = LadderRequest::new(service.config().scope());
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .with_context(|| format!("{flag} needs a value"))?;
        match flag.as_str() {
            "--page" => req.page = value.parse().with_context(|| format!("invalid page {value:?}"))?,
            "--page-size" => {
                req.page_size = value
                    .parse()
                    .with_context(|| format!("invalid page size {value:?}"))?
            }
            "--race" => req.race = Some(Race::from_key(value).ok_or_else(|| anyhow!("unknown race {value:?}"))?),
            "--tag" => req.battle_tag = Some(value.clone()),
            other => bail!("unknown flag {other:?}\n{USAGE}"),
        }
    }
    Ok(req)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}

fn not_found(tag: &str) -> Result<()> {
    eprintln!("no data for {tag}");
    Ok(())
}
