use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::hint::black_box;

use ladder_stats::leaderboard::{build_inputs, flatten_ladder};
use ladder_stats::model::normalize_matches;
use ladder_stats::ranking::{LadderInputRow, build_ladder};
use ladder_stats::stats_performance::performance_by_gap;

const RACES: [i64; 5] = [0, 1, 2, 4, 8];

fn random_inputs(n: usize) -> Vec<LadderInputRow> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|idx| {
            let games = rng.gen_range(5..400);
            LadderInputRow {
                battle_tag: format!("Player{idx}#{}", 1000 + idx),
                rating: rng.gen_range(800.0..2600.0_f64).round(),
                wins: rng.gen_range(0..=games),
                games,
                sos: rng.gen_bool(0.3).then(|| rng.gen_range(1200.0..2200.0)),
            }
        })
        .collect()
}

/// League pages shaped like the live endpoint: rows nested under
/// `player`/`playersInfo` arrays, with some players on several races.
fn random_league_pages(leagues: usize, rows_per_league: usize) -> Value {
    let mut rng = StdRng::seed_from_u64(11);
    let pages: Vec<Value> = (0..leagues)
        .map(|league| {
            let rows: Vec<Value> = (0..rows_per_league)
                .map(|idx| {
                    let id = rng.gen_range(0..leagues * rows_per_league / 2);
                    json!({
                        "race": RACES[rng.gen_range(0..RACES.len())],
                        "player1Id": format!("Player{id}#{}", 1000 + id),
                        "player": {
                            "mmr": rng.gen_range(800.0..2600.0_f64),
                            "games": rng.gen_range(0..300),
                            "wins": rng.gen_range(0..150),
                        },
                        "playersInfo": [{"battleTag": format!("Player{id}#{}", 1000 + id)}],
                        "rankNumber": league * rows_per_league + idx,
                    })
                })
                .collect();
            Value::Array(rows)
        })
        .collect();
    Value::Array(pages)
}

fn bench_build_ladder(c: &mut Criterion) {
    let inputs = random_inputs(5_000);
    c.bench_function("build_ladder_5000", |b| {
        b.iter(|| {
            let ladder = build_ladder(black_box(inputs.clone()));
            black_box(ladder.len());
        })
    });
}

fn bench_flatten_ladder(c: &mut Criterion) {
    let payload = random_league_pages(31, 200);
    c.bench_function("flatten_and_dedupe_31_leagues", |b| {
        b.iter(|| {
            let rows = flatten_ladder(black_box(&payload));
            let inputs = build_inputs(&rows, 5);
            black_box(inputs.len());
        })
    });
}

fn bench_match_parse_and_aggregate(c: &mut Criterion) {
    let page: Value = serde_json::from_str(MATCHES_JSON).unwrap();
    let entries = page["matches"].as_array().cloned().unwrap_or_default();
    let big = json!({ "matches": (0..40).flat_map(|_| entries.clone()).collect::<Vec<_>>() });
    c.bench_function("match_parse_and_gap_buckets", |b| {
        b.iter(|| {
            let matches = normalize_matches(black_box(big.clone()));
            let report = performance_by_gap(&matches, "Grubby#1278", 1);
            black_box(report.overall.games);
        })
    });
}

criterion_group!(perf, bench_build_ladder, bench_flatten_ladder, bench_match_parse_and_aggregate);
criterion_main!(perf);

static MATCHES_JSON: &str = include_str!("../tests/fixtures/matches_page.json");
