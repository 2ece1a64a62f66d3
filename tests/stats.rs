mod common;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use common::{duel, fixture_json, player};
use ladder_stats::identity::PlayerProfile;
use ladder_stats::model::{MatchRecord, Race, normalize_matches};
use ladder_stats::stats_common::count_race_games;
use ladder_stats::stats_consistency::consistency;
use ladder_stats::stats_country::country_breakdown;
use ladder_stats::stats_heroes::hero_matchups;
use ladder_stats::stats_maps::map_breakdown;
use ladder_stats::stats_opponents::{head_to_head, opponent_breakdown};
use ladder_stats::stats_performance::performance_by_gap;
use ladder_stats::stats_summary::summarize;

const TAG: &str = "Grubby#1278";

fn fixture_matches() -> Vec<MatchRecord> {
    normalize_matches(fixture_json("matches_page.json"))
}

#[test]
fn performance_splits_by_rating_gap() {
    let report = performance_by_gap(&fixture_matches(), TAG, 1);

    assert_eq!((report.overall.games, report.overall.wins), (4, 3));
    assert_eq!((report.higher.games, report.higher.wins), (2, 2));
    assert_eq!((report.lower.games, report.lower.wins), (2, 1));
    assert_eq!(report.even.games, 0);

    let buckets: Vec<(i64, Option<i64>, u32)> = report
        .buckets
        .iter()
        .map(|b| (b.min, b.max, b.record.games))
        .collect();
    assert_eq!(buckets, vec![(-100, Some(-50), 2), (50, Some(100), 1), (200, Some(250), 1)]);
}

#[test]
fn maps_group_by_resolved_name() {
    let report = map_breakdown(&fixture_matches(), TAG, 1);

    assert_eq!(report.maps.len(), 2);
    let hill = &report.maps[0];
    assert_eq!(hill.map, "Concealed Hill");
    assert_eq!((hill.games, hill.wins, hill.losses), (3, 2, 1));
    assert_eq!(hill.win_rate, 66.7);
    assert_eq!(hill.avg_minutes, 23.3);
    assert_eq!(hill.net_rating, 0.0);
    assert_eq!((hill.vs_higher, hill.vs_lower), (2, 1));
    assert_eq!(hill.hero_counts, [1, 2, 0]);

    assert_eq!(report.maps[1].map, "AutumnLeaves");
    assert_eq!(report.top_maps[0].map, "AutumnLeaves");
    assert_eq!(report.worst_maps[0].map, "Concealed Hill");

    let durations: Vec<(&str, u32, u32)> = report
        .durations
        .iter()
        .map(|d| (d.label.as_str(), d.wins, d.losses))
        .collect();
    assert_eq!(
        durations,
        vec![
            ("5-10 min", 0, 0),
            ("11-15 min", 2, 0),
            ("16-20 min", 0, 0),
            ("20-25 min", 0, 1),
            ("26-30 min", 0, 0),
            ("30+ min", 1, 0),
        ]
    );

    let longest = report.longest_win.expect("longest win");
    assert_eq!(longest.opp_tag, "Sok#5555");
    assert_eq!(longest.minutes, 33.3);
}

#[test]
fn heroes_compare_against_baseline() {
    let report = hero_matchups(&fixture_matches(), TAG, None, 1);

    assert!((report.baseline_win_rate - 5.0 / 6.0).abs() < 1e-12);

    let own: Vec<(u8, u32, u32)> = report
        .own_hero_count
        .iter()
        .map(|r| (r.heroes, r.record.games, r.record.wins))
        .collect();
    assert_eq!(own, vec![(1, 2, 1), (2, 2, 2)]);

    let opp: Vec<(u8, u32)> = report
        .opponent_hero_count
        .iter()
        .map(|r| (r.heroes, r.record.games))
        .collect();
    assert_eq!(opp, vec![(1, 1), (2, 2), (3, 1)]);

    assert_eq!(report.best_vs_openers[0].hero, "demonhunter");
    assert_eq!(report.best_vs_openers[0].name, "Demon Hunter");
    assert_eq!(report.worst_vs_openers[0].hero, "archmage");
    assert_eq!(report.worst_vs_openers[0].record.games, 3);

    let best: Vec<&str> = report.best_vs_heroes.iter().map(|r| r.hero.as_str()).collect();
    let worst: Vec<&str> = report.worst_vs_heroes.iter().map(|r| r.hero.as_str()).collect();
    assert!(best.iter().all(|h| !worst.contains(h)));
}

#[test]
fn heroes_can_match_the_player_by_id() {
    let matches = normalize_matches(json!([
        duel(
            "a",
            "2025-03-01T10:00:00Z",
            24,
            600.0,
            json!({"battleTag": "Renamed#1", "playerId": "PID-1", "won": true, "heroes": [{"name": "lich"}]}),
            json!({"battleTag": "Opp#1", "won": false, "heroes": [{"name": "paladin"}]})
        )
    ]));

    assert!(hero_matchups(&matches, "Old#1", None, 1).own_hero_count.is_empty());
    let report = hero_matchups(&matches, "Old#1", Some("pid-1"), 1);
    assert_eq!(report.own_hero_count.len(), 1);
    assert_eq!(report.best_vs_openers[0].hero, "paladin");
}

#[test]
fn countries_group_opponents() {
    let report = country_breakdown(&fixture_matches(), TAG, &PlayerProfile::default());

    assert_eq!(report.home_country, "NL");
    let rows: Vec<(&str, &str, u32)> = report
        .countries
        .iter()
        .map(|c| (c.country.as_str(), c.label.as_str(), c.record.games))
        .collect();
    assert_eq!(rows, vec![("UA", "Ukraine", 2), ("KR", "Korea", 1), ("US", "USA", 1)]);

    let ua = &report.countries[0];
    assert_eq!(ua.unique_opponents, 1);
    assert_eq!(ua.avg_games_per_opponent, 2.0);
    assert_eq!(ua.avg_opponent_rating, Some(2496.0));
    assert_eq!(ua.avg_self_rating, Some(2404.0));
    assert_eq!(ua.time_played_seconds, 2200.0);
    assert!((ua.time_share - 2200.0 / 4900.0).abs() < 1e-12);
    assert_eq!(ua.races.len(), 1);
    assert_eq!(ua.races[0].race, "Human");
}

#[test]
fn countries_report_exists_without_games() {
    let profile = PlayerProfile {
        battle_tag: TAG.to_string(),
        location: Some("de".to_string()),
        ..PlayerProfile::default()
    };
    let report = country_breakdown(&[], TAG, &profile);
    assert_eq!(report.home_country, "DE");
    assert_eq!(report.home_country_label, "Germany");
    assert!(report.countries.is_empty());
}

#[test]
fn consistency_tracks_streaks_and_sessions() {
    let report = consistency(&fixture_matches(), TAG, 1).expect("report");

    assert_eq!((report.games, report.wins, report.losses), (4, 3, 1));
    assert_eq!(report.win_rate, Some(75.0));
    assert_eq!(report.streaks.longest_win, 2);
    assert_eq!(report.streaks.longest_loss, 1);
    assert_eq!(report.streaks.current, 2);

    let sessions: Vec<(u32, u32)> = report.sessions.iter().map(|s| (s.games, s.wins)).collect();
    assert_eq!(sessions, vec![(2, 1), (2, 2)]);
    assert_eq!(
        report.sessions[1].start,
        Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap())
    );

    assert_eq!(report.recent[0].window, 10);
    assert_eq!(report.recent[0].games, 4);
    assert_eq!(report.recent[0].win_rate, Some(75.0));

    assert!(consistency(&fixture_matches(), "Nobody#1", 1).is_none());
}

#[test]
fn opponents_pick_best_and_worst() {
    let report = opponent_breakdown(&fixture_matches(), TAG, 24, 1);

    assert_eq!(report.strict_games, 4);
    let tags: Vec<&str> = report.opponents.iter().map(|o| o.tag.as_str()).collect();
    assert_eq!(tags, vec!["Happy#2384", "Moon#1234", "Sok#5555"]);

    let happy = &report.opponents[0];
    assert_eq!((happy.wins, happy.losses), (1, 1));
    assert_eq!(happy.net_rating, -4.0);
    assert_eq!(happy.adjusted_win_rate, 0.5);
    assert_eq!(happy.win_rate, 50.0);

    assert_eq!(report.best.as_ref().map(|b| b.tag.as_str()), Some("Moon#1234"));
    assert_eq!(report.worst.as_ref().map(|w| w.tag.as_str()), Some("Happy#2384"));

    let ex = &report.extremes;
    assert_eq!(ex.largest_single_gain, Some(8.0));
    assert_eq!(ex.largest_single_loss, Some(-12.0));
    assert!(ex.high_gain_games.is_empty());
    assert_eq!(ex.gain_games_to_show.len(), 1);
    assert_eq!(ex.gain_games_to_show[0].opp_name, "Happy#2384");
    assert_eq!(ex.largest_gap_win.as_ref().map(|g| g.gap), Some(100.0));
    assert!(ex.largest_gap_loss.is_none());

    let h2h = head_to_head(&report, "HAPPY#2384");
    assert_eq!(h2h.record.map(|r| r.total_games), Some(2));
    assert!(head_to_head(&report, "Stranger#1").record.is_none());
}

#[test]
fn opponents_ignore_other_seasons() {
    let report = opponent_breakdown(&fixture_matches(), TAG, 23, 1);
    assert_eq!(report.strict_games, 0);
    assert!(report.best.is_none());
    assert!(report.opponents.is_empty());
}

#[test]
fn summary_reports_races_and_gains() {
    let summary = summarize(&fixture_matches(), TAG, 24, 1);

    assert_eq!(summary.most_played_all_time, "Orc");
    assert_eq!(summary.most_played_this_season, "Orc");
    assert_eq!(summary.highest_current_race.as_deref(), Some("Orc"));
    assert_eq!(summary.highest_current_rating, Some(2406.0));
    assert_eq!(
        summary.last_played,
        Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 30, 0).unwrap())
    );
    assert!(summary.top_peaks.is_empty());
    assert_eq!(summary.gain_games.len(), 1);
    assert_eq!(summary.gain_games[0].gain, 8.0);
    assert_eq!(summary.largest_gap_win.as_ref().map(|g| g.gap), Some(100.0));
}

#[test]
fn summary_tracks_peaks_after_enough_games() {
    let games: Vec<Value> = (0..40)
        .map(|i| {
            duel(
                &format!("g{i}"),
                &format!("2025-03-01T00:{i:02}:00Z"),
                24,
                600.0,
                player("Foo#1", 4, 1500.0 + f64::from(i), 1.0, true),
                player("Bar#1", 1, 1500.0, -1.0, false),
            )
        })
        .collect();
    let matches = normalize_matches(Value::Array(games));

    let summary = summarize(&matches, "Foo#1", 24, 1);
    assert_eq!(summary.top_peaks.len(), 1);
    assert_eq!(summary.top_peaks[0].race, "Night Elf");
    assert_eq!(summary.top_peaks[0].rating, 1540.0);
    assert_eq!(summary.top_peaks[0].game, 40);
}

#[test]
fn race_game_counts_use_qualifying_games() {
    let matches = fixture_matches();
    assert_eq!(count_race_games(&matches, TAG, Race::Orc, 1), 4);
    assert_eq!(count_race_games(&matches, TAG, Race::Human, 1), 0);
    assert_eq!(count_race_games(&matches, "happy#2384", Race::Human, 1), 2);
}
