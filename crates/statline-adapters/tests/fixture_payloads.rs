use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use statline_adapters::{normalize, NormalizationError, NormalizeContext};
use statline_core::{FeedDescriptor, FeedKind, NormalizedRecord};

fn workspace_root() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(rel: &str) -> JsonValue {
    let path = workspace_root().join("fixtures").join(rel);
    let text = std::fs::read_to_string(&path).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn ctx(feed_id: &str, kind: FeedKind) -> NormalizeContext {
    let feed = FeedDescriptor::new(feed_id, kind).with_parameter("sport", "nba");
    let observed_at = DateTime::parse_from_rfc3339("2026-03-01T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    NormalizeContext::for_feed(&feed, observed_at)
}

#[test]
fn prizepicks_envelope_and_keyed_payloads_agree() {
    let c = ctx("player-props:nba", FeedKind::PlayerProp);
    let wrapped = normalize(&c, &fixture("prizepicks/selections.json")).unwrap();
    let keyed = normalize(&c, &fixture("prizepicks/selections_keyed.json")).unwrap();
    assert_eq!(wrapped, keyed);

    let NormalizedRecord::PlayerProp(brunson) = &wrapped[1] else {
        panic!("expected player prop");
    };
    assert_eq!(brunson.id, "pp-1002");
    assert_eq!(brunson.player_name, "Jalen Brunson");
    assert_eq!(brunson.line, 27.5);
    assert_eq!(brunson.over_price, Some(-110.0));
    assert_eq!(brunson.game, "NYK vs MIA");
    assert_eq!(brunson.sport, "NBA");
    assert_eq!(brunson.last_update.timestamp(), 1772386800);
}

#[test]
fn prizepicks_rejection_and_empty_payloads() {
    let c = ctx("player-props:nba", FeedKind::PlayerProp);
    let err = normalize(&c, &fixture("prizepicks/rejected.json")).unwrap_err();
    assert!(matches!(err, NormalizationError::Rejected { message: Some(_) }));
    assert!(normalize(&c, &fixture("prizepicks/empty.json")).unwrap().is_empty());
}

#[test]
fn games_payload_maps_nested_team_objects() {
    let records = normalize(&ctx("games:nba", FeedKind::Game), &fixture("games/nba_games.json")).unwrap();
    assert_eq!(records.len(), 2);
    let NormalizedRecord::Game(live) = &records[0] else {
        panic!("expected game");
    };
    assert_eq!(live.id, "0022500901");
    assert_eq!(live.status, "live");
    assert_eq!((live.home_score, live.away_score), (88, 84));
    assert_eq!(live.venue, "TD Garden");

    let NormalizedRecord::Game(upcoming) = &records[1] else {
        panic!("expected game");
    };
    assert_eq!(upcoming.home_team, "Phoenix Suns");
    assert_eq!(upcoming.away_team, "Sacramento Kings");
    assert_eq!(upcoming.status, "scheduled");
    assert_eq!(upcoming.start_time.to_rfc3339(), "2026-03-01T03:00:00+00:00");
}

#[test]
fn fantasy_teams_inside_data_object() {
    let records = normalize(
        &ctx("fantasy-teams:nba", FeedKind::FantasyTeam),
        &fixture("fantasy/teams.json"),
    )
    .unwrap();
    let NormalizedRecord::FantasyTeam(team) = &records[0] else {
        panic!("expected fantasy team");
    };
    assert_eq!(team.points, 1288.5);
    assert_eq!(team.players.len(), 3);
    assert_eq!(team.record, "14-6");
}

#[test]
fn analytics_skip_empty_data_for_kind_container() {
    let records = normalize(
        &ctx("analytics:nba", FeedKind::Analytics),
        &fixture("analytics/analytics.json"),
    )
    .unwrap();
    assert_eq!(records.len(), 2);
    let NormalizedRecord::Analytics(usage) = &records[0] else {
        panic!("expected analytics");
    };
    assert_eq!(usage.value, 31.4);
    assert_eq!(usage.trend, "up");
}

#[test]
fn daily_picks_fill_category_and_premium_flag() {
    let records = normalize(&ctx("daily-picks:nba", FeedKind::Pick), &fixture("picks/daily.json")).unwrap();
    let categories = records
        .iter()
        .map(|r| match r {
            NormalizedRecord::Pick(p) => p.category.as_str(),
            _ => "",
        })
        .collect::<Vec<_>>();
    assert_eq!(categories, vec!["Value Bet", "High Confidence"]);

    let NormalizedRecord::Pick(sga) = &records[1] else {
        panic!("expected pick");
    };
    assert!(sga.requires_premium);
    assert_eq!(sga.odds, "+120");
    assert_eq!(sga.team, "TBD");
    assert!(records.iter().all(|r| r.missing_fields().is_empty()));
}

#[test]
fn analytics_object_sections_become_records() {
    let records = normalize(
        &ctx("analytics:nba", FeedKind::Analytics),
        &fixture("analytics/sections.json"),
    )
    .unwrap();
    assert_eq!(records.len(), 2);
    let NormalizedRecord::Analytics(by_sport) = &records[0] else {
        panic!("expected analytics");
    };
    assert_eq!(by_sport.title, "NBA props hit rate");
    assert_eq!(by_sport.player, "N/A");
    let NormalizedRecord::Analytics(streak) = &records[1] else {
        panic!("expected analytics");
    };
    assert_eq!(streak.player, "Shai Gilgeous-Alexander");
    assert_eq!(streak.trend, "up");
    assert!(records.iter().all(|r| r.missing_fields().is_empty()));
}
