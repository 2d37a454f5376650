//! Core domain model for statline feeds, canonical records, and snapshot provenance.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "statline-core";

pub const DEFAULT_FALLBACK_COUNT: usize = 8;

/// One HTTP resource that may satisfy a feed. Lower priority is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub path: String,
    pub priority: i32,
    pub display_name: String,
}

/// Which canonical record schema a feed produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    PlayerProp,
    Pick,
    Game,
    FantasyTeam,
    Analytics,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::PlayerProp => "player_prop",
            FeedKind::Pick => "pick",
            FeedKind::Game => "game",
            FeedKind::FantasyTeam => "fantasy_team",
            FeedKind::Analytics => "analytics",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_fallback_count() -> usize {
    DEFAULT_FALLBACK_COUNT
}

/// A logical data feed: its record kind, query parameters, and endpoint candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub feed_id: String,
    pub kind: FeedKind,
    #[serde(default)]
    pub base_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub candidates: Vec<EndpointCandidate>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    /// Synthetic records to generate when nothing else is available; `0` disables it.
    #[serde(default = "default_fallback_count")]
    pub fallback_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedDescriptorError {
    #[error("feed id must not be empty")]
    EmptyId,
    #[error("feed {feed_id} declares priority {priority} more than once")]
    DuplicatePriority { feed_id: String, priority: i32 },
    #[error("feed {feed_id} has a candidate with an empty path")]
    EmptyPath { feed_id: String },
}

impl FeedDescriptor {
    pub fn new(feed_id: impl Into<String>, kind: FeedKind) -> Self {
        Self {
            feed_id: feed_id.into(),
            kind,
            base_parameters: BTreeMap::new(),
            candidates: Vec::new(),
            refresh_interval_secs: None,
            fallback_count: DEFAULT_FALLBACK_COUNT,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_candidate(
        mut self,
        path: impl Into<String>,
        priority: i32,
        display_name: impl Into<String>,
    ) -> Self {
        self.candidates.push(EndpointCandidate {
            path: path.into(),
            priority,
            display_name: display_name.into(),
        });
        self
    }

    pub fn with_fallback_count(mut self, count: usize) -> Self {
        self.fallback_count = count;
        self
    }

    pub fn sport(&self) -> Option<&str> {
        self.base_parameters.get("sport").map(String::as_str)
    }

    pub fn validate(&self) -> Result<(), FeedDescriptorError> {
        if self.feed_id.trim().is_empty() {
            return Err(FeedDescriptorError::EmptyId);
        }
        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if candidate.path.trim().is_empty() {
                return Err(FeedDescriptorError::EmptyPath {
                    feed_id: self.feed_id.clone(),
                });
            }
            if !seen.insert(candidate.priority) {
                return Err(FeedDescriptorError::DuplicatePriority {
                    feed_id: self.feed_id.clone(),
                    priority: candidate.priority,
                });
            }
        }
        Ok(())
    }
}

/// Candidates of a feed in the order they should be attempted.
pub fn resolve_candidates(feed: &FeedDescriptor) -> Vec<EndpointCandidate> {
    let mut candidates = feed.candidates.clone();
    candidates.sort_by_key(|c| c.priority);
    candidates
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayerProp {
    pub id: String,
    pub player_name: String,
    pub team: String,
    pub stat_type: String,
    pub line: f64,
    pub over_price: Option<f64>,
    pub under_price: Option<f64>,
    pub bookmaker: String,
    pub game: String,
    pub sport: String,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Pick {
    pub id: String,
    pub player: String,
    pub team: String,
    pub sport: String,
    pub pick: String,
    pub confidence: f64,
    pub odds: String,
    pub edge: String,
    pub analysis: String,
    pub category: String,
    pub requires_premium: bool,
    pub timestamp: DateTime<Utc>,
}

impl Pick {
    /// Bucket label used when upstream omits a category.
    pub fn category_for_confidence(confidence: f64) -> &'static str {
        if confidence >= 90.0 {
            "High Confidence"
        } else if confidence >= 85.0 {
            "Value Bet"
        } else if confidence >= 80.0 {
            "Lock Pick"
        } else {
            "High Upside"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub home_score: u32,
    pub away_score: u32,
    pub venue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FantasyTeam {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub sport: String,
    pub league: String,
    pub record: String,
    pub points: f64,
    pub rank: u32,
    pub players: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsItem {
    pub id: String,
    pub title: String,
    pub player: String,
    pub metric: String,
    pub value: f64,
    pub trend: String,
    pub sport: String,
    pub timestamp: DateTime<Utc>,
}

/// Canonical feed item. Every variant carries defaults for every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    PlayerProp(PlayerProp),
    Pick(Pick),
    Game(Game),
    FantasyTeam(FantasyTeam),
    Analytics(AnalyticsItem),
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        match self {
            NormalizedRecord::PlayerProp(r) => &r.id,
            NormalizedRecord::Pick(r) => &r.id,
            NormalizedRecord::Game(r) => &r.id,
            NormalizedRecord::FantasyTeam(r) => &r.id,
            NormalizedRecord::Analytics(r) => &r.id,
        }
    }

    pub fn kind(&self) -> FeedKind {
        match self {
            NormalizedRecord::PlayerProp(_) => FeedKind::PlayerProp,
            NormalizedRecord::Pick(_) => FeedKind::Pick,
            NormalizedRecord::Game(_) => FeedKind::Game,
            NormalizedRecord::FantasyTeam(_) => FeedKind::FantasyTeam,
            NormalizedRecord::Analytics(_) => FeedKind::Analytics,
        }
    }

    pub fn sport(&self) -> &str {
        match self {
            NormalizedRecord::PlayerProp(r) => &r.sport,
            NormalizedRecord::Pick(r) => &r.sport,
            NormalizedRecord::Game(r) => &r.sport,
            NormalizedRecord::FantasyTeam(r) => &r.sport,
            NormalizedRecord::Analytics(r) => &r.sport,
        }
    }

    /// Names of required text fields left empty. Normalized records should never have any.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, &str)> = match self {
            NormalizedRecord::PlayerProp(r) => vec![
                ("id", r.id.as_str()),
                ("player_name", r.player_name.as_str()),
                ("team", r.team.as_str()),
                ("stat_type", r.stat_type.as_str()),
                ("bookmaker", r.bookmaker.as_str()),
                ("game", r.game.as_str()),
                ("sport", r.sport.as_str()),
            ],
            NormalizedRecord::Pick(r) => vec![
                ("id", r.id.as_str()),
                ("player", r.player.as_str()),
                ("team", r.team.as_str()),
                ("sport", r.sport.as_str()),
                ("pick", r.pick.as_str()),
                ("odds", r.odds.as_str()),
                ("edge", r.edge.as_str()),
                ("category", r.category.as_str()),
            ],
            NormalizedRecord::Game(r) => vec![
                ("id", r.id.as_str()),
                ("home_team", r.home_team.as_str()),
                ("away_team", r.away_team.as_str()),
                ("sport", r.sport.as_str()),
                ("status", r.status.as_str()),
            ],
            NormalizedRecord::FantasyTeam(r) => vec![
                ("id", r.id.as_str()),
                ("name", r.name.as_str()),
                ("owner", r.owner.as_str()),
                ("sport", r.sport.as_str()),
                ("record", r.record.as_str()),
            ],
            NormalizedRecord::Analytics(r) => vec![
                ("id", r.id.as_str()),
                ("title", r.title.as_str()),
                ("player", r.player.as_str()),
                ("metric", r.metric.as_str()),
                ("sport", r.sport.as_str()),
            ],
        };
        required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Where the data in a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Cached,
    Synthetic,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Cached => "cached",
            Provenance::Synthetic => "synthetic",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Latest materialized result for a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub feed_id: String,
    pub records: Vec<NormalizedRecord>,
    pub captured_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub source_endpoint: Option<String>,
}

impl Snapshot {
    pub fn live(
        feed_id: impl Into<String>,
        records: Vec<NormalizedRecord>,
        captured_at: DateTime<Utc>,
        source_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            records,
            captured_at,
            provenance: Provenance::Live,
            source_endpoint: Some(source_endpoint.into()),
        }
    }

    pub fn synthetic(
        feed_id: impl Into<String>,
        records: Vec<NormalizedRecord>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            records,
            captured_at,
            provenance: Provenance::Synthetic,
            source_endpoint: None,
        }
    }

    /// A stored snapshot as seen when served from cache: live data becomes `Cached`,
    /// everything else, `captured_at` included, is untouched.
    pub fn into_cached(mut self) -> Self {
        if self.provenance == Provenance::Live {
            self.provenance = Provenance::Cached;
        }
        self
    }
}

/// Outcome of one endpoint attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchAttemptResult {
    pub candidate: EndpointCandidate,
    pub succeeded: bool,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Terminal state reached by one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Succeeded,
    CacheHit,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub snapshot: Arc<Snapshot>,
    pub outcome: ResolutionOutcome,
    pub attempts: Vec<FetchAttemptResult>,
    pub last_error: Option<String>,
}

/// No live data, no cached snapshot, and no synthetic fallback could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("acquisition unavailable for feed {feed_id}: {reason}")]
pub struct AcquisitionUnavailable {
    pub feed_id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props_feed() -> FeedDescriptor {
        FeedDescriptor::new("player-props:nba", FeedKind::PlayerProp)
            .with_parameter("sport", "nba")
            .with_candidate("/api/prizepicks", 5, "Root")
            .with_candidate("/api/prizepicks/selections", 1, "Selections")
            .with_candidate("/api/prizepicks/picks", 2, "Picks")
    }

    #[test]
    fn candidates_resolve_in_priority_order() {
        let resolved = resolve_candidates(&props_feed());
        let paths = resolved.iter().map(|c| c.path.as_str()).collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec!["/api/prizepicks/selections", "/api/prizepicks/picks", "/api/prizepicks"]
        );
    }

    #[test]
    fn empty_candidate_list_is_legal() {
        let feed = FeedDescriptor::new("analytics:nba", FeedKind::Analytics);
        assert!(feed.validate().is_ok());
        assert!(resolve_candidates(&feed).is_empty());
    }

    #[test]
    fn duplicate_priorities_are_rejected() {
        let feed = props_feed().with_candidate("/api/prize-picks", 2, "Prize-Picks");
        assert_eq!(
            feed.validate(),
            Err(FeedDescriptorError::DuplicatePriority {
                feed_id: "player-props:nba".into(),
                priority: 2,
            })
        );
    }

    #[test]
    fn cached_relabel_keeps_timestamp_and_synthetic_provenance() {
        let captured_at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let live = Snapshot::live("games:nba", vec![], captured_at, "/api/nba/games");
        let cached = live.clone().into_cached();
        assert_eq!(cached.provenance, Provenance::Cached);
        assert_eq!(cached.captured_at, captured_at);
        assert_eq!(cached.source_endpoint, live.source_endpoint);

        let synthetic = Snapshot::synthetic("games:nba", vec![], captured_at).into_cached();
        assert_eq!(synthetic.provenance, Provenance::Synthetic);
    }

    #[test]
    fn record_kind_tag_survives_serde() {
        let record = NormalizedRecord::Game(Game {
            id: "g1".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            sport: "NBA".into(),
            status: "scheduled".into(),
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "game");
        let back: NormalizedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        assert!(back.missing_fields().is_empty());
    }

    #[test]
    fn missing_fields_reports_empty_required_text() {
        let record = NormalizedRecord::Pick(Pick::default());
        let missing = record.missing_fields();
        assert!(missing.contains(&"id"));
        assert!(missing.contains(&"player"));
        assert!(missing.contains(&"edge"));

        let analytics = NormalizedRecord::Analytics(AnalyticsItem::default());
        assert!(analytics.missing_fields().contains(&"player"));
    }

    #[test]
    fn pick_category_thresholds() {
        assert_eq!(Pick::category_for_confidence(92.0), "High Confidence");
        assert_eq!(Pick::category_for_confidence(86.0), "Value Bet");
        assert_eq!(Pick::category_for_confidence(80.0), "Lock Pick");
        assert_eq!(Pick::category_for_confidence(40.0), "High Upside");
    }
}
