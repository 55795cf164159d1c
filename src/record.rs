use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Metric name -> numeric-or-null. Null is data here (empty cell, impossible
/// ratio), never an error. BTreeMap keeps the persisted JSON deterministically
/// ordered so re-running an already-crawled event is byte-stable.
pub type StatLine = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[serde(rename = "Season")]
    Regular,
    #[serde(rename = "Post-Season")]
    Post,
}

impl EventType {
    pub fn label(self) -> &'static str {
        match self {
            EventType::Regular => "Season",
            EventType::Post => "Post-Season",
        }
    }
}

/// Basic biographical info for one player, either scraped from the roster
/// page or recovered from the external biography source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    /// Meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Kilograms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Years in the league; 0 for rookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<u32>,
}

/// One player's line in the box score: raw and derived metrics, plus basic
/// info when identity resolution succeeded. An unresolved identity leaves the
/// info fields out entirely (partial-success policy), the stats still persist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerRecord {
    #[serde(flatten)]
    pub stats: StatLine,
    #[serde(flatten)]
    pub info: Option<RosterEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamRecord {
    pub name: String,
    pub totals: StatLine,
    pub players: BTreeMap<String, PlayerRecord>,
    /// Period label ("1".."4", "OT", "T") -> score string.
    pub scores: BTreeMap<String, String>,
}

/// The complete persisted document for one event, uniquely addressed by
/// (country, league, season, code). Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub code: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub league: String,
    pub season: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stadium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<u32>,
    /// Game duration in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub officials: Vec<String>,
    pub home: TeamRecord,
    pub away: TeamRecord,
}

/// Deterministic location of an event's persisted record. Its existence is
/// the sole "already crawled" signal; there is no separate index.
pub fn event_path(out_dir: &Path, country: &str, league: &str, season: &str, code: &str) -> PathBuf {
    out_dir
        .join(country)
        .join(league)
        .join(season)
        .join(format!("{code}.json"))
}
