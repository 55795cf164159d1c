//! Conversion of one raw statistics table into typed per-entity stat lines.
//!
//! Header cells go through a fixed alias table; anything unknown means the
//! source changed its layout and the extraction cannot be trusted, so that is
//! a fatal structure mismatch rather than a skipped column.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

use crate::error::CrawlError;
use crate::record::StatLine;

/// A stat table as delivered by the page layer: metric headers (label column
/// already dropped), body rows, and the team-totals footer cells.
#[derive(Debug, Clone, Default)]
pub struct StatTable {
    pub headers: Vec<String>,
    pub rows: Vec<PlayerRow>,
    pub footer: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlayerRow {
    pub name: String,
    pub cells: Vec<String>,
}

/// Index of the fixed non-data divider between starters and the bench.
const SEPARATOR_ROW: usize = 5;

const MP_SENTINELS: &[&str] = &["Did Not Play", "Player Suspended"];

/// Raw header text -> canonical metric name, covering both observed table
/// styles (basic and advanced box).
static HEADER_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let pairs: &[(&str, &str)] = &[
        ("MP", "MP"),
        ("FG", "FG"),
        ("FGA", "FGA"),
        ("FG%", "FG%"),
        ("3P", "3P"),
        ("3PA", "3PA"),
        ("3P%", "3P%"),
        ("FT", "FT"),
        ("FTA", "FTA"),
        ("FT%", "FT%"),
        ("ORB", "ORB"),
        ("DRB", "DRB"),
        ("TRB", "TRB"),
        ("AST", "AST"),
        ("STL", "STL"),
        ("BLK", "BLK"),
        ("TOV", "TOV"),
        ("PF", "PF"),
        ("PTS", "PTS"),
        ("+/-", "+/-"),
        ("GmSc", "GmSc"),
        ("TS%", "TS%"),
        ("eFG%", "eFG%"),
        ("3PAr", "3PAr"),
        ("FTr", "FTAr"),
        ("FTAr", "FTAr"),
        ("ORB%", "ORB%"),
        ("DRB%", "DRB%"),
        ("TRB%", "TRB%"),
        ("AST%", "AST%"),
        ("STL%", "STL%"),
        ("BLK%", "BLK%"),
        ("TOV%", "TOV%"),
        ("USG%", "USG%"),
        ("ORtg", "ORtg"),
        ("DRtg", "DRtg"),
        ("BPM", "BPM"),
    ];
    pairs.iter().copied().collect()
});

/// Extract one team's totals and per-player stat lines.
///
/// `plus_minus` says whether the trailing "+/-" column belongs in the totals
/// row; when it does not, the column leaves the totals but stays on the
/// player rows, which carry a per-player differential with no team sum.
pub fn extract_team(
    table: &StatTable,
    plus_minus: bool,
) -> Result<(StatLine, BTreeMap<String, StatLine>), CrawlError> {
    let metrics = canonical_headers(&table.headers)?;
    let mut footer: Vec<&str> = table.footer.iter().map(String::as_str).collect();
    let mut total_metrics: &[&'static str] = &metrics;
    if !plus_minus && metrics.last() == Some(&"+/-") {
        total_metrics = &metrics[..metrics.len() - 1];
        if footer.len() > total_metrics.len() {
            footer.pop();
        }
    }
    if footer.len() != total_metrics.len() {
        return Err(CrawlError::structure(format!(
            "totals row has {} cells for {} metrics",
            footer.len(),
            total_metrics.len()
        )));
    }

    let mut totals = StatLine::new();
    for (metric, cell) in total_metrics.iter().zip(footer) {
        totals.insert((*metric).to_string(), parse_cell(metric, cell)?);
    }

    if table.rows.len() <= SEPARATOR_ROW {
        return Err(CrawlError::structure(format!(
            "expected bench divider at row {SEPARATOR_ROW}, table has {} rows",
            table.rows.len()
        )));
    }
    let rows = table
        .rows
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != SEPARATOR_ROW)
        .map(|(_, row)| row);

    let mut players = BTreeMap::new();
    for row in rows {
        let mut line = StatLine::new();
        // Zip stops at the shorter side: a "Did Not Play" row carries a single
        // spanned cell and legitimately fills only MP.
        for (metric, cell) in metrics.iter().zip(row.cells.iter()) {
            line.insert((*metric).to_string(), parse_cell(metric, cell)?);
        }
        players.insert(row.name.clone(), line);
    }

    Ok((totals, players))
}

fn canonical_headers(headers: &[String]) -> Result<Vec<&'static str>, CrawlError> {
    headers
        .iter()
        .map(|h| {
            HEADER_ALIASES
                .get(h.trim())
                .copied()
                .ok_or_else(|| CrawlError::structure(format!("unknown header {h:?}")))
        })
        .collect()
}

/// Cell policy: empty -> null; MP sentinels and empty MP -> zero minutes;
/// `M:SS` -> fractional minutes; anything else parses as f64, and a non-empty
/// cell that fails to parse is a layout change, not data.
fn parse_cell(metric: &str, raw: &str) -> Result<Option<f64>, CrawlError> {
    let raw = raw.trim();
    if metric == "MP" {
        return convert_minutes(raw).map(Some);
    }
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| CrawlError::structure(format!("unparseable {metric} cell {raw:?}")))
}

/// Minutes column: sentinel or empty -> 0.0, `M:SS` -> `M + SS/60`.
pub fn convert_minutes(raw: &str) -> Result<f64, CrawlError> {
    if raw.is_empty() || MP_SENTINELS.contains(&raw) {
        return Ok(0.0);
    }
    if let Some((m, s)) = raw.split_once(':') {
        let minutes: f64 = m
            .parse()
            .map_err(|_| CrawlError::structure(format!("bad minutes {raw:?}")))?;
        let seconds: f64 = s
            .parse()
            .map_err(|_| CrawlError::structure(format!("bad minutes {raw:?}")))?;
        return Ok(minutes + seconds / 60.0);
    }
    raw.parse()
        .map_err(|_| CrawlError::structure(format!("bad minutes {raw:?}")))
}
