//! Per-event crawl pipeline: fetch -> extract -> derive -> resolve
//! identities -> persist, inside a retry loop driven by the typed failure
//! kind. One event in, one JSON document out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use scraper::Html;
use tracing::{debug, info, warn};

use crate::biography::BiographySource;
use crate::derived;
use crate::error::CrawlError;
use crate::http_client::Fetcher;
use crate::identity::{self, IdentityCaches};
use crate::page;
use crate::record::{event_path, EventRecord, EventType, PlayerRecord, StatLine, TeamRecord};
use crate::roster;
use crate::tables;

const SITE_BASE: &str = "https://www.basketball-reference.com";
/// Total attempts per event; only deadline expiries consume the budget,
/// anything else aborts on the first occurrence.
const MAX_ATTEMPTS: u32 = 5;

pub struct EventCrawler<'a> {
    pub country: &'a str,
    pub league: &'a str,
    pub season: &'a str,
    pub code: String,
    pub event_type: EventType,
    pub out_dir: &'a Path,
    pub fetcher: &'a dyn Fetcher,
    pub biographies: &'a dyn BiographySource,
    pub caches: &'a IdentityCaches,
}

impl EventCrawler<'_> {
    pub fn output_path(&self) -> PathBuf {
        event_path(self.out_dir, self.country, self.league, self.season, &self.code)
    }

    /// A persisted record at the deterministic location is the sole
    /// "already crawled" signal.
    pub fn is_crawled(&self) -> bool {
        self.output_path().exists()
    }

    /// Entry guard plus retry loop. Never panics and never propagates: an
    /// event's failure is its own, observable through logs and the missing
    /// output file.
    pub fn run(&self) {
        if self.is_crawled() {
            debug!("{} already crawled, skipping", self.code);
            return;
        }
        for attempt in 1..=MAX_ATTEMPTS {
            match self.crawl() {
                Ok(()) => {
                    info!("crawled {}", self.code);
                    return;
                }
                Err(err) if err.is_retryable() => {
                    info!(
                        "timeout crawling {}, retrying {attempt}/{MAX_ATTEMPTS}",
                        self.code
                    );
                }
                Err(err) => {
                    warn!("couldn't crawl {}: {err}", self.code);
                    return;
                }
            }
        }
        warn!("abandoned {} after {MAX_ATTEMPTS} attempts", self.code);
    }

    /// One full attempt. Every stage returns a typed result; the first error
    /// wins and classifies the attempt.
    fn crawl(&self) -> Result<(), CrawlError> {
        let url = format!("{SITE_BASE}/boxscores/{}.html", self.code);
        let raw = self.fetcher.fetch(&url)?;
        let doc = Html::parse_document(&raw);

        let (mut away, mut home) = self.extract_teams(&doc)?;
        let meta = page::event_meta(&doc);
        let (away_scores, home_scores) = page::line_scores(&doc)?;
        away.scores = away_scores;
        home.scores = home_scores;
        let extra = page::extra_info(&raw);

        let [(away_name, away_page), (home_name, home_page)] = page::team_entries(&doc)?;
        away.name = away_name;
        home.name = home_name;

        derive_event(&mut home, &mut away);

        self.resolve_team_identities(&mut away, &away_page)?;
        self.resolve_team_identities(&mut home, &home_page)?;

        let record = EventRecord {
            code: self.code.clone(),
            event_type: self.event_type,
            league: self.league.to_string(),
            season: self.season.to_string(),
            country: page::title_case(&self.country.replace('_', " ")),
            date: meta.date,
            time: meta.time,
            stadium: meta.stadium,
            attendance: extra.attendance,
            duration: extra.duration,
            officials: extra.officials,
            home,
            away,
        };
        self.persist(&record)
    }

    /// The four stat tables in page order are away/home basic (no trailing
    /// +/- in the totals) and away/home advanced.
    fn extract_teams(&self, doc: &Html) -> Result<(TeamRecord, TeamRecord), CrawlError> {
        let stat_tables = page::stat_tables(doc)?;
        let mut away = TeamRecord::default();
        let mut home = TeamRecord::default();
        for (team, basic_idx, advanced_idx) in [(&mut away, 0, 1), (&mut home, 2, 3)] {
            let (totals, players) = tables::extract_team(&stat_tables[basic_idx], false)?;
            team.totals = totals;
            for (name, stats) in players {
                team.players.insert(name, PlayerRecord { stats, info: None });
            }
            let (adv_totals, adv_players) = tables::extract_team(&stat_tables[advanced_idx], true)?;
            team.totals.extend(adv_totals);
            for (name, stats) in adv_players {
                team.players
                    .entry(name)
                    .or_default()
                    .stats
                    .extend(stats);
            }
        }
        Ok((away, home))
    }

    /// Attach basic info to every player on one team. An unresolved identity
    /// is the accepted partial outcome; the stats still persist.
    fn resolve_team_identities(
        &self,
        team: &mut TeamRecord,
        team_page: &str,
    ) -> Result<(), CrawlError> {
        let roster = roster::fetch_roster(self.fetcher, &format!("{SITE_BASE}{team_page}"))?;
        for (name, player) in team.players.iter_mut() {
            match identity::resolve(name, &team.name, &roster, self.caches, self.biographies) {
                Ok(entry) => player.info = Some(entry),
                Err(CrawlError::IdentityUnresolved { .. }) => {
                    debug!("no identity for {name} ({})", team.name);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Atomic persist: temp file then rename, so a crash never leaves a
    /// half-written record that the entry guard would trust.
    fn persist(&self, record: &EventRecord) -> Result<(), CrawlError> {
        let path = self.output_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(record)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Full derivation for one event. Team-level stats must exist on both sides
/// before any player's rate stats, and the scoring differential needs both
/// totals, hence the fixed order.
fn derive_event(home: &mut TeamRecord, away: &mut TeamRecord) {
    let home_raw = home.totals.clone();
    let away_raw = away.totals.clone();
    derived::add_team_derived(&mut home.totals, &away_raw);
    derived::add_team_derived(&mut away.totals, &home_raw);

    derive_players(&mut home.players, &home.totals, &away.totals);
    derive_players(&mut away.players, &away.totals, &home.totals);

    derived::add_plus_minus(&mut home.totals, &mut away.totals);
}

fn derive_players(
    players: &mut BTreeMap<String, PlayerRecord>,
    team: &StatLine,
    opp: &StatLine,
) {
    for player in players.values_mut() {
        // Derived fields exist iff the player actually played.
        let played = derived::get(&player.stats, "MP").is_some_and(|mp| mp != 0.0);
        if played {
            derived::add_player_derived(&mut player.stats, team, opp);
        }
    }
}
