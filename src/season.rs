//! Season-level orchestration: discover the event codes month by month, then
//! dispatch the per-event crawler over a bounded worker pool.

use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::biography::BiographySource;
use crate::crawler::EventCrawler;
use crate::error::CrawlError;
use crate::http_client::Fetcher;
use crate::identity::IdentityCaches;
use crate::page;
use crate::record::EventType;

pub const DEFAULT_WORKERS: usize = 5;

/// The schedule is published per month across the season span.
const MONTHS: &[&str] = &[
    "october", "november", "december", "january", "february", "march", "april", "may", "june",
];

pub struct SeasonOrchestrator<'a> {
    pub country: &'a str,
    pub league: &'a str,
    pub season: &'a str,
    pub out_dir: &'a Path,
    pub workers: usize,
    pub fetcher: &'a dyn Fetcher,
    pub biographies: &'a dyn BiographySource,
    pub caches: &'a IdentityCaches,
}

impl SeasonOrchestrator<'_> {
    /// Crawl every event of the season: regular-season codes first, then the
    /// postseason set, each drained fully before moving on. Events fail
    /// independently; nothing aggregates back up here.
    pub fn crawl_season(&self) -> Result<()> {
        let (regular, post) = self.discover_codes();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .context("failed to build crawl worker pool")?;

        for (event_type, codes) in [(EventType::Regular, regular), (EventType::Post, post)] {
            info!(
                "crawling {} {} events for {}",
                codes.len(),
                event_type.label(),
                self.season
            );
            pool.install(|| {
                codes.par_iter().for_each(|code| {
                    EventCrawler {
                        country: self.country,
                        league: self.league,
                        season: self.season,
                        code: code.clone(),
                        event_type,
                        out_dir: self.out_dir,
                        fetcher: self.fetcher,
                        biographies: self.biographies,
                        caches: self.caches,
                    }
                    .run();
                });
            });
        }
        Ok(())
    }

    /// Event codes for the season, split into (regular, postseason). A month
    /// that fails to fetch or parse is logged and skipped; the other months
    /// still contribute.
    fn discover_codes(&self) -> (Vec<String>, Vec<String>) {
        let mut regular = Vec::new();
        let mut post = Vec::new();
        for month in MONTHS {
            match self.month_codes(month) {
                Ok((mut r, mut p)) => {
                    regular.append(&mut r);
                    post.append(&mut p);
                }
                Err(err) => warn!("discovery failed for {month} {}: {err}", self.season),
            }
        }
        (regular, post)
    }

    fn month_codes(&self, month: &str) -> Result<(Vec<String>, Vec<String>), CrawlError> {
        let url = schedule_url(self.league, self.season, month);
        let body = self.fetcher.fetch(&url)?;
        page::schedule_codes(&body)
    }
}

/// Monthly schedule page for a season. The listing is keyed by the season's
/// closing year.
fn schedule_url(league: &str, season: &str, month: &str) -> String {
    let end_year = season.split('-').nth(1).unwrap_or(season);
    format!(
        "https://www.basketball-reference.com/leagues/{}_{end_year}_games-{month}.html",
        league.to_uppercase()
    )
}

/// Expand CLI season tokens: explicit `YYYY-YYYY` tokens pass through, a
/// single `FROM-to-TO` range becomes the consecutive seasons it spans.
pub fn expand_seasons(tokens: &[String]) -> Vec<String> {
    if let [single] = tokens {
        if let Some((from, to)) = single.split_once("-to-") {
            if let (Ok(from), Ok(to)) = (from.parse::<u32>(), to.parse::<u32>()) {
                return (from..to)
                    .map(|year| format!("{year}-{}", year + 1))
                    .collect();
            }
        }
    }
    tokens.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_token_expands_to_consecutive_seasons() {
        let tokens = vec!["2010-to-2014".to_string()];
        assert_eq!(
            expand_seasons(&tokens),
            vec!["2010-2011", "2011-2012", "2012-2013", "2013-2014"]
        );
    }

    #[test]
    fn explicit_tokens_pass_through() {
        let tokens = vec!["2014-2015".to_string(), "2015-2016".to_string()];
        assert_eq!(expand_seasons(&tokens), tokens);
    }

    #[test]
    fn schedule_url_uses_closing_year_and_month() {
        assert_eq!(
            schedule_url("nba", "2015-2016", "october"),
            "https://www.basketball-reference.com/leagues/NBA_2016_games-october.html"
        );
    }
}
