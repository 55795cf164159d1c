//! Last-resort identity source: an external encyclopedia page keyed by the
//! player's name. Specified at its interface (`BiographySource`) so the
//! resolver can be exercised without the network; `WikipediaSource` is the
//! production implementation.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::Html;

use crate::error::CrawlError;
use crate::http_client::Fetcher;
use crate::page::sel;
use crate::record::RosterEntry;

#[derive(Debug, Clone, Default)]
pub struct BiographyPage {
    /// Labeled infobox fields, keys lowercased with underscores
    /// ("listed_height", "playing_career", ...).
    pub infobox: HashMap<String, String>,
    /// Full page text, used for team-name disambiguation.
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum BiographyLookup {
    Page(BiographyPage),
    /// The source could not pick a single page and offers candidates.
    Disambiguation(Vec<String>),
}

pub trait BiographySource: Sync {
    fn lookup(&self, title: &str) -> Result<BiographyLookup, CrawlError>;
}

const WIKI_BASE: &str = "https://en.wikipedia.org/wiki/";

pub struct WikipediaSource<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> WikipediaSource<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }
}

impl BiographySource for WikipediaSource<'_> {
    fn lookup(&self, title: &str) -> Result<BiographyLookup, CrawlError> {
        let url = format!("{WIKI_BASE}{}", title.replace(' ', "_"));
        let body = self.fetcher.fetch(&url)?;
        let doc = Html::parse_document(&body);

        let text: String = doc
            .root_element()
            .text()
            .collect::<String>();
        if doc.select(&sel("div#disambigbox")).next().is_some()
            || text.contains("may refer to:")
        {
            let options = doc
                .select(&sel("div#mw-content-text li a"))
                .filter_map(|a| a.value().attr("title").map(|t| t.to_string()))
                .collect();
            return Ok(BiographyLookup::Disambiguation(options));
        }

        let mut infobox = HashMap::new();
        if let Some(table) = doc.select(&sel("table.infobox")).next() {
            for tr in table.select(&sel("tr")) {
                let Some(th) = tr.select(&sel("th")).next() else {
                    continue;
                };
                let Some(td) = tr.select(&sel("td")).next() else {
                    continue;
                };
                let key = th
                    .text()
                    .collect::<String>()
                    .trim()
                    .to_lowercase()
                    .replace(' ', "_");
                let val = td
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                infobox.insert(key, val);
            }
        }
        Ok(BiographyLookup::Page(BiographyPage { infobox, text }))
    }
}

/// Position labels as the encyclopedia writes them.
static POSITIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("Point guard", "PG"),
        ("Shooting guard", "SG"),
        ("Small forward", "SF"),
        ("Power forward", "PF"),
        ("Center", "C"),
        ("Guard", "G"),
        ("Forward", "F"),
    ]
    .into_iter()
    .collect()
});

/// Resolve one scraped name through the external source, disambiguating by
/// team and most recent birth year when offered multiple pages.
pub fn resolve_biography(
    source: &dyn BiographySource,
    name: &str,
    team: &str,
    current_year: i32,
) -> Result<RosterEntry, CrawlError> {
    match source.lookup(name)? {
        BiographyLookup::Page(page) => entry_from_page(&page, name, current_year),
        BiographyLookup::Disambiguation(options) => {
            let mut best: Option<(i32, BiographyPage)> = None;
            for option in options {
                if option.to_lowercase().contains("disambiguation") {
                    continue;
                }
                let Ok(BiographyLookup::Page(page)) = source.lookup(&option) else {
                    continue;
                };
                if !page.text.contains(team) {
                    continue;
                }
                let Some(year) = birth_year(&page) else {
                    continue;
                };
                if best.as_ref().is_none_or(|(b, _)| year > *b) {
                    best = Some((year, page));
                }
            }
            match best {
                Some((_, page)) => entry_from_page(&page, name, current_year),
                None => Err(CrawlError::unresolved(name)),
            }
        }
    }
}

fn entry_from_page(
    page: &BiographyPage,
    name: &str,
    current_year: i32,
) -> Result<RosterEntry, CrawlError> {
    // Without a position and a birth date the page cannot establish an
    // identity; height, weight and career span degrade to null.
    let position = page
        .infobox
        .get("position")
        .and_then(|p| p.split(" / ").next())
        .and_then(|p| POSITIONS.get(p.trim()).copied())
        .ok_or_else(|| CrawlError::unresolved(name))?;
    let birth_date = page
        .infobox
        .get("born")
        .and_then(|b| parse_birth_date(b))
        .ok_or_else(|| CrawlError::unresolved(name))?;

    Ok(RosterEntry {
        position: Some(position.to_string()),
        birth_date: Some(birth_date),
        height: page
            .infobox
            .get("listed_height")
            .and_then(|h| parse_dual_unit(h, "m", "ft")),
        weight: page
            .infobox
            .get("listed_weight")
            .and_then(|w| parse_dual_unit(w, "kg", "lb")),
        experience: page
            .infobox
            .get("playing_career")
            .and_then(|c| parse_experience(c, current_year)),
    })
}

/// Listed measures come metric-first ("2.06 m (6 ft 9 in)") or imperial-first
/// ("6 ft 9 in (2.06 m)"); the unit-marker offsets tell which, and the metric
/// value is read either from the front or from inside the parentheses.
fn parse_dual_unit(raw: &str, metric_unit: &str, imperial_unit: &str) -> Option<f64> {
    let metric_at = raw.find(metric_unit)?;
    let imperial_at = raw.find(imperial_unit)?;
    if metric_at < imperial_at {
        raw[..metric_at].trim().parse().ok()
    } else {
        let open = raw.find('(')?;
        raw.get(open + 1..metric_at)?.trim().parse().ok()
    }
}

/// Career span "1996–present" or "1996–2016"; experience is years elapsed
/// from the start to today or to retirement.
fn parse_experience(raw: &str, current_year: i32) -> Option<u32> {
    let cleaned = raw.replace('\n', "");
    let (start, end) = cleaned
        .split_once('\u{2013}')
        .or_else(|| cleaned.split_once('-'))?;
    let start: i32 = start.trim().parse().ok()?;
    let end = end.trim();
    let years = if end == "present" {
        current_year - start
    } else {
        end.parse::<i32>().ok()? - start
    };
    u32::try_from(years).ok()
}

/// The born field leads with the machine-readable date:
/// "(1984-12-30) December 30, 1984 (age 40)".
fn parse_birth_date(born: &str) -> Option<String> {
    if !born.starts_with('(') {
        return None;
    }
    let date = born.get(1..11)?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(date.to_string())
}

fn birth_year(page: &BiographyPage) -> Option<i32> {
    let born = page.infobox.get("born")?;
    parse_birth_date(born)?[..4].parse().ok()
}
