//! Team roster extraction: canonical player names with basic biographical
//! info, built once per team per event. Workers may rebuild the same roster
//! concurrently; the construction is read-only and side-effect-free, so the
//! redundancy is accepted.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::Html;

use crate::error::CrawlError;
use crate::http_client::Fetcher;
use crate::page::sel;
use crate::record::RosterEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RosterField {
    Name,
    Position,
    Height,
    Weight,
    BirthDate,
    Country,
    Experience,
    College,
}

/// Raw roster header text -> field. The flag column ships with an empty
/// header. Anything else means the roster layout changed.
static ROSTER_HEADERS: Lazy<HashMap<&'static str, RosterField>> = Lazy::new(|| {
    [
        ("Player", RosterField::Name),
        ("Pos", RosterField::Position),
        ("Ht", RosterField::Height),
        ("Wt", RosterField::Weight),
        ("Birth Date", RosterField::BirthDate),
        ("", RosterField::Country),
        ("Exp", RosterField::Experience),
        ("College", RosterField::College),
    ]
    .into_iter()
    .collect()
});

pub type Roster = BTreeMap<String, RosterEntry>;

pub fn fetch_roster(fetcher: &dyn Fetcher, url: &str) -> Result<Roster, CrawlError> {
    let body = fetcher.fetch(url)?;
    parse_roster(&body)
}

pub fn parse_roster(html: &str) -> Result<Roster, CrawlError> {
    let doc = Html::parse_document(html);
    let region = doc
        .select(&sel("div#div_roster table"))
        .next()
        .ok_or_else(|| CrawlError::structure("roster table missing"))?;

    let fields: Vec<RosterField> = region
        .select(&sel("thead th"))
        .skip(1)
        .map(|th| {
            let raw = th.text().collect::<String>();
            ROSTER_HEADERS
                .get(raw.trim())
                .copied()
                .ok_or_else(|| CrawlError::structure(format!("unknown roster header {raw:?}")))
        })
        .collect::<Result<_, _>>()?;

    let mut roster = Roster::new();
    for row in region.select(&sel("tbody tr")) {
        let cells: Vec<String> = row
            .select(&sel("td"))
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        let mut name = None;
        let mut entry = RosterEntry::default();
        for (field, cell) in fields.iter().zip(cells.iter()) {
            match field {
                RosterField::Name => name = Some(cell.clone()),
                RosterField::Position => {
                    if !cell.is_empty() {
                        entry.position = Some(cell.clone());
                    }
                }
                RosterField::Height => entry.height = parse_height(cell),
                RosterField::Weight => entry.weight = parse_weight(cell),
                RosterField::BirthDate => entry.birth_date = parse_birth_date(cell),
                RosterField::Experience => entry.experience = parse_experience(cell),
                RosterField::Country | RosterField::College => {}
            }
        }
        if let Some(name) = name {
            roster.insert(name, entry);
        }
    }
    Ok(roster)
}

const FEET_PER_METER: f64 = 3.2808;
const KG_PER_LB: f64 = 0.453_592;

/// Listed height "6-10" -> meters, via the feet.inches reading.
fn parse_height(raw: &str) -> Option<f64> {
    let v: f64 = raw.replace('-', ".").parse().ok()?;
    Some(v / FEET_PER_METER)
}

/// Listed weight in pounds -> kilograms.
fn parse_weight(raw: &str) -> Option<f64> {
    let lbs: f64 = raw.parse().ok()?;
    Some(lbs * KG_PER_LB)
}

fn parse_birth_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), "%B %d, %Y")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// "R" marks a rookie.
fn parse_experience(raw: &str) -> Option<u32> {
    if raw == "R" {
        return Some(0);
    }
    raw.parse().ok()
}
