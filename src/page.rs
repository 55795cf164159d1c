//! Box-score page querying: the "query nodes" primitives the crawler builds
//! on. Everything here turns one fetched page into plain data; layout
//! assumptions that do not hold surface as structure mismatches.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};

use crate::error::CrawlError;
use crate::tables::{PlayerRow, StatTable};

/// Selectors here are compile-time constants; a parse failure is a typo, not
/// a runtime condition.
pub(crate) fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap_or_else(|_| unreachable!("bad selector {s}"))
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// The four stat tables of a box score in page order:
/// away basic, away advanced, home basic, home advanced.
pub fn stat_tables(doc: &Html) -> Result<Vec<StatTable>, CrawlError> {
    let tables: Vec<StatTable> = doc
        .select(&sel("table.stats_table"))
        .map(table_region)
        .collect::<Result<_, _>>()?;
    if tables.len() < 4 {
        return Err(CrawlError::structure(format!(
            "expected 4 stats tables, found {}",
            tables.len()
        )));
    }
    Ok(tables)
}

fn table_region(table: ElementRef) -> Result<StatTable, CrawlError> {
    let head_rows: Vec<ElementRef> = table.select(&sel("thead tr")).collect();
    // The first thead row is a spanning caption; the metric names live on the
    // second.
    let header_row = head_rows
        .get(1)
        .ok_or_else(|| CrawlError::structure("stat table missing metric header row"))?;
    let headers: Vec<String> = header_row
        .select(&sel("th"))
        .skip(1)
        .map(text_of)
        .collect();

    let rows = table
        .select(&sel("tbody tr"))
        .map(|row| {
            let label = row
                .select(&sel("th"))
                .next()
                .ok_or_else(|| CrawlError::structure("player row missing label cell"))?;
            let name = label
                .select(&sel("a"))
                .next()
                .map(text_of)
                .unwrap_or_else(|| text_of(label));
            let cells = row.select(&sel("td")).map(text_of).collect();
            Ok(PlayerRow { name, cells })
        })
        .collect::<Result<Vec<_>, CrawlError>>()?;

    let footer = table.select(&sel("tfoot td")).map(text_of).collect();

    Ok(StatTable {
        headers,
        rows,
        footer,
    })
}

#[derive(Debug, Clone, Default)]
pub struct EventMeta {
    pub date: Option<String>,
    pub time: Option<String>,
    pub stadium: Option<String>,
}

/// Scheduled date/time and venue from the scorebox meta block. A page without
/// the block still crawls; the fields just stay empty.
pub fn event_meta(doc: &Html) -> EventMeta {
    let entries: Vec<String> = doc
        .select(&sel("div.scorebox_meta > div"))
        .map(text_of)
        .collect();

    let mut meta = EventMeta::default();
    if let Some(first) = entries.first() {
        if first.contains("AM") || first.contains("PM") {
            if let Ok(dt) = NaiveDateTime::parse_from_str(first, "%I:%M %p, %B %d, %Y") {
                meta.date = Some(dt.format("%Y-%m-%d").to_string());
                meta.time = Some(dt.format("%H:%M").to_string());
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(first, "%B %d, %Y") {
            meta.date = Some(d.format("%Y-%m-%d").to_string());
        }
    }
    if let Some(second) = entries.get(1) {
        let venue = second.split(',').next().unwrap_or_default().trim();
        if !venue.is_empty() {
            meta.stadium = Some(title_case(venue));
        }
    }
    meta
}

/// (name, team page path) for away then home, from the scorebox performers.
pub fn team_entries(doc: &Html) -> Result<[(String, String); 2], CrawlError> {
    let mut teams = Vec::new();
    for performer in doc.select(&sel("div.scorebox div[itemprop=\"performer\"]")) {
        let anchor = performer
            .select(&sel("a"))
            .last()
            .ok_or_else(|| CrawlError::structure("performer block without team link"))?;
        let href = anchor
            .value()
            .attr("href")
            .ok_or_else(|| CrawlError::structure("team link without href"))?;
        teams.push((text_of(anchor), href.to_string()));
    }
    teams
        .try_into()
        .map_err(|_| CrawlError::structure("expected exactly 2 performer blocks"))
}

/// Per-period scores for (away, home). The line-score table ships inside an
/// HTML comment, so the wrapper's contents are uncommented and re-parsed.
pub fn line_scores(
    doc: &Html,
) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>), CrawlError> {
    let wrapper = doc
        .select(&sel("div#all_line_score"))
        .next()
        .ok_or_else(|| CrawlError::structure("line score block missing"))?;
    let inner = wrapper.inner_html().replace("<!--", "").replace("-->", "");
    let fragment = Html::parse_fragment(&inner);
    let table = fragment
        .select(&sel("table#line_score"))
        .next()
        .ok_or_else(|| CrawlError::structure("line score table missing"))?;

    let rows: Vec<ElementRef> = table.select(&sel("tr")).collect();
    if rows.len() < 4 {
        return Err(CrawlError::structure("line score table too short"));
    }
    let periods: Vec<String> = rows[1].select(&sel("th")).skip(1).map(text_of).collect();
    let mut scores = Vec::new();
    for row in &rows[2..4] {
        let cells: Vec<String> = row.select(&sel("td")).skip(1).map(text_of).collect();
        scores.push(periods.iter().cloned().zip(cells).collect::<BTreeMap<_, _>>());
    }
    let home = scores.pop().unwrap_or_default();
    let away = scores.pop().unwrap_or_default();
    Ok((away, home))
}

#[derive(Debug, Clone, Default)]
pub struct ExtraInfo {
    pub attendance: Option<u32>,
    pub duration: Option<u32>,
    pub officials: Vec<String>,
}

/// Attendance, game duration and officials. These blocks sit below the box
/// scores, occasionally inside comments, so they are scanned on the raw page
/// text rather than the parsed tree.
pub fn extra_info(raw: &str) -> ExtraInfo {
    let attendance = scan_after(raw, "Attendance:", |c| c.is_ascii_digit() || c == ',')
        .and_then(|s| s.replace(',', "").parse().ok());

    let duration = scan_after(raw, "Time of Game:", |c| c.is_ascii_digit() || c == ':')
        .and_then(|s| {
            let (h, m) = s.split_once(':')?;
            let h: u32 = h.parse().ok()?;
            let m: u32 = m.parse().ok()?;
            Some(h * 60 + m)
        });

    let officials = raw
        .find("Officials:")
        .map(|idx| {
            let tail = &raw[idx..];
            let block = &tail[..tail.find("</div>").unwrap_or(tail.len())];
            anchor_texts(block)
        })
        .unwrap_or_default();

    ExtraInfo {
        attendance,
        duration,
        officials,
    }
}

/// First run of `keep` characters after `marker`, skipping markup tags.
fn scan_after(raw: &str, marker: &str, keep: impl Fn(char) -> bool) -> Option<String> {
    let idx = raw.find(marker)? + marker.len();
    let mut out = String::new();
    let mut in_tag = false;
    for c in raw[idx..].chars().take(200) {
        if c == '<' {
            if !out.is_empty() {
                break;
            }
            in_tag = true;
        } else if c == '>' {
            in_tag = false;
        } else if in_tag {
            // Markup between the marker and its value.
        } else if keep(c) {
            out.push(c);
        } else if !out.is_empty() {
            break;
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

fn anchor_texts(block: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = block;
    while let Some(start) = rest.find("<a") {
        let Some(open_end) = rest[start..].find('>') else {
            break;
        };
        let after = &rest[start + open_end + 1..];
        let Some(close) = after.find("</a>") else {
            break;
        };
        let text = after[..close].trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
        rest = &after[close + 4..];
    }
    out
}

/// Box-score codes on one monthly schedule page, split into
/// (regular season, postseason).
pub fn schedule_codes(html: &str) -> Result<(Vec<String>, Vec<String>), CrawlError> {
    let doc = Html::parse_document(html);
    let tables: Vec<ElementRef> = doc.select(&sel("table.stats_table")).collect();
    let (regular, post) = match tables.len() {
        0 => return Err(CrawlError::structure("schedule page without stats tables")),
        1 => (tables[0], None),
        _ => (tables[0], Some(tables[1])),
    };

    let mut reg_codes = Vec::new();
    let mut post_codes = Vec::new();
    for (table, codes) in [(Some(regular), &mut reg_codes), (post, &mut post_codes)] {
        let Some(table) = table else { continue };
        for anchor in table.select(&sel("tbody tr a")) {
            if text_of(anchor) != "Box Score" {
                continue;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(code) = code_from_href(href) {
                codes.push(code);
            }
        }
    }
    Ok((reg_codes, post_codes))
}

/// "/boxscores/201510270GSW.html" -> "201510270GSW"
fn code_from_href(href: &str) -> Option<String> {
    let file = href.split('/').nth(2)?;
    Some(file.split('.').next()?.to_string())
}

pub(crate) fn title_case(s: &str) -> String {
    s.split(' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
