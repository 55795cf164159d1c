//! Reconciliation of scraped player names against a roster: exact lookup,
//! cached alias, Levenshtein fuzzy match, then the external biography source.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use strsim::normalized_levenshtein;
use tracing::debug;

use crate::biography::{resolve_biography, BiographySource};
use crate::error::CrawlError;
use crate::record::RosterEntry;
use crate::roster::Roster;

/// Fuzzy matches below this similarity are not trusted.
const FUZZY_THRESHOLD: f64 = 0.65;

/// Run-scoped caches, constructed once per orchestrator run and shared by
/// every worker. Both maps are append-only for the lifetime of the run and a
/// key always maps to the same value (players are name-stable within a run),
/// so two workers racing on the same key write identical entries; last-write-
/// wins is deliberately accepted instead of coordinating.
#[derive(Debug, Default)]
pub struct IdentityCaches {
    aliases: Mutex<HashMap<String, String>>,
    bios: Mutex<HashMap<String, RosterEntry>>,
}

impl IdentityCaches {
    pub fn new() -> Self {
        Self::default()
    }

    fn alias_for(&self, scraped: &str) -> Option<String> {
        self.aliases.lock().ok()?.get(scraped).cloned()
    }

    fn record_alias(&self, scraped: &str, canonical: &str) {
        if let Ok(mut aliases) = self.aliases.lock() {
            aliases.insert(scraped.to_string(), canonical.to_string());
        }
    }

    fn bio_for(&self, scraped: &str) -> Option<RosterEntry> {
        self.bios.lock().ok()?.get(scraped).cloned()
    }

    fn record_bio(&self, scraped: &str, entry: &RosterEntry) {
        if let Ok(mut bios) = self.bios.lock() {
            bios.insert(scraped.to_string(), entry.clone());
        }
    }
}

/// Resolve a scraped name to basic info. Terminal states in order: roster
/// key, cached alias, accepted fuzzy match, external biography.
pub fn resolve(
    scraped: &str,
    team_name: &str,
    roster: &Roster,
    caches: &IdentityCaches,
    source: &dyn BiographySource,
) -> Result<RosterEntry, CrawlError> {
    if let Some(entry) = roster.get(scraped) {
        return Ok(entry.clone());
    }

    if let Some(canonical) = caches.alias_for(scraped) {
        if let Some(entry) = roster.get(&canonical) {
            return Ok(entry.clone());
        }
    }

    if let Some(canonical) = most_suitable(scraped, roster) {
        debug!("{scraped} associated with {canonical} from roster");
        caches.record_alias(scraped, &canonical);
        return Ok(roster[&canonical].clone());
    }

    debug!("no roster association for {scraped}, using external biography");
    if let Some(entry) = caches.bio_for(scraped) {
        return Ok(entry);
    }
    let entry = resolve_biography(source, scraped, team_name, Utc::now().year())?;
    caches.record_bio(scraped, &entry);
    Ok(entry)
}

/// Highest-similarity roster key, accepted only above the threshold and when
/// the first-token prefixes agree. The prefix guard keeps short names with
/// high overall similarity ("Chris Paul" vs "Chris Webber" passes it, but
/// their ratio stays below the threshold) from colliding onto the wrong
/// person.
fn most_suitable(scraped: &str, roster: &Roster) -> Option<String> {
    let (score, candidate) = roster
        .keys()
        .map(|name| (normalized_levenshtein(scraped, name), name))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))?;

    if score >= FUZZY_THRESHOLD && prefixes_agree(scraped, candidate) {
        Some(candidate.clone())
    } else {
        None
    }
}

/// First three characters of the scraped first token must appear within the
/// first three of the candidate's, case-insensitively.
fn prefixes_agree(scraped: &str, candidate: &str) -> bool {
    let prefix = |s: &str| {
        s.split_whitespace()
            .next()
            .unwrap_or("")
            .chars()
            .take(3)
            .collect::<String>()
            .to_lowercase()
    };
    let scraped = prefix(scraped);
    let candidate = prefix(candidate);
    !scraped.is_empty() && candidate.contains(&scraped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biography::BiographyLookup;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        result: Option<RosterEntry>,
    }

    impl CountingSource {
        fn unresolvable() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: None,
            }
        }

        fn with(entry: RosterEntry) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Some(entry),
            }
        }
    }

    impl BiographySource for CountingSource {
        fn lookup(&self, title: &str) -> Result<BiographyLookup, CrawlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(entry) => {
                    let mut infobox = HashMap::new();
                    infobox.insert(
                        "position".to_string(),
                        match entry.position.as_deref() {
                            Some("PG") => "Point guard".to_string(),
                            _ => "Center".to_string(),
                        },
                    );
                    infobox.insert(
                        "born".to_string(),
                        format!("({}) long form", entry.birth_date.as_deref().unwrap()),
                    );
                    Ok(BiographyLookup::Page(crate::biography::BiographyPage {
                        infobox,
                        text: "whatever team".to_string(),
                    }))
                }
                None => Err(CrawlError::unresolved(title)),
            }
        }
    }

    fn roster_of(names: &[&str]) -> Roster {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    RosterEntry {
                        position: Some("PG".to_string()),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn exact_roster_key_wins_without_side_effects() {
        let roster = roster_of(&["LeBron James"]);
        let caches = IdentityCaches::new();
        let source = CountingSource::unresolvable();
        let entry = resolve("LeBron James", "Cavs", &roster, &caches, &source).unwrap();
        assert_eq!(entry.position.as_deref(), Some("PG"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(caches.aliases.lock().unwrap().is_empty());
    }

    #[test]
    fn misspelling_resolves_through_fuzzy_match_and_is_cached() {
        let roster = roster_of(&["LeBron James"]);
        let caches = IdentityCaches::new();
        let source = CountingSource::unresolvable();
        let entry = resolve("Lebron Jmes", "Cavs", &roster, &caches, &source).unwrap();
        assert_eq!(entry.position.as_deref(), Some("PG"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            caches.aliases.lock().unwrap().get("Lebron Jmes").map(String::as_str),
            Some("LeBron James")
        );
    }

    #[test]
    fn surname_divergence_fails_fuzzy_and_falls_through() {
        // "chr" prefixes agree, but the overall ratio stays below 0.65.
        let roster = roster_of(&["Chris Webber"]);
        let caches = IdentityCaches::new();
        let source = CountingSource::unresolvable();
        let err = resolve("Chris Paul", "Kings", &roster, &caches, &source).unwrap_err();
        assert!(matches!(err, CrawlError::IdentityUnresolved { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(caches.aliases.lock().unwrap().is_empty());
    }

    #[test]
    fn prefix_guard_rejects_high_similarity_prefix_mismatch() {
        assert!(prefixes_agree("Lebron Jmes", "LeBron James"));
        assert!(prefixes_agree("Chris Paul", "Chris Webber"));
        assert!(!prefixes_agree("Jon Smith", "Ron Smith"));
    }

    #[test]
    fn alias_cache_short_circuits_second_resolution() {
        let roster = roster_of(&["LeBron James"]);
        let caches = IdentityCaches::new();
        let source = CountingSource::unresolvable();
        resolve("Lebron Jmes", "Cavs", &roster, &caches, &source).unwrap();
        // Second time around the fuzzy scan is bypassed via the alias.
        let entry = resolve("Lebron Jmes", "Cavs", &roster, &caches, &source).unwrap();
        assert_eq!(entry.position.as_deref(), Some("PG"));
    }

    struct CareerSource;

    impl BiographySource for CareerSource {
        fn lookup(&self, _title: &str) -> Result<BiographyLookup, CrawlError> {
            let mut infobox = HashMap::new();
            infobox.insert("position".to_string(), "Center".to_string());
            infobox.insert(
                "born".to_string(),
                "(1992-02-12) February 12, 1992".to_string(),
            );
            infobox.insert(
                "playing_career".to_string(),
                "2015\u{2013}present".to_string(),
            );
            Ok(BiographyLookup::Page(crate::biography::BiographyPage {
                infobox,
                text: "plays for the Hawks".to_string(),
            }))
        }
    }

    #[test]
    fn external_experience_counts_from_the_current_year() {
        let roster = roster_of(&["Somebody Else"]);
        let caches = IdentityCaches::new();
        let entry = resolve("Unknown Person", "Hawks", &roster, &caches, &CareerSource).unwrap();
        assert_eq!(
            entry.experience,
            Some((Utc::now().year() - 2015) as u32)
        );
    }

    #[test]
    fn external_result_is_cached_per_scraped_name() {
        let roster = roster_of(&["Somebody Else"]);
        let caches = IdentityCaches::new();
        let source = CountingSource::with(RosterEntry {
            position: Some("PG".to_string()),
            birth_date: Some("1984-12-30".to_string()),
            ..Default::default()
        });
        let first = resolve("Zaza Unknown", "Hawks", &roster, &caches, &source).unwrap();
        let second = resolve("Zaza Unknown", "Hawks", &roster, &caches, &source).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.birth_date.as_deref(), Some("1984-12-30"));
    }
}
