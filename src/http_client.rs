use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::error::CrawlError;

pub const DEFAULT_DEADLINE_SECS: u64 = 30;

/// Rotated per request so a long season crawl does not present one client
/// identifier for thousands of pages.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
];

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    // No client-wide timeout: the deadline is threaded per request so each
    // crawl attempt carries its own envelope.
    CLIENT.get_or_try_init(|| Client::builder().build().context("failed to build http client"))
}

/// "Fetch page text" primitive. The crawl pipeline only ever sees this
/// interface, which is what lets tests substitute canned pages.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<String, CrawlError>;
}

/// Production fetcher: shared blocking client, per-request deadline, rotated
/// user agent.
pub struct WebFetcher {
    deadline: Duration,
}

impl WebFetcher {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }
}

impl Default for WebFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_DEADLINE_SECS))
    }
}

impl Fetcher for WebFetcher {
    fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let client = http_client().map_err(|e| CrawlError::Fetch(e.to_string()))?;
        let agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let resp = client
            .get(url)
            .header(USER_AGENT, agent)
            .timeout(self.deadline)
            .send()
            .map_err(classify)?;
        let status = resp.status();
        let body = resp.text().map_err(classify)?;
        if !status.is_success() {
            return Err(CrawlError::Fetch(format!("http {status} for {url}")));
        }
        Ok(body)
    }
}

/// Transport failures split into deadline expiry (retryable) and everything
/// else (fatal for the event).
fn classify(err: reqwest::Error) -> CrawlError {
    if err.is_timeout() {
        CrawlError::FetchTimeout
    } else {
        CrawlError::Fetch(err.to_string())
    }
}
