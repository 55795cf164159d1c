use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use boxcrawl::biography::WikipediaSource;
use boxcrawl::http_client::{WebFetcher, DEFAULT_DEADLINE_SECS};
use boxcrawl::identity::IdentityCaches;
use boxcrawl::season::{expand_seasons, SeasonOrchestrator, DEFAULT_WORKERS};

const COUNTRY: &str = "united_states";

#[derive(Parser)]
#[command(name = "boxcrawl")]
#[command(about = "Crawl box scores for whole seasons into per-event JSON records")]
struct Cli {
    /// League identifier.
    #[arg(long, default_value = "nba")]
    league: String,

    /// Season tokens: explicit `YYYY-YYYY` values, or a single `FROM-to-TO`
    /// range expanded into consecutive seasons.
    #[arg(long, num_args = 1.., default_value = "2014-2015")]
    seasons: Vec<String>,

    /// Root directory for persisted event records.
    #[arg(long, default_value = "matches")]
    out_dir: PathBuf,

    /// Width of the per-season crawl worker pool.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Per-fetch deadline in seconds.
    #[arg(long, default_value_t = DEFAULT_DEADLINE_SECS)]
    deadline_secs: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let seasons = expand_seasons(&cli.seasons);

    let fetcher = WebFetcher::new(Duration::from_secs(cli.deadline_secs));
    let biographies = WikipediaSource::new(&fetcher);
    // One cache object per run, shared by reference across every worker.
    let caches = IdentityCaches::new();

    for season in &seasons {
        let season_dir = cli.out_dir.join(COUNTRY).join(&cli.league).join(season);
        fs::create_dir_all(&season_dir)
            .with_context(|| format!("failed to create {}", season_dir.display()))?;

        info!("crawling season {season}");
        SeasonOrchestrator {
            country: COUNTRY,
            league: &cli.league,
            season,
            out_dir: &cli.out_dir,
            workers: cli.workers,
            fetcher: &fetcher,
            biographies: &biographies,
            caches: &caches,
        }
        .crawl_season()?;
    }
    Ok(())
}
