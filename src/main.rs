use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use listing_scraper::config::AppConfig;
use listing_scraper::fetch::{FetchClient, PageFetcher, RetryPolicy};
use listing_scraper::persist::Persister;
use listing_scraper::pipeline::{probe_page, Orchestrator, RunOptions};
use listing_scraper::profiles::{builtin_profiles, find_profile, profile_for_url};
use listing_scraper::report::RunReport;
use listing_scraper::store::{MemoryStore, RestStore, TableStore};

#[derive(Parser)]
#[command(name = "listing_scraper", about = "Business-marketplace listing scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all configured sites and upsert listings into the store
    Run {
        /// Only scrape this site (see `sites`)
        #[arg(short, long)]
        site: Option<String>,
        /// Max detail pages to fetch per site
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Whole-run time budget in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Extract and dedup against an in-memory store, writing nothing
        #[arg(long)]
        dry_run: bool,
        /// Emit the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the configured site profiles
    Sites,
    /// Fetch one page and print what the extractor sees, without persisting
    Probe {
        url: String,
        /// Force a site profile instead of matching on the URL host
        #[arg(short, long)]
        site: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            site,
            limit,
            timeout,
            dry_run,
            json,
        } => run(site, limit, timeout, dry_run, json).await,
        Commands::Sites => {
            let profiles = builtin_profiles();
            println!("{:<16} {:<36} {:>9}", "site", "base url", "max pages");
            println!("{}", "-".repeat(64));
            for p in &profiles {
                println!("{:<16} {:<36} {:>9}", p.name, p.base_url, p.max_pages);
            }
            Ok(())
        }
        Commands::Probe { url, site } => probe(&url, site.as_deref()).await,
    }
}

async fn run(
    site: Option<String>,
    limit: Option<usize>,
    timeout: Option<u64>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let mut profiles = builtin_profiles();
    if let Some(name) = &site {
        if find_profile(&profiles, name).is_none() {
            bail!("unknown site '{}', try the `sites` command", name);
        }
        profiles.retain(|p| p.name.eq_ignore_ascii_case(name));
    }

    let store: Arc<dyn TableStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let store_config = config.require_store()?;
        Arc::new(
            RestStore::new(&store_config.url, &store_config.api_key)
                .context("store client construction failed")?,
        )
    };

    let fetcher: Arc<dyn PageFetcher> = Arc::new(FetchClient::new(
        config.proxy.clone(),
        RetryPolicy::default(),
    )?);

    let options = RunOptions {
        detail_limit: limit,
        run_timeout: timeout.map(std::time::Duration::from_secs),
        ..RunOptions::default()
    };

    let report = Arc::new(RunReport::new());
    let orchestrator = Orchestrator::new(fetcher, Arc::new(Persister::new(store)), report, options);
    let summary = orchestrator.run(&profiles).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render_text());
    }
    Ok(())
}

async fn probe(url: &str, site: Option<&str>) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let profiles = builtin_profiles();

    let profile = match site {
        Some(name) => {
            find_profile(&profiles, name).with_context(|| format!("unknown site '{}'", name))?
        }
        None => profile_for_url(&profiles, url)
            .context("no profile matches this URL host, pass --site")?,
    };

    let fetcher: Arc<dyn PageFetcher> = Arc::new(FetchClient::new(
        config.proxy.clone(),
        RetryPolicy::default(),
    )?);

    let candidates = probe_page(&fetcher, profile, url).await?;
    if candidates.is_empty() {
        println!("No candidates extracted from {}", url);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}
