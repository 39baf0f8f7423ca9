//! Feed/detail orchestration.
//!
//! Per site: sequential paginated feed-scrape, then detail-scrape in
//! fixed-size batches. Sites run in parallel under one semaphore; every
//! candidate streams over a channel to a single persist consumer, so store
//! writes begin while sites are still scraping.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::fetch::PageFetcher;
use crate::listing::ListingCandidate;
use crate::parser::{extract_detail, extract_listings, merge_detail};
use crate::persist::Persister;
use crate::profiles::SiteProfile;
use crate::report::{RunReport, RunSummary};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// How many sites scrape at once.
    pub site_concurrency: usize,
    /// Cap on detail pages fetched per site.
    pub detail_limit: Option<usize>,
    /// Whole-run budget. Checked between pages and between batches; in-flight
    /// fetches finish on their own timeouts.
    pub run_timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            site_concurrency: 3,
            detail_limit: None,
            run_timeout: None,
        }
    }
}

pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    persister: Arc<Persister>,
    report: Arc<RunReport>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        persister: Arc<Persister>,
        report: Arc<RunReport>,
        options: RunOptions,
    ) -> Self {
        Orchestrator {
            fetcher,
            persister,
            report,
            options,
        }
    }

    /// Scrape every profile and stream the results into the store. The
    /// summary always comes back, partial failures included.
    pub async fn run(&self, profiles: &[SiteProfile]) -> RunSummary {
        let deadline = self.options.run_timeout.map(|t| Instant::now() + t);
        let semaphore = Arc::new(Semaphore::new(self.options.site_concurrency.max(1)));

        // Workers send candidates, the single consumer below persists them.
        let (tx, mut rx) = mpsc::channel::<ListingCandidate>(64);

        for profile in profiles.iter().cloned() {
            let fetcher = Arc::clone(&self.fetcher);
            let report = Arc::clone(&self.report);
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let options = self.options;

            tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                scrape_site(fetcher, profile, report, tx, options, deadline).await;
            });
        }

        // Close our sender so the loop ends when all site tasks finish.
        drop(tx);

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} listings processed ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        while let Some(candidate) = rx.recv().await {
            let site = candidate.source.clone();
            let outcome = self.persister.persist(&candidate).await;
            self.report.persist_outcome(&site, outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let summary = self.report.snapshot();
        info!(
            found = summary.found,
            saved = summary.saved,
            duplicates = summary.duplicates,
            errors = summary.errors,
            "run complete"
        );
        summary
    }
}

async fn scrape_site(
    fetcher: Arc<dyn PageFetcher>,
    profile: SiteProfile,
    report: Arc<RunReport>,
    tx: mpsc::Sender<ListingCandidate>,
    options: RunOptions,
    deadline: Option<Instant>,
) {
    let site = profile.name;
    let candidates = feed_stage(&fetcher, &profile, &report, deadline).await;

    if candidates.is_empty() {
        report.log("warn", format!("{}: feed stage produced no candidates", site), None);
        return;
    }

    let enriched = detail_stage(&fetcher, &profile, &report, candidates, options, deadline).await;

    for candidate in enriched {
        report.candidate_found(site, &candidate.industry);
        if tx.send(candidate).await.is_err() {
            // Consumer is gone; nothing left to do for this site.
            return;
        }
    }
    report.log("info", format!("{}: site done", site), None);
}

/// Sequential pagination. Stops at the first page yielding zero new
/// candidate URLs, at `max_pages`, on a fetch failure, or at the deadline,
/// whichever comes first.
async fn feed_stage(
    fetcher: &Arc<dyn PageFetcher>,
    profile: &SiteProfile,
    report: &Arc<RunReport>,
    deadline: Option<Instant>,
) -> Vec<ListingCandidate> {
    let site = profile.name;
    let mut seen: HashSet<String> = HashSet::new();
    let mut collected: Vec<ListingCandidate> = Vec::new();
    let mut fetch_failed = false;

    for page in 1..=profile.max_pages {
        if past(deadline) {
            report.log("warn", format!("{}: run deadline hit during feed stage", site), None);
            break;
        }

        let url = profile.feed_url(page);
        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                // A dead feed page means zero results, not a dead run.
                warn!(site, page, error = %e, "feed page fetch failed");
                report.fetch_error(site);
                fetch_failed = true;
                break;
            }
        };
        report.page_fetched(site);

        let page_candidates = extract_listings(&html, profile);
        let mut new_count = 0usize;
        for candidate in page_candidates {
            let key = candidate
                .original_url
                .clone()
                .unwrap_or_else(|| format!("{}::{}", candidate.source, candidate.name));
            if seen.insert(key) {
                new_count += 1;
                collected.push(candidate);
            }
        }

        report.log(
            "info",
            format!("{}: feed page {} parsed", site, page),
            Some(json!({ "url": url, "new_candidates": new_count })),
        );

        if new_count == 0 {
            break;
        }
    }

    if fetch_failed && collected.is_empty() {
        report.site_failed(site);
    }
    collected
}

/// Detail fetches run `detail_batch_size` at a time with a fixed pause
/// between batches. One URL failing is logged and leaves that candidate
/// with its feed-stage fields; it never cancels the batch.
async fn detail_stage(
    fetcher: &Arc<dyn PageFetcher>,
    profile: &SiteProfile,
    report: &Arc<RunReport>,
    candidates: Vec<ListingCandidate>,
    options: RunOptions,
    deadline: Option<Instant>,
) -> Vec<ListingCandidate> {
    let site = profile.name;
    let batch_size = profile.detail_batch_size.max(1);
    let mut budget = options.detail_limit.unwrap_or(usize::MAX);
    let mut enriched: Vec<ListingCandidate> = Vec::with_capacity(candidates.len());

    let mut rest = candidates;
    let mut first_batch = true;
    while !rest.is_empty() {
        if past(deadline) {
            report.log(
                "warn",
                format!("{}: run deadline hit, skipping remaining detail fetches", site),
                Some(json!({ "remaining": rest.len() })),
            );
            enriched.append(&mut rest);
            break;
        }

        if !first_batch {
            tokio::time::sleep(Duration::from_millis(profile.batch_delay_ms)).await;
        }
        first_batch = false;

        let take = batch_size.min(rest.len());
        let batch: Vec<ListingCandidate> = rest.drain(..take).collect();

        let mut handles = Vec::with_capacity(batch.len());
        for candidate in batch {
            let url = match candidate.original_url.clone() {
                Some(u) if budget > 0 => u,
                _ => {
                    // Nothing to fetch; pass the feed record through.
                    handles.push(tokio::spawn(async move { candidate }));
                    continue;
                }
            };
            budget -= 1;

            let fetcher = Arc::clone(fetcher);
            let report = Arc::clone(report);
            let profile = profile.clone();
            handles.push(tokio::spawn(async move {
                enrich_one(&fetcher, &profile, &report, candidate, &url).await
            }));
        }

        for handle in handles {
            if let Ok(candidate) = handle.await {
                enriched.push(candidate);
            }
        }
    }

    enriched
}

async fn enrich_one(
    fetcher: &Arc<dyn PageFetcher>,
    profile: &SiteProfile,
    report: &Arc<RunReport>,
    mut candidate: ListingCandidate,
    url: &str,
) -> ListingCandidate {
    match fetcher.fetch(url).await {
        Ok(html) => {
            report.page_fetched(profile.name);
            if let Some(detail) = extract_detail(&html, profile) {
                merge_detail(&mut candidate, detail);
            }
        }
        Err(e) => {
            warn!(site = profile.name, url, error = %e, "detail fetch failed");
            report.fetch_error(profile.name);
        }
    }
    candidate
}

/// Fetch one page and extract whatever it holds, feed rules first. No
/// persistence; used by the probe command.
pub async fn probe_page(
    fetcher: &Arc<dyn PageFetcher>,
    profile: &SiteProfile,
    url: &str,
) -> anyhow::Result<Vec<ListingCandidate>> {
    let html = fetcher.fetch(url).await?;
    let listings = extract_listings(&html, profile);
    if !listings.is_empty() {
        return Ok(listings);
    }
    Ok(extract_detail(&html, profile).into_iter().collect())
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
