//! In-memory run aggregation: counters, a structured log list, and the
//! end-of-run summary. Counters are atomic and the log list is lock-guarded
//! so concurrent site tasks can append safely.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::persist::PersistOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteBreakdown {
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub pages_fetched: usize,
    pub failed: bool,
}

/// Snapshot exported at run end; always produced, partial failures included.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub duration_secs: f64,
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub per_site: BTreeMap<String, SiteBreakdown>,
    pub per_industry: BTreeMap<String, usize>,
    pub log: Vec<LogEntry>,
}

pub struct RunReport {
    started: Instant,
    found: AtomicUsize,
    saved: AtomicUsize,
    duplicates: AtomicUsize,
    errors: AtomicUsize,
    log: Mutex<Vec<LogEntry>>,
    per_site: Mutex<BTreeMap<String, SiteBreakdown>>,
    per_industry: Mutex<BTreeMap<String, usize>>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        RunReport {
            started: Instant::now(),
            found: AtomicUsize::new(0),
            saved: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            per_site: Mutex::new(BTreeMap::new()),
            per_industry: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn log(&self, level: &str, message: impl Into<String>, data: Option<Value>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.into(),
            data,
        };
        self.log.lock().unwrap().push(entry);
    }

    pub fn candidate_found(&self, site: &str, industry: &str) {
        self.found.fetch_add(1, Ordering::Relaxed);
        self.per_site.lock().unwrap().entry(site.to_string()).or_default().found += 1;
        *self
            .per_industry
            .lock()
            .unwrap()
            .entry(industry.to_string())
            .or_default() += 1;
    }

    pub fn persist_outcome(&self, site: &str, outcome: PersistOutcome) {
        let mut sites = self.per_site.lock().unwrap();
        let entry = sites.entry(site.to_string()).or_default();
        match outcome {
            PersistOutcome::Created | PersistOutcome::Updated => {
                self.saved.fetch_add(1, Ordering::Relaxed);
                entry.saved += 1;
            }
            PersistOutcome::Duplicate => {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                entry.duplicates += 1;
            }
            PersistOutcome::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                entry.errors += 1;
            }
        }
    }

    pub fn page_fetched(&self, site: &str) {
        self.per_site.lock().unwrap().entry(site.to_string()).or_default().pages_fetched += 1;
    }

    pub fn fetch_error(&self, site: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.per_site.lock().unwrap().entry(site.to_string()).or_default().errors += 1;
    }

    pub fn site_failed(&self, site: &str) {
        self.per_site.lock().unwrap().entry(site.to_string()).or_default().failed = true;
    }

    pub fn snapshot(&self) -> RunSummary {
        self.snapshot_at(self.started.elapsed())
    }

    fn snapshot_at(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            duration_secs: elapsed.as_secs_f64(),
            found: self.found.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            per_site: self.per_site.lock().unwrap().clone(),
            per_industry: self.per_industry.lock().unwrap().clone(),
            log: self.log.lock().unwrap().clone(),
        }
    }
}

impl RunSummary {
    /// Compact text rendering for the CLI footer.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Found:      {}\nSaved:      {}\nDuplicates: {}\nErrors:     {}\n",
            self.found, self.saved, self.duplicates, self.errors
        ));

        if !self.per_site.is_empty() {
            out.push_str("\nPer site:\n");
            for (site, b) in &self.per_site {
                out.push_str(&format!(
                    "  {:<16} found {:>4} | saved {:>4} | dup {:>4} | err {:>3} | pages {:>3}{}\n",
                    site,
                    b.found,
                    b.saved,
                    b.duplicates,
                    b.errors,
                    b.pages_fetched,
                    if b.failed { " | FAILED" } else { "" },
                ));
            }
        }

        if !self.per_industry.is_empty() {
            out.push_str("\nPer industry:\n");
            for (industry, count) in &self.per_industry {
                out.push_str(&format!("  {:<28} {:>4}\n", industry, count));
            }
        }

        out.push_str(&format!("\nDone in {:.1}s\n", self.duration_secs));
        out
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_roll_up() {
        let report = RunReport::new();
        report.candidate_found("flippa", "SaaS & Software");
        report.candidate_found("flippa", "E-commerce");
        report.persist_outcome("flippa", PersistOutcome::Created);
        report.persist_outcome("flippa", PersistOutcome::Duplicate);
        report.fetch_error("flippa");

        let s = report.snapshot();
        assert_eq!(s.found, 2);
        assert_eq!(s.saved, 1);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.errors, 1);
        assert_eq!(s.per_site["flippa"].found, 2);
        assert_eq!(s.per_industry["SaaS & Software"], 1);
    }

    #[test]
    fn updated_counts_as_saved() {
        let report = RunReport::new();
        report.persist_outcome("quietlight", PersistOutcome::Updated);
        assert_eq!(report.snapshot().saved, 1);
    }

    #[test]
    fn log_entries_accumulate() {
        let report = RunReport::new();
        report.log("info", "feed page fetched", Some(serde_json::json!({"page": 1})));
        report.log("warn", "detail fetch failed", None);
        let s = report.snapshot();
        assert_eq!(s.log.len(), 2);
        assert_eq!(s.log[0].level, "info");
    }

    #[test]
    fn summary_serializes() {
        let report = RunReport::new();
        report.candidate_found("bizbuysell", "Services");
        let json = serde_json::to_string(&report.snapshot()).unwrap();
        assert!(json.contains("\"per_site\""));
    }
}
