use serde::{Deserialize, Serialize};

/// Names shorter than this are boilerplate ("Sold", "View") rather than
/// listing titles.
pub const MIN_NAME_LEN: usize = 5;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_HIGHLIGHT_LEN: usize = 120;
pub const MAX_HIGHLIGHTS: usize = 5;

/// Plausible asking-price / revenue window. Values outside are parsing
/// false-positives (a "$3" badge, a phone number run together).
pub const MIN_PLAUSIBLE_AMOUNT: i64 = 1_000;
pub const MAX_PLAUSIBLE_AMOUNT: i64 = 100_000_000;

pub fn is_plausible_amount(v: i64) -> bool {
    (MIN_PLAUSIBLE_AMOUNT..=MAX_PLAUSIBLE_AMOUNT).contains(&v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
}

/// A listing as extracted from one page, before dedup against the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub name: String,
    /// Currency units, USD assumed. 0 means unknown, never an error marker.
    pub asking_price: i64,
    pub annual_revenue: i64,
    pub industry: String,
    pub location: String,
    pub source: String,
    pub original_url: Option<String>,
    pub highlights: Vec<String>,
    pub description: Option<String>,
    pub status: ListingStatus,
}

impl ListingCandidate {
    pub fn new(name: &str, source: &str) -> Self {
        ListingCandidate {
            name: truncate(name.trim(), MAX_NAME_LEN),
            asking_price: 0,
            annual_revenue: 0,
            industry: String::new(),
            location: String::new(),
            source: source.to_string(),
            original_url: None,
            highlights: Vec::new(),
            description: None,
            status: ListingStatus::Active,
        }
    }

    pub fn set_description(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.description = Some(truncate(text, MAX_DESCRIPTION_LEN));
        }
    }

    pub fn push_highlight(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() && self.highlights.len() < MAX_HIGHLIGHTS {
            self.highlights.push(truncate(text, MAX_HIGHLIGHT_LEN));
        }
    }

    /// Natural key used for dedup when no URL was captured.
    pub fn name_source_key(&self) -> (&str, &str) {
        (&self.name, &self.source)
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("café business", 4), "café");
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn highlights_are_bounded() {
        let mut c = ListingCandidate::new("Profitable SaaS", "flippa");
        for i in 0..10 {
            c.push_highlight(&format!("point {}", i));
        }
        assert_eq!(c.highlights.len(), MAX_HIGHLIGHTS);
    }

    #[test]
    fn empty_highlight_skipped() {
        let mut c = ListingCandidate::new("Profitable SaaS", "flippa");
        c.push_highlight("   ");
        assert!(c.highlights.is_empty());
    }

    #[test]
    fn plausibility_window() {
        assert!(!is_plausible_amount(999));
        assert!(is_plausible_amount(1_000));
        assert!(is_plausible_amount(100_000_000));
        assert!(!is_plausible_amount(100_000_001));
    }
}
