//! Free-text value normalization: money strings, industry and location
//! keywords. Heuristic best-effort, tuned for recall over precision.

use std::sync::LazyLock;

use regex::Regex;

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(million|thousand|[mk])?\b").unwrap()
});

/// Parse a free-text currency string into whole currency units.
///
/// Handles "$1.2M", "$450K", "2.5 million", "$75,000". Returns `None`
/// (not zero) when no numeric substring is present. USD assumed, no unit
/// conversion.
pub fn parse_price(text: &str) -> Option<i64> {
    let caps = MONEY_RE.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;

    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "m" || s == "million" => 1_000_000.0,
        Some(s) if s == "k" || s == "thousand" => 1_000.0,
        _ => 1.0,
    };

    let value = (number * multiplier).round();
    if !value.is_finite() || value < 0.0 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Ordered keyword table, first match wins.
const INDUSTRY_TABLE: &[(&[&str], &str)] = &[
    (&["saas", "software", "app ", "platform", "subscription"], "SaaS & Software"),
    (&["ecommerce", "e-commerce", "amazon", "fba", "shopify", "online store", "dropship"], "E-commerce"),
    (&["content", "blog", "newsletter", "media", "youtube", "affiliate"], "Content & Media"),
    (&["restaurant", "cafe", "coffee", "bakery", "food", "catering", "bar "], "Food & Restaurant"),
    (&["health", "medical", "dental", "clinic", "wellness", "fitness", "gym"], "Health & Wellness"),
    (&["manufactur", "industrial", "machine shop", "fabrication", "wholesale"], "Manufacturing & Wholesale"),
    (&["real estate", "property management", "rental"], "Real Estate"),
    (&["agency", "marketing", "consulting", "service", "cleaning", "landscap", "plumbing", "hvac"], "Services"),
    (&["automotive", "auto repair", "car wash", "dealership"], "Automotive"),
];

pub const INDUSTRY_DEFAULT: &str = "Other";

pub fn classify_industry(text: &str) -> String {
    let haystack = text.to_lowercase();
    for (keywords, label) in INDUSTRY_TABLE {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return label.to_string();
        }
    }
    INDUSTRY_DEFAULT.to_string()
}

static CITY_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][A-Za-z .'-]+,\s*[A-Z]{2})\b").unwrap());

const ONLINE_KEYWORDS: &[&str] = &["online", "remote", "relocatable", "worldwide", "internet"];

/// Pull a location out of free text. `None` when nothing recognizable.
pub fn classify_location(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if ONLINE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some("Online".to_string());
    }

    if let Some(caps) = CITY_STATE_RE.captures(trimmed) {
        return Some(caps[1].trim().to_string());
    }

    // Short free text ("Texas", "United Kingdom") is taken as-is; long text
    // is prose, not a location.
    if trimmed.len() <= 40 && trimmed.chars().any(|c| c.is_alphabetic()) {
        return Some(trimmed.to_string());
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_millions() {
        assert_eq!(parse_price("$1.2M"), Some(1_200_000));
        assert_eq!(parse_price("2.5 million"), Some(2_500_000));
        assert_eq!(parse_price("$2.1M"), Some(2_100_000));
    }

    #[test]
    fn price_thousands() {
        assert_eq!(parse_price("$450K"), Some(450_000));
        assert_eq!(parse_price("450 thousand"), Some(450_000));
        assert_eq!(parse_price("$500k"), Some(500_000));
    }

    #[test]
    fn price_comma_grouped() {
        assert_eq!(parse_price("$75,000"), Some(75_000));
        assert_eq!(parse_price("Asking: $2,100,000 (firm)"), Some(2_100_000));
    }

    #[test]
    fn price_no_number() {
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("Contact seller"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn price_never_negative() {
        // Minus signs are stripped by the token pattern, not interpreted.
        for s in ["-500", "$-1.2M", "loss of $40K"] {
            if let Some(v) = parse_price(s) {
                assert!(v >= 0, "{} parsed negative", s);
            }
        }
    }

    #[test]
    fn price_rounds_to_integer() {
        assert_eq!(parse_price("$1.2345M"), Some(1_234_500));
        assert_eq!(parse_price("0.0015k"), Some(2));
    }

    #[test]
    fn industry_first_match_wins() {
        // "software" (SaaS row) appears before "marketing" (Services row).
        assert_eq!(
            classify_industry("Marketing software platform"),
            "SaaS & Software"
        );
        assert_eq!(classify_industry("Established HVAC business"), "Services");
        assert_eq!(classify_industry("A mystery venture"), INDUSTRY_DEFAULT);
    }

    #[test]
    fn location_city_state() {
        assert_eq!(
            classify_location("Located in Austin, TX since 1999").as_deref(),
            Some("Austin, TX")
        );
    }

    #[test]
    fn location_online_keywords() {
        assert_eq!(classify_location("Fully remote team").as_deref(), Some("Online"));
        assert_eq!(classify_location("Relocatable").as_deref(), Some("Online"));
    }

    #[test]
    fn location_short_text_passthrough() {
        assert_eq!(classify_location("Texas").as_deref(), Some("Texas"));
        assert_eq!(classify_location(""), None);
    }
}
