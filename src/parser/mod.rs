//! Field extraction: HTML in, `ListingCandidate`s out.
//!
//! Selector policy per the site profiles: ordered container selectors with
//! first-past-threshold wins, ordered per-field sub-selectors evaluated as a
//! first-success fold, free-text fallbacks for name and price. Containers
//! without a recognizable name are dropped silently; that is expected, not
//! an error.

pub mod fields;
pub mod normalize;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::listing::{is_plausible_amount, ListingCandidate, MAX_HIGHLIGHTS, MIN_NAME_LEN};
use crate::profiles::{ExtractionRules, SiteProfile};
use fields::{
    collect_texts, compile, first_href, first_text, normalized_text, price_from_free_text,
    title_from_text,
};
use normalize::{classify_industry, classify_location, parse_price, INDUSTRY_DEFAULT};

pub const LOCATION_DEFAULT: &str = "Not specified";

/// Extract listing cards from a feed page. Document order is preserved.
pub fn extract_listings(html: &str, profile: &SiteProfile) -> Vec<ListingCandidate> {
    let doc = Html::parse_document(html);
    let containers = match select_containers(&doc, &profile.feed) {
        Some(c) => c,
        None => {
            debug!(site = profile.name, "no container selector matched feed page");
            return Vec::new();
        }
    };

    containers
        .into_iter()
        .filter_map(|el| build_candidate(el, &profile.feed, profile))
        .collect()
}

/// Extract the single record from a listing detail page.
pub fn extract_detail(html: &str, profile: &SiteProfile) -> Option<ListingCandidate> {
    let doc = Html::parse_document(html);
    let containers = select_containers(&doc, &profile.detail)?;
    containers
        .into_iter()
        .find_map(|el| build_candidate(el, &profile.detail, profile))
}

/// Fold detail-page fields into a feed-stage candidate. Detail data only
/// fills gaps or extends; it never erases feed fields.
pub fn merge_detail(base: &mut ListingCandidate, detail: ListingCandidate) {
    if detail
        .description
        .as_ref()
        .map(|d| d.len() > base.description.as_deref().map_or(0, str::len))
        .unwrap_or(false)
    {
        base.description = detail.description;
    }
    if base.highlights.is_empty() {
        base.highlights = detail.highlights;
    }
    if base.asking_price == 0 {
        base.asking_price = detail.asking_price;
    }
    if base.annual_revenue == 0 {
        base.annual_revenue = detail.annual_revenue;
    }
    if base.location == LOCATION_DEFAULT && detail.location != LOCATION_DEFAULT {
        base.location = detail.location;
    }
    if base.industry == INDUSTRY_DEFAULT && detail.industry != INDUSTRY_DEFAULT {
        base.industry = detail.industry;
    }
}

/// Apply the ordered container selectors; the first one yielding more than
/// `min_container_hits` elements wins, earliest in the list on ties.
fn select_containers<'a>(doc: &'a Html, rules: &ExtractionRules) -> Option<Vec<ElementRef<'a>>> {
    for raw in &rules.containers {
        let sel = match Selector::parse(raw) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let found: Vec<ElementRef<'a>> = doc.select(&sel).collect();
        if found.len() > rules.min_container_hits {
            return Some(found);
        }
    }
    None
}

fn build_candidate(
    el: ElementRef<'_>,
    rules: &ExtractionRules,
    profile: &SiteProfile,
) -> Option<ListingCandidate> {
    let name_sels = compile(&rules.name);
    let name = first_text(el, &name_sels)
        .filter(|n| n.chars().count() >= MIN_NAME_LEN)
        .or_else(|| title_from_text(el))?;

    let mut candidate = ListingCandidate::new(&name, profile.name);

    let price_sels = compile(&rules.price);
    candidate.asking_price = first_text(el, &price_sels)
        .and_then(|t| parse_price(&t))
        .or_else(|| price_from_free_text(&normalized_text(el)))
        .filter(|v| is_plausible_amount(*v))
        .unwrap_or(0);

    let revenue_sels = compile(&rules.revenue);
    candidate.annual_revenue = first_text(el, &revenue_sels)
        .and_then(|t| parse_price(&t))
        .filter(|v| is_plausible_amount(*v))
        .unwrap_or(0);

    let location_sels = compile(&rules.location);
    candidate.location = first_text(el, &location_sels)
        .and_then(|t| classify_location(&t))
        .unwrap_or_else(|| LOCATION_DEFAULT.to_string());

    let description_sels = compile(&rules.description);
    if let Some(desc) = first_text(el, &description_sels) {
        candidate.set_description(&desc);
    }

    let highlight_sels = compile(&rules.highlights);
    for h in collect_texts(el, &highlight_sels, MAX_HIGHLIGHTS) {
        candidate.push_highlight(&h);
    }

    let link_sels = compile(&rules.link);
    candidate.original_url = first_href(el, &link_sels).and_then(|href| profile.resolve_url(&href));

    let classify_input = format!(
        "{} {}",
        candidate.name,
        candidate.description.as_deref().unwrap_or("")
    );
    candidate.industry = classify_industry(&classify_input);

    Some(candidate)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::builtin_profiles;

    fn bizbuysell() -> SiteProfile {
        builtin_profiles()
            .into_iter()
            .find(|p| p.name == "bizbuysell")
            .unwrap()
    }

    fn feed_fixture() -> String {
        std::fs::read_to_string("tests/fixtures/feed_page.html").unwrap()
    }

    fn detail_fixture() -> String {
        std::fs::read_to_string("tests/fixtures/detail_page.html").unwrap()
    }

    #[test]
    fn feed_page_extracts_named_cards_only() {
        let profile = bizbuysell();
        let candidates = extract_listings(&feed_fixture(), &profile);
        // Three containers in the fixture, one without a name.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].asking_price, 500_000);
        assert_eq!(candidates[1].asking_price, 2_100_000);
        assert!(candidates.iter().all(|c| c.source == "bizbuysell"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let profile = bizbuysell();
        let html = feed_fixture();
        let first = extract_listings(&html, &profile);
        let second = extract_listings(&html, &profile);
        assert_eq!(first, second);
    }

    #[test]
    fn feed_links_resolve_against_base() {
        let profile = bizbuysell();
        let candidates = extract_listings(&feed_fixture(), &profile);
        let url = candidates[0].original_url.as_deref().unwrap();
        assert!(url.starts_with("https://www.bizbuysell.com/"), "{}", url);
    }

    #[test]
    fn detail_page_yields_full_record() {
        let profile = bizbuysell();
        let detail = extract_detail(&detail_fixture(), &profile).unwrap();
        assert!(detail.name.chars().count() >= MIN_NAME_LEN);
        assert!(detail.description.is_some());
        assert!(!detail.highlights.is_empty());
    }

    #[test]
    fn merge_fills_gaps_without_erasing() {
        let profile = bizbuysell();
        let mut base = extract_listings(&feed_fixture(), &profile).remove(0);
        let feed_price = base.asking_price;
        let detail = extract_detail(&detail_fixture(), &profile).unwrap();
        merge_detail(&mut base, detail);
        assert_eq!(base.asking_price, feed_price);
        assert!(base.description.is_some());
        assert!(!base.highlights.is_empty());
    }

    #[test]
    fn implausible_amounts_become_unknown() {
        let profile = bizbuysell();
        let html = r#"
            <div class="listing-container"><h3 class="title">Tiny Sticker Stand For Sale</h3>
                <span class="asking-price">$3</span></div>
            <div class="listing-container"><h3 class="title">Another Real Business Here</h3>
                <span class="asking-price">$250,000</span></div>
        "#;
        let candidates = extract_listings(html, &profile);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].asking_price, 0);
        assert_eq!(candidates[1].asking_price, 250_000);
    }
}
