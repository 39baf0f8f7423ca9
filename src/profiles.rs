//! Static per-site configuration driving the generic pipeline.
//!
//! Profiles are defined once at startup and immutable for the whole run.
//! Selector lists are ordered: the extractor takes the first one that works.

use url::Url;

/// Ordered CSS-selector lists for one page shape (feed card or detail page).
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// Candidate container selectors, tried in order. The first selector
    /// with more than `min_container_hits` matches wins.
    pub containers: Vec<&'static str>,
    pub min_container_hits: usize,
    pub name: Vec<&'static str>,
    pub price: Vec<&'static str>,
    pub revenue: Vec<&'static str>,
    pub location: Vec<&'static str>,
    pub description: Vec<&'static str>,
    pub link: Vec<&'static str>,
    pub highlights: Vec<&'static str>,
}

impl ExtractionRules {
    fn feed() -> Self {
        ExtractionRules {
            containers: Vec::new(),
            // A real feed page has many cards; a single hit is usually a
            // navigation element matching by accident.
            min_container_hits: 1,
            name: Vec::new(),
            price: Vec::new(),
            revenue: Vec::new(),
            location: Vec::new(),
            description: Vec::new(),
            link: Vec::new(),
            highlights: Vec::new(),
        }
    }

    fn detail() -> Self {
        ExtractionRules {
            min_container_hits: 0,
            ..Self::feed()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Stable source identifier stored with every listing.
    pub name: &'static str,
    pub base_url: &'static str,
    /// Paginated feed URL, `{page}` replaced with a 1-based page number.
    pub feed_url_template: &'static str,
    pub max_pages: usize,
    pub detail_batch_size: usize,
    pub batch_delay_ms: u64,
    pub feed: ExtractionRules,
    pub detail: ExtractionRules,
}

impl SiteProfile {
    pub fn feed_url(&self, page: usize) -> String {
        self.feed_url_template.replace("{page}", &page.to_string())
    }

    /// Resolve a possibly relative href against the site base.
    pub fn resolve_url(&self, href: &str) -> Option<String> {
        let base = Url::parse(self.base_url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }

    pub fn matches_host(&self, url: &str) -> bool {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(String::from)) {
            Some(h) => h,
            None => return false,
        };
        Url::parse(self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .map(|base_host| host.trim_start_matches("www.") == base_host.trim_start_matches("www."))
            .unwrap_or(false)
    }
}

/// The built-in marketplace table.
pub fn builtin_profiles() -> Vec<SiteProfile> {
    vec![bizbuysell(), empire_flippers(), quietlight(), flippa()]
}

pub fn find_profile<'a>(profiles: &'a [SiteProfile], name: &str) -> Option<&'a SiteProfile> {
    profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Pick the profile whose host matches the URL, for single-page probes.
pub fn profile_for_url<'a>(profiles: &'a [SiteProfile], url: &str) -> Option<&'a SiteProfile> {
    profiles.iter().find(|p| p.matches_host(url))
}

fn bizbuysell() -> SiteProfile {
    SiteProfile {
        name: "bizbuysell",
        base_url: "https://www.bizbuysell.com",
        feed_url_template: "https://www.bizbuysell.com/businesses-for-sale/{page}",
        max_pages: 5,
        detail_batch_size: 5,
        batch_delay_ms: 2000,
        feed: ExtractionRules {
            containers: vec!["app-listing-showcase", "div.listing-container", "article.listing"],
            name: vec!["h3.title", "a.title", "h3", "h2"],
            price: vec!["span.asking-price", "p.asking-price", "span.price"],
            revenue: vec!["span.cash-flow", "p.cash-flow"],
            location: vec!["span.location", "p.location"],
            description: vec!["p.description", "p.tagline"],
            link: vec!["a.title", "a"],
            highlights: vec![],
            ..ExtractionRules::feed()
        },
        detail: ExtractionRules {
            containers: vec!["div.bfsDetails", "main", "body"],
            name: vec!["h1.bfsTitle", "h1"],
            price: vec!["span.price", "div.price-container span"],
            revenue: vec!["span.cash-flow", "span.gross-revenue"],
            location: vec!["span.location", "h2.gray"],
            description: vec!["div.businessDescription", "div.description"],
            link: vec![],
            highlights: vec!["div.listingProfile li", "ul.details li"],
            ..ExtractionRules::detail()
        },
    }
}

fn empire_flippers() -> SiteProfile {
    SiteProfile {
        name: "empireflippers",
        base_url: "https://empireflippers.com",
        feed_url_template: "https://empireflippers.com/marketplace/page/{page}/",
        max_pages: 4,
        detail_batch_size: 5,
        batch_delay_ms: 2000,
        feed: ExtractionRules {
            containers: vec!["div.listing-card", "div.marketplace-listing", "article"],
            name: vec!["h2.listing-title", "h3", "h2"],
            price: vec!["span.listing-price", "div.price strong", "span.price"],
            revenue: vec!["span.monthly-net-profit", "div.profit span"],
            location: vec![],
            description: vec!["p.listing-summary", "p"],
            link: vec!["a.listing-link", "a"],
            highlights: vec![],
            ..ExtractionRules::feed()
        },
        detail: ExtractionRules {
            containers: vec!["div.listing-detail", "main", "body"],
            name: vec!["h1.listing-title", "h1"],
            price: vec!["span.listing-price", "div.price strong"],
            revenue: vec!["span.monthly-net-profit", "td.profit"],
            location: vec![],
            description: vec!["div.listing-description", "section.summary"],
            link: vec![],
            highlights: vec!["ul.listing-highlights li", "div.highlights li"],
            ..ExtractionRules::detail()
        },
    }
}

fn quietlight() -> SiteProfile {
    SiteProfile {
        name: "quietlight",
        base_url: "https://quietlight.com",
        feed_url_template: "https://quietlight.com/listings/page/{page}/",
        max_pages: 3,
        detail_batch_size: 5,
        batch_delay_ms: 2000,
        feed: ExtractionRules {
            containers: vec!["article.listing", "div.listing-card", "div.listing"],
            name: vec!["h2.entry-title a", "h2 a", "h3"],
            price: vec!["span.price", "div.listing-price"],
            revenue: vec!["span.revenue", "div.listing-revenue"],
            location: vec![],
            description: vec!["div.entry-summary", "p.excerpt", "p"],
            link: vec!["h2.entry-title a", "a"],
            highlights: vec![],
            ..ExtractionRules::feed()
        },
        detail: ExtractionRules {
            containers: vec!["article", "main", "body"],
            name: vec!["h1.entry-title", "h1"],
            price: vec!["span.price", "li.price strong"],
            revenue: vec!["span.revenue", "li.revenue strong"],
            location: vec![],
            description: vec!["div.entry-content", "div.listing-description"],
            link: vec![],
            highlights: vec!["ul.listing-facts li", "div.entry-content li"],
            ..ExtractionRules::detail()
        },
    }
}

fn flippa() -> SiteProfile {
    SiteProfile {
        name: "flippa",
        base_url: "https://flippa.com",
        feed_url_template: "https://flippa.com/search?filter%5Bstatus%5D=open&page%5Bnumber%5D={page}",
        max_pages: 4,
        detail_batch_size: 5,
        batch_delay_ms: 2000,
        feed: ExtractionRules {
            containers: vec!["div.ListingCard", "div[data-listing-id]", "div.search-result"],
            name: vec!["h3.ListingCard__title", "a.GTM-listing-link", "h3", "h2"],
            price: vec!["span.ListingCard__price", "div.current-price", "span.price"],
            revenue: vec!["span.ListingCard__profit", "dd.profit"],
            location: vec!["span.ListingCard__location"],
            description: vec!["p.ListingCard__summary", "p"],
            link: vec!["a.GTM-listing-link", "a"],
            highlights: vec![],
            ..ExtractionRules::feed()
        },
        detail: ExtractionRules {
            containers: vec!["div.listing-page", "main", "body"],
            name: vec!["h1.listing-title", "h1"],
            price: vec!["span.current-price", "div.price span"],
            revenue: vec!["dd.profit", "td.net-profit"],
            location: vec!["span.seller-location"],
            description: vec!["div.listing-description", "section.description"],
            link: vec![],
            highlights: vec!["ul.key-points li", "div.highlights li"],
            ..ExtractionRules::detail()
        },
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_substitutes_page() {
        let p = bizbuysell();
        assert_eq!(
            p.feed_url(3),
            "https://www.bizbuysell.com/businesses-for-sale/3"
        );
    }

    #[test]
    fn resolve_relative_href() {
        let p = bizbuysell();
        assert_eq!(
            p.resolve_url("/business-for-sale/cafe/123").as_deref(),
            Some("https://www.bizbuysell.com/business-for-sale/cafe/123")
        );
        // Absolute hrefs pass through.
        assert_eq!(
            p.resolve_url("https://elsewhere.com/x").as_deref(),
            Some("https://elsewhere.com/x")
        );
    }

    #[test]
    fn host_matching_ignores_www() {
        let p = bizbuysell();
        assert!(p.matches_host("https://bizbuysell.com/business-for-sale/1"));
        assert!(!p.matches_host("https://flippa.com/1"));
    }

    #[test]
    fn profile_lookup() {
        let profiles = builtin_profiles();
        assert!(find_profile(&profiles, "Flippa").is_some());
        assert!(find_profile(&profiles, "nope").is_none());
        let by_url = profile_for_url(&profiles, "https://quietlight.com/listings/abc/");
        assert_eq!(by_url.map(|p| p.name), Some("quietlight"));
    }
}
