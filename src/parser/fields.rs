//! Per-field extraction rules: ordered selector lists evaluated as a
//! first-success fold, with free-text fallbacks when no selector matches.

use scraper::{ElementRef, Selector};

use super::normalize::parse_price;

/// Title-ish lines shorter than this are badges/labels, longer is prose.
const TITLE_MIN_LEN: usize = 10;
const TITLE_MAX_LEN: usize = 120;

/// Compile a selector list, skipping any that fail to parse.
pub fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// First non-empty text produced by an ordered selector list.
pub fn first_text(el: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    for sel in selectors {
        for found in el.select(sel) {
            let text = normalized_text(found);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First href produced by an ordered selector list.
pub fn first_href(el: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    for sel in selectors {
        for found in el.select(sel) {
            if let Some(href) = found.value().attr("href") {
                let href = href.trim();
                if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") {
                    return Some(href.to_string());
                }
            }
        }
    }
    None
}

/// All texts from the first selector that yields any, bounded by `limit`.
pub fn collect_texts(el: ElementRef<'_>, selectors: &[Selector], limit: usize) -> Vec<String> {
    for sel in selectors {
        let texts: Vec<String> = el
            .select(sel)
            .map(normalized_text)
            .filter(|t| !t.is_empty())
            .take(limit)
            .collect();
        if !texts.is_empty() {
            return texts;
        }
    }
    Vec::new()
}

/// Element text with collapsed whitespace.
pub fn normalized_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fallback when no name selector matched: split the container's visible
/// text into lines and take the first one that looks like a listing title.
pub fn title_from_text(el: ElementRef<'_>) -> Option<String> {
    el.text()
        .map(|chunk| chunk.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|line| looks_like_title(line))
}

fn looks_like_title(line: &str) -> bool {
    let len = line.chars().count();
    if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&len) {
        return false;
    }
    if line.starts_with('$') || line.starts_with("http") {
        return false;
    }
    // Money amounts and metric rows are not titles.
    if line.contains('$') && len < 30 {
        return false;
    }
    line.chars().any(|c| c.is_alphabetic())
}

/// Fallback price scan: only dollar-prefixed amounts, to keep IDs and
/// dates in surrounding text from parsing as prices.
pub fn price_from_free_text(text: &str) -> Option<i64> {
    let idx = text.find('$')?;
    parse_price(&text[idx + 1..])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn fragment(html: &str) -> Html {
        Html::parse_fragment(html)
    }

    #[test]
    fn first_text_respects_order() {
        let html = fragment(r#"<div><h3>Card title here</h3><h2>Second choice</h2></div>"#);
        let sels = compile(&["h4", "h3", "h2"]);
        let got = first_text(html.root_element(), &sels);
        assert_eq!(got.as_deref(), Some("Card title here"));
    }

    #[test]
    fn first_href_skips_anchors() {
        let html = fragment(r##"<div><a href="#top">up</a><a href="/listing/9">go</a></div>"##);
        let sels = compile(&["a"]);
        assert_eq!(
            first_href(html.root_element(), &sels).as_deref(),
            Some("/listing/9")
        );
    }

    #[test]
    fn title_fallback_skips_noise() {
        let html = fragment(
            r#"<div><span>$450K</span><span>Featured</span>
               <span>Established Landscaping Company</span></div>"#,
        );
        assert_eq!(
            title_from_text(html.root_element()).as_deref(),
            Some("Established Landscaping Company")
        );
    }

    #[test]
    fn free_text_price_needs_dollar() {
        assert_eq!(price_from_free_text("asking $450K firm"), Some(450_000));
        assert_eq!(price_from_free_text("established 1998"), None);
    }
}
