//! Fingerprint extraction from a page snapshot.
//!
//! The card shape is deliberately narrow: a `div` with exactly three `div`
//! children whose first child carries a `$`-prefixed price span, wrapped
//! somewhere inside an anchor. Low recall, high precision: page chrome
//! never matches, and anything that does is a listing card.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::RawListing;

/// Extract listing fingerprints from one HTML snapshot, in document
/// traversal order. Duplicate card nodes rendered by the page's own
/// virtualization are suppressed within the pass.
pub fn extract_listings(html: &str, origin: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let div_selector = Selector::parse("div").unwrap();
    let price_selector = Selector::parse(r#"span[dir="auto"]"#).unwrap();

    let base = Url::parse(origin).ok();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();

    for element in document.select(&div_selector) {
        let children: Vec<ElementRef> =
            element.children().filter_map(ElementRef::wrap).collect();
        if children.len() != 3 || !children.iter().all(|c| c.value().name() == "div") {
            continue;
        }
        let Some(price_el) = children[0].select(&price_selector).next() else {
            continue;
        };
        let price = collapse_text(price_el);
        if !price.starts_with('$') {
            continue;
        }

        let title = collapse_text(children[1]);
        let location = collapse_text(children[2]);
        let link = ancestor_href(element)
            .map(|href| resolve_link(base.as_ref(), &href))
            .unwrap_or_default();

        let row = RawListing {
            price,
            title,
            location,
            link,
        };
        if seen.insert(row.composite_key()) {
            rows.push(row);
        }
    }

    debug!("extracted {} listing cards", rows.len());
    rows
}

/// Visible text of an element: segments trimmed and joined with single
/// spaces, the closest stable analogue of rendered inner text.
fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Href of the nearest ancestor anchor, if any.
fn ancestor_href(element: ElementRef<'_>) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map(String::from)
}

/// Resolve `href` against the page origin; on any failure the raw string
/// is kept as-is rather than losing the observation.
fn resolve_link(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}
