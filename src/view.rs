//! Filter/sort view-model: given the full canonical record set and a filter
//! selection, derive the visible ordered subset. Pure, except for reporting
//! which records the "ships to you" rule wants hidden; persisting those is
//! the caller's (idempotent, asynchronous) job.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::dedup::dedupe_keep_oldest;
use crate::models::{epoch, parse_timestamp, Listing, Variant};
use crate::store::{ListingStore, StoreResult};
use crate::sync::SyncEngine;

/// Phrase that marks a shipping-only (non-local) listing.
const SHIP_TO_YOU: &str = "ship to you";

/// Device-category filter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFilter {
    /// Any iPhone-family model string.
    IphoneFamily,
    /// Anything that is not iPhone-family.
    Other,
    /// An exact model string, compared case-insensitively.
    Named(String),
}

/// iPhone generation filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFilter {
    Gen(u8),
    /// iPhone family, but older than generation 13.
    Older,
}

/// Recency buckets offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyBucket {
    LastHour,
    Last12Hours,
    LastDay,
    Last3Days,
}

impl RecencyBucket {
    fn max_age(self) -> Duration {
        match self {
            RecencyBucket::LastHour => Duration::hours(1),
            RecencyBucket::Last12Hours => Duration::hours(12),
            RecencyBucket::LastDay => Duration::hours(24),
            RecencyBucket::Last3Days => Duration::hours(72),
        }
    }
}

/// Inclusive price bounds in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

/// One multi-dimensional filter selection. A record must satisfy every
/// active dimension; within a dimension any selected value suffices. An
/// empty dimension is inactive.
#[derive(Debug, Clone, Default)]
pub struct FilterSelection {
    pub models: Vec<ModelFilter>,
    pub generations: Vec<GenerationFilter>,
    pub variants: Vec<Variant>,
    pub cities: Vec<String>,
    pub recency: Vec<RecencyBucket>,
    pub price: Option<PriceRange>,
    pub search: Option<String>,
    pub show_hidden: bool,
    pub favorites_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Price,
    Title,
    Location,
    Model,
    FoundAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Single active sort key with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Price,
            order: SortOrder::Ascending,
        }
    }
}

impl SortSpec {
    /// Clicking an already-active key flips the order; a new key starts
    /// descending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.order = match self.order {
                SortOrder::Ascending => SortOrder::Descending,
                SortOrder::Descending => SortOrder::Ascending,
            };
        } else {
            self.key = key;
            self.order = SortOrder::Descending;
        }
    }
}

/// The derived view plus the ids the auto-hide rule wants persisted as
/// hidden (never contains records that are already hidden).
#[derive(Debug, Clone)]
pub struct FilteredView {
    pub listings: Vec<Listing>,
    pub auto_hide: Vec<String>,
}

/// Derive the visible ordered subset from scratch. Safe to over-trigger on
/// every store notification.
pub fn apply_filters(
    listings: &[Listing],
    filter: &FilterSelection,
    sort: &SortSpec,
    now: DateTime<Utc>,
) -> FilteredView {
    let mut auto_hide = Vec::new();
    let mut visible = Vec::new();

    for listing in listings {
        let mut listing = listing.clone();
        if mentions_shipping(&listing) {
            if !listing.hidden {
                auto_hide.push(listing.id.clone());
            }
            listing.hidden = true;
        }
        if passes(&listing, filter, now) {
            visible.push(listing);
        }
    }

    sort_listings(&mut visible, sort);
    FilteredView {
        listings: visible,
        auto_hide,
    }
}

/// One full refresh of the dashboard feed: fetch everything, collapse to
/// the canonical one-record-per-link set, derive the filtered view, and
/// persist any new auto-hide verdicts.
///
/// This is what a store change notification triggers. It is idempotent, so
/// rapid or concurrent notifications are safe to over-trigger: re-running
/// on unchanged data hides nothing new and returns the same view.
pub async fn derive_view<S: ListingStore>(
    sync: &SyncEngine<S>,
    filter: &FilterSelection,
    sort: &SortSpec,
) -> StoreResult<FilteredView> {
    let all = sync.store().list_all().await?;
    let canonical = dedupe_keep_oldest(all).unique;
    let view = apply_filters(&canonical, filter, sort, Utc::now());
    if !view.auto_hide.is_empty() {
        sync.apply_auto_hide(&view.auto_hide).await?;
    }
    Ok(view)
}

fn mentions_shipping(listing: &Listing) -> bool {
    listing.title.to_lowercase().contains(SHIP_TO_YOU)
        || listing.location.to_lowercase().contains(SHIP_TO_YOU)
}

fn passes(listing: &Listing, filter: &FilterSelection, now: DateTime<Utc>) -> bool {
    if !filter.models.is_empty() && !filter.models.iter().any(|m| model_matches(listing, m)) {
        return false;
    }
    if !filter.generations.is_empty()
        && !filter
            .generations
            .iter()
            .any(|g| generation_matches(listing, *g))
    {
        return false;
    }
    if !filter.variants.is_empty()
        && !listing
            .variant
            .is_some_and(|v| filter.variants.contains(&v))
    {
        return false;
    }
    if !filter.cities.is_empty()
        && !filter
            .cities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&listing.search_city))
    {
        return false;
    }
    if !filter.recency.is_empty() {
        let age = now - listing.observed_at();
        if !filter.recency.iter().any(|b| age <= b.max_age()) {
            return false;
        }
    }
    if let Some(range) = &filter.price {
        if listing.price < range.min || listing.price > range.max {
            return false;
        }
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let term = term.to_lowercase();
        let hit = listing.title.to_lowercase().contains(&term)
            || listing.model.to_lowercase().contains(&term)
            || listing.location.to_lowercase().contains(&term);
        if !hit {
            return false;
        }
    }
    if filter.favorites_only && !listing.favorited {
        return false;
    }
    if !filter.show_hidden && listing.hidden {
        return false;
    }
    true
}

fn model_matches(listing: &Listing, filter: &ModelFilter) -> bool {
    let is_iphone = listing.model.to_lowercase().contains("iphone");
    match filter {
        ModelFilter::IphoneFamily => is_iphone,
        ModelFilter::Other => !is_iphone,
        ModelFilter::Named(name) => listing.model.eq_ignore_ascii_case(name),
    }
}

fn generation_matches(listing: &Listing, filter: GenerationFilter) -> bool {
    let gen = iphone_generation(&listing.model);
    match filter {
        GenerationFilter::Gen(wanted) => gen == Some(wanted),
        GenerationFilter::Older => {
            listing.model.to_lowercase().contains("iphone")
                && !matches!(gen, Some(13..=17))
        }
    }
}

/// Generation number in a model string like "iPhone 15 Pro Max".
fn iphone_generation(model: &str) -> Option<u8> {
    let lower = model.to_lowercase();
    let rest = lower[lower.find("iphone")? + "iphone".len()..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn sort_listings(listings: &mut [Listing], sort: &SortSpec) {
    listings.sort_by(|a, b| {
        let ord = match sort.key {
            SortKey::Price => a.price.cmp(&b.price),
            SortKey::FoundAt => found_time(a).cmp(&found_time(b)),
            SortKey::Title => cmp_text(&a.title, &b.title),
            SortKey::Location => cmp_text(&a.location, &b.location),
            SortKey::Model => cmp_text(&a.model, &b.model),
        };
        match sort.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

fn found_time(listing: &Listing) -> DateTime<Utc> {
    parse_timestamp(listing.found_at.as_deref()).unwrap_or_else(epoch)
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
