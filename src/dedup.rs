//! Cross-cycle deduplication: collapse every observation of the same
//! marketplace link into the single earliest-observed record.

use std::collections::HashMap;

use tracing::info;

use crate::models::Listing;

/// Result of one deduplication pass.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Canonical set, one entry per distinct link, in first-seen order.
    pub unique: Vec<Listing>,
    /// How many input records were discarded (duplicates and link-less).
    pub duplicates_removed: usize,
}

/// Collapse the accumulated observation set to one record per link.
///
/// The retained record is the one with the earliest observation time
/// (`detected_at` falling back to `found_at`; unparseable values compare as
/// the epoch). Records with no link cannot be deduplicated and are dropped
/// outright. When both candidates collapse to the epoch the incumbent is
/// kept, a deterministic tie-break rather than a meaningful one.
pub fn dedupe_keep_oldest(listings: Vec<Listing>) -> DedupOutcome {
    let total = listings.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Listing> = Vec::new();

    for listing in listings {
        if listing.link.trim().is_empty() {
            continue;
        }
        match index.get(&listing.link) {
            None => {
                index.insert(listing.link.clone(), unique.len());
                unique.push(listing);
            }
            Some(&slot) => {
                if listing.observed_at() < unique[slot].observed_at() {
                    unique[slot] = listing;
                }
            }
        }
    }

    let duplicates_removed = total - unique.len();
    if duplicates_removed > 0 {
        info!(
            "collapsed {} duplicates, {} unique listings remain",
            duplicates_removed,
            unique.len()
        );
    }

    DedupOutcome {
        unique,
        duplicates_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, link: &str, found_at: Option<&str>) -> Listing {
        Listing {
            id: id.into(),
            title: "iPhone 15".into(),
            price: 100,
            location: "Austin".into(),
            link: link.into(),
            model: "iPhone 15".into(),
            variant: None,
            search_city: "Austin".into(),
            source: "marketplace".into(),
            found_at: found_at.map(Into::into),
            detected_at: None,
            hidden: false,
            favorited: false,
        }
    }

    #[test]
    fn keeps_the_earliest_observation_per_link() {
        let outcome = dedupe_keep_oldest(vec![
            listing("a", "https://x/item/1", Some("2024-01-02T00:00:00Z")),
            listing("b", "https://x/item/1", Some("2024-01-01T00:00:00Z")),
        ]);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].id, "b");
    }

    #[test]
    fn earliest_wins_over_every_discarded_duplicate() {
        let outcome = dedupe_keep_oldest(vec![
            listing("a", "https://x/item/1", Some("2024-03-01T00:00:00Z")),
            listing("b", "https://x/item/1", Some("2024-01-01T00:00:00Z")),
            listing("c", "https://x/item/1", Some("2024-02-01T00:00:00Z")),
            listing("d", "https://x/item/2", Some("2024-02-01T00:00:00Z")),
        ]);
        assert_eq!(outcome.unique.len(), 2);
        let canonical = &outcome.unique[0];
        assert_eq!(canonical.id, "b");
    }

    #[test]
    fn linkless_records_are_excluded() {
        let outcome = dedupe_keep_oldest(vec![
            listing("a", "", Some("2024-01-01T00:00:00Z")),
            listing("b", "https://x/item/1", Some("2024-01-01T00:00:00Z")),
        ]);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].id, "b");
        assert_eq!(outcome.duplicates_removed, 1);
    }

    #[test]
    fn dedup_is_idempotent() {
        let first = dedupe_keep_oldest(vec![
            listing("a", "https://x/item/1", Some("2024-01-02T00:00:00Z")),
            listing("b", "https://x/item/1", Some("2024-01-01T00:00:00Z")),
            listing("c", "https://x/item/2", None),
        ]);
        let second = dedupe_keep_oldest(first.unique.clone());
        assert_eq!(second.duplicates_removed, 0);
        assert_eq!(second.unique, first.unique);
    }

    #[test]
    fn unparseable_timestamp_ties_keep_the_incumbent() {
        let outcome = dedupe_keep_oldest(vec![
            listing("a", "https://x/item/1", Some("not a date")),
            listing("b", "https://x/item/1", None),
        ]);
        assert_eq!(outcome.unique[0].id, "a");
    }
}
