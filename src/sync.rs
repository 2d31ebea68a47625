//! Reconciliation of freshly-extracted batches against the persisted store:
//! at-most-once-per-link writes, additive variant backfill, user flag
//! updates and paced bulk deletes.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::models::NewListing;
use crate::store::{ListingStore, StoreError, StoreResult};

/// Outcome of reconciling one extracted batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub variant_backfilled: usize,
    pub duplicates_skipped: usize,
}

/// A bulk delete that failed partway. `removed` is how many records were
/// actually deleted before the failure.
#[derive(Debug, Error)]
#[error("bulk delete stopped after removing {removed} listings: {source}")]
pub struct BulkDeleteError {
    pub removed: usize,
    #[source]
    pub source: StoreError,
}

pub struct SyncEngine<S> {
    store: S,
    batch_size: usize,
    batch_pause: Duration,
}

impl<S: ListingStore> SyncEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: 25,
            batch_pause: Duration::from_millis(250),
        }
    }

    /// Batch size and inter-batch pause used by bulk deletes.
    pub fn with_batching(mut self, batch_size: usize, batch_pause: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_pause = batch_pause;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile a classified batch against the persisted set.
    ///
    /// New links are written; links already persisted are never overwritten,
    /// except to attach a variant the stored record lacks. A link counts as
    /// "already persisted" by exact value, by the marketplace item id
    /// embedded in its path, or by its hash in the processed side table.
    pub async fn sync_batch(&self, batch: Vec<NewListing>) -> StoreResult<SyncReport> {
        let existing = self.store.list_all().await?;

        // (store id, whether a variant is already attached), keyed two ways.
        let mut by_link: HashMap<String, (String, bool)> = HashMap::new();
        let mut by_item: HashMap<String, (String, bool)> = HashMap::new();
        for listing in &existing {
            let entry = (listing.id.clone(), listing.variant.is_some());
            if let Some(item) = marketplace_item_id(&listing.link) {
                by_item.insert(item, entry.clone());
            }
            by_link.insert(listing.link.clone(), entry);
        }

        let mut report = SyncReport::default();
        for new in batch {
            let known = by_link
                .get(&new.link)
                .or_else(|| {
                    marketplace_item_id(&new.link).and_then(|item| by_item.get(&item))
                })
                .cloned();

            if let Some((id, has_variant)) = known {
                match (has_variant, new.variant) {
                    (false, Some(variant)) => {
                        if self.store.set_variant_if_absent(&id, variant).await? {
                            report.variant_backfilled += 1;
                            by_link.insert(new.link.clone(), (id.clone(), true));
                            if let Some(item) = marketplace_item_id(&new.link) {
                                by_item.insert(item, (id, true));
                            }
                        } else {
                            report.duplicates_skipped += 1;
                        }
                    }
                    _ => report.duplicates_skipped += 1,
                }
                continue;
            }

            if self.store.is_hash_processed(&new.link_hash).await? {
                report.duplicates_skipped += 1;
                continue;
            }

            let link = new.link.clone();
            let hash = new.link_hash.clone();
            let has_variant = new.variant.is_some();
            let id = self.store.insert(new).await?;
            self.store.mark_hash_processed(&hash).await?;
            let entry = (id, has_variant);
            if let Some(item) = marketplace_item_id(&link) {
                by_item.insert(item, entry.clone());
            }
            by_link.insert(link, entry);
            report.created += 1;
        }

        info!(
            "sync: {} created, {} variants backfilled, {} duplicates skipped",
            report.created, report.variant_backfilled, report.duplicates_skipped
        );
        Ok(report)
    }

    /// User-triggered suppression toggle; bypasses dedup and classification.
    pub async fn set_hidden(&self, id: &str, hidden: bool) -> StoreResult<()> {
        self.store.set_hidden(id, hidden).await
    }

    /// User-triggered favorite toggle; bypasses dedup and classification.
    pub async fn set_favorited(&self, id: &str, favorited: bool) -> StoreResult<()> {
        self.store.set_favorited(id, favorited).await
    }

    /// Persist the view-model's auto-hide verdicts. Idempotent: callers
    /// only pass records that are not hidden yet.
    pub async fn apply_auto_hide(&self, ids: &[String]) -> StoreResult<usize> {
        for id in ids {
            self.store.set_hidden(id, true).await?;
        }
        Ok(ids.len())
    }

    /// Delete the given records in paced batches. On a mid-batch failure
    /// the remaining batches are left untouched and the error reports how
    /// many records were removed before it.
    pub async fn delete_ids(&self, ids: &[String]) -> Result<usize, BulkDeleteError> {
        let mut removed = 0;
        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            for id in chunk {
                match self.store.delete(id).await {
                    Ok(()) => removed += 1,
                    Err(source) => return Err(BulkDeleteError { removed, source }),
                }
            }
        }
        Ok(removed)
    }

    /// Delete every persisted record.
    pub async fn delete_all(&self) -> Result<usize, BulkDeleteError> {
        let ids: Vec<String> = self
            .store
            .list_all()
            .await
            .map_err(|source| BulkDeleteError { removed: 0, source })?
            .into_iter()
            .map(|l| l.id)
            .collect();
        self.delete_ids(&ids).await
    }
}

/// Numeric item id embedded in a marketplace link path (`/item/12345/`),
/// if present. Lets two URL spellings of one listing deduplicate.
pub fn marketplace_item_id(link: &str) -> Option<String> {
    let start = link.find("/item/")? + "/item/".len();
    let digits: String = link[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::classify::classify_listing;
    use crate::models::{RawListing, Variant};
    use crate::store::JsonFileStore;

    fn observed(title: &str, link: &str) -> NewListing {
        let raw = RawListing {
            price: "$650".into(),
            title: title.into(),
            location: "Dallas, TX".into(),
            link: link.into(),
        };
        classify_listing(&raw, "Dallas", Utc::now()).unwrap()
    }

    fn engine() -> SyncEngine<JsonFileStore> {
        SyncEngine::new(JsonFileStore::in_memory())
            .with_batching(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn new_links_are_created_once() {
        let sync = engine();
        let report = sync
            .sync_batch(vec![
                observed("iPhone 15 Pro", "https://x/marketplace/item/1/"),
                observed("iPhone 14", "https://x/marketplace/item/2/"),
            ])
            .await
            .unwrap();
        assert_eq!(report.created, 2);

        // Re-syncing the same batch writes nothing.
        let report = sync
            .sync_batch(vec![observed("iPhone 15 Pro", "https://x/marketplace/item/1/")])
            .await
            .unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(sync.store().list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn item_id_matches_across_url_spellings() {
        let sync = engine();
        sync.sync_batch(vec![observed(
            "iPhone 15 Pro",
            "https://x/marketplace/item/42/?ref=search",
        )])
        .await
        .unwrap();
        let report = sync
            .sync_batch(vec![observed(
                "iPhone 15 Pro",
                "https://x/marketplace/item/42/?ref=feed",
            )])
            .await
            .unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(sync.store().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn variant_backfill_is_additive_only() {
        let sync = engine();
        // "iPhone 15 128GB box" has a variant keyword-free title after the
        // generation, but strip it down: persist a record with no variant.
        let mut first = observed("iPhone 15", "https://x/marketplace/item/7/");
        first.variant = None;
        sync.sync_batch(vec![first]).await.unwrap();

        let report = sync
            .sync_batch(vec![observed("iPhone 15 Pro", "https://x/marketplace/item/7/")])
            .await
            .unwrap();
        assert_eq!(report.variant_backfilled, 1);
        assert_eq!(report.created, 0);

        let stored = &sync.store().list_all().await.unwrap()[0];
        assert_eq!(stored.variant, Some(Variant::Pro(15)));
        // The stored title is untouched; only the variant was attached.
        assert_eq!(stored.title, "iPhone 15");

        // A later pass cannot replace the variant.
        let report = sync
            .sync_batch(vec![observed(
                "iPhone 15 Pro Max",
                "https://x/marketplace/item/7/",
            )])
            .await
            .unwrap();
        assert_eq!(report.variant_backfilled, 0);
        assert_eq!(report.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn processed_hashes_block_reingestion() {
        let sync = engine();
        let listing = observed("iPhone 14", "https://x/marketplace/item/9/");
        sync.store()
            .mark_hash_processed(&listing.link_hash)
            .await
            .unwrap();

        let report = sync.sync_batch(vec![listing]).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn bulk_delete_reports_partial_progress() {
        let sync = engine();
        sync.sync_batch(vec![
            observed("iPhone 15", "https://x/marketplace/item/1/"),
            observed("iPhone 14", "https://x/marketplace/item/2/"),
        ])
        .await
        .unwrap();
        let mut ids: Vec<String> = sync
            .store()
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        ids.insert(1, "missing".into());

        let err = sync.delete_ids(&ids).await.unwrap_err();
        assert_eq!(err.removed, 1);
        // The batch after the failure was never touched.
        assert_eq!(sync.store().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_all_clears_the_store() {
        let sync = engine();
        sync.sync_batch(vec![
            observed("iPhone 15", "https://x/marketplace/item/1/"),
            observed("iPhone 14", "https://x/marketplace/item/2/"),
            observed("iPad Pro", "https://x/marketplace/item/3/"),
        ])
        .await
        .unwrap();
        assert_eq!(sync.delete_all().await.unwrap(), 3);
        assert!(sync.store().list_all().await.unwrap().is_empty());
    }

    #[test]
    fn item_id_extraction() {
        assert_eq!(
            marketplace_item_id("https://x/marketplace/item/12345/?ref=a"),
            Some("12345".into())
        );
        assert_eq!(marketplace_item_id("https://x/profile/99"), None);
    }
}
