//! JSON-file-backed implementation of the store seam: an in-memory map
//! persisted as a pretty-printed JSON image after every mutation, with
//! broadcast change notifications.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::models::{Listing, NewListing, Variant};
use crate::store::{ListingStore, StoreError, StoreEvent, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreImage {
    listings: BTreeMap<String, Listing>,
    processed_hashes: BTreeSet<String>,
    next_id: u64,
}

/// Listing store persisted as a single JSON document on disk.
///
/// Cheap to clone; clones share the same underlying state and notification
/// channel.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<Mutex<StoreImage>>,
    path: Option<PathBuf>,
    tx: broadcast::Sender<StoreEvent>,
}

impl JsonFileStore {
    /// Purely in-memory store, used by tests and dry runs.
    pub fn in_memory() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(StoreImage::default())),
            path: None,
            tx,
        }
    }

    /// Open a store backed by `path`, loading the existing image if the
    /// file is already there.
    pub async fn open(path: PathBuf) -> StoreResult<Self> {
        let image = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreImage::default(),
            Err(err) => return Err(err.into()),
        };
        let (tx, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(Mutex::new(image)),
            path: Some(path),
            tx,
        })
    }

    async fn persist(&self, image: &StoreImage) -> StoreResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(image)?;
            tokio::fs::write(path, json).await?;
        }
        Ok(())
    }

    fn notify(&self) {
        // No receivers is fine; the notification is best-effort.
        let _ = self.tx.send(StoreEvent::ListingsChanged);
    }
}

#[async_trait]
impl ListingStore for JsonFileStore {
    async fn list_all(&self) -> StoreResult<Vec<Listing>> {
        let image = self.inner.lock().await;
        Ok(image.listings.values().cloned().collect())
    }

    async fn insert(&self, listing: NewListing) -> StoreResult<String> {
        let mut image = self.inner.lock().await;
        image.next_id += 1;
        let id = format!("l{:06}", image.next_id);
        image
            .listings
            .insert(id.clone(), Listing::from_new(id.clone(), listing));
        self.persist(&image).await?;
        drop(image);
        self.notify();
        debug!("inserted listing {id}");
        Ok(id)
    }

    async fn set_hidden(&self, id: &str, hidden: bool) -> StoreResult<()> {
        let mut image = self.inner.lock().await;
        let listing = image
            .listings
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        listing.hidden = hidden;
        self.persist(&image).await?;
        drop(image);
        self.notify();
        Ok(())
    }

    async fn set_favorited(&self, id: &str, favorited: bool) -> StoreResult<()> {
        let mut image = self.inner.lock().await;
        let listing = image
            .listings
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        listing.favorited = favorited;
        self.persist(&image).await?;
        drop(image);
        self.notify();
        Ok(())
    }

    async fn set_variant_if_absent(&self, id: &str, variant: Variant) -> StoreResult<bool> {
        let mut image = self.inner.lock().await;
        let listing = image
            .listings
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if listing.variant.is_some() {
            return Ok(false);
        }
        listing.variant = Some(variant);
        self.persist(&image).await?;
        drop(image);
        self.notify();
        Ok(true)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut image = self.inner.lock().await;
        if image.listings.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.persist(&image).await?;
        drop(image);
        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    async fn is_hash_processed(&self, hash: &str) -> StoreResult<bool> {
        let image = self.inner.lock().await;
        Ok(image.processed_hashes.contains(hash))
    }

    async fn mark_hash_processed(&self, hash: &str) -> StoreResult<()> {
        let mut image = self.inner.lock().await;
        image.processed_hashes.insert(hash.to_string());
        self.persist(&image).await
    }
}
