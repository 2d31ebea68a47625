//! Narrow interface to the persisted listing store.
//!
//! The pipeline only ever needs read-all, write-new, a few single-field
//! updates, delete-by-id and a change subscription, plus the side table of
//! previously processed link hashes. Anything speaking this trait (the
//! bundled JSON file store, or a real-time backend) can sit behind it.

pub mod json;

pub use json::JsonFileStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{Listing, NewListing, Variant};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("listing {0} not found")]
    NotFound(String),
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fired on any add, update or removal anywhere in the collection.
/// Consumers re-derive their views from scratch; there is no patch payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    ListingsChanged,
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Snapshot of every persisted record.
    async fn list_all(&self) -> StoreResult<Vec<Listing>>;

    /// Persist a new record, returning its store-assigned identifier.
    async fn insert(&self, listing: NewListing) -> StoreResult<String>;

    /// User-controlled suppression flag; single-field update.
    async fn set_hidden(&self, id: &str, hidden: bool) -> StoreResult<()>;

    /// User-controlled favorite flag; single-field update.
    async fn set_favorited(&self, id: &str, favorited: bool) -> StoreResult<()>;

    /// Attach a variant only when the record has none yet. Returns whether
    /// anything was written; this is the one additive update the pipeline makes to
    /// an already-persisted record.
    async fn set_variant_if_absent(&self, id: &str, variant: Variant) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Subscribe to collection change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Side table of link hashes already ingested by any path.
    async fn is_hash_processed(&self, hash: &str) -> StoreResult<bool>;

    async fn mark_hash_processed(&self, hash: &str) -> StoreResult<()>;
}
