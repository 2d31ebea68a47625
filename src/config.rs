//! Runtime configuration for the scout, loadable from a JSON file with
//! sensible defaults for every field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Marketplace search page to watch.
    pub search_url: String,
    /// Provenance tag recorded on every listing this instance produces.
    pub search_city: String,
    /// Cycles to run before stopping on our own.
    pub max_cycles: u32,
    /// Scroll-and-settle passes per cycle, letting lazy content populate.
    pub scroll_passes: u32,
    /// Milliseconds to wait after each scroll for content to materialize.
    pub scroll_settle_ms: u64,
    /// Milliseconds between export and reload, so the file write finishes
    /// before the page state is destroyed.
    pub export_settle_ms: u64,
    /// Milliseconds to wait after a reload before the next cycle.
    pub reload_wait_ms: u64,
    /// Upper bound of the random jitter added to the reload wait.
    pub cycle_jitter_ms: u64,
    /// Bulk-delete batch size.
    pub delete_batch_size: usize,
    /// Milliseconds between bulk-delete batches.
    pub delete_batch_pause_ms: u64,
    /// Where the JSON store image lives.
    pub store_path: PathBuf,
    /// Where per-cycle CSV exports land.
    pub export_dir: PathBuf,
    /// Begin scraping without waiting for a start request.
    pub auto_start: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.facebook.com/marketplace/category/electronics".into(),
            search_city: "Austin".into(),
            max_cycles: 10,
            scroll_passes: 2,
            scroll_settle_ms: 1_000,
            export_settle_ms: 1_000,
            reload_wait_ms: 5_000,
            cycle_jitter_ms: 2_000,
            delete_batch_size: 25,
            delete_batch_pause_ms: 250,
            store_path: PathBuf::from("listings.json"),
            export_dir: PathBuf::from("exports"),
            auto_start: false,
        }
    }
}

impl ScoutConfig {
    /// Load from a JSON file, or fall back to defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("failed to parse config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Whether scraping should begin without an explicit start request:
    /// either the config flag, or the `autoscrape=true` marker in the
    /// search URL's query string.
    pub fn should_auto_start(&self) -> bool {
        self.auto_start || self.search_url.contains("autoscrape=true")
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn export_settle(&self) -> Duration {
        Duration::from_millis(self.export_settle_ms)
    }

    pub fn reload_wait(&self) -> Duration {
        Duration::from_millis(self.reload_wait_ms)
    }

    pub fn delete_batch_pause(&self) -> Duration {
        Duration::from_millis(self.delete_batch_pause_ms)
    }
}
